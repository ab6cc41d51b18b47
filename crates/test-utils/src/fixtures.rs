//! Common test fixtures for CLMU preparation tests.

/// Points of interest used across tests.
pub mod points {
    use clmu_common::GeoPoint;

    /// Central London, the default point of the soil lookup
    pub fn london() -> GeoPoint {
        GeoPoint {
            lat: 51.508965,
            lon: -0.118092,
        }
    }

    /// A point given in the [0, 360) longitude convention (= -160 E)
    pub fn east_360() -> GeoPoint {
        GeoPoint {
            lat: 21.3,
            lon: 200.0,
        }
    }
}

/// 5-minute soil texture grid spacing (degrees).
pub const SOIL_STEP_DEG: f64 = 1.0 / 12.0;

/// Template surface-data dimensions.
pub mod template {
    pub const NUMURBL: usize = 3;
    pub const NUMRAD: usize = 2;
    pub const NLEVURB: usize = 5;
    pub const NLEVSOI: usize = 10;

    /// Value of the template variable the urban source never provides
    pub const NATVEG: f64 = 42.0;
}

/// Time spans used in forcing tests, as `YYYY-MM`.
pub mod time {
    /// Fifteen whole months
    pub const LONG_START: &str = "2012-11";
    pub const LONG_END: &str = "2014-01";
}
