//! Point-of-interest coordinates and longitude conventions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error("Latitude out of range [-90, 90]: {0}")]
    InvalidLatitude(f64),

    #[error("Longitude is not a finite number: {0}")]
    InvalidLongitude(f64),
}

/// A geographic point in degrees.
///
/// Longitudes are accepted in either the [-180, 180) or the [0, 360)
/// convention; use [`GeoPoint::normalized`] before looking the point up in a
/// dataset indexed in [-180, 180).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::InvalidLatitude(lat));
        }
        if !lon.is_finite() {
            return Err(GeoError::InvalidLongitude(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Same point with its longitude mapped into [-180, 180).
    pub fn normalized(&self) -> Self {
        Self {
            lat: self.lat,
            lon: normalize_lon(self.lon),
        }
    }

    /// Offset the point by whole grid steps in each axis.
    pub fn offset(&self, dlat: f64, dlon: f64) -> Self {
        Self {
            lat: self.lat + dlat,
            lon: self.lon + dlon,
        }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Map a longitude into [-180, 180).
pub fn normalize_lon(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Map a negative longitude into the [0, 360) convention.
pub fn wrap_lon_360(lon: f64) -> f64 {
    if lon < 0.0 {
        lon + 360.0
    } else {
        lon
    }
}

/// Index of the coordinate closest to `value`.
///
/// Mirrors a nearest-neighbour snap on a coordinate index: values outside the
/// coordinate range resolve to the edge cell, there is no distance bound.
/// NaN coordinates are skipped; ties resolve to the lower index.
pub fn nearest_index(coords: &[f64], value: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &c) in coords.iter().enumerate() {
        if c.is_nan() {
            continue;
        }
        let d = (c - value).abs();
        match best {
            Some((_, bd)) if d >= bd => {}
            _ => best = Some((i, d)),
        }
    }
    best.map(|(i, _)| i)
}
