//! Synthetic datasets shaped like the real pipeline inputs.
//!
//! Every value follows a documented formula of its indices so tests can
//! check that the right cell, region or time step was picked.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use netcdf_io::{Dataset, Dimension, VarType, Variable};

use crate::fixtures::template::{NATVEG, NLEVSOI, NLEVURB, NUMRAD, NUMURBL};

/// Evenly spaced coordinate values.
pub fn uniform_axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|k| start + step * k as f64).collect()
}

fn var(name: &str, dims: &[(&str, usize)], vartype: VarType, data: Vec<f64>) -> Variable {
    let dims = dims.iter().map(|(n, l)| Dimension::new(*n, *l)).collect();
    Variable::new(name, dims, vartype, data).expect("generator shape")
}

// ============================================================================
// Reanalysis
// ============================================================================

/// How the time axis of a synthetic reanalysis file is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAxis {
    /// `time`, hours since 1900-01-01 (legacy CDS NetCDF)
    Hours1900,
    /// `valid_time`, seconds since 1970-01-01 (current CDS NetCDF)
    ValidTimeSeconds,
}

/// 2 m temperature of cell `(i, j)` at hour `h`: `280 + i + 0.1 j + 0.001 h`.
pub fn era5_t2m(i: usize, j: usize, h: usize) -> f64 {
    280.0 + i as f64 + 0.1 * j as f64 + 0.001 * h as f64
}

/// Surface pressure of latitude row `i`: `100000 + 10 i`.
pub fn era5_sp(i: usize) -> f64 {
    100_000.0 + 10.0 * i as f64
}

/// Hourly gridded single-level reanalysis on `(time, latitude, longitude)`.
///
/// Fields: `t2m` from [`era5_t2m`], `d2m = t2m - 5`, `sp` from [`era5_sp`],
/// `u10 = 3 + j`, `v10 = 4`, `ssrd` 1e6 J/m^2 between 06 and 18 UTC and 0
/// otherwise, `strd = 1.1e6`, `tp = 2e-4`, `fsr = 0.5`. With `packed_sp`
/// the pressure is stored as `i16` with `scale_factor = 10` and
/// `add_offset = 100000`.
pub fn era5_dataset(
    lats: &[f64],
    lons: &[f64],
    start: DateTime<Utc>,
    hours: usize,
    axis: TimeAxis,
    packed_sp: bool,
) -> Dataset {
    let (nlat, nlon) = (lats.len(), lons.len());
    let (time_name, units, unit_secs, epoch) = match axis {
        TimeAxis::Hours1900 => (
            "time",
            "hours since 1900-01-01 00:00:00.0",
            3600.0,
            Utc.with_ymd_and_hms(1900, 1, 1, 0, 0, 0).unwrap(),
        ),
        TimeAxis::ValidTimeSeconds => (
            "valid_time",
            "seconds since 1970-01-01",
            1.0,
            DateTime::<Utc>::UNIX_EPOCH,
        ),
    };

    let mut ds = Dataset::new();
    let times: Vec<f64> = (0..hours)
        .map(|h| {
            let t = start + Duration::hours(h as i64);
            (t - epoch).num_seconds() as f64 / unit_secs
        })
        .collect();
    ds.insert(
        var(time_name, &[(time_name, hours)], VarType::F64, times)
            .with_attr("units", units)
            .with_attr("calendar", "gregorian"),
    )
    .unwrap();
    ds.insert(var("latitude", &[("latitude", nlat)], VarType::F64, lats.to_vec()))
        .unwrap();
    ds.insert(var("longitude", &[("longitude", nlon)], VarType::F64, lons.to_vec()))
        .unwrap();

    let dims = [(time_name, hours), ("latitude", nlat), ("longitude", nlon)];
    let field = |f: &dyn Fn(usize, usize, usize) -> f64| -> Vec<f64> {
        let mut data = Vec::with_capacity(hours * nlat * nlon);
        for h in 0..hours {
            for i in 0..nlat {
                for j in 0..nlon {
                    data.push(f(i, j, h));
                }
            }
        }
        data
    };

    let daylight = |h: usize| (6..18).contains(&(start + Duration::hours(h as i64)).hour());

    let entries: Vec<(&str, &str, Vec<f64>)> = vec![
        ("t2m", "K", field(&|i, j, h| era5_t2m(i, j, h))),
        ("d2m", "K", field(&|i, j, h| era5_t2m(i, j, h) - 5.0)),
        ("u10", "m s**-1", field(&|_, j, _| 3.0 + j as f64)),
        ("v10", "m s**-1", field(&|_, _, _| 4.0)),
        (
            "ssrd",
            "J m**-2",
            field(&|_, _, h| if daylight(h) { 1.0e6 } else { 0.0 }),
        ),
        ("strd", "J m**-2", field(&|_, _, _| 1.1e6)),
        ("tp", "m", field(&|_, _, _| 2.0e-4)),
        ("fsr", "m", field(&|_, _, _| 0.5)),
    ];
    for (name, unit, data) in entries {
        ds.insert(
            var(name, &dims, VarType::F32, data)
                .with_attr("units", unit)
                .with_attr("_FillValue", f32::NAN),
        )
        .unwrap();
    }

    let sp = if packed_sp {
        var(
            "sp",
            &dims,
            VarType::I16,
            field(&|i, _, _| i as f64),
        )
        .with_attr("scale_factor", 10.0f64)
        .with_attr("add_offset", 100_000.0f64)
        .with_attr("_FillValue", -32767i16)
    } else {
        var("sp", &dims, VarType::F64, field(&|i, _, _| era5_sp(i)))
    };
    ds.insert(sp.with_attr("units", "Pa")).unwrap();

    ds
}

// ============================================================================
// Soil texture
// ============================================================================

/// Soil texture raster: `MAPUNITS(lat, lon)` plus `PCT_SAND`/`PCT_CLAY`
/// tables on `(number_of_layers, max_value_mapunit)`.
///
/// `mapunits` is row-major over `(lat, lon)`; `sand[k]` and `clay[k]` are
/// the per-layer percentages of map unit `k`.
pub fn soil_dataset(
    lats: &[f64],
    lons: &[f64],
    mapunits: &[f64],
    sand: &[Vec<f64>],
    clay: &[Vec<f64>],
) -> Dataset {
    let (nlat, nlon) = (lats.len(), lons.len());
    assert_eq!(mapunits.len(), nlat * nlon, "one map unit per cell");
    assert_eq!(sand.len(), clay.len(), "sand and clay tables differ");
    let nunits = sand.len();
    let nlayers = sand.first().map(|s| s.len()).unwrap_or(0);

    let table = |rows: &[Vec<f64>]| {
        let mut data = Vec::with_capacity(nlayers * nunits);
        for layer in 0..nlayers {
            for unit in rows {
                data.push(unit[layer]);
            }
        }
        data
    };

    let mut ds = Dataset::new();
    ds.insert(var("LAT", &[("lat", nlat)], VarType::F64, lats.to_vec()))
        .unwrap();
    ds.insert(var("LON", &[("lon", nlon)], VarType::F64, lons.to_vec()))
        .unwrap();
    ds.insert(var(
        "MAPUNITS",
        &[("lat", nlat), ("lon", nlon)],
        VarType::I32,
        mapunits.to_vec(),
    ))
    .unwrap();
    let table_dims = [("number_of_layers", nlayers), ("max_value_mapunit", nunits)];
    ds.insert(
        var("PCT_SAND", &table_dims, VarType::F32, table(sand)).with_attr("units", "%"),
    )
    .unwrap();
    ds.insert(
        var("PCT_CLAY", &table_dims, VarType::F32, table(clay)).with_attr("units", "%"),
    )
    .unwrap();
    ds
}

// ============================================================================
// Urban morphology
// ============================================================================

/// Number of regions in the synthetic urban dataset.
pub const URBAN_REGIONS: usize = 4;

/// Albedo families split by solar stream.
pub const ALBEDO_NAMES: [&str; 4] = ["ALB_ROOF", "ALB_WALL", "ALB_IMPROAD", "ALB_PERROAD"];

/// Canyon height-to-width ratio for a density class and region index.
pub fn canyon_hwr(class: usize, region: usize) -> f64 {
    (region + 1) as f64 * 10.0 + class as f64
}

/// Albedo of family `family` (index into [`ALBEDO_NAMES`]).
pub fn albedo(family: usize, solar: usize, rad: usize, class: usize, region: usize) -> f64 {
    0.1 * (family + 1) as f64
        + 0.01 * solar as f64
        + 0.001 * rad as f64
        + 0.0001 * class as f64
        + 0.00001 * region as f64
}

/// Roof conductivity; the deepest layer is missing (NaN).
pub fn tk_roof(level: usize, class: usize, region: usize) -> f64 {
    if level == NLEVURB - 1 {
        f64::NAN
    } else {
        level as f64 + 10.0 * class as f64 + 100.0 * region as f64
    }
}

/// Urban morphology raster with `REGION_ID(lat, lon)` and per-region
/// parameter tables.
pub fn urban_dataset(lats: &[f64], lons: &[f64], region_ids: &[f64]) -> Dataset {
    let (nlat, nlon) = (lats.len(), lons.len());
    assert_eq!(region_ids.len(), nlat * nlon, "one region per cell");

    let mut ds = Dataset::new();
    ds.insert(var("LAT", &[("lat", nlat)], VarType::F64, lats.to_vec()))
        .unwrap();
    ds.insert(var("LON", &[("lon", nlon)], VarType::F64, lons.to_vec()))
        .unwrap();
    ds.insert(var(
        "REGION_ID",
        &[("lat", nlat), ("lon", nlon)],
        VarType::I32,
        region_ids.to_vec(),
    ))
    .unwrap();

    let mut longxy = Vec::with_capacity(nlat * nlon);
    for _ in lats {
        longxy.extend_from_slice(lons);
    }
    ds.insert(var(
        "LONGXY",
        &[("lat", nlat), ("lon", nlon)],
        VarType::F64,
        longxy,
    ))
    .unwrap();

    let mut hwr = Vec::new();
    for class in 0..NUMURBL {
        for region in 0..URBAN_REGIONS {
            hwr.push(canyon_hwr(class, region));
        }
    }
    ds.insert(var(
        "CANYON_HWR",
        &[("density_class", NUMURBL), ("region", URBAN_REGIONS)],
        VarType::F64,
        hwr,
    ))
    .unwrap();

    for (family, name) in ALBEDO_NAMES.iter().enumerate() {
        let mut data = Vec::new();
        for solar in 0..2 {
            for rad in 0..NUMRAD {
                for class in 0..NUMURBL {
                    for region in 0..URBAN_REGIONS {
                        data.push(albedo(family, solar, rad, class, region));
                    }
                }
            }
        }
        ds.insert(var(
            name,
            &[
                ("numsolar", 2),
                ("numrad", NUMRAD),
                ("density_class", NUMURBL),
                ("region", URBAN_REGIONS),
            ],
            VarType::F64,
            data,
        ))
        .unwrap();
    }

    let mut tk = Vec::new();
    for level in 0..NLEVURB {
        for class in 0..NUMURBL {
            for region in 0..URBAN_REGIONS {
                tk.push(tk_roof(level, class, region));
            }
        }
    }
    ds.insert(
        var(
            "TK_ROOF",
            &[
                ("nlevurb", NLEVURB),
                ("density_class", NUMURBL),
                ("region", URBAN_REGIONS),
            ],
            VarType::F64,
            tk,
        )
        .with_attr("_FillValue", -999.0f64),
    )
    .unwrap();

    ds.insert(var(
        "PCT_URBAN",
        &[("density_class", NUMURBL), ("lat", nlat), ("lon", nlon)],
        VarType::F64,
        vec![5.0; NUMURBL * nlat * nlon],
    ))
    .unwrap();

    ds
}

// ============================================================================
// Template surface data
// ============================================================================

/// Single-cell surface-data template.
///
/// Urban fields start at `-1`, `LONGXY`/`LATIXY` at `0`, `URBAN_REGION_ID`
/// at `0` and `PCT_NATVEG` at [`NATVEG`]; the last is never provided by
/// the urban source.
pub fn template_dataset() -> Dataset {
    let cell = [("lsmlat", 1), ("lsmlon", 1)];
    let with_cell = |dims: &[(&'static str, usize)]| -> Vec<(&'static str, usize)> {
        dims.iter().copied().chain(cell).collect()
    };

    let mut ds = Dataset::new();
    ds.set_attr("title", "synthetic surface data template");

    ds.insert(var("LONGXY", &cell, VarType::F64, vec![0.0]).with_attr("units", "degrees east"))
        .unwrap();
    ds.insert(var("LATIXY", &cell, VarType::F64, vec![0.0]).with_attr("units", "degrees north"))
        .unwrap();
    ds.insert(var("URBAN_REGION_ID", &cell, VarType::I32, vec![0.0]))
        .unwrap();
    ds.insert(var("PCT_NATVEG", &cell, VarType::F64, vec![NATVEG]))
        .unwrap();

    ds.insert(var(
        "CANYON_HWR",
        &with_cell(&[("numurbl", NUMURBL)]),
        VarType::F64,
        vec![-1.0; NUMURBL],
    ))
    .unwrap();

    for name in ALBEDO_NAMES {
        for suffix in ["DIR", "DIF"] {
            ds.insert(var(
                &format!("{}_{}", name, suffix),
                &with_cell(&[("numrad", NUMRAD), ("numurbl", NUMURBL)]),
                VarType::F64,
                vec![-1.0; NUMRAD * NUMURBL],
            ))
            .unwrap();
        }
    }

    ds.insert(var(
        "TK_ROOF",
        &with_cell(&[("nlevurb", NLEVURB), ("numurbl", NUMURBL)]),
        VarType::F64,
        vec![-1.0; NLEVURB * NUMURBL],
    ))
    .unwrap();

    ds.insert(
        var(
            "PCT_URBAN",
            &with_cell(&[("numurbl", NUMURBL)]),
            VarType::F64,
            vec![0.0; NUMURBL],
        )
        .with_attr("units", "%"),
    )
    .unwrap();

    for name in ["PCT_SAND", "PCT_CLAY"] {
        ds.insert(
            var(
                name,
                &with_cell(&[("nlevsoi", NLEVSOI)]),
                VarType::F64,
                vec![-1.0; NLEVSOI],
            )
            .with_attr("units", "%"),
        )
        .unwrap();
    }

    ds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_axis() {
        assert_eq!(uniform_axis(50.0, 0.5, 3), vec![50.0, 50.5, 51.0]);
    }

    #[test]
    fn test_era5_layout() {
        let start = Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap();
        let ds = era5_dataset(&[51.0, 51.25], &[-0.25, 0.0, 0.25], start, 4, TimeAxis::Hours1900, false);

        let t2m = ds.require("t2m").unwrap();
        assert_eq!(t2m.shape(), vec![4, 2, 3]);
        // (h=1, i=1, j=2)
        assert_eq!(t2m.data[1 * 6 + 1 * 3 + 2], era5_t2m(1, 2, 1));
        assert_eq!(ds.require("time").unwrap().data[0], 981_768.0);
    }

    #[test]
    fn test_soil_table_layout() {
        let ds = soil_dataset(
            &[0.0],
            &[0.0, 1.0],
            &[0.0, 1.0],
            &[vec![0.0, 0.0], vec![40.0, 45.0]],
            &[vec![0.0, 0.0], vec![20.0, 25.0]],
        );
        let sand = ds.require("PCT_SAND").unwrap();
        assert_eq!(sand.dim_names(), vec!["number_of_layers", "max_value_mapunit"]);
        assert_eq!(sand.extract_at(&[("max_value_mapunit", 1)]).unwrap(), vec![40.0, 45.0]);
    }

    #[test]
    fn test_template_single_cell() {
        let ds = template_dataset();
        assert_eq!(ds.dimension("lsmlat").unwrap().len, 1);
        assert_eq!(ds.require("TK_ROOF").unwrap().shape(), vec![NLEVURB, NUMURBL, 1, 1]);
        assert!(ds.contains("ALB_WALL_DIF"));
    }

    #[test]
    fn test_urban_region_tables() {
        let ds = urban_dataset(&[51.0], &[0.0], &[2.0]);
        let hwr = ds.require("CANYON_HWR").unwrap();
        assert_eq!(
            hwr.extract_at(&[("density_class", 2), ("region", 1)]).unwrap(),
            vec![canyon_hwr(2, 1)]
        );
    }
}
