//! Soil texture lookup with an expanding ring search for valid cells.
//!
//! Soil rasters store a map unit id per cell (`MAPUNITS`) and per-unit
//! sand/clay tables on `(number_of_layers, max_value_mapunit)`. Water bodies
//! and unmapped land resolve to all-zero texture, in which case the search
//! moves outward ring by ring until a cell with usable texture is found.

use std::collections::HashSet;

use clmu_common::GeoPoint;
use netcdf_io::{Dataset, GridCell};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::error::{SurfDataError, SurfDataResult};

/// Probe order within one ring, as `(lat, lon)` multiples of `radius * step`.
pub const PROBE_OFFSETS: [(f64, f64); 9] = [
    (0.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 0.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (-1.0, 0.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
];

const MAPUNIT_DIM: &str = "max_value_mapunit";

/// Ring search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoilSearch {
    /// Probe spacing in degrees; taken from the raster's `LAT` spacing when unset
    #[serde(default)]
    pub step_deg: Option<f64>,

    /// Number of rings tried before giving up
    #[serde(default = "default_max_radius")]
    pub max_radius: u32,
}

fn default_max_radius() -> u32 {
    64
}

impl Default for SoilSearch {
    fn default() -> Self {
        Self::new(default_max_radius())
    }
}

impl SoilSearch {
    pub fn new(max_radius: u32) -> Self {
        Self {
            step_deg: None,
            max_radius,
        }
    }

    pub fn validate(&self) -> SurfDataResult<()> {
        if let Some(step) = self.step_deg {
            check_step(step)?;
        }
        if self.max_radius == 0 {
            return Err(SurfDataError::InvalidConfig(
                "max search radius must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Probe spacing for `ds`: the configured step, or the raster resolution.
    pub fn step_for(&self, ds: &Dataset) -> SurfDataResult<f64> {
        match self.step_deg {
            Some(step) => check_step(step).map(|_| step),
            None => grid_step(ds),
        }
    }
}

fn check_step(step: f64) -> SurfDataResult<()> {
    if !step.is_finite() || step <= 0.0 {
        return Err(SurfDataError::InvalidConfig(format!(
            "search step must be positive, got {}",
            step
        )));
    }
    Ok(())
}

/// Latitude spacing of the soil raster.
fn grid_step(ds: &Dataset) -> SurfDataResult<f64> {
    let lat = ds
        .variable("LAT")
        .ok_or_else(|| SurfDataError::MissingVariable("LAT".to_string()))?;
    match lat.data.as_slice() {
        [a, b, ..] if (b - a).is_finite() && b != a => Ok((b - a).abs()),
        _ => Err(SurfDataError::shape(
            "LAT",
            "need two distinct latitudes to derive the search step",
        )),
    }
}

/// Texture accepted by the search.
#[derive(Debug, Clone, PartialEq)]
pub struct SoilSample {
    /// Probe point that produced the hit
    pub point: GeoPoint,
    /// Raster cell the probe snapped to
    pub cell: GeoPoint,
    /// Ring the hit was found in (1 = the point's own neighbourhood)
    pub radius: u32,
    pub mapunit: f64,
    /// Sand percentage per soil layer
    pub sand: Vec<f64>,
    /// Clay percentage per soil layer
    pub clay: Vec<f64>,
}

/// Usable texture: neither sand nor clay is all zero, and no value is missing.
pub fn is_valid_composition(sand: &[f64], clay: &[f64]) -> bool {
    let all_zero = |v: &[f64]| v.iter().all(|x| *x == 0.0);
    let finite = |v: &[f64]| v.iter().all(|x| x.is_finite());

    !sand.is_empty()
        && !clay.is_empty()
        && finite(sand)
        && finite(clay)
        && !(all_zero(sand) || all_zero(clay))
}

/// Search outward from `point` for the first cell with usable texture.
///
/// Ring `r` probes [`PROBE_OFFSETS`] scaled by `r` grid steps; the first
/// valid probe in that order wins. Cells already rejected are not read again.
#[instrument(skip(ds, search), fields(max_radius = search.max_radius))]
pub fn find_soil(ds: &Dataset, point: &GeoPoint, search: &SoilSearch) -> SurfDataResult<SoilSample> {
    search.validate()?;
    let step = search.step_for(ds)?;
    debug!(step, "Soil search step");
    let origin = point.normalized();
    let mut rejected: HashSet<(usize, usize)> = HashSet::new();

    for radius in 1..=search.max_radius {
        let scale = radius as f64 * step;
        for (dlat, dlon) in PROBE_OFFSETS {
            let probe = origin.offset(dlat * scale, dlon * scale);
            let cell = ds.nearest_cell("LAT", "LON", &probe)?;
            if rejected.contains(&(cell.lat_index, cell.lon_index)) {
                continue;
            }

            match texture_at(ds, &cell)? {
                Some((mapunit, sand, clay)) if is_valid_composition(&sand, &clay) => {
                    info!(
                        lat = probe.lat,
                        lon = probe.lon,
                        radius,
                        mapunit,
                        "Found suitable soil point"
                    );
                    return Ok(SoilSample {
                        point: probe,
                        cell: cell.point(),
                        radius,
                        mapunit,
                        sand,
                        clay,
                    });
                }
                _ => {
                    debug!(lat = cell.lat, lon = cell.lon, radius, "Degenerate soil cell");
                    rejected.insert((cell.lat_index, cell.lon_index));
                }
            }
        }
    }

    Err(SurfDataError::NoValidSoil {
        point: origin,
        radius: search.max_radius,
    })
}

/// Map unit and per-layer sand/clay of a cell, or `None` when the map unit
/// does not resolve to a table entry.
fn texture_at(ds: &Dataset, cell: &GridCell) -> SurfDataResult<Option<(f64, Vec<f64>, Vec<f64>)>> {
    let mapunits = ds
        .variable("MAPUNITS")
        .ok_or_else(|| SurfDataError::MissingVariable("MAPUNITS".to_string()))?;
    let mapunit = match mapunits
        .extract_at(&[
            (cell.lat_dim.as_str(), cell.lat_index),
            (cell.lon_dim.as_str(), cell.lon_index),
        ])?
        .as_slice()
    {
        [v] => *v,
        other => {
            return Err(SurfDataError::shape(
                "MAPUNITS",
                format!("expected one value per cell, found {}", other.len()),
            ))
        }
    };

    let Some(index) = mapunit_index(ds, mapunit)? else {
        return Ok(None);
    };

    let table = |name: &str| -> SurfDataResult<Vec<f64>> {
        let var = ds
            .variable(name)
            .ok_or_else(|| SurfDataError::MissingVariable(name.to_string()))?;
        Ok(var.extract_at(&[(MAPUNIT_DIM, index)])?)
    };

    Ok(Some((mapunit, table("PCT_SAND")?, table("PCT_CLAY")?)))
}

/// Table position of a map unit: label lookup on the `max_value_mapunit`
/// coordinate when the raster has one, the unit id itself otherwise.
fn mapunit_index(ds: &Dataset, mapunit: f64) -> SurfDataResult<Option<usize>> {
    if !mapunit.is_finite() || mapunit < 0.0 {
        return Ok(None);
    }
    let id = mapunit.trunc();

    if let Some(coord) = ds.variable(MAPUNIT_DIM) {
        return Ok(coord.data.iter().position(|c| *c == id));
    }

    let len = ds
        .dimension(MAPUNIT_DIM)
        .ok_or_else(|| SurfDataError::MissingVariable(format!("{} dimension", MAPUNIT_DIM)))?
        .len;
    let index = id as usize;
    Ok((index < len).then_some(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{assert_approx_eq, assert_coords_approx_eq};
    use test_utils::fixtures::SOIL_STEP_DEG;
    use test_utils::generators::{soil_dataset, uniform_axis};

    const STEP: f64 = 0.1;

    /// 7x7 raster centred on (0, 0) with map unit 0 (no texture) everywhere
    /// except the listed cells, which get map unit 1.
    fn raster(valid: &[(usize, usize)]) -> Dataset {
        let axis = uniform_axis(-0.3, STEP, 7);
        let mut units = vec![0.0; 49];
        for (i, j) in valid {
            units[i * 7 + j] = 1.0;
        }
        soil_dataset(
            &axis,
            &axis,
            &units,
            &[vec![0.0; 3], vec![40.0, 42.0, 45.0]],
            &[vec![0.0; 3], vec![20.0, 21.0, 22.0]],
        )
    }

    fn search(max_radius: u32) -> SoilSearch {
        SoilSearch {
            step_deg: Some(STEP),
            max_radius,
        }
    }

    #[test]
    fn test_composition_rules() {
        assert!(is_valid_composition(&[40.0, 0.0], &[20.0, 0.0]));
        assert!(!is_valid_composition(&[0.0, 0.0], &[20.0, 10.0]));
        assert!(!is_valid_composition(&[40.0], &[0.0]));
        assert!(!is_valid_composition(&[f64::NAN], &[20.0]));
        assert!(!is_valid_composition(&[], &[]));
    }

    #[test]
    fn test_valid_point_found_immediately() {
        let ds = raster(&[(3, 3)]);
        let sample = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(4)).unwrap();
        assert_eq!(sample.radius, 1);
        assert_eq!(sample.sand, vec![40.0, 42.0, 45.0]);
        assert_eq!(sample.clay, vec![20.0, 21.0, 22.0]);
        assert_eq!(sample.mapunit, 1.0);
    }

    #[test]
    fn test_probe_order_breaks_ties() {
        // Both east (0, +1) and north (+1, 0) neighbours are valid; east is probed first
        let ds = raster(&[(4, 3), (3, 4)]);
        let sample = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(4)).unwrap();
        assert_eq!(sample.radius, 1);
        assert_coords_approx_eq!((sample.cell.lat, sample.cell.lon), (0.0, 0.1), 1e-9);
    }

    #[test]
    fn test_terminates_within_ring() {
        // Only the far south-west corner is land: three rings out
        let ds = raster(&[(0, 0)]);
        let sample = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(8)).unwrap();
        assert_eq!(sample.radius, 3);
        assert_coords_approx_eq!((sample.cell.lat, sample.cell.lon), (-0.3, -0.3), 1e-9);
    }

    #[test]
    fn test_max_radius_guard() {
        let ds = raster(&[]);
        let err = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(5)).unwrap_err();
        assert!(matches!(err, SurfDataError::NoValidSoil { radius: 5, .. }));
    }

    #[test]
    fn test_mapunit_outside_table_is_degenerate() {
        let axis = uniform_axis(-0.1, STEP, 3);
        let mut units = vec![9.0; 9];
        units[8] = 1.0;
        let ds = soil_dataset(
            &axis,
            &axis,
            &units,
            &[vec![0.0], vec![30.0]],
            &[vec![0.0], vec![10.0]],
        );
        let sample = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(2)).unwrap();
        assert_eq!(sample.sand, vec![30.0]);
        assert_eq!(sample.radius, 1);
        assert_coords_approx_eq!((sample.cell.lat, sample.cell.lon), (0.1, 0.1), 1e-9);
    }

    #[test]
    fn test_invalid_search_rejected() {
        let ds = raster(&[(3, 3)]);
        let bad = SoilSearch {
            step_deg: Some(0.0),
            max_radius: 3,
        };
        let err = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &bad).unwrap_err();
        assert!(matches!(err, SurfDataError::InvalidConfig(_)));
    }

    // ========================================================================
    // Step derived from the raster
    // ========================================================================

    /// 21x21 raster at 5-minute spacing centred on (0, 0), usable only
    /// eight cells north of the centre.
    fn coarse_raster() -> Dataset {
        let axis = uniform_axis(-10.0 * SOIL_STEP_DEG, SOIL_STEP_DEG, 21);
        let mut units = vec![0.0; 21 * 21];
        units[18 * 21 + 10] = 1.0;
        soil_dataset(
            &axis,
            &axis,
            &units,
            &[vec![0.0; 2], vec![55.0, 50.0]],
            &[vec![0.0; 2], vec![15.0, 18.0]],
        )
    }

    #[test]
    fn test_step_follows_raster_resolution() {
        let ds = coarse_raster();
        let search = SoilSearch::new(10);
        assert_approx_eq!(search.step_for(&ds).unwrap(), SOIL_STEP_DEG, 1e-12);

        let sample = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search).unwrap();
        assert_eq!(sample.radius, 8);
        assert_eq!(sample.sand, vec![55.0, 50.0]);
        assert_coords_approx_eq!(
            (sample.cell.lat, sample.cell.lon),
            (8.0 * SOIL_STEP_DEG, 0.0),
            1e-9
        );
    }

    #[test]
    fn test_configured_step_overrides_raster() {
        // A step ten times finer than the grid cannot reach eight cells out in ten rings
        let search = SoilSearch {
            step_deg: Some(SOIL_STEP_DEG / 10.0),
            max_radius: 10,
        };
        let err = find_soil(&coarse_raster(), &GeoPoint::new(0.0, 0.0).unwrap(), &search)
            .unwrap_err();
        assert!(matches!(err, SurfDataError::NoValidSoil { radius: 10, .. }));
    }

    #[test]
    fn test_single_row_raster_needs_explicit_step() {
        let ds = soil_dataset(
            &[0.0],
            &[0.0, 0.1],
            &[1.0, 1.0],
            &[vec![0.0], vec![30.0]],
            &[vec![0.0], vec![10.0]],
        );
        let err = find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &SoilSearch::new(2))
            .unwrap_err();
        assert!(matches!(err, SurfDataError::Shape { .. }));
        assert!(find_soil(&ds, &GeoPoint::new(0.0, 0.0).unwrap(), &search(2)).is_ok());
    }
}
