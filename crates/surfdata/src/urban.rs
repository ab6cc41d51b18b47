//! Urban morphology and material parameters for one point.

use clmu_common::GeoPoint;
use netcdf_io::Dataset;
use tracing::{debug, info, instrument};

use crate::error::{SurfDataError, SurfDataResult};

/// Albedo families stored per solar stream on `numsolar`.
pub const ALBEDO_VARIABLES: [&str; 4] = ["ALB_ROOF", "ALB_WALL", "ALB_IMPROAD", "ALB_PERROAD"];

/// `numsolar` index of diffuse and direct radiation.
const DIFFUSE: usize = 0;
const DIRECT: usize = 1;

/// Urban parameters at the cell nearest to a point, reduced to one region.
#[derive(Debug, Clone)]
pub struct UrbanRecord {
    /// Raster cell the point snapped to
    pub cell: GeoPoint,
    /// 1-based region id of that cell
    pub region_id: u32,
    /// Parameters without the spatial and region dimensions
    pub params: Dataset,
}

/// Select the urban parameters for `point`.
///
/// The point is looked up in the [-180, 180) convention on the `LAT`/`LON`
/// coordinates, the cell's `REGION_ID` picks a slice of every
/// region-dimensioned table, and the albedo families are split into
/// `_DIF`/`_DIR` variables.
#[instrument(skip(ds))]
pub fn extract_urban(ds: &Dataset, point: &GeoPoint) -> SurfDataResult<UrbanRecord> {
    let target = point.normalized();
    let (cell_ds, cell) = ds.sel_nearest("LAT", "LON", &target)?;

    let region_id = cell_ds
        .variable("REGION_ID")
        .ok_or_else(|| SurfDataError::MissingVariable("REGION_ID".to_string()))?
        .scalar_value()?;
    let regions = ds.dimension("region").map(|d| d.len).unwrap_or(0);
    if !region_id.is_finite()
        || region_id < 1.0
        || region_id.fract() != 0.0
        || region_id as usize > regions
    {
        return Err(SurfDataError::InvalidRegion {
            value: region_id,
            regions,
        });
    }
    let region_id = region_id as u32;

    let mut params = cell_ds.isel("region", region_id as usize - 1)?;
    split_albedo(&mut params)?;

    info!(
        lat = cell.lat,
        lon = cell.lon,
        region_id,
        variables = params.variable_names().len(),
        "Selected urban parameters"
    );

    Ok(UrbanRecord {
        cell: cell.point(),
        region_id,
        params,
    })
}

/// Replace each albedo family with its diffuse (`_DIF`) and direct (`_DIR`)
/// components.
fn split_albedo(params: &mut Dataset) -> SurfDataResult<()> {
    for base in ALBEDO_VARIABLES {
        let var = params
            .remove(base)
            .ok_or_else(|| SurfDataError::MissingVariable(base.to_string()))?;
        if !var.has_dim("numsolar") {
            return Err(SurfDataError::shape(base, "no 'numsolar' dimension"));
        }

        for (index, suffix) in [(DIFFUSE, "DIF"), (DIRECT, "DIR")] {
            let mut part = var.select("numsolar", index)?;
            part.name = format!("{}_{}", base, suffix);
            debug!(variable = %part.name, "Split albedo");
            params.insert(part)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::fixtures::points;
    use test_utils::fixtures::template::{NUMRAD, NUMURBL};
    use test_utils::generators::{albedo, canyon_hwr, urban_dataset, URBAN_REGIONS};

    fn london_grid() -> Dataset {
        // Row 1 column 1 holds region 3; the ocean cell at row 0 column 0 has no region
        urban_dataset(
            &[51.0, 51.5],
            &[-0.5, 0.0],
            &[0.0, 1.0, 2.0, 3.0],
        )
    }

    #[test]
    fn test_region_slice() {
        let record = extract_urban(&london_grid(), &points::london()).unwrap();
        assert_eq!(record.region_id, 3);
        assert_eq!(record.cell, GeoPoint { lat: 51.5, lon: 0.0 });

        let hwr = record.params.require("CANYON_HWR").unwrap();
        assert_eq!(hwr.dim_names(), vec!["density_class"]);
        assert_eq!(hwr.data, (0..NUMURBL).map(|c| canyon_hwr(c, 2)).collect::<Vec<_>>());
        assert!(record.params.dimension("region").is_none());
    }

    #[test]
    fn test_albedo_split() {
        let record = extract_urban(&london_grid(), &GeoPoint::new(51.5, 0.0).unwrap()).unwrap();
        let params = &record.params;

        assert!(!params.contains("ALB_ROOF"));
        let dif = params.require("ALB_WALL_DIF").unwrap();
        let dir = params.require("ALB_WALL_DIR").unwrap();
        assert_eq!(dif.dim_names(), vec!["numrad", "density_class"]);
        assert_eq!(dif.len(), NUMRAD * NUMURBL);
        // (rad 1, class 2) of region index 2
        assert_eq!(dif.data[NUMURBL + 2], albedo(1, 0, 1, 2, 2));
        assert_eq!(dir.data[NUMURBL + 2], albedo(1, 1, 1, 2, 2));
    }

    #[test]
    fn test_longitude_360_is_normalized() {
        let ds = urban_dataset(&[21.0, 21.5], &[-160.0, 20.0], &[1.0, 2.0, 1.0, 4.0]);
        let record = extract_urban(&ds, &points::east_360()).unwrap();
        assert_eq!(record.cell.lon, -160.0);
        assert_eq!(record.region_id, 1);
    }

    #[test]
    fn test_cell_without_region_rejected() {
        let err = extract_urban(&london_grid(), &GeoPoint::new(51.0, -0.5).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            SurfDataError::InvalidRegion { value, regions } if value == 0.0 && regions == URBAN_REGIONS
        ));
    }
}
