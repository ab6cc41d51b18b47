//! Integration test: write a dataset with mixed storage types and read it back.

use netcdf_io::{open_dataset, write_dataset, Dataset, Dimension, VarType, Variable};

/// Value at (lat, lon) = lat * 10 + lon
fn grid_values(nlat: usize, nlon: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(nlat * nlon);
    for i in 0..nlat {
        for j in 0..nlon {
            data.push((i * 10 + j) as f64);
        }
    }
    data
}

fn sample_dataset() -> Dataset {
    let mut ds = Dataset::new();
    ds.set_attr("title", "roundtrip test");

    let lat = Dimension::new("lsmlat", 2);
    let lon = Dimension::new("lsmlon", 3);

    ds.insert(
        Variable::new("PCT_URBAN", vec![Dimension::new("numurbl", 3), lat.clone(), lon.clone()], VarType::F64, {
            let mut v = Vec::new();
            for k in 0..3 {
                v.extend(grid_values(2, 3).into_iter().map(|x| x + 100.0 * k as f64));
            }
            v
        })
        .unwrap()
        .with_attr("units", "%")
        .with_attr("_FillValue", 1.0e36),
    )
    .unwrap();

    ds.insert(
        Variable::new("URBAN_REGION_ID", vec![lat.clone(), lon.clone()], VarType::I32, grid_values(2, 3))
            .unwrap()
            .with_attr("long_name", "urban region ID"),
    )
    .unwrap();

    let mut sand = grid_values(2, 3);
    sand[4] = f64::NAN;
    ds.insert(
        Variable::new("SAND_F32", vec![lat, lon], VarType::F32, sand)
            .unwrap()
            .with_attr("_FillValue", -999.0f32),
    )
    .unwrap();

    ds.insert(Variable::scalar("zbot", 30.0)).unwrap();
    ds
}

#[test]
fn test_roundtrip_preserves_schema_and_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("surfdata.nc");

    let original = sample_dataset();
    write_dataset(&original, &path).unwrap();
    let loaded = open_dataset(&path).unwrap();

    assert_eq!(loaded.dimension("lsmlat").unwrap().len, 2);
    assert_eq!(loaded.dimension("numurbl").unwrap().len, 3);
    assert_eq!(netcdf_io::global_str(&loaded, "title"), Some("roundtrip test"));

    let pct = loaded.require("PCT_URBAN").unwrap();
    assert_eq!(pct.vartype, VarType::F64);
    assert_eq!(pct.shape(), vec![3, 2, 3]);
    assert_eq!(pct.data, original.require("PCT_URBAN").unwrap().data);
    assert_eq!(pct.attr_str("units"), Some("%"));
    assert_eq!(pct.attr_f64("_FillValue"), Some(1.0e36));

    let region = loaded.require("URBAN_REGION_ID").unwrap();
    assert_eq!(region.vartype, VarType::I32);
    assert_eq!(region.data, grid_values(2, 3));

    let sand = loaded.require("SAND_F32").unwrap();
    assert_eq!(sand.vartype, VarType::F32);
    assert!(sand.data[4].is_nan(), "fill should decode back to NaN");
    assert_eq!(sand.data[5], 12.0);

    let zbot = loaded.require("zbot").unwrap();
    assert_eq!(zbot.scalar_value().unwrap(), 30.0);
}

#[test]
fn test_overwrite_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.nc");

    let mut ds = sample_dataset();
    write_dataset(&ds, &path).unwrap();

    ds.require_mut("URBAN_REGION_ID")
        .unwrap()
        .assign_at(&[("lsmlat", 0), ("lsmlon", 0)], &[27.0])
        .unwrap();
    write_dataset(&ds, &path).unwrap();

    let loaded = open_dataset(&path).unwrap();
    let region = loaded.require("URBAN_REGION_ID").unwrap();
    assert_eq!(region.extract_at(&[("lsmlat", 0), ("lsmlon", 0)]).unwrap(), vec![27.0]);
}
