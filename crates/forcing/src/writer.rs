//! Forcing file layout, naming, writing and reading.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clmu_common::{CfTimeUnits, GeoPoint, YearMonth};
use netcdf_io::{open_dataset, write_dataset, Dataset, Dimension, VarType, Variable};
use tracing::{info, instrument};

use crate::constants::FILL_VALUE;
use crate::error::{ForcingError, ForcingResult};
use crate::record::{decode_time, ForcingRecord};

/// Forcing variables as `(name, units, long_name)`.
pub const FORCING_VARIABLES: [(&str, &str, &str); 8] = [
    ("SWdown", "W/m^2", "Surface solar radiation downwards"),
    ("LWdown", "W/m^2", "Surface thermal radiation downwards"),
    ("Qair", "kg/kg", "Specific humidity"),
    ("Tair", "K", "Air temperature"),
    ("Wind", "m/s", "Wind speed"),
    ("Prectmms", "mm/s", "Total precipitation"),
    ("PSurf", "Pa", "Surface pressure"),
    ("Zbot", "m", "Geopotential height"),
];

/// Default output name for a point, reference height and month span.
pub fn forcing_file_name(point: &GeoPoint, zbot: f64, start: &YearMonth, end: &YearMonth) -> String {
    format!(
        "era5_forcing_{}_{}_{}_{}_{}_{}_{}.nc",
        point.lat, point.lon, zbot, start.year, start.month, end.year, end.month
    )
}

/// Resolve the output path, or `None` when an existing file should be reused.
pub fn resolve_output(path: PathBuf, reuse_existing: bool) -> Option<PathBuf> {
    if reuse_existing && path.exists() {
        info!(path = %path.display(), "Forcing file already exists, reusing it");
        None
    } else {
        Some(path)
    }
}

fn series(record: &ForcingRecord, name: &str) -> Vec<f64> {
    match name {
        "SWdown" => record.swdown.clone(),
        "LWdown" => record.lwdown.clone(),
        "Qair" => record.qair.clone(),
        "Tair" => record.tair.clone(),
        "Wind" => record.wind.clone(),
        "Prectmms" => record.prectmms.clone(),
        "PSurf" => record.psurf.clone(),
        _ => record.zbot_series(),
    }
}

/// Lay a forcing record out as a `(time, y, x)` dataset.
pub fn to_dataset(record: &ForcingRecord, source: &str) -> ForcingResult<Dataset> {
    let n = record.len();
    let time_dim = Dimension::new("time", n);
    let y_dim = Dimension::new("y", 1);
    let x_dim = Dimension::new("x", 1);

    let units = CfTimeUnits::unix_seconds();
    let mut ds = Dataset::new();

    ds.insert(
        Variable::new(
            "time",
            vec![time_dim.clone()],
            VarType::F64,
            record.time.iter().map(|t| units.encode(t)).collect(),
        )?
        .with_attr("units", units.to_string())
        .with_attr("calendar", "standard")
        .with_attr("long_name", "time"),
    )?;
    ds.insert(Variable::new("y", vec![y_dim.clone()], VarType::F64, vec![1.0])?)?;
    ds.insert(Variable::new("x", vec![x_dim.clone()], VarType::F64, vec![1.0])?)?;

    for (name, unit, long_name) in FORCING_VARIABLES {
        let values = series(record, name);
        if values.len() != n {
            return Err(ForcingError::Shape(format!(
                "{} has {} values for {} time steps",
                name,
                values.len(),
                n
            )));
        }
        ds.insert(
            Variable::new(
                name,
                vec![time_dim.clone(), y_dim.clone(), x_dim.clone()],
                VarType::F64,
                values,
            )?
            .with_attr("_FillValue", FILL_VALUE)
            .with_attr("units", unit)
            .with_attr("long_name", long_name),
        )?;
    }

    ds.set_attr("title", "CLMU atmospheric forcing");
    ds.set_attr("source", source);
    ds.set_attr("zbot", record.zbot);
    ds.set_attr(
        "history",
        format!("created {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")),
    );
    Ok(ds)
}

/// Write a forcing file.
#[instrument(skip(record), fields(steps = record.len()))]
pub fn write_forcing(record: &ForcingRecord, path: &Path, source: &str) -> ForcingResult<()> {
    let ds = to_dataset(record, source)?;
    write_dataset(&ds, path)?;
    info!(path = %path.display(), steps = record.len(), "Wrote forcing file");
    Ok(())
}

/// Read a forcing file written by [`write_forcing`].
pub fn read_forcing(path: &Path) -> ForcingResult<ForcingRecord> {
    let ds = open_dataset(path)?;

    let time_var = ds.require("time")?;
    let units = time_var
        .attr_str("units")
        .ok_or_else(|| ForcingError::MissingField("time units".to_string()))?;
    let cf = CfTimeUnits::parse(units)?;
    let time = decode_time(&cf, "time", &time_var.data)?;
    let n = time.len();

    let field = |name: &str| -> ForcingResult<Vec<f64>> {
        let var = ds
            .variable(name)
            .ok_or_else(|| ForcingError::MissingField(name.to_string()))?;
        if var.len() != n {
            return Err(ForcingError::Shape(format!(
                "{} has {} values for {} time steps",
                name,
                var.len(),
                n
            )));
        }
        Ok(var.data.clone())
    };

    let zbot = field("Zbot")?
        .first()
        .copied()
        .or_else(|| netcdf_io::global_f64(&ds, "zbot"))
        .ok_or_else(|| ForcingError::MissingField("Zbot".to_string()))?;

    Ok(ForcingRecord {
        zbot,
        swdown: field("SWdown")?,
        lwdown: field("LWdown")?,
        qair: field("Qair")?,
        tair: field("Tair")?,
        wind: field("Wind")?,
        prectmms: field("Prectmms")?,
        psurf: field("PSurf")?,
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forcing_file_name() {
        let point = GeoPoint::new(51.5, -0.125).unwrap();
        let name = forcing_file_name(
            &point,
            30.0,
            &YearMonth::new(2012, 11).unwrap(),
            &YearMonth::new(2014, 1).unwrap(),
        );
        assert_eq!(name, "era5_forcing_51.5_-0.125_30_2012_11_2014_1.nc");
    }

    #[test]
    fn test_resolve_output_reuse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.nc");
        assert_eq!(resolve_output(path.clone(), true), Some(path.clone()));
        std::fs::write(&path, b"x").unwrap();
        assert_eq!(resolve_output(path.clone(), true), None);
        assert_eq!(resolve_output(path.clone(), false), Some(path));
    }

    #[test]
    fn test_dataset_layout() {
        let record = ForcingRecord {
            time: vec![chrono::DateTime::<Utc>::UNIX_EPOCH],
            zbot: 30.0,
            tair: vec![280.0],
            psurf: vec![f64::NAN],
            wind: vec![2.0],
            qair: vec![0.005],
            swdown: vec![0.0],
            lwdown: vec![300.0],
            prectmms: vec![1e-16],
        };
        let ds = to_dataset(&record, "local").unwrap();

        assert_eq!(ds.dimension("time").unwrap().len, 1);
        assert_eq!(ds.dimension("x").unwrap().len, 1);
        let tair = ds.require("Tair").unwrap();
        assert_eq!(tair.dim_names(), vec!["time", "y", "x"]);
        assert_eq!(tair.attr_str("units"), Some("K"));
        assert_eq!(tair.attr_f64("_FillValue"), Some(1.0e36));
        assert_eq!(ds.require("Zbot").unwrap().data, vec![30.0]);
        assert_eq!(
            ds.require("time").unwrap().attr_str("units"),
            Some("seconds since 1970-01-01 00:00:00")
        );
        assert_eq!(netcdf_io::global_str(&ds, "source"), Some("local"));
    }
}
