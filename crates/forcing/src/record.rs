//! Raw reanalysis series and derived forcing series for a single point.

use chrono::{DateTime, Utc};
use clmu_common::{normalize_lon, wrap_lon_360, CfTimeUnits, GeoPoint};
use netcdf_io::Dataset;
use tracing::debug;

use crate::error::{ForcingError, ForcingResult};

const LAT_NAMES: [&str; 2] = ["latitude", "lat"];
const LON_NAMES: [&str; 2] = ["longitude", "lon"];
const TIME_NAMES: [&str; 2] = ["time", "valid_time"];

/// Hourly single-level reanalysis values at one point.
///
/// Units as delivered upstream: temperatures in K, pressure in Pa, wind in
/// m/s, radiation accumulated over the hour in J/m^2, precipitation and
/// roughness length in m.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub time: Vec<DateTime<Utc>>,
    pub t2m: Vec<f64>,
    pub d2m: Vec<f64>,
    pub sp: Vec<f64>,
    pub u10: Vec<f64>,
    pub v10: Vec<f64>,
    pub ssrd: Vec<f64>,
    pub strd: Vec<f64>,
    pub tp: Vec<f64>,
    pub fsr: Vec<f64>,
}

impl RawRecord {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn fields(&self) -> [(&'static str, &Vec<f64>); 9] {
        [
            ("t2m", &self.t2m),
            ("d2m", &self.d2m),
            ("sp", &self.sp),
            ("u10", &self.u10),
            ("v10", &self.v10),
            ("ssrd", &self.ssrd),
            ("strd", &self.strd),
            ("tp", &self.tp),
            ("fsr", &self.fsr),
        ]
    }

    fn fields_mut(&mut self) -> [&mut Vec<f64>; 9] {
        [
            &mut self.t2m,
            &mut self.d2m,
            &mut self.sp,
            &mut self.u10,
            &mut self.v10,
            &mut self.ssrd,
            &mut self.strd,
            &mut self.tp,
            &mut self.fsr,
        ]
    }

    /// Check that every field shares the time axis length.
    pub fn validate(&self) -> ForcingResult<()> {
        let n = self.time.len();
        for (name, values) in self.fields() {
            if values.len() != n {
                return Err(ForcingError::Shape(format!(
                    "field {} has {} values for {} time steps",
                    name,
                    values.len(),
                    n
                )));
            }
        }
        Ok(())
    }

    /// Append another record along the time axis.
    pub fn append(&mut self, mut other: RawRecord) {
        self.time.append(&mut other.time);
        let theirs = other.fields_mut();
        for (mine, theirs) in self.fields_mut().into_iter().zip(theirs) {
            mine.append(theirs);
        }
    }

    fn reorder(&mut self, order: &[usize]) {
        self.time = order.iter().map(|&i| self.time[i]).collect();
        for values in self.fields_mut() {
            *values = order.iter().map(|&i| values[i]).collect();
        }
    }

    /// Sort by time and drop repeated timestamps, keeping the first occurrence.
    ///
    /// Returns the number of dropped steps.
    pub fn sort_dedup(&mut self) -> usize {
        let mut order: Vec<usize> = (0..self.time.len()).collect();
        // Stable sort keeps the earlier chunk first among equal timestamps
        order.sort_by_key(|&i| self.time[i]);
        let before = order.len();
        order.dedup_by_key(|i| self.time[*i]);
        let dropped = before - order.len();
        self.reorder(&order);
        dropped
    }

    /// Keep only the steps in `[start, end)`.
    pub fn restrict(&mut self, start: &DateTime<Utc>, end: &DateTime<Utc>) {
        let keep: Vec<usize> = (0..self.time.len())
            .filter(|&i| self.time[i] >= *start && self.time[i] < *end)
            .collect();
        if keep.len() != self.time.len() {
            self.reorder(&keep);
        }
    }

    /// Extract the series at the grid cell nearest to `point` from a gridded
    /// reanalysis file.
    ///
    /// Accepts `latitude`/`lat` and `longitude`/`lon` coordinates in either
    /// longitude convention and a `time` or `valid_time` axis with CF units.
    /// Singleton extra dimensions (ensemble member, experiment version) are
    /// dropped.
    pub fn from_dataset(ds: &Dataset, point: &GeoPoint) -> ForcingResult<Self> {
        let lat_name = first_present(ds, &LAT_NAMES)?;
        let lon_name = first_present(ds, &LON_NAMES)?;

        let lon_coords = &ds.require(lon_name)?.data;
        let target = if lon_coords.iter().any(|&l| l > 180.0) {
            GeoPoint {
                lat: point.lat,
                lon: wrap_lon_360(normalize_lon(point.lon)),
            }
        } else {
            point.normalized()
        };

        let (cell_ds, cell) = ds.sel_nearest(lat_name, lon_name, &target)?;
        debug!(
            lat = cell.lat,
            lon = cell.lon,
            requested = %point,
            "Selected nearest reanalysis cell"
        );

        let time_name = first_present(&cell_ds, &TIME_NAMES)?;
        let time_var = cell_ds.require(time_name)?;
        let time_dim = match time_var.dims.as_slice() {
            [d] => d.name.clone(),
            _ => {
                return Err(ForcingError::Shape(format!(
                    "time coordinate '{}' is not one-dimensional",
                    time_name
                )))
            }
        };
        let units = time_var
            .attr_str("units")
            .ok_or_else(|| ForcingError::MissingField(format!("{} units", time_name)))?;
        let cf = CfTimeUnits::parse(units)?;
        let time = decode_time(&cf, time_name, &time_var.data)?;

        let series = |name: &str| point_series(&cell_ds, name, &time_dim);
        let record = RawRecord {
            time,
            t2m: series("t2m")?,
            d2m: series("d2m")?,
            sp: series("sp")?,
            u10: series("u10")?,
            v10: series("v10")?,
            ssrd: series("ssrd")?,
            strd: series("strd")?,
            tp: series("tp")?,
            fsr: series("fsr")?,
        };
        record.validate()?;
        Ok(record)
    }
}

fn first_present<'a>(ds: &Dataset, names: &[&'a str]) -> ForcingResult<&'a str> {
    names
        .iter()
        .copied()
        .find(|n| ds.contains(n))
        .ok_or_else(|| ForcingError::MissingField(names.join(" or ")))
}

/// Reduce a point-selected variable to its time series.
fn point_series(ds: &Dataset, name: &str, time_dim: &str) -> ForcingResult<Vec<f64>> {
    let mut var = ds
        .variable(name)
        .ok_or_else(|| ForcingError::MissingField(name.to_string()))?
        .clone();

    let extra: Vec<(String, usize)> = var
        .dims
        .iter()
        .filter(|d| d.name != time_dim)
        .map(|d| (d.name.clone(), d.len))
        .collect();
    for (dim, len) in extra {
        if len != 1 {
            return Err(ForcingError::Shape(format!(
                "{} has extra dimension '{}' of length {}",
                name, dim, len
            )));
        }
        var = var.select(&dim, 0)?;
    }

    if !var.has_dim(time_dim) {
        return Err(ForcingError::Shape(format!(
            "{} is not defined along '{}'",
            name, time_dim
        )));
    }
    Ok(var.data)
}

/// Derived forcing series at one point, in the units the model consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForcingRecord {
    pub time: Vec<DateTime<Utc>>,
    /// Reference height (m), constant along time
    pub zbot: f64,
    /// Air temperature at zbot (K)
    pub tair: Vec<f64>,
    /// Surface pressure at zbot (Pa)
    pub psurf: Vec<f64>,
    /// Wind speed at zbot (m/s)
    pub wind: Vec<f64>,
    /// Specific humidity (kg/kg)
    pub qair: Vec<f64>,
    /// Incident shortwave (W/m^2)
    pub swdown: Vec<f64>,
    /// Incident longwave (W/m^2)
    pub lwdown: Vec<f64>,
    /// Precipitation rate (mm/s)
    pub prectmms: Vec<f64>,
}

impl ForcingRecord {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// `zbot` broadcast along the time axis.
    pub fn zbot_series(&self) -> Vec<f64> {
        vec![self.zbot; self.time.len()]
    }

    /// Time axis is strictly increasing.
    pub fn is_strictly_increasing(&self) -> bool {
        self.time.windows(2).all(|w| w[0] < w[1])
    }
}

/// Decode a CF time axis. An undecodable value is a shape error naming the
/// axis and position.
pub(crate) fn decode_time(
    cf: &CfTimeUnits,
    name: &str,
    values: &[f64],
) -> ForcingResult<Vec<DateTime<Utc>>> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            cf.decode(v).map_err(|e| {
                ForcingError::Shape(format!("time coordinate '{}' at index {}: {}", name, i, e))
            })
        })
        .collect()
}
