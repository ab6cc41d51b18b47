//! Writing a [`Dataset`] to disk.

use std::path::Path;

use netcdf::AttributeValue;
use tracing::{debug, instrument};

use crate::dataset::{attr_as_f64, Dataset, VarType, Variable};
use crate::error::{NetCdfError, NetCdfResult};
use crate::reader::silence_hdf5_errors;

/// Write a dataset as a NetCDF-4 file, replacing any existing file.
///
/// Each variable keeps its storage type. `NaN` values are encoded as the
/// variable's `_FillValue`; integer variables holding `NaN` without one are
/// rejected.
#[instrument(skip(ds), fields(path = %path.as_ref().display()))]
pub fn write_dataset(ds: &Dataset, path: impl AsRef<Path>) -> NetCdfResult<()> {
    silence_hdf5_errors();

    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut file = netcdf::create(path)?;

    for dim in &ds.dimensions {
        file.add_dimension(&dim.name, dim.len)?;
    }

    for (name, value) in &ds.attributes {
        file.add_attribute(name, value.clone())?;
    }

    for var in ds.variables() {
        write_variable(&mut file, var)?;
    }

    debug!(variables = ds.variable_names().len(), "Wrote dataset");
    Ok(())
}

macro_rules! put_typed {
    ($file:expr, $var:expr, $ty:ty) => {{
        let dims: Vec<&str> = $var.dims.iter().map(|d| d.name.as_str()).collect();
        let fill = $var.attr_f64("_FillValue");
        let data = encode::<$ty>($var, fill)?;

        let mut nc = $file.add_variable::<$ty>(&$var.name, &dims)?;
        // The fill attribute has to match the storage type
        if let Some(fill) = fill {
            nc.put_attribute("_FillValue", fill as $ty)?;
        }
        for (name, value) in &$var.attributes {
            if name != "_FillValue" {
                nc.put_attribute(name, value.clone())?;
            }
        }
        nc.put_values(&data, ..)?;
    }};
}

fn write_variable(file: &mut netcdf::FileMut, var: &Variable) -> NetCdfResult<()> {
    match var.vartype {
        VarType::I8 => put_typed!(file, var, i8),
        VarType::U8 => put_typed!(file, var, u8),
        VarType::I16 => put_typed!(file, var, i16),
        VarType::U16 => put_typed!(file, var, u16),
        VarType::I32 => put_typed!(file, var, i32),
        VarType::U32 => put_typed!(file, var, u32),
        VarType::I64 => put_typed!(file, var, i64),
        VarType::U64 => put_typed!(file, var, u64),
        VarType::F32 => put_typed!(file, var, f32),
        VarType::F64 => put_typed!(file, var, f64),
    }
    Ok(())
}

/// Numeric cast from the in-memory representation.
trait FromF64: Copy {
    fn from_f64(v: f64) -> Self;
}

macro_rules! impl_from_f64 {
    ($($ty:ty),*) => {
        $(impl FromF64 for $ty {
            fn from_f64(v: f64) -> Self {
                v as $ty
            }
        })*
    };
}

impl_from_f64!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

fn encode<T: FromF64>(var: &Variable, fill: Option<f64>) -> NetCdfResult<Vec<T>> {
    let mut out = Vec::with_capacity(var.data.len());
    for &v in &var.data {
        let v = match (v.is_nan(), fill) {
            (true, Some(fill)) => fill,
            (true, None) if !var.vartype.is_float() => {
                return Err(NetCdfError::InvalidFormat(format!(
                    "integer variable '{}' holds missing values but has no _FillValue",
                    var.name
                )))
            }
            _ => v,
        };
        out.push(T::from_f64(v));
    }
    Ok(out)
}

/// Text value of a global attribute.
pub fn global_str<'a>(ds: &'a Dataset, name: &str) -> Option<&'a str> {
    match ds.attr(name)? {
        AttributeValue::Str(s) => Some(s.as_str()),
        _ => None,
    }
}

/// Numeric value of a global attribute.
pub fn global_f64(ds: &Dataset, name: &str) -> Option<f64> {
    ds.attr(name).and_then(attr_as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Dimension;

    #[test]
    fn test_encode_nan_as_fill() {
        let var = Variable::new(
            "PCT_SAND",
            vec![Dimension::new("nlevsoi", 2)],
            VarType::F64,
            vec![f64::NAN, 40.0],
        )
        .unwrap()
        .with_attr("_FillValue", 1.0e36);

        let out: Vec<f64> = encode(&var, var.attr_f64("_FillValue")).unwrap();
        assert_eq!(out, vec![1.0e36, 40.0]);
    }

    #[test]
    fn test_encode_integer_without_fill_rejects_nan() {
        let var = Variable::new(
            "URBAN_REGION_ID",
            vec![Dimension::new("lsmlat", 1)],
            VarType::I32,
            vec![f64::NAN],
        )
        .unwrap();
        assert!(encode::<i32>(&var, None).is_err());
    }

    #[test]
    fn test_encode_float_without_fill_keeps_nan() {
        let var = Variable::new("x", vec![Dimension::new("x", 1)], VarType::F32, vec![f64::NAN])
            .unwrap();
        let out: Vec<f32> = encode(&var, None).unwrap();
        assert!(out[0].is_nan());
    }
}
