//! Loading NetCDF files into a [`Dataset`].

use std::path::Path;
use std::sync::Once;

use netcdf::types::{FloatType, IntType, NcVariableType};
use tracing::{debug, instrument};

use crate::dataset::{attr_as_f64, Dataset, Dimension, VarType, Variable};
use crate::error::{NetCdfError, NetCdfResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// Probing for optional attributes on NetCDF-4 files makes the HDF5 C library
/// print diagnostics like `can't locate attribute in name index` even though
/// the lookup is handled. Call once early in `main()`, before any file is
/// opened; repeated calls are no-ops.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and null handlers are a
        // documented way to disable automatic error output.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

/// Read a whole NetCDF file into memory.
///
/// Numeric variables are converted to `f64`. Values equal to `_FillValue` or
/// `missing_value` become `NaN`. Packed variables (`scale_factor` /
/// `add_offset`) are unpacked and come back as `F64` variables with the
/// packing attributes removed.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn open_dataset(path: impl AsRef<Path>) -> NetCdfResult<Dataset> {
    silence_hdf5_errors();

    let path = path.as_ref();
    let file = netcdf::open(path).map_err(|e| {
        NetCdfError::InvalidFormat(format!("Failed to open {}: {}", path.display(), e))
    })?;

    let mut ds = Dataset::new();
    ds.dimensions = file
        .dimensions()
        .map(|d| Dimension::new(d.name(), d.len()))
        .collect();

    for attr in file.attributes() {
        ds.attributes.push((attr.name().to_string(), attr.value()?));
    }

    for var in file.variables() {
        let variable = read_variable(&var)?;
        ds.insert(variable)?;
    }

    debug!(
        variables = ds.variable_names().len(),
        dimensions = ds.dimensions.len(),
        "Loaded dataset"
    );
    Ok(ds)
}

fn read_variable(var: &netcdf::Variable) -> NetCdfResult<Variable> {
    let name = var.name();
    let vartype = storage_type(&name, var.vartype())?;

    let dims: Vec<Dimension> = var
        .dimensions()
        .iter()
        .map(|d| Dimension::new(d.name(), d.len()))
        .collect();

    let mut attributes = Vec::new();
    for attr in var.attributes() {
        attributes.push((attr.name().to_string(), attr.value()?));
    }

    let raw: Vec<f64> = var.get_values(..)?;

    let mut variable = Variable::new(name, dims, vartype, raw)?;
    variable.attributes = attributes;
    decode_fill(&mut variable);
    unpack(&mut variable);
    Ok(variable)
}

fn storage_type(name: &str, kind: NcVariableType) -> NetCdfResult<VarType> {
    Ok(match kind {
        NcVariableType::Int(IntType::I8) => VarType::I8,
        NcVariableType::Int(IntType::U8) => VarType::U8,
        NcVariableType::Int(IntType::I16) => VarType::I16,
        NcVariableType::Int(IntType::U16) => VarType::U16,
        NcVariableType::Int(IntType::I32) => VarType::I32,
        NcVariableType::Int(IntType::U32) => VarType::U32,
        NcVariableType::Int(IntType::I64) => VarType::I64,
        NcVariableType::Int(IntType::U64) => VarType::U64,
        NcVariableType::Float(FloatType::F32) => VarType::F32,
        NcVariableType::Float(FloatType::F64) => VarType::F64,
        other => {
            return Err(NetCdfError::UnsupportedType {
                variable: name.to_string(),
                kind: format!("{:?}", other),
            })
        }
    })
}

/// Replace fill and missing markers with `NaN`.
fn decode_fill(var: &mut Variable) {
    let markers: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|n| var.attr_f64(n))
        .collect();
    if markers.is_empty() {
        return;
    }

    // f32 fills are compared at f32 precision
    let is_f32 = var.vartype == VarType::F32;
    for v in var.data.iter_mut() {
        let hit = markers.iter().any(|m| {
            if is_f32 {
                (*v as f32) == (*m as f32)
            } else {
                v == m
            }
        });
        if hit {
            *v = f64::NAN;
        }
    }
}

fn unpack(var: &mut Variable) {
    let scale = var.attr(SCALE_FACTOR).and_then(attr_as_f64);
    let offset = var.attr(ADD_OFFSET).and_then(attr_as_f64);
    if scale.is_none() && offset.is_none() {
        return;
    }

    let scale = scale.unwrap_or(1.0);
    let offset = offset.unwrap_or(0.0);
    for v in var.data.iter_mut() {
        if !v.is_nan() {
            *v = *v * scale + offset;
        }
    }

    // Packed fill markers refer to the raw integers and no longer apply
    for name in [SCALE_FACTOR, ADD_OFFSET, "_FillValue", "missing_value"] {
        var.remove_attr(name);
    }
    var.vartype = VarType::F64;
    debug!(variable = %var.name, scale, offset, "Unpacked variable");
}

const SCALE_FACTOR: &str = "scale_factor";
const ADD_OFFSET: &str = "add_offset";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fill_f32_precision() {
        let mut v = Variable::new(
            "t2m",
            vec![Dimension::new("time", 3)],
            VarType::F32,
            vec![280.0, 9.969_209_968_386_869e36_f32 as f64, 281.0],
        )
        .unwrap()
        .with_attr("_FillValue", 9.969_209_968_386_869e36_f32);

        decode_fill(&mut v);
        assert_eq!(v.data[0], 280.0);
        assert!(v.data[1].is_nan());
        assert_eq!(v.data[2], 281.0);
    }

    #[test]
    fn test_unpack_short() {
        let mut v = Variable::new(
            "u10",
            vec![Dimension::new("time", 3)],
            VarType::I16,
            vec![100.0, -32767.0, 0.0],
        )
        .unwrap()
        .with_attr("scale_factor", 0.5f64)
        .with_attr("add_offset", 10.0f64)
        .with_attr("missing_value", -32767i16)
        .with_attr("units", "m s**-1");

        decode_fill(&mut v);
        unpack(&mut v);

        assert_eq!(v.vartype, VarType::F64);
        assert_eq!(v.data[0], 60.0);
        assert!(v.data[1].is_nan());
        assert_eq!(v.data[2], 10.0);
        assert!(v.attr("scale_factor").is_none());
        assert!(v.attr("missing_value").is_none());
        assert_eq!(v.attr_str("units"), Some("m s**-1"));
    }

    #[test]
    fn test_unpacked_variables_untouched() {
        let mut v = Variable::new("x", vec![Dimension::new("x", 2)], VarType::F64, vec![1.0, 2.0])
            .unwrap();
        decode_fill(&mut v);
        unpack(&mut v);
        assert_eq!(v.data, vec![1.0, 2.0]);
        assert_eq!(v.vartype, VarType::F64);
    }

    #[test]
    fn test_open_missing_file() {
        let result = open_dataset("/nonexistent/file.nc");
        assert!(matches!(result, Err(NetCdfError::InvalidFormat(_))));
    }
}
