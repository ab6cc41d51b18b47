//! In-memory NetCDF dataset model.
//!
//! Every numeric variable is held as row-major `f64` values together with the
//! storage type it had on disk, so a dataset can be loaded, edited field by
//! field and written back with its schema intact. Missing values are `NaN`
//! in memory.

use clmu_common::{nearest_index, GeoPoint};
use netcdf::AttributeValue;

use crate::error::{NetCdfError, NetCdfResult};

/// Storage type of a variable on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl VarType {
    pub fn is_float(&self) -> bool {
        matches!(self, VarType::F32 | VarType::F64)
    }
}

/// A named dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
}

impl Dimension {
    pub fn new(name: impl Into<String>, len: usize) -> Self {
        Self {
            name: name.into(),
            len,
        }
    }
}

/// A numeric variable with its dimensions and attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub dims: Vec<Dimension>,
    pub vartype: VarType,
    pub data: Vec<f64>,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl Variable {
    /// Create a variable, checking that `data` fills `dims` exactly.
    pub fn new(
        name: impl Into<String>,
        dims: Vec<Dimension>,
        vartype: VarType,
        data: Vec<f64>,
    ) -> NetCdfResult<Self> {
        let name = name.into();
        let expected: usize = dims.iter().map(|d| d.len).product();
        if expected != data.len() {
            return Err(NetCdfError::shape(
                &name,
                format!("{} values for shape {:?}", data.len(), shape_of(&dims)),
            ));
        }
        Ok(Self {
            name,
            dims,
            vartype,
            data,
            attributes: Vec::new(),
        })
    }

    /// Scalar `f64` variable.
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            dims: Vec::new(),
            vartype: VarType::F64,
            data: vec![value],
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn shape(&self) -> Vec<usize> {
        shape_of(&self.dims)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim_names(&self) -> Vec<&str> {
        self.dims.iter().map(|d| d.name.as_str()).collect()
    }

    pub fn has_dim(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d.name == name)
    }

    pub fn dim_len(&self, name: &str) -> Option<usize> {
        self.dims.iter().find(|d| d.name == name).map(|d| d.len)
    }

    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Attribute as text, if it is a string attribute.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        match self.attr(name)? {
            AttributeValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// First element of a numeric attribute.
    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(attr_as_f64)
    }

    /// Set or replace an attribute, keeping its position when it already exists.
    pub fn set_attr(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<AttributeValue> {
        let pos = self.attributes.iter().position(|(n, _)| n == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Flat offsets of every element where the named dimensions are held at the
    /// given indices, in row-major order over the remaining dimensions.
    fn positions(&self, fixed: &[(&str, usize)]) -> NetCdfResult<Vec<usize>> {
        for (dim, idx) in fixed {
            let len = self.dim_len(dim).ok_or_else(|| {
                NetCdfError::shape(&self.name, format!("no dimension '{}'", dim))
            })?;
            if *idx >= len {
                return Err(NetCdfError::shape(
                    &self.name,
                    format!("index {} out of range for '{}' (len {})", idx, dim, len),
                ));
            }
        }

        let shape = self.shape();
        let mut strides = vec![1usize; shape.len()];
        for k in (0..shape.len().saturating_sub(1)).rev() {
            strides[k] = strides[k + 1] * shape[k + 1];
        }

        // Per-dimension index ranges: a single index for fixed dims, all otherwise
        let ranges: Vec<(usize, usize)> = self
            .dims
            .iter()
            .map(|d| match fixed.iter().find(|(n, _)| *n == d.name) {
                Some((_, i)) => (*i, *i + 1),
                None => (0, d.len),
            })
            .collect();

        let count: usize = ranges.iter().map(|(lo, hi)| hi - lo).product();
        let mut out = Vec::with_capacity(count);
        if count == 0 {
            return Ok(out);
        }

        let mut idx: Vec<usize> = ranges.iter().map(|(lo, _)| *lo).collect();
        loop {
            out.push(idx.iter().zip(&strides).map(|(i, s)| i * s).sum());

            // Odometer increment, last dimension fastest
            let mut k = idx.len();
            loop {
                if k == 0 {
                    return Ok(out);
                }
                k -= 1;
                idx[k] += 1;
                if idx[k] < ranges[k].1 {
                    break;
                }
                idx[k] = ranges[k].0;
            }
        }
    }

    /// Values where the named dimensions are held fixed.
    pub fn extract_at(&self, fixed: &[(&str, usize)]) -> NetCdfResult<Vec<f64>> {
        Ok(self
            .positions(fixed)?
            .into_iter()
            .map(|p| self.data[p])
            .collect())
    }

    /// Overwrite the values where the named dimensions are held fixed.
    ///
    /// `values` must cover the remaining dimensions exactly, in row-major order.
    pub fn assign_at(&mut self, fixed: &[(&str, usize)], values: &[f64]) -> NetCdfResult<()> {
        let positions = self.positions(fixed)?;
        if positions.len() != values.len() {
            return Err(NetCdfError::shape(
                &self.name,
                format!(
                    "cannot assign {} values to a slice of {} elements",
                    values.len(),
                    positions.len()
                ),
            ));
        }
        for (p, v) in positions.into_iter().zip(values) {
            self.data[p] = *v;
        }
        Ok(())
    }

    /// Slice along one dimension, dropping it (positional selection).
    ///
    /// Variables without the dimension are returned unchanged.
    pub fn select(&self, dim: &str, index: usize) -> NetCdfResult<Variable> {
        if !self.has_dim(dim) {
            return Ok(self.clone());
        }
        let data = self.extract_at(&[(dim, index)])?;
        Ok(Variable {
            name: self.name.clone(),
            dims: self.dims.iter().filter(|d| d.name != dim).cloned().collect(),
            vartype: self.vartype,
            data,
            attributes: self.attributes.clone(),
        })
    }

    /// Single value of a variable that has exactly one element.
    pub fn scalar_value(&self) -> NetCdfResult<f64> {
        match self.data.as_slice() {
            [v] => Ok(*v),
            _ => Err(NetCdfError::shape(
                &self.name,
                format!("expected a single value, found shape {:?}", self.shape()),
            )),
        }
    }
}

/// A set of dimensions, variables and global attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub dimensions: Vec<Dimension>,
    variables: Vec<Variable>,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// Variable lookup that fails with [`NetCdfError::MissingData`].
    pub fn require(&self, name: &str) -> NetCdfResult<&Variable> {
        self.variable(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))
    }

    pub fn require_mut(&mut self, name: &str) -> NetCdfResult<&mut Variable> {
        self.variable_mut(name)
            .ok_or_else(|| NetCdfError::missing(format!("{} variable", name)))
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn variable_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variable(name).is_some()
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|d| d.name == name)
    }

    /// Insert a variable, replacing any variable with the same name.
    ///
    /// Dimensions the dataset does not know yet are registered; a dimension
    /// whose length disagrees with the registered one is a shape error.
    pub fn insert(&mut self, var: Variable) -> NetCdfResult<()> {
        for dim in &var.dims {
            match self.dimension(&dim.name) {
                Some(existing) if existing.len != dim.len => {
                    return Err(NetCdfError::shape(
                        &var.name,
                        format!(
                            "dimension '{}' has length {} but the dataset declares {}",
                            dim.name, dim.len, existing.len
                        ),
                    ));
                }
                Some(_) => {}
                None => self.dimensions.push(dim.clone()),
            }
        }

        match self.variables.iter_mut().find(|v| v.name == var.name) {
            Some(slot) => *slot = var,
            None => self.variables.push(var),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let pos = self.variables.iter().position(|v| v.name == name)?;
        Some(self.variables.remove(pos))
    }

    pub fn set_attr(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Positional selection along one dimension for every variable that has it.
    ///
    /// The dimension is dropped from the result.
    pub fn isel(&self, dim: &str, index: usize) -> NetCdfResult<Dataset> {
        let len = self
            .dimension(dim)
            .ok_or_else(|| NetCdfError::missing(format!("{} dimension", dim)))?
            .len;
        if index >= len {
            return Err(NetCdfError::shape(
                dim,
                format!("index {} out of range (len {})", index, len),
            ));
        }

        let variables = self
            .variables
            .iter()
            .map(|v| v.select(dim, index))
            .collect::<NetCdfResult<Vec<_>>>()?;

        Ok(Dataset {
            dimensions: self
                .dimensions
                .iter()
                .filter(|d| d.name != dim)
                .cloned()
                .collect(),
            variables,
            attributes: self.attributes.clone(),
        })
    }

    /// Resolve the grid cell nearest to a point using 1-D coordinate variables.
    ///
    /// Returns the cell indices and the coordinates of the snapped cell.
    pub fn nearest_cell(
        &self,
        lat_var: &str,
        lon_var: &str,
        point: &GeoPoint,
    ) -> NetCdfResult<GridCell> {
        let lat = self.require(lat_var)?;
        let lon = self.require(lon_var)?;

        let lat_dim = single_dim(lat)?;
        let lon_dim = single_dim(lon)?;

        let i = nearest_index(&lat.data, point.lat)
            .ok_or_else(|| NetCdfError::missing(format!("{} coordinate values", lat_var)))?;
        let j = nearest_index(&lon.data, point.lon)
            .ok_or_else(|| NetCdfError::missing(format!("{} coordinate values", lon_var)))?;

        Ok(GridCell {
            lat_dim: lat_dim.to_string(),
            lon_dim: lon_dim.to_string(),
            lat_index: i,
            lon_index: j,
            lat: lat.data[i],
            lon: lon.data[j],
        })
    }

    /// Select the cell nearest to a point, dropping both spatial dimensions.
    pub fn sel_nearest(
        &self,
        lat_var: &str,
        lon_var: &str,
        point: &GeoPoint,
    ) -> NetCdfResult<(Dataset, GridCell)> {
        let cell = self.nearest_cell(lat_var, lon_var, point)?;
        let ds = self
            .isel(&cell.lat_dim, cell.lat_index)?
            .isel(&cell.lon_dim, cell.lon_index)?;
        Ok((ds, cell))
    }
}

/// A resolved grid cell.
#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub lat_dim: String,
    pub lon_dim: String,
    pub lat_index: usize,
    pub lon_index: usize,
    pub lat: f64,
    pub lon: f64,
}

impl GridCell {
    pub fn point(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

fn single_dim(var: &Variable) -> NetCdfResult<&str> {
    match var.dims.as_slice() {
        [d] => Ok(d.name.as_str()),
        _ => Err(NetCdfError::shape(
            &var.name,
            format!("expected a 1-D coordinate, found shape {:?}", var.shape()),
        )),
    }
}

fn shape_of(dims: &[Dimension]) -> Vec<usize> {
    dims.iter().map(|d| d.len).collect()
}

/// First element of a numeric attribute as `f64`.
pub fn attr_as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::Uchar(v) => Some(*v as f64),
        AttributeValue::Schar(v) => Some(*v as f64),
        AttributeValue::Ushort(v) => Some(*v as f64),
        AttributeValue::Short(v) => Some(*v as f64),
        AttributeValue::Uint(v) => Some(*v as f64),
        AttributeValue::Int(v) => Some(*v as f64),
        AttributeValue::Ulonglong(v) => Some(*v as f64),
        AttributeValue::Longlong(v) => Some(*v as f64),
        AttributeValue::Float(v) => Some(*v as f64),
        AttributeValue::Double(v) => Some(*v),
        AttributeValue::Uchars(v) => v.first().map(|x| *x as f64),
        AttributeValue::Schars(v) => v.first().map(|x| *x as f64),
        AttributeValue::Ushorts(v) => v.first().map(|x| *x as f64),
        AttributeValue::Shorts(v) => v.first().map(|x| *x as f64),
        AttributeValue::Uints(v) => v.first().map(|x| *x as f64),
        AttributeValue::Ints(v) => v.first().map(|x| *x as f64),
        AttributeValue::Ulonglongs(v) => v.first().map(|x| *x as f64),
        AttributeValue::Longlongs(v) => v.first().map(|x| *x as f64),
        AttributeValue::Floats(v) => v.first().map(|x| *x as f64),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_var() -> Variable {
        // (level=2, lat=2, lon=3): value = level*100 + lat*10 + lon
        let mut data = Vec::new();
        for k in 0..2 {
            for i in 0..2 {
                for j in 0..3 {
                    data.push((k * 100 + i * 10 + j) as f64);
                }
            }
        }
        Variable::new(
            "V",
            vec![
                Dimension::new("level", 2),
                Dimension::new("lat", 2),
                Dimension::new("lon", 3),
            ],
            VarType::F64,
            data,
        )
        .unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = Variable::new("x", vec![Dimension::new("a", 3)], VarType::F64, vec![1.0]);
        assert!(matches!(err, Err(NetCdfError::Shape { .. })));
    }

    #[test]
    fn test_extract_at_cell() {
        let v = grid_var();
        let values = v.extract_at(&[("lat", 1), ("lon", 2)]).unwrap();
        assert_eq!(values, vec![12.0, 112.0]);
    }

    #[test]
    fn test_select_drops_dimension() {
        let v = grid_var().select("level", 1).unwrap();
        assert_eq!(v.dim_names(), vec!["lat", "lon"]);
        assert_eq!(v.data, vec![100.0, 101.0, 102.0, 110.0, 111.0, 112.0]);
    }

    #[test]
    fn test_assign_at_touches_only_the_cell() {
        let mut v = grid_var();
        let before = v.clone();
        v.assign_at(&[("lat", 0), ("lon", 1)], &[-1.0, -2.0]).unwrap();

        assert_eq!(v.extract_at(&[("lat", 0), ("lon", 1)]).unwrap(), vec![-1.0, -2.0]);
        let changed = v
            .data
            .iter()
            .zip(&before.data)
            .filter(|(a, b)| a != b)
            .count();
        assert_eq!(changed, 2);
    }

    #[test]
    fn test_assign_at_length_mismatch() {
        let mut v = grid_var();
        assert!(v.assign_at(&[("lat", 0), ("lon", 1)], &[1.0]).is_err());
        assert!(v.assign_at(&[("lat", 5)], &[1.0]).is_err());
        assert!(v.assign_at(&[("depth", 0)], &[1.0]).is_err());
    }

    #[test]
    fn test_scalar_variable() {
        let v = Variable::scalar("zbot", 30.0);
        assert_eq!(v.extract_at(&[]).unwrap(), vec![30.0]);
        assert_eq!(v.scalar_value().unwrap(), 30.0);
        assert!(grid_var().scalar_value().is_err());
    }

    #[test]
    fn test_attributes() {
        let mut v = Variable::scalar("t", 1.0)
            .with_attr("units", "K")
            .with_attr("_FillValue", 1.0e36);
        assert_eq!(v.attr_str("units"), Some("K"));
        assert_eq!(v.attr_f64("_FillValue"), Some(1.0e36));
        v.set_attr("units", "degC");
        assert_eq!(v.attributes.len(), 2);
        assert_eq!(v.attr_str("units"), Some("degC"));
        assert!(v.remove_attr("units").is_some());
        assert!(v.attr("units").is_none());
    }

    #[test]
    fn test_dataset_insert_checks_dimensions() {
        let mut ds = Dataset::new();
        ds.insert(grid_var()).unwrap();
        assert_eq!(ds.dimension("lon").unwrap().len, 3);

        let clash = Variable::new("W", vec![Dimension::new("lon", 4)], VarType::F64, vec![0.0; 4])
            .unwrap();
        assert!(ds.insert(clash).is_err());

        // Replacing keeps one entry
        ds.insert(grid_var()).unwrap();
        assert_eq!(ds.variable_names(), vec!["V".to_string()]);
    }

    #[test]
    fn test_sel_nearest() {
        let mut ds = Dataset::new();
        ds.insert(
            Variable::new("LAT", vec![Dimension::new("lat", 2)], VarType::F64, vec![50.0, 51.0])
                .unwrap(),
        )
        .unwrap();
        ds.insert(
            Variable::new(
                "LON",
                vec![Dimension::new("lon", 3)],
                VarType::F64,
                vec![-3.0, -2.0, -1.0],
            )
            .unwrap(),
        )
        .unwrap();
        ds.insert(grid_var()).unwrap();

        let point = GeoPoint::new(50.9, -1.2).unwrap();
        let (sel, cell) = ds.sel_nearest("LAT", "LON", &point).unwrap();
        assert_eq!((cell.lat_index, cell.lon_index), (1, 2));
        assert_eq!(cell.point(), GeoPoint { lat: 51.0, lon: -1.0 });
        assert_eq!(sel.require("V").unwrap().data, vec![12.0, 112.0]);
        assert!(sel.dimension("lat").is_none());
        assert_eq!(sel.require("LAT").unwrap().scalar_value().unwrap(), 51.0);
    }

    #[test]
    fn test_isel_out_of_range() {
        let mut ds = Dataset::new();
        ds.insert(grid_var()).unwrap();
        assert!(ds.isel("level", 2).is_err());
        assert!(ds.isel("nope", 0).is_err());
    }
}
