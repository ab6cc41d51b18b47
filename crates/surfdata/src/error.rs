//! Error types for surface data preparation.

use clmu_common::{GeoError, GeoPoint};
use netcdf_io::NetCdfError;
use thiserror::Error;

/// Result type for surface data operations.
pub type SurfDataResult<T> = Result<T, SurfDataError>;

#[derive(Error, Debug)]
pub enum SurfDataError {
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error("Invalid point: {0}")]
    Geo(#[from] GeoError),

    #[error("Missing variable: {0}")]
    MissingVariable(String),

    /// Template and source disagree on a variable's layout
    #[error("Shape mismatch for '{variable}': {message}")]
    Shape { variable: String, message: String },

    #[error("No valid soil texture within {radius} rings of {point}")]
    NoValidSoil { point: GeoPoint, radius: u32 },

    #[error("Invalid urban region id {value} (dataset has {regions} regions)")]
    InvalidRegion { value: f64, regions: usize },

    #[error("Invalid urban fractions: {0}")]
    PctUrban(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SurfDataError {
    pub fn shape(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Shape {
            variable: variable.into(),
            message: message.into(),
        }
    }
}
