//! Error types for NetCDF dataset operations.

use thiserror::Error;

/// Result type for NetCDF operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF reading, writing and in-memory manipulation.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error reported by libnetcdf
    #[error("NetCDF library error: {0}")]
    Library(#[from] netcdf::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Values do not fit the declared dimensions
    #[error("Shape mismatch for '{variable}': {message}")]
    Shape { variable: String, message: String },

    /// Variable type the in-memory model cannot hold (strings, compounds, ...)
    #[error("Unsupported type for variable '{variable}': {kind}")]
    UnsupportedType { variable: String, kind: String },

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl NetCdfError {
    pub fn shape(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Shape {
            variable: variable.into(),
            message: message.into(),
        }
    }

    pub fn missing(what: impl Into<String>) -> Self {
        Self::MissingData(what.into())
    }
}
