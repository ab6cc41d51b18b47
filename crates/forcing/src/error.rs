//! Error types for forcing derivation.

use clmu_common::{GeoError, TimeParseError};
use netcdf_io::NetCdfError;
use thiserror::Error;

/// Result type for forcing operations.
pub type ForcingResult<T> = Result<T, ForcingError>;

#[derive(Error, Debug)]
pub enum ForcingError {
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] NetCdfError),

    #[error("Time error: {0}")]
    Time(#[from] TimeParseError),

    #[error("Invalid point: {0}")]
    Geo(#[from] GeoError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A raw input field is absent
    #[error("Missing input field: {0}")]
    MissingField(String),

    /// Series lengths or dimensions do not line up
    #[error("Data shape error: {0}")]
    Shape(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported forcing source '{0}' (supported: cds, local)")]
    UnsupportedSource(String),

    /// The retrieval service rejected or failed a request
    #[error("CDS request failed: {0}")]
    Cds(String),

    #[error("CDS request {request_id} did not complete within {secs}s")]
    Timeout { request_id: String, secs: u64 },

    /// No data returned for a requested month
    #[error("No records for {0}")]
    EmptyChunk(String),
}
