//! Raw reanalysis sources.
//!
//! Each [`ForcingSource`] variant is bound to one [`RawFetcher`]
//! implementation. The set is closed: keywords for retrieval back-ends this
//! crate does not implement are rejected when parsed.

mod cds;
mod local;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use async_trait::async_trait;
use clmu_common::{GeoPoint, MonthChunk};
use serde::{Deserialize, Serialize};

use crate::error::{ForcingError, ForcingResult};
use crate::record::RawRecord;

pub use cds::{AssetValue, CdsConfig, CdsFetcher, JobReply, JobResults, JobStatus};
pub use local::{LocalArchive, LocalConfig};

/// Capability to fetch the raw series for a point over one month chunk.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// Fetch the raw record for `point`, restricted to `chunk`.
    async fn fetch(&self, point: &GeoPoint, chunk: &MonthChunk) -> ForcingResult<RawRecord>;

    /// Short name used in logs and output metadata.
    fn name(&self) -> &str;
}

/// Supported raw data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ForcingSource {
    /// Copernicus Climate Data Store retrieval API
    Cds,
    /// Monthly files already on disk
    Local,
}

impl ForcingSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForcingSource::Cds => "cds",
            ForcingSource::Local => "local",
        }
    }
}

impl fmt::Display for ForcingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForcingSource {
    type Err = ForcingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cds" => Ok(ForcingSource::Cds),
            "local" => Ok(ForcingSource::Local),
            _ => Err(ForcingError::UnsupportedSource(s.to_string())),
        }
    }
}

impl TryFrom<String> for ForcingSource {
    type Error = ForcingError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ForcingSource> for String {
    fn from(source: ForcingSource) -> Self {
        source.as_str().to_string()
    }
}

/// Settings needed to construct any of the fetchers.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Directory for downloaded raw files
    pub cache_dir: PathBuf,
    pub cds: CdsConfig,
    pub local: LocalConfig,
}

/// Create the fetcher bound to a source.
pub fn create_fetcher(
    source: ForcingSource,
    settings: &SourceSettings,
) -> ForcingResult<Box<dyn RawFetcher>> {
    match source {
        ForcingSource::Cds => Ok(Box::new(CdsFetcher::new(
            settings.cds.clone(),
            settings.cache_dir.clone(),
        )?)),
        ForcingSource::Local => Ok(Box::new(LocalArchive::new(
            settings.local.clone(),
            settings.cache_dir.clone(),
        ))),
    }
}
