//! Monthly reanalysis files already on disk.

use std::path::PathBuf;

use async_trait::async_trait;
use clmu_common::{GeoPoint, MonthChunk, YearMonth};
use netcdf_io::open_dataset;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::RawFetcher;
use crate::error::{ForcingError, ForcingResult};
use crate::record::RawRecord;

/// Local archive settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// File name pattern with `{year}` and `{month:02}` (or `{month}`) placeholders
    #[serde(default = "default_pattern")]
    pub pattern: String,

    /// Archive directory; the raw cache directory when unset
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_pattern() -> String {
    "era5_{year}_{month:02}.nc".to_string()
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            pattern: default_pattern(),
            dir: None,
        }
    }
}

impl LocalConfig {
    /// File name for a month.
    pub fn file_name(&self, month: &YearMonth) -> String {
        self.pattern
            .replace("{year}", &format!("{:04}", month.year))
            .replace("{month:02}", &format!("{:02}", month.month))
            .replace("{month}", &month.month.to_string())
    }
}

/// Reads one whole-month file per chunk and keeps the chunk's window.
pub struct LocalArchive {
    config: LocalConfig,
    dir: PathBuf,
}

impl LocalArchive {
    pub fn new(config: LocalConfig, cache_dir: PathBuf) -> Self {
        let dir = config.dir.clone().unwrap_or(cache_dir);
        Self { config, dir }
    }

    pub fn path_for(&self, month: &YearMonth) -> PathBuf {
        self.dir.join(self.config.file_name(month))
    }
}

#[async_trait]
impl RawFetcher for LocalArchive {
    #[instrument(skip(self), fields(chunk = %chunk))]
    async fn fetch(&self, point: &GeoPoint, chunk: &MonthChunk) -> ForcingResult<RawRecord> {
        let path = self.path_for(&chunk.month());
        if !path.exists() {
            return Err(ForcingError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("raw archive file {} not found", path.display()),
            )));
        }

        debug!(path = %path.display(), "Reading local archive file");
        let ds = open_dataset(&path)?;
        let mut record = RawRecord::from_dataset(&ds, point)?;
        record.restrict(&chunk.start_datetime(), &chunk.end_datetime());
        Ok(record)
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_placeholders() {
        let month = YearMonth::new(2013, 3).unwrap();
        assert_eq!(LocalConfig::default().file_name(&month), "era5_2013_03.nc");

        let config = LocalConfig {
            pattern: "{year}/single_{month}.nc".to_string(),
            dir: None,
        };
        assert_eq!(config.file_name(&month), "2013/single_3.nc");
    }

    #[test]
    fn test_dir_falls_back_to_cache() {
        let archive = LocalArchive::new(LocalConfig::default(), PathBuf::from("/cache"));
        let month = YearMonth::new(2012, 12).unwrap();
        assert_eq!(archive.path_for(&month), PathBuf::from("/cache/era5_2012_12.nc"));

        let archive = LocalArchive::new(
            LocalConfig {
                dir: Some(PathBuf::from("/archive")),
                ..LocalConfig::default()
            },
            PathBuf::from("/cache"),
        );
        assert_eq!(archive.path_for(&month), PathBuf::from("/archive/era5_2012_12.nc"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let archive = LocalArchive::new(LocalConfig::default(), PathBuf::from("/nonexistent"));
        let point = GeoPoint::new(0.0, 0.0).unwrap();
        let chunk = clmu_common::DateRange::parse("2012-01-01", "2012-02-01")
            .unwrap()
            .chunks()[0];
        let err = archive.fetch(&point, &chunk).await.unwrap_err();
        assert!(matches!(err, ForcingError::Io(_)));
    }
}
