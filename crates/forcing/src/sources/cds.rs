//! Copernicus Climate Data Store retrieval.
//!
//! One job per month chunk on the CDS retrieve API: the job is submitted to
//! the dataset's `execute` endpoint, polled until it reports `successful`,
//! and its result asset streamed into the cache directory. Cached files are
//! reused on later runs.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use clmu_common::{BoundingBox, GeoPoint, MonthChunk};
use futures::StreamExt;
use netcdf_io::open_dataset;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use super::RawFetcher;
use crate::error::{ForcingError, ForcingResult};
use crate::record::RawRecord;

/// Half width (degrees) of the box requested around the point.
const AREA_HALF_WIDTH: f64 = 0.25;

const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Long names of the requested single-level variables.
const CDS_VARIABLES: [&str; 9] = [
    "2m_temperature",
    "2m_dewpoint_temperature",
    "surface_pressure",
    "10m_u_component_of_wind",
    "10m_v_component_of_wind",
    "surface_solar_radiation_downwards",
    "surface_thermal_radiation_downwards",
    "total_precipitation",
    "forecast_surface_roughness",
];

/// CDS API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdsConfig {
    /// API root, e.g. `https://cds.climate.copernicus.eu/api`
    #[serde(default = "default_url")]
    pub url: String,

    /// Personal access token
    #[serde(default)]
    pub key: String,

    #[serde(default = "default_dataset")]
    pub dataset: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Give up on a queued job after this long
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "https://cds.climate.copernicus.eu/api".to_string()
}

fn default_dataset() -> String {
    "reanalysis-era5-single-levels".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_timeout() -> u64 {
    600
}

impl Default for CdsConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key: String::new(),
            dataset: default_dataset(),
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

impl CdsConfig {
    /// Access token sent in the `PRIVATE-TOKEN` header.
    pub fn token(&self) -> ForcingResult<&str> {
        let token = self.key.trim();
        if token.is_empty() {
            return Err(ForcingError::InvalidConfig(
                "CDS key is not set (personal access token from the CDS profile page)"
                    .to_string(),
            ));
        }
        if token.contains(':') {
            return Err(ForcingError::InvalidConfig(
                "CDS key has the retired '<uid>:<apikey>' form; use the personal access token"
                    .to_string(),
            ));
        }
        Ok(token)
    }

    fn execute_url(&self) -> String {
        format!(
            "{}/retrieve/v1/processes/{}/execute",
            self.url.trim_end_matches('/'),
            self.dataset
        )
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/retrieve/v1/jobs/{}", self.url.trim_end_matches('/'), job_id)
    }
}

/// Lifecycle status reported for a retrieve job.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Accepted,
    Running,
    Successful,
    Failed,
    Dismissed,
    #[serde(other)]
    Unknown,
}

/// Status document returned by submit and poll calls.
#[derive(Debug, Clone, Deserialize)]
pub struct JobReply {
    #[serde(rename = "jobID")]
    pub job_id: String,
    pub status: JobStatus,
}

/// Result document of a successful job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResults {
    pub asset: ResultAsset,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultAsset {
    pub value: AssetValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetValue {
    pub href: String,
    #[serde(rename = "file:size", default)]
    pub size: Option<u64>,
}

/// Problem document the API returns for failed jobs and rejected calls.
#[derive(Debug, Clone, Default, Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

/// Readable message from an error body, falling back to the raw text.
fn problem_message(body: &str) -> String {
    match serde_json::from_str::<Problem>(body) {
        Ok(p) if !p.title.is_empty() || !p.detail.is_empty() => {
            format!("{} {}", p.title, p.detail).trim().to_string()
        }
        _ => body.trim().to_string(),
    }
}

/// Fetches monthly ERA5 single-level extracts from the CDS.
pub struct CdsFetcher {
    client: Client,
    config: CdsConfig,
    cache_dir: PathBuf,
}

impl CdsFetcher {
    pub fn new(config: CdsConfig, cache_dir: PathBuf) -> ForcingResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(60)))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            cache_dir,
        })
    }

    /// Retrieval request body for one chunk.
    pub fn request_body(point: &GeoPoint, chunk: &MonthChunk) -> serde_json::Value {
        let month = chunk.month();
        let area = BoundingBox::around(&point.normalized(), AREA_HALF_WIDTH).to_nwse();
        let days: Vec<String> = chunk.days().iter().map(|d| format!("{:02}", d)).collect();
        let hours: Vec<String> = (0..24).map(|h| format!("{:02}:00", h)).collect();

        json!({
            "inputs": {
                "product_type": ["reanalysis"],
                "data_format": "netcdf",
                "download_format": "unarchived",
                "variable": CDS_VARIABLES,
                "year": [format!("{:04}", month.year)],
                "month": [format!("{:02}", month.month)],
                "day": days,
                "time": hours,
                "area": area,
            }
        })
    }

    /// Cache file for a point and chunk.
    pub fn cache_path(&self, point: &GeoPoint, chunk: &MonthChunk) -> PathBuf {
        self.cache_dir.join(format!(
            "era5_single_{}_{}_{}_{}.nc",
            point.lat,
            point.lon,
            chunk.start.format("%Y%m%d"),
            chunk.end.format("%Y%m%d")
        ))
    }

    fn authorized(&self, request: RequestBuilder) -> ForcingResult<RequestBuilder> {
        Ok(request.header(TOKEN_HEADER, self.config.token()?))
    }

    #[instrument(skip(self, body))]
    async fn submit(&self, body: &serde_json::Value) -> ForcingResult<JobReply> {
        let request = self.authorized(self.client.post(self.config.execute_url()))?;
        let response = request.json(body).send().await?;
        parse_reply(response).await
    }

    async fn poll(&self, job_id: &str) -> ForcingResult<JobReply> {
        let request = self.authorized(self.client.get(self.config.job_url(job_id)))?;
        parse_reply(request.send().await?).await
    }

    /// Result asset of a finished job. Failed jobs answer with a problem
    /// document, which becomes the error message.
    async fn results(&self, job_id: &str) -> ForcingResult<AssetValue> {
        let url = format!("{}/results", self.config.job_url(job_id));
        let request = self.authorized(self.client.get(url))?;
        let results: JobResults = parse_reply(request.send().await?).await?;
        Ok(results.asset.value)
    }

    /// Wait for a submitted job and return its result asset.
    async fn wait_for_result(&self, mut reply: JobReply) -> ForcingResult<AssetValue> {
        let started = Instant::now();
        let interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            match reply.status {
                JobStatus::Successful => return self.results(&reply.job_id).await,
                JobStatus::Failed => {
                    return match self.results(&reply.job_id).await {
                        Err(ForcingError::Cds(detail)) => Err(ForcingError::Cds(format!(
                            "job {} failed: {}",
                            reply.job_id, detail
                        ))),
                        Err(e) => Err(e),
                        Ok(_) => Err(ForcingError::Cds(format!(
                            "job {} failed",
                            reply.job_id
                        ))),
                    };
                }
                JobStatus::Dismissed => {
                    return Err(ForcingError::Cds(format!(
                        "job {} was dismissed",
                        reply.job_id
                    )));
                }
                JobStatus::Accepted | JobStatus::Running | JobStatus::Unknown => {}
            }

            if started.elapsed().as_secs() >= self.config.timeout_secs {
                return Err(ForcingError::Timeout {
                    request_id: reply.job_id,
                    secs: self.config.timeout_secs,
                });
            }

            debug!(job_id = %reply.job_id, status = ?reply.status, "Waiting for CDS job");
            tokio::time::sleep(interval).await;
            reply = self.poll(&reply.job_id).await?;
        }
    }

    /// Stream a result file to `path` through a `.partial` file.
    async fn download(&self, location: &str, path: &Path) -> ForcingResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let partial = path.with_extension("nc.partial");

        let response = self.client.get(location).send().await?;
        if !response.status().is_success() {
            return Err(ForcingError::Cds(format!(
                "download failed: {}",
                response.status()
            )));
        }

        let mut file = fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut bytes = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&partial, path).await?;
        info!(path = %path.display(), bytes, "Downloaded CDS result");
        Ok(())
    }
}

async fn parse_reply<T: DeserializeOwned>(response: reqwest::Response) -> ForcingResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ForcingError::Cds(format!(
            "HTTP {}: {}",
            status,
            problem_message(&body)
        )));
    }
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl RawFetcher for CdsFetcher {
    #[instrument(skip(self), fields(chunk = %chunk))]
    async fn fetch(&self, point: &GeoPoint, chunk: &MonthChunk) -> ForcingResult<RawRecord> {
        let path = self.cache_path(point, chunk);

        if path.exists() {
            info!(path = %path.display(), "Using cached CDS extract");
        } else {
            let body = Self::request_body(point, chunk);
            let reply = self.submit(&body).await?;
            info!(job_id = %reply.job_id, "Submitted CDS job");

            let asset = self.wait_for_result(reply).await?;
            debug!(href = %asset.href, size = ?asset.size, "CDS result ready");
            if let Err(e) = self.download(&asset.href, &path).await {
                warn!(error = %e, "CDS download failed");
                return Err(e);
            }
        }

        let ds = open_dataset(&path)?;
        let mut record = RawRecord::from_dataset(&ds, point)?;
        record.restrict(&chunk.start_datetime(), &chunk.end_datetime());
        Ok(record)
    }

    fn name(&self) -> &str {
        "cds"
    }
}
