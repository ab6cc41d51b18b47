//! Pipeline configuration.
//!
//! Loaded from an optional YAML file; every section falls back to its
//! defaults, then a fixed set of environment variables overrides the result.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use forcing::{CdsConfig, ConversionParams, ForcingSource, LocalConfig, SourceSettings};
use serde::{Deserialize, Serialize};
use surfdata::SurfDataConfig;
use tracing::{debug, info};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub forcing: ForcingConfig,
    #[serde(default)]
    pub cds: CdsConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub surfdata: SurfDataConfig,
}

/// Working directories and raw input file names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw monthly downloads
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Urban, soil and template datasets
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Parent of the model case directories removed by `clean`
    #[serde(default = "default_case_root")]
    pub case_root: PathBuf,

    #[serde(default = "default_urban_file")]
    pub urban_file: String,

    #[serde(default = "default_soil_file")]
    pub soil_file: String,

    #[serde(default = "default_template_file")]
    pub template_file: String,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./era5_data")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./inputdata")
}

fn default_case_root() -> PathBuf {
    PathBuf::from("./cases")
}

fn default_urban_file() -> String {
    "mksrf_urban_0.05x0.05_simyr2000.c170724.nc".to_string()
}

fn default_soil_file() -> String {
    "mksrf_soitex.10level.c010119.nc".to_string()
}

fn default_template_file() -> String {
    "surfdata.nc".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            output_dir: default_output_dir(),
            input_dir: default_input_dir(),
            case_root: default_case_root(),
            urban_file: default_urban_file(),
            soil_file: default_soil_file(),
            template_file: default_template_file(),
        }
    }
}

impl PathsConfig {
    pub fn urban_path(&self) -> PathBuf {
        self.input_dir.join(&self.urban_file)
    }

    pub fn soil_path(&self) -> PathBuf {
        self.input_dir.join(&self.soil_file)
    }

    pub fn template_path(&self) -> PathBuf {
        self.input_dir.join(&self.template_file)
    }
}

/// Forcing derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcingConfig {
    #[serde(default = "default_source")]
    pub source: ForcingSource,

    /// Reference height (m)
    #[serde(default = "default_zbot")]
    pub zbot: f64,

    /// Temperature lapse rate (K/m)
    #[serde(default = "default_lapse_rate")]
    pub lapse_rate: f64,

    /// Skip the run when the output file already exists
    #[serde(default = "default_reuse_existing")]
    pub reuse_existing: bool,
}

fn default_source() -> ForcingSource {
    ForcingSource::Cds
}

fn default_zbot() -> f64 {
    ConversionParams::default().zbot
}

fn default_lapse_rate() -> f64 {
    ConversionParams::default().lapse_rate
}

fn default_reuse_existing() -> bool {
    true
}

impl Default for ForcingConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            zbot: default_zbot(),
            lapse_rate: default_lapse_rate(),
            reuse_existing: default_reuse_existing(),
        }
    }
}

impl PipelineConfig {
    /// Load the YAML file when given, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given, using defaults");
                Self::default()
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: PipelineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "Loaded pipeline configuration");
        Ok(config)
    }

    /// Apply `CLMU_CACHE_DIR`, `CLMU_OUTPUT_DIR`, `CDS_URL`, `CDS_KEY` and
    /// `FORCING_SOURCE` as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("CLMU_CACHE_DIR") {
            self.paths.cache_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("CLMU_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("CDS_URL") {
            self.cds.url = url;
        }
        if let Some(key) = lookup("CDS_KEY") {
            self.cds.key = key;
        }
        if let Some(source) = lookup("FORCING_SOURCE") {
            self.forcing.source = source
                .parse()
                .with_context(|| "Invalid FORCING_SOURCE".to_string())?;
        }
        Ok(())
    }

    pub fn source_settings(&self) -> SourceSettings {
        SourceSettings {
            cache_dir: self.paths.cache_dir.clone(),
            cds: self.cds.clone(),
            local: self.local.clone(),
        }
    }

    pub fn conversion_params(&self) -> Result<ConversionParams> {
        ConversionParams::new(self.forcing.zbot, self.forcing.lapse_rate)
            .context("Invalid forcing settings")
    }
}
