//! Atmospheric forcing derivation for CLMU single-point runs.
//!
//! Hourly single-level reanalysis (ERA5) is retrieved month by month for a
//! point, concatenated along time, and converted to the eight forcing
//! variables the model reads: `SWdown`, `LWdown`, `Qair`, `Tair`, `Wind`,
//! `Prectmms`, `PSurf` and `Zbot`, all valid at the reference height `zbot`.
//!
//! # Example
//!
//! ```ignore
//! use forcing::{build_forcing, create_fetcher, write_forcing, ConversionParams, ForcingSource};
//!
//! let fetcher = create_fetcher(ForcingSource::Cds, &settings)?;
//! let record = build_forcing(fetcher.as_ref(), &point, &range, &ConversionParams::default()).await?;
//! write_forcing(&record, &path, fetcher.name())?;
//! ```

pub mod constants;

mod assemble;
mod convert;
mod error;
mod record;
mod sources;
mod writer;

pub use assemble::{build_forcing, fetch_range};
pub use convert::{
    accumulated_flux, air_temperature, convert, dewpoint_celsius, floor, precipitation_rate,
    saturation_vapor_pressure, specific_humidity, surface_pressure, wind_speed, ConversionParams,
};
pub use error::{ForcingError, ForcingResult};
pub use record::{ForcingRecord, RawRecord};
pub use sources::{
    create_fetcher, AssetValue, CdsConfig, CdsFetcher, ForcingSource, JobReply, JobResults,
    JobStatus, LocalArchive, LocalConfig, RawFetcher, SourceSettings,
};
pub use writer::{
    forcing_file_name, read_forcing, resolve_output, to_dataset, write_forcing, FORCING_VARIABLES,
};
