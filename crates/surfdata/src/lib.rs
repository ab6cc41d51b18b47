//! Single-point surface data for CLMU runs.
//!
//! A one-cell surface data template is filled with the urban morphology and
//! material parameters of the region containing the point, the requested
//! urban density fractions, and the sand/clay texture of the nearest soil
//! cell with usable data.
//!
//! # Example
//!
//! ```ignore
//! use surfdata::{prepare_surface_file, SurfDataConfig, SurfacePaths, UrbanFractions};
//!
//! let fractions: UrbanFractions = "0,0,100".parse()?;
//! let report = prepare_surface_file(&paths, &point, &fractions, &SurfDataConfig::default())?;
//! println!("soil found {} rings out", report.soil.radius);
//! ```

mod error;
mod fractions;
mod inject;
mod soil;
mod urban;

pub use error::{SurfDataError, SurfDataResult};
pub use fractions::{PctUrbanPolicy, UrbanFractions};
pub use inject::{
    build_surface, check_template, inject_shared, prepare_surface_file, InjectionReport,
    SurfDataConfig, SurfacePaths, CELL_DIMS,
};
pub use soil::{find_soil, is_valid_composition, SoilSample, SoilSearch, PROBE_OFFSETS};
pub use urban::{extract_urban, UrbanRecord, ALBEDO_VARIABLES};
