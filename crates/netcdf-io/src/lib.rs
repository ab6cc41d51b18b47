//! NetCDF dataset I/O for the CLMU preparation pipeline.
//!
//! This crate loads whole NetCDF files (reanalysis extracts, surface-data
//! templates, soil and urban rasters) into an in-memory [`Dataset`] and writes
//! them back out.
//!
//! # Implementation Notes
//!
//! Reading and writing go through the `netcdf` crate, which links libnetcdf
//! and HDF5 (system packages `libnetcdf-dev` and `libhdf5-dev`). The files
//! this pipeline touches are small point extracts or single global rasters,
//! so values are held fully in memory as `f64` while the on-disk storage type
//! of every variable is remembered for the round trip.

mod dataset;
mod error;
mod reader;
mod writer;

pub use dataset::{attr_as_f64, Dataset, Dimension, GridCell, VarType, Variable};
pub use error::{NetCdfError, NetCdfResult};
pub use netcdf::AttributeValue;
pub use reader::{open_dataset, silence_hdf5_errors};
pub use writer::{global_f64, global_str, write_dataset};
