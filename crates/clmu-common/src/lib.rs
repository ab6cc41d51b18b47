//! Common types and utilities shared across the CLMU input preparation crates.

pub mod bbox;
pub mod geo;
pub mod time;

pub use bbox::BoundingBox;
pub use geo::{nearest_index, normalize_lon, wrap_lon_360, GeoError, GeoPoint};
pub use time::{month_chunks, CfTimeUnits, DateRange, MonthChunk, TimeParseError, YearMonth};
