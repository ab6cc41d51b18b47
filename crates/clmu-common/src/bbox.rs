//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

use crate::GeoPoint;

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Square box of `half_width` degrees around a point, clamped to valid latitudes.
    pub fn around(point: &GeoPoint, half_width: f64) -> Self {
        Self {
            min_lon: point.lon - half_width,
            min_lat: (point.lat - half_width).max(-90.0),
            max_lon: point.lon + half_width,
            max_lat: (point.lat + half_width).min(90.0),
        }
    }

    /// Box as `[north, west, south, east]`, the order reanalysis retrieval APIs expect.
    pub fn to_nwse(&self) -> [f64; 4] {
        [self.max_lat, self.min_lon, self.min_lat, self.max_lon]
    }

    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lon >= self.min_lon
            && point.lon <= self.max_lon
            && point.lat >= self.min_lat
            && point.lat <= self.max_lat
    }
}
