// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Axis-aligned bounding box of the area of interest.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Bounding box in degrees. Never persisted.
///
/// Tuple order is always `(min_lat, min_lon, max_lat, max_lon)`, which is
/// also the `(south, west, north, east)` order of an Overpass bbox filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl BoundingBox {
    pub fn as_tuple(&self) -> (f64, f64, f64, f64) {
        (self.min_lat, self.min_lon, self.max_lat, self.max_lon)
    }

    /// Render as an Overpass QL bbox filter body.
    pub fn overpass_filter(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }
}

impl From<(f64, f64, f64, f64)> for BoundingBox {
    fn from((min_lat, min_lon, max_lat, max_lon): (f64, f64, f64, f64)) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }
}
