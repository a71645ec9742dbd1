// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility extraction from the Overpass API.
//!
//! Responses are decoded into transport DTOs first and then mapped into
//! `NewBuilding` / `NewAmenity` records by pure functions, so the mapping
//! can be tested without HTTP.

use crate::models::building::Information;
use crate::models::{BoundingBox, NewAmenity, NewBuilding};
use geo::{Coord, LineString, Point, Polygon};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Amenity codes selected by the amenity query.
const AMENITY_FILTER: &str = "restaurant|cafe|bank|pharmacy";

/// Errors extracting facilities.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Overpass request failed: {0}")]
    Transport(String),

    #[error("Overpass returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid Overpass response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ExtractionError {
    fn from(e: reqwest::Error) -> Self {
        ExtractionError::Transport(e.to_string())
    }
}

// ─── Transport DTOs ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
pub struct OverpassElement {
    #[serde(rename = "type")]
    pub element_type: String,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl OverpassElement {
    fn is_node(&self) -> bool {
        self.element_type == "node"
    }

    fn is_way(&self) -> bool {
        self.element_type == "way"
    }

    fn coord(&self) -> Option<Coord<f64>> {
        match (self.lon, self.lat) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some(Coord { x, y }),
            _ => None,
        }
    }

    fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

// ─── Queries ─────────────────────────────────────────────────

pub fn buildings_query(bbox: &BoundingBox, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{timeout}];\nway[\"building\"]({bbox});\n(._;>;);\nout body;",
        timeout = timeout_secs,
        bbox = bbox.overpass_filter()
    )
}

pub fn amenities_query(bbox: &BoundingBox, timeout_secs: u64) -> String {
    let filter = bbox.overpass_filter();
    format!(
        "[out:json][timeout:{timeout}];\n(\n  node[\"amenity\"~\"{codes}\"]({filter});\n  \
         node[\"shop\"]({filter});\n  node[\"office\"]({filter});\n);\nout body;",
        timeout = timeout_secs,
        codes = AMENITY_FILTER,
        filter = filter
    )
}

// ─── Parsing ─────────────────────────────────────────────────

/// Map every way into a building footprint.
///
/// Way node references are resolved against the nodes in the same response.
/// Closed rings are kept, open rings with at least three distinct points are
/// closed, and anything else is skipped.
pub fn parse_buildings(response: &OverpassResponse) -> Vec<NewBuilding> {
    let nodes: HashMap<i64, Coord<f64>> = response
        .elements
        .iter()
        .filter(|e| e.is_node())
        .filter_map(|e| e.coord().map(|c| (e.id, c)))
        .collect();

    let mut buildings = Vec::new();
    for way in response.elements.iter().filter(|e| e.is_way()) {
        let resolved: Option<Vec<Coord<f64>>> =
            way.nodes.iter().map(|id| nodes.get(id).copied()).collect();
        let Some(points) = resolved else {
            tracing::debug!(osm_id = way.id, "Skipping way with unresolved node references");
            continue;
        };
        let Some(ring) = close_ring(points) else {
            tracing::debug!(osm_id = way.id, "Skipping degenerate way");
            continue;
        };

        buildings.push(NewBuilding {
            osm_id: way.id,
            information: information(&way.tags),
            geometry: Polygon::new(LineString::from(ring), vec![]),
        });
    }
    buildings
}

/// Map every node with a position into an amenity.
pub fn parse_amenities(response: &OverpassResponse) -> Vec<NewAmenity> {
    response
        .elements
        .iter()
        .filter(|e| e.is_node())
        .filter_map(|node| {
            let Some(coord) = node.coord() else {
                tracing::debug!(osm_id = node.id, "Skipping node without position");
                return None;
            };
            Some(NewAmenity::new(
                node.id,
                node.tag("name").map(str::to_string),
                raw_category(node),
                address(node),
                node.tag("opening_hours").map(str::to_string),
                Point::from(coord),
            ))
        })
        .collect()
}

/// The `amenity` tag, else the key that matched the node.
fn raw_category(node: &OverpassElement) -> Option<String> {
    if let Some(amenity) = node.tag("amenity") {
        return Some(amenity.to_string());
    }
    ["shop", "office"]
        .into_iter()
        .find(|key| node.tags.contains_key(*key))
        .map(str::to_string)
}

fn address(node: &OverpassElement) -> Option<String> {
    let street = node.tag("addr:street")?;
    Some(match node.tag("addr:housenumber") {
        Some(number) => format!("{} {}", number, street),
        None => street.to_string(),
    })
}

fn information(tags: &BTreeMap<String, String>) -> Information {
    tags.iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect()
}

fn close_ring(mut points: Vec<Coord<f64>>) -> Option<Vec<Coord<f64>>> {
    let distinct: HashSet<(u64, u64)> = points
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return None;
    }
    if points.first() != points.last() {
        let first = points[0];
        points.push(first);
    }
    (points.len() >= 4).then_some(points)
}

// ─── Client ──────────────────────────────────────────────────

/// Overpass API client.
#[derive(Clone)]
pub struct OverpassClient {
    http: reqwest::Client,
    url: String,
    timeout_secs: u64,
}

impl OverpassClient {
    pub fn new(http: reqwest::Client, url: String, timeout_secs: u64) -> Self {
        Self {
            http,
            url,
            timeout_secs,
        }
    }

    /// Buildings within the bounding box.
    pub async fn extract_buildings(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<NewBuilding>, ExtractionError> {
        let response = self
            .query(&buildings_query(bbox, self.timeout_secs))
            .await?;
        let buildings = parse_buildings(&response);
        tracing::info!(
            elements = response.elements.len(),
            count = buildings.len(),
            "Buildings extracted"
        );
        Ok(buildings)
    }

    /// Restaurants, cafés, banks, pharmacies, shops and offices within the bounding box.
    pub async fn extract_amenities(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<NewAmenity>, ExtractionError> {
        let response = self
            .query(&amenities_query(bbox, self.timeout_secs))
            .await?;
        let amenities = parse_amenities(&response);
        tracing::info!(count = amenities.len(), "Amenities extracted");
        Ok(amenities)
    }

    async fn query(&self, query: &str) -> Result<OverpassResponse, ExtractionError> {
        tracing::debug!(url = %self.url, "Querying Overpass");
        let response = self
            .http
            .post(&self.url)
            .form(&[("data", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ExtractionError::Decode(e.to_string()))
    }
}
