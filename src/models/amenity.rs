// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Amenity model for storage and API.

use chrono::{DateTime, Utc};
use geo::Point;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::category::AmenityCategory;
use crate::models::geometry::{to_portable, StorageGeometry};
use crate::time_utils::format_timestamp;

/// Stored amenity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amenity {
    /// Internal identifier
    pub id: Uuid,
    /// OSM node ID (unique, idempotency key for loads)
    pub osm_id: i64,
    pub name: Option<String>,
    /// Raw category code from the data provider (e.g. "restaurant")
    pub amenity_type: Option<String>,
    /// Always `AmenityCategory::from_raw(amenity_type)`
    pub category: AmenityCategory,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    /// Location (lon, lat), SRID 4326
    pub geometry: Point<f64>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl Amenity {
    /// GeoJSON feature with the amenity's attributes as properties.
    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("id".to_string(), self.id.to_string().into());
        properties.insert("osm_id".to_string(), self.osm_id.into());
        properties.insert("name".to_string(), self.name.clone().into());
        properties.insert("amenity_type".to_string(), self.amenity_type.clone().into());
        properties.insert("category".to_string(), self.category.label().into());
        properties.insert("address".to_string(), self.address.clone().into());
        properties.insert(
            "opening_hours".to_string(),
            self.opening_hours.clone().into(),
        );

        geojson::Feature {
            bbox: None,
            geometry: Some(to_portable(&StorageGeometry::point(self.geometry))),
            id: Some(geojson::feature::Id::String(self.id.to_string())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Amenity extracted from the map-data source, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAmenity {
    pub osm_id: i64,
    pub name: Option<String>,
    pub amenity_type: Option<String>,
    pub category: AmenityCategory,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    pub geometry: Point<f64>,
}

impl NewAmenity {
    /// Build a record, deriving the category from the raw code.
    pub fn new(
        osm_id: i64,
        name: Option<String>,
        amenity_type: Option<String>,
        address: Option<String>,
        opening_hours: Option<String>,
        geometry: Point<f64>,
    ) -> Self {
        let category = AmenityCategory::from_raw(amenity_type.as_deref());
        Self {
            osm_id,
            name,
            amenity_type,
            category,
            address,
            opening_hours,
            geometry,
        }
    }
}

/// Partial update of an amenity's mutable fields.
///
/// `updated_at` is accepted for payload compatibility but ignored; the store
/// always stamps the current time.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AmenityUpdate {
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub amenity_type: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 255))]
    pub opening_hours: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AmenityUpdate {
    /// Category implied by a new `amenity_type`, if one is being set.
    pub fn category(&self) -> Option<AmenityCategory> {
        self.amenity_type
            .as_deref()
            .map(|raw| AmenityCategory::from_raw(Some(raw)))
    }
}

/// Amenity as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AmenityResponse {
    pub id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub osm_id: i64,
    pub name: Option<String>,
    pub amenity_type: Option<String>,
    pub category: AmenityCategory,
    pub address: Option<String>,
    pub opening_hours: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub geometry: geojson::Geometry,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

impl From<&Amenity> for AmenityResponse {
    fn from(a: &Amenity) -> Self {
        Self {
            id: a.id,
            osm_id: a.osm_id,
            name: a.name.clone(),
            amenity_type: a.amenity_type.clone(),
            category: a.category,
            address: a.address.clone(),
            opening_hours: a.opening_hours.clone(),
            geometry: to_portable(&StorageGeometry::point(a.geometry)),
            updated_at: format_timestamp(a.updated_at),
            updated_by: a.updated_by.clone(),
        }
    }
}

/// Nearest amenity of a category, with its distance from the building.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosestAmenity {
    pub amenity: Amenity,
    pub distance_meters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ClosestAmenityResponse {
    pub building_id: Uuid,
    pub category: AmenityCategory,
    pub amenity: AmenityResponse,
    pub distance_meters: f64,
}
