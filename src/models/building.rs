// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Building model for storage and API.

use chrono::{DateTime, Utc};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::amenity::{Amenity, AmenityResponse};
use crate::models::category::BuildingCategory;
use crate::models::geometry::{to_portable, StorageGeometry};
use crate::time_utils::format_timestamp;

/// Raw tag bag copied verbatim from the map-data source.
///
/// Deliberately schema-less: keys and value types are whatever the source
/// provides, and clients may add their own keys through updates.
pub type Information = serde_json::Map<String, serde_json::Value>;

/// Stored building record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    /// Internal identifier
    pub id: Uuid,
    /// OSM way ID (unique, idempotency key for loads)
    pub osm_id: i64,
    pub information: Information,
    /// Footprint, SRID 4326
    pub geometry: Polygon<f64>,
    pub requires_maintenance: bool,
    /// Assigned nearest amenity. Nulled by the store when that amenity is deleted.
    pub amenity_id: Option<Uuid>,
    /// The assigned amenity, joined on list reads.
    pub amenity: Option<Amenity>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
}

impl Building {
    /// Category implied by the building's own `amenity` tag.
    pub fn implied_category(&self) -> BuildingCategory {
        BuildingCategory::from_raw(self.information.get("amenity").and_then(|v| v.as_str()))
    }

    /// GeoJSON feature with the building's attributes as properties.
    pub fn to_feature(&self) -> geojson::Feature {
        let mut properties = serde_json::Map::new();
        properties.insert("id".to_string(), self.id.to_string().into());
        properties.insert("osm_id".to_string(), self.osm_id.into());
        properties.insert(
            "information".to_string(),
            serde_json::Value::Object(self.information.clone()),
        );
        properties.insert(
            "requires_maintenance".to_string(),
            self.requires_maintenance.into(),
        );
        properties.insert(
            "amenity_id".to_string(),
            self.amenity_id.map(|id| id.to_string()).into(),
        );
        properties.insert(
            "category".to_string(),
            self.implied_category().label().into(),
        );

        geojson::Feature {
            bbox: None,
            geometry: Some(to_portable(&StorageGeometry::polygon(
                self.geometry.clone(),
            ))),
            id: Some(geojson::feature::Id::String(self.id.to_string())),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

/// Building extracted from the map-data source, not yet stored.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBuilding {
    pub osm_id: i64,
    pub information: Information,
    pub geometry: Polygon<f64>,
}

/// Partial update of a building's mutable fields.
///
/// `updated_at` is accepted for payload compatibility but ignored; the store
/// always stamps the current time.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BuildingUpdate {
    pub information: Option<Information>,
    pub requires_maintenance: Option<bool>,
    #[validate(length(min = 1, max = 128))]
    pub updated_by: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Building as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct BuildingResponse {
    pub id: Uuid,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub osm_id: i64,
    pub information: Information,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub geometry: geojson::Geometry,
    pub requires_maintenance: bool,
    pub category: String,
    pub amenity_id: Option<Uuid>,
    pub amenity: Option<AmenityResponse>,
    pub updated_at: String,
    pub updated_by: Option<String>,
}

impl From<&Building> for BuildingResponse {
    fn from(b: &Building) -> Self {
        Self {
            id: b.id,
            osm_id: b.osm_id,
            information: b.information.clone(),
            geometry: to_portable(&StorageGeometry::polygon(b.geometry.clone())),
            requires_maintenance: b.requires_maintenance,
            category: b.implied_category().label().to_string(),
            amenity_id: b.amenity_id,
            amenity: b.amenity.as_ref().map(AmenityResponse::from),
            updated_at: format_timestamp(b.updated_at),
            updated_by: b.updated_by.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::LineString;

    fn building_with_tags(tags: serde_json::Value) -> Building {
        Building {
            id: Uuid::new_v4(),
            osm_id: 7,
            information: tags.as_object().cloned().unwrap_or_default(),
            geometry: Polygon::new(
                LineString::from(vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]),
                vec![],
            ),
            requires_maintenance: false,
            amenity_id: None,
            amenity: None,
            updated_at: Utc::now(),
            updated_by: None,
        }
    }

    #[test]
    fn test_implied_category_residential_default() {
        let b = building_with_tags(serde_json::json!({"building": "yes"}));
        assert_eq!(b.implied_category(), BuildingCategory::Residential);
    }

    #[test]
    fn test_implied_category_from_amenity_tag() {
        let b = building_with_tags(serde_json::json!({"building": "yes", "amenity": "school"}));
        assert_eq!(b.implied_category().label(), "Community and Culture");
    }

    #[test]
    fn test_response_keeps_information_verbatim() {
        let b = building_with_tags(serde_json::json!({"building": "yes", "levels": 3}));
        let response = BuildingResponse::from(&b);
        assert_eq!(response.information.get("levels"), Some(&serde_json::json!(3)));
        assert_eq!(response.category, "Residential");
    }

    #[test]
    fn test_update_deserializes_partial_payload() {
        let update: BuildingUpdate =
            serde_json::from_str(r#"{"requires_maintenance": true}"#).unwrap();
        assert_eq!(update.requires_maintenance, Some(true));
        assert!(update.information.is_none());
        assert!(update.validate().is_ok());
    }
}
