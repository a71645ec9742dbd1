// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Resolve the area-of-interest boundary into a bounding box.

use crate::models::geometry::{value_type_name, GeometryError};
use crate::models::BoundingBox;
use crate::services::features::{FeatureServiceClient, FeatureServiceError};
use geo::Coord;
use serde_json::Value;

/// Errors resolving the boundary.
#[derive(Debug, thiserror::Error)]
pub enum BoundaryError {
    #[error("Boundary feature has no geometry")]
    MissingGeometry,

    #[error("Boundary geometry has no coordinates")]
    MissingCoordinates,

    #[error("Boundary geometry contains no positions")]
    EmptyCoordinates,

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    FeatureService(#[from] FeatureServiceError),
}

/// The geometry kinds a boundary feature may carry.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryGeometry {
    Point(Vec<f64>),
    Polygon(Vec<Vec<Vec<f64>>>),
    MultiPolygon(Vec<Vec<Vec<Vec<f64>>>>),
}

impl BoundaryGeometry {
    /// Decode the `geometry` member of a feature.
    pub fn from_json(geometry: &Value) -> Result<Self, BoundaryError> {
        if geometry.is_null() {
            return Err(BoundaryError::MissingGeometry);
        }
        let coordinates = match geometry.get("coordinates") {
            None | Some(Value::Null) => return Err(BoundaryError::MissingCoordinates),
            Some(Value::Array(items)) if items.is_empty() => {
                return Err(BoundaryError::MissingCoordinates)
            }
            Some(c) => c.clone(),
        };

        let kind = geometry
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("geometry has no type"))?;

        let decode_err = |e: serde_json::Error| invalid(format!("{} coordinates: {}", kind, e));
        match kind {
            "Point" => Ok(BoundaryGeometry::Point(
                serde_json::from_value(coordinates).map_err(decode_err)?,
            )),
            "Polygon" => Ok(BoundaryGeometry::Polygon(
                serde_json::from_value(coordinates).map_err(decode_err)?,
            )),
            "MultiPolygon" => Ok(BoundaryGeometry::MultiPolygon(
                serde_json::from_value(coordinates).map_err(decode_err)?,
            )),
            other => Err(invalid(format!("unsupported boundary geometry type {}", other))),
        }
    }

    /// Every (lon, lat) position across all rings and polygons.
    pub fn positions(&self) -> Result<Vec<Coord<f64>>, BoundaryError> {
        match self {
            BoundaryGeometry::Point(p) => Ok(vec![boundary_coord(p)?]),
            BoundaryGeometry::Polygon(rings) => rings_positions(rings),
            BoundaryGeometry::MultiPolygon(polygons) => {
                let mut all = Vec::new();
                for rings in polygons {
                    all.extend(rings_positions(rings)?);
                }
                Ok(all)
            }
        }
    }
}

impl TryFrom<&geojson::Geometry> for BoundaryGeometry {
    type Error = BoundaryError;

    fn try_from(geometry: &geojson::Geometry) -> Result<Self, Self::Error> {
        match &geometry.value {
            geojson::Value::Point(p) => Ok(BoundaryGeometry::Point(p.clone())),
            geojson::Value::Polygon(rings) => Ok(BoundaryGeometry::Polygon(rings.clone())),
            geojson::Value::MultiPolygon(polygons) => {
                Ok(BoundaryGeometry::MultiPolygon(polygons.clone()))
            }
            other => Err(invalid(format!(
                "unsupported boundary geometry type {}",
                value_type_name(other)
            ))),
        }
    }
}

fn invalid(msg: impl Into<String>) -> BoundaryError {
    BoundaryError::Geometry(GeometryError::InvalidGeometry(msg.into()))
}

/// Boundary positions may carry elevation; only (lon, lat) is kept.
fn boundary_coord(position: &[f64]) -> Result<Coord<f64>, BoundaryError> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        [_, _, ..] => Err(invalid("position contains non-finite values")),
        _ => Err(invalid(format!(
            "position must have at least 2 values, found {}",
            position.len()
        ))),
    }
}

fn rings_positions(rings: &[Vec<Vec<f64>>]) -> Result<Vec<Coord<f64>>, BoundaryError> {
    rings
        .iter()
        .flatten()
        .map(|p| boundary_coord(p))
        .collect()
}

/// Bounding box of a boundary feature (a GeoJSON Feature object).
pub fn bounding_box_of_feature(feature: &Value) -> Result<BoundingBox, BoundaryError> {
    let geometry = feature.get("geometry").unwrap_or(&Value::Null);
    let positions = BoundaryGeometry::from_json(geometry)?.positions()?;
    bounding_box_of_positions(&positions)
}

/// Min/max over a set of (lon, lat) positions.
pub fn bounding_box_of_positions(positions: &[Coord<f64>]) -> Result<BoundingBox, BoundaryError> {
    let (first, rest) = positions
        .split_first()
        .ok_or(BoundaryError::EmptyCoordinates)?;

    let init = BoundingBox {
        min_lat: first.y,
        min_lon: first.x,
        max_lat: first.y,
        max_lon: first.x,
    };
    Ok(rest.iter().fold(init, |b, c| BoundingBox {
        min_lat: b.min_lat.min(c.y),
        min_lon: b.min_lon.min(c.x),
        max_lat: b.max_lat.max(c.y),
        max_lon: b.max_lon.max(c.x),
    }))
}

/// Resolves the configured boundary feature through the feature service.
#[derive(Clone)]
pub struct BoundaryResolver {
    client: FeatureServiceClient,
}

impl BoundaryResolver {
    pub fn new(client: FeatureServiceClient) -> Self {
        Self { client }
    }

    /// Fetch the boundary feature and compute its bounding box.
    pub async fn resolve_bounding_box(
        &self,
        collection_id: &str,
        feature_id: &str,
    ) -> Result<BoundingBox, BoundaryError> {
        let feature = self.client.get_feature(collection_id, feature_id).await?;
        let bbox = bounding_box_of_feature(&feature)?;

        tracing::info!(
            collection = collection_id,
            feature = feature_id,
            min_lat = bbox.min_lat,
            min_lon = bbox.min_lon,
            max_lat = bbox.max_lat,
            max_lon = bbox.max_lon,
            "Boundary resolved"
        );
        Ok(bbox)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_polygon_example() {
        let feature = json!({
            "type": "Feature",
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[14.0, 35.0], [14.1, 35.0], [14.1, 35.1], [14.0, 35.0]]]
            }
        });
        let bbox = bounding_box_of_feature(&feature).unwrap();
        assert_eq!(bbox.as_tuple(), (35.0, 14.0, 35.1, 14.1));
    }

    #[test]
    fn test_multipolygon_spans_all_parts() {
        let feature = json!({
            "geometry": {
                "type": "MultiPolygon",
                "coordinates": [
                    [[[14.0, 35.0], [14.1, 35.0], [14.1, 35.1], [14.0, 35.0]]],
                    [[[14.5, 36.0], [14.6, 36.0], [14.6, 36.2, 12.5], [14.5, 36.0]]]
                ]
            }
        });
        let bbox = bounding_box_of_feature(&feature).unwrap();
        assert_eq!(bbox.as_tuple(), (35.0, 14.0, 36.2, 14.6));
    }

    #[test]
    fn test_point_is_degenerate_box() {
        let feature = json!({"geometry": {"type": "Point", "coordinates": [14.5, 35.9]}});
        let bbox = bounding_box_of_feature(&feature).unwrap();
        assert_eq!(bbox.as_tuple(), (35.9, 14.5, 35.9, 14.5));
    }

    #[test]
    fn test_missing_geometry() {
        assert!(matches!(
            bounding_box_of_feature(&json!({"type": "Feature"})),
            Err(BoundaryError::MissingGeometry)
        ));
        assert!(matches!(
            bounding_box_of_feature(&json!({"geometry": null})),
            Err(BoundaryError::MissingGeometry)
        ));
    }

    #[test]
    fn test_missing_coordinates() {
        for geometry in [
            json!({"type": "Polygon"}),
            json!({"type": "Polygon", "coordinates": null}),
            json!({"type": "Polygon", "coordinates": []}),
        ] {
            assert!(matches!(
                bounding_box_of_feature(&json!({ "geometry": geometry })),
                Err(BoundaryError::MissingCoordinates)
            ));
        }
    }

    #[test]
    fn test_empty_rings() {
        let feature = json!({"geometry": {"type": "Polygon", "coordinates": [[]]}});
        assert!(matches!(
            bounding_box_of_feature(&feature),
            Err(BoundaryError::EmptyCoordinates)
        ));
    }

    #[test]
    fn test_malformed_and_unsupported() {
        let malformed = json!({"geometry": {"type": "Polygon", "coordinates": [["x"]]}});
        assert!(matches!(
            bounding_box_of_feature(&malformed),
            Err(BoundaryError::Geometry(_))
        ));

        let line = json!({"geometry": {"type": "LineString", "coordinates": [[0.0, 0.0]]}});
        assert!(matches!(
            bounding_box_of_feature(&line),
            Err(BoundaryError::Geometry(_))
        ));

        let short = json!({"geometry": {"type": "Point", "coordinates": [1.0]}});
        assert!(matches!(
            bounding_box_of_feature(&short),
            Err(BoundaryError::Geometry(_))
        ));
    }

    #[test]
    fn test_from_geojson_geometry() {
        let geometry = geojson::Geometry::new(geojson::Value::Polygon(vec![vec![
            vec![1.0, 2.0],
            vec![3.0, 2.0],
            vec![3.0, 4.0],
            vec![1.0, 2.0],
        ]]));
        let positions = BoundaryGeometry::try_from(&geometry)
            .unwrap()
            .positions()
            .unwrap();
        let bbox = bounding_box_of_positions(&positions).unwrap();
        assert_eq!(bbox.as_tuple(), (2.0, 1.0, 4.0, 3.0));
    }
}
