// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geometry codec between portable GeoJSON and the stored SRID 4326 form.
//!
//! The store only ever holds two shapes: building footprints (Polygon) and
//! amenity locations (Point). Anything else is rejected up front rather than
//! coerced, so a malformed ring can never reach the spatial index.

use geo::{Closest, ClosestPoint, Contains, Coord, Distance, Haversine, Intersects, LineString};
use geo::{Point, Polygon};
use serde::{Deserialize, Serialize};

/// WGS-84, used for every stored geometry.
pub const SRID_WGS84: i32 = 4326;

/// Errors from geometry conversion.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),
}

impl GeometryError {
    fn invalid(msg: impl Into<String>) -> Self {
        GeometryError::InvalidGeometry(msg.into())
    }
}

/// The shapes the facility store accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Point(Point<f64>),
    Polygon(Polygon<f64>),
}

/// Geometry in storage form: a validated shape tagged with its SRID.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageGeometry {
    srid: i32,
    shape: Shape,
}

impl StorageGeometry {
    pub fn point(point: Point<f64>) -> Self {
        Self {
            srid: SRID_WGS84,
            shape: Shape::Point(point),
        }
    }

    pub fn polygon(polygon: Polygon<f64>) -> Self {
        Self {
            srid: SRID_WGS84,
            shape: Shape::Polygon(polygon),
        }
    }

    pub fn srid(&self) -> i32 {
        self.srid
    }

    pub fn into_point(self) -> Result<Point<f64>, GeometryError> {
        match self.shape {
            Shape::Point(p) => Ok(p),
            Shape::Polygon(_) => Err(GeometryError::invalid("expected Point, found Polygon")),
        }
    }

    pub fn into_polygon(self) -> Result<Polygon<f64>, GeometryError> {
        match self.shape {
            Shape::Polygon(p) => Ok(p),
            Shape::Point(_) => Err(GeometryError::invalid("expected Polygon, found Point")),
        }
    }

    /// GeoJSON text as bound into `ST_GeomFromGeoJSON`.
    pub fn to_geojson_string(&self) -> String {
        to_portable(self).to_string()
    }
}

/// Convert a GeoJSON geometry into storage form (SRID 4326).
///
/// Only 2D Point and Polygon geometries are accepted. Polygon rings must be
/// closed and carry at least four positions.
pub fn to_storage(geometry: &geojson::Geometry) -> Result<StorageGeometry, GeometryError> {
    match &geometry.value {
        geojson::Value::Point(position) => {
            Ok(StorageGeometry::point(Point::from(position_to_coord(position)?)))
        }
        geojson::Value::Polygon(rings) => Ok(StorageGeometry::polygon(rings_to_polygon(rings)?)),
        other => Err(GeometryError::invalid(format!(
            "unsupported geometry type {}",
            value_type_name(other)
        ))),
    }
}

/// Parse GeoJSON geometry text and convert it into storage form.
pub fn parse_geometry(text: &str) -> Result<StorageGeometry, GeometryError> {
    let geometry: geojson::Geometry =
        serde_json::from_str(text).map_err(|e| GeometryError::invalid(e.to_string()))?;
    to_storage(&geometry)
}

/// Convert a stored geometry back into GeoJSON, positions in (lon, lat) order.
pub fn to_portable(geometry: &StorageGeometry) -> geojson::Geometry {
    let value = match &geometry.shape {
        Shape::Point(p) => geojson::Value::from(p),
        Shape::Polygon(p) => geojson::Value::from(p),
    };
    geojson::Geometry::new(value)
}

pub(crate) fn value_type_name(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Validate a single GeoJSON position as a finite (lon, lat) pair.
pub(crate) fn position_to_coord(position: &[f64]) -> Result<Coord<f64>, GeometryError> {
    let [x, y] = position else {
        return Err(GeometryError::invalid(format!(
            "position must have exactly 2 values, found {}",
            position.len()
        )));
    };
    if !x.is_finite() || !y.is_finite() {
        return Err(GeometryError::invalid("position contains non-finite values"));
    }
    Ok(Coord { x: *x, y: *y })
}

fn ring_to_line_string(ring: &[Vec<f64>]) -> Result<LineString<f64>, GeometryError> {
    if ring.len() < 4 {
        return Err(GeometryError::invalid(format!(
            "ring must have at least 4 positions, found {}",
            ring.len()
        )));
    }
    let coords = ring
        .iter()
        .map(|p| position_to_coord(p))
        .collect::<Result<Vec<_>, _>>()?;
    if coords.first() != coords.last() {
        return Err(GeometryError::invalid("ring is not closed"));
    }
    Ok(LineString::from(coords))
}

fn rings_to_polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, GeometryError> {
    let (exterior, interiors) = rings
        .split_first()
        .ok_or_else(|| GeometryError::invalid("polygon has no exterior ring"))?;
    let exterior = ring_to_line_string(exterior)?;
    let interiors = interiors
        .iter()
        .map(|r| ring_to_line_string(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Geodesic distance in meters from a polygon to a point.
///
/// Zero when the point lies inside or on the polygon, otherwise the Haversine
/// distance to the closest point of the polygon boundary.
pub fn polygon_point_distance(polygon: &Polygon<f64>, point: &Point<f64>) -> f64 {
    if polygon.intersects(point) {
        return 0.0;
    }
    match polygon.closest_point(point) {
        Closest::Intersection(p) | Closest::SinglePoint(p) => Haversine.distance(p, *point),
        Closest::Indeterminate => f64::INFINITY,
    }
}

/// Geodesic distance in meters between two points.
pub fn point_distance(a: &Point<f64>, b: &Point<f64>) -> f64 {
    Haversine.distance(*a, *b)
}

/// Strict containment: points on the boundary are not contained.
pub fn polygon_contains(polygon: &Polygon<f64>, point: &Point<f64>) -> bool {
    polygon.contains(point)
}
