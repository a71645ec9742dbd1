// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use facility_sync::config::Config;
use facility_sync::db::FacilityDb;
use facility_sync::models::{NewAmenity, NewBuilding};
use facility_sync::routes::create_router;
use facility_sync::AppState;
use geo::{LineString, Point, Polygon};
use std::sync::Arc;

/// PostGIS connection string for integration tests, if configured.
#[allow(dead_code)]
pub fn postgis_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL").ok()
}

/// Skip test with message if no PostGIS database is configured.
#[macro_export]
macro_rules! require_postgis {
    () => {
        if crate::common::postgis_url().is_none() {
            eprintln!("⚠️  Skipping: TEST_DATABASE_URL not set");
            return;
        }
    };
}

/// Connect to the test PostGIS database and clear its tables.
#[allow(dead_code)]
pub async fn test_db() -> FacilityDb {
    let url = postgis_url().expect("TEST_DATABASE_URL not set");
    let db = FacilityDb::connect(&url)
        .await
        .expect("Failed to connect to PostGIS");
    let pool = db.pg_pool().expect("PostGIS backend has a pool");
    sqlx::query("TRUNCATE buildings, amenities, query_cache")
        .execute(pool)
        .await
        .expect("Failed to truncate test tables");
    db
}

/// Create a test app over the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (axum::Router, Arc<AppState>) {
    let state =
        Arc::new(AppState::build(config, FacilityDb::new_memory()).expect("Failed to build state"));
    (create_router(state.clone()), state)
}

/// Axis-aligned square footprint with its south-west corner at (lon, lat).
#[allow(dead_code)]
pub fn square(lon: f64, lat: f64, size: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![
            (lon, lat),
            (lon + size, lat),
            (lon + size, lat + size),
            (lon, lat + size),
            (lon, lat),
        ]),
        vec![],
    )
}

#[allow(dead_code)]
pub fn building(osm_id: i64, polygon: Polygon<f64>) -> NewBuilding {
    let information = serde_json::json!({ "building": "yes" })
        .as_object()
        .cloned()
        .unwrap_or_default();
    NewBuilding {
        osm_id,
        information,
        geometry: polygon,
    }
}

#[allow(dead_code)]
pub fn amenity(osm_id: i64, amenity_type: &str, lon: f64, lat: f64) -> NewAmenity {
    NewAmenity::new(
        osm_id,
        Some(format!("Amenity {}", osm_id)),
        Some(amenity_type.to_string()),
        None,
        None,
        Point::new(lon, lat),
    )
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
