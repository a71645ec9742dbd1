// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility service behavior: idempotent loads and cached list freshness.

use facility_sync::cache::CacheKey;
use facility_sync::models::{Amenity, AmenityUpdate, NewBuilding};
use serde_json::json;

mod common;

fn tagged_building(osm_id: i64, lon: f64, tags: serde_json::Value) -> NewBuilding {
    NewBuilding {
        osm_id,
        information: tags.as_object().cloned().unwrap_or_default(),
        geometry: common::square(lon, 35.0, 0.0001),
    }
}

#[tokio::test]
async fn test_reloading_building_keeps_first_version() {
    let (_, state) = common::create_test_app();

    let inserted = state
        .facilities
        .load_buildings(&[tagged_building(100, 14.0, json!({ "x": 1 }))])
        .await
        .unwrap();
    assert_eq!(inserted, 1);

    let inserted = state
        .facilities
        .load_buildings(&[tagged_building(100, 15.0, json!({ "x": 2 }))])
        .await
        .unwrap();
    assert_eq!(inserted, 0);

    let buildings = state.facilities.get_buildings().await.unwrap();
    assert_eq!(buildings.len(), 1);
    assert_eq!(buildings[0].osm_id, 100);
    assert_eq!(buildings[0].information.get("x"), Some(&json!(1)));
    assert_eq!(buildings[0].geometry, common::square(14.0, 35.0, 0.0001));
}

#[tokio::test]
async fn test_update_during_list_load_is_not_cached_stale() {
    let (_, state) = common::create_test_app();
    state
        .facilities
        .load_amenities(&[common::amenity(1, "cafe", 14.0, 35.0)])
        .await
        .unwrap();
    let id = state.facilities.get_amenities().await.unwrap()[0].id;
    state
        .facilities
        .cache()
        .invalidate(&[CacheKey::Amenities])
        .await;

    // The update lands between the store read and the cache write.
    let update = AmenityUpdate {
        name: Some("renamed".to_string()),
        ..Default::default()
    };
    let loaded: Vec<Amenity> = state
        .facilities
        .cache()
        .get_or_load(CacheKey::Amenities, || async {
            let stale = state.facilities.db().get_amenities().await?;
            state.facilities.update_amenity(id, &update).await?;
            Ok(stale)
        })
        .await
        .unwrap();
    assert_eq!(loaded[0].name.as_deref(), Some("Amenity 1"));

    let amenities = state.facilities.get_amenities().await.unwrap();
    assert_eq!(amenities[0].name.as_deref(), Some("renamed"));
}
