// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! PostGIS integration tests.
//!
//! These tests require a PostgreSQL database with the PostGIS extension
//! available, named by TEST_DATABASE_URL. The tables are truncated first, so
//! everything runs inside one test to keep the sections from racing.

use facility_sync::cache::{CacheKey, ResponseCache};
use facility_sync::models::{AmenityCategory, AmenityUpdate, Building, BuildingUpdate};
use geo::Point;
use std::time::Duration;

mod common;
use common::{amenity, building, square, test_db};

#[tokio::test]
async fn test_postgis_store() {
    require_postgis!();

    let db = test_db().await;

    // ═══ Bulk load ═══

    let inserted = db
        .load_buildings(&[
            building(100, square(14.0, 35.0, 0.0001)),
            building(200, square(14.01, 35.0, 0.0001)),
            building(100, square(15.0, 36.0, 0.0001)),
        ])
        .await
        .unwrap();
    assert_eq!(inserted, 2, "duplicate osm_id in one batch is inserted once");

    let inserted = db
        .load_amenities(&[
            amenity(9, "cafe", 14.00003, 35.00003),
            amenity(4, "bank", 14.00007, 35.00007),
            amenity(7, "pub", 14.0002, 35.00005),
        ])
        .await
        .unwrap();
    assert_eq!(inserted, 3);

    let again = db
        .load_amenities(&[amenity(9, "library", 14.5, 35.5)])
        .await
        .unwrap();
    assert_eq!(again, 0, "existing osm_id is skipped");
    let cafe = db
        .get_amenities()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.osm_id == 9)
        .unwrap();
    assert_eq!(cafe.category, AmenityCategory::FoodAndDrink);
    assert_eq!(cafe.geometry, Point::new(14.00003, 35.00003));

    // ═══ Batch assignment ═══

    let updated = db.assign_closest_amenities(5.0).await.unwrap();
    assert_eq!(updated, 1);
    let buildings = db.get_buildings().await.unwrap();
    let by_osm = |all: &[Building], osm_id: i64| all.iter().find(|b| b.osm_id == osm_id).cloned();
    let b100 = by_osm(&buildings, 100).unwrap();
    assert_eq!(b100.amenity.as_ref().map(|a| a.osm_id), Some(4));
    assert!(by_osm(&buildings, 200).unwrap().amenity_id.is_none());

    assert_eq!(db.assign_closest_amenities(5.0).await.unwrap(), 0);
    let cafe_in_b100 = db
        .get_amenities()
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.osm_id == 9)
        .unwrap();
    assert!(!db
        .fill_building_amenity(b100.id, cafe_in_b100.id)
        .await
        .unwrap());

    // ═══ Spatial queries ═══

    let contained = db.find_contained_amenity(b100.id).await.unwrap().unwrap();
    assert_eq!(contained.osm_id, 4);

    let closest = db
        .closest_amenity(b100.id, AmenityCategory::FoodAndDrink, 5000.0)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closest.amenity.osm_id, 9);
    assert_eq!(closest.distance_meters, 0.0);

    let nearby = db
        .amenities_within_radius(Point::new(14.0002, 35.00005), 1.0)
        .await
        .unwrap();
    assert_eq!(nearby.len(), 1);
    assert_eq!(nearby[0].osm_id, 7);

    // ═══ Updates ═══

    let update = AmenityUpdate {
        amenity_type: Some("pharmacy".to_string()),
        updated_by: Some("integration".to_string()),
        ..Default::default()
    };
    let updated = db.update_amenity(cafe.id, &update).await.unwrap().unwrap();
    assert_eq!(updated.category, AmenityCategory::OtherAmenities);
    assert_eq!(updated.name, cafe.name);
    assert!(updated.updated_at >= cafe.updated_at);

    let update = BuildingUpdate {
        requires_maintenance: Some(true),
        ..Default::default()
    };
    let updated = db.update_building(b100.id, &update).await.unwrap().unwrap();
    assert!(updated.requires_maintenance);
    assert_eq!(updated.amenity_id, b100.amenity_id);

    // ═══ Deletes ═══

    let assigned = b100.amenity_id.unwrap();
    assert!(db.delete_amenity(assigned).await.unwrap());
    let b100 = db.get_building(b100.id).await.unwrap().unwrap();
    assert!(b100.amenity_id.is_none());
    assert!(!db.delete_amenity(assigned).await.unwrap());

    assert!(db.delete_building(b100.id).await.unwrap());
    assert_eq!(db.get_buildings().await.unwrap().len(), 1);
    assert_eq!(db.get_amenities().await.unwrap().len(), 2);

    // ═══ Response cache ═══

    let pool = db.pg_pool().unwrap().clone();
    let cache = ResponseCache::postgres(pool.clone(), Duration::from_secs(60));
    cache.invalidate(&[CacheKey::Amenities]).await;
    assert_eq!(cache.get::<Vec<String>>(CacheKey::Amenities).await, None);

    cache
        .put(CacheKey::Amenities, &vec!["a".to_string(), "b".to_string()])
        .await;
    assert_eq!(
        cache.get::<Vec<String>>(CacheKey::Amenities).await,
        Some(vec!["a".to_string(), "b".to_string()])
    );
    cache.invalidate(&[CacheKey::Amenities]).await;
    assert_eq!(cache.get::<Vec<String>>(CacheKey::Amenities).await, None);

    let loaded: Vec<String> = cache
        .get_or_load(CacheKey::Buildings, || async {
            cache.invalidate(&[CacheKey::Buildings]).await;
            Ok(vec!["stale".to_string()])
        })
        .await
        .unwrap();
    assert_eq!(loaded, vec!["stale".to_string()]);
    assert_eq!(cache.get::<Vec<String>>(CacheKey::Buildings).await, None);

    let expired = ResponseCache::postgres(pool, Duration::ZERO);
    expired.put(CacheKey::Buildings, &vec![1, 2, 3]).await;
    assert_eq!(expired.get::<Vec<i32>>(CacheKey::Buildings).await, None);
}
