// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nearest-amenity assignment behavior over the in-memory store.

use facility_sync::error::AppError;
use facility_sync::models::geometry::polygon_point_distance;
use facility_sync::models::AmenityCategory;
use geo::Point;

mod common;

#[tokio::test]
async fn test_equidistant_amenities_resolve_by_osm_id() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    db.load_buildings(&[common::building(100, common::square(14.0, 35.0, 0.0001))])
        .await
        .unwrap();
    // Both inside the footprint: distance 0 for each.
    db.load_amenities(&[
        common::amenity(9, "cafe", 14.00003, 35.00003),
        common::amenity(4, "bank", 14.00007, 35.00007),
    ])
    .await
    .unwrap();

    let report = state.assignment.assign_closest_amenities().await.unwrap();
    assert_eq!(report.updated, 1);

    let building = db.get_buildings().await.unwrap().remove(0);
    assert_eq!(building.amenity.map(|a| a.osm_id), Some(4));

    // Same data, same winner: nothing rewritten.
    let report = state.assignment.assign_closest_amenities().await.unwrap();
    assert_eq!(report.updated, 0);
}

#[tokio::test]
async fn test_radius_bounds_assignment() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    db.load_buildings(&[
        common::building(100, common::square(14.0, 35.0, 0.0001)),
        common::building(200, common::square(14.01, 35.0, 0.0001)),
    ])
    .await
    .unwrap();
    // ~2.7 m east of building 100; building 200 is ~900 m away from everything.
    db.load_amenities(&[common::amenity(1, "pub", 14.00013, 35.00005)])
        .await
        .unwrap();

    let report = state.assignment.assign_within(1.0).await.unwrap();
    assert_eq!(report.updated, 0);

    let report = state.assignment.assign_within(5.0).await.unwrap();
    assert_eq!(report.updated, 1);

    let buildings = db.get_buildings().await.unwrap();
    let by_osm = |osm_id: i64| buildings.iter().find(|b| b.osm_id == osm_id).unwrap();
    assert!(by_osm(100).amenity_id.is_some());
    assert!(by_osm(200).amenity_id.is_none());

    // No candidate within the smaller radius: the assignment stays.
    assert_eq!(state.assignment.assign_within(1.0).await.unwrap().updated, 0);
    let b100 = db.get_buildings().await.unwrap().remove(0);
    assert_eq!(b100.amenity.map(|a| a.osm_id), Some(1));
}

#[tokio::test]
async fn test_radius_is_inclusive() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    let footprint = common::square(14.0, 35.0, 0.0001);
    let location = Point::new(14.00013, 35.00005);
    let exact = polygon_point_distance(&footprint, &location);

    db.load_buildings(&[common::building(100, footprint)])
        .await
        .unwrap();
    db.load_amenities(&[common::amenity(1, "pub", location.x(), location.y())])
        .await
        .unwrap();

    let just_short = exact * (1.0 - 1e-9);
    assert_eq!(state.assignment.assign_within(just_short).await.unwrap().updated, 0);
    assert_eq!(state.assignment.assign_within(exact).await.unwrap().updated, 1);
}

#[tokio::test]
async fn test_nearer_amenity_replaces_assignment() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    db.load_buildings(&[common::building(100, common::square(14.0, 35.0, 0.0001))])
        .await
        .unwrap();
    db.load_amenities(&[common::amenity(1, "pub", 14.00014, 35.00005)])
        .await
        .unwrap();
    state.assignment.assign_closest_amenities().await.unwrap();

    state
        .facilities
        .load_amenities(&[common::amenity(2, "cafe", 14.00005, 35.00005)])
        .await
        .unwrap();
    let report = state.assignment.assign_closest_amenities().await.unwrap();
    assert_eq!(report.updated, 1);

    let buildings = state.facilities.get_buildings().await.unwrap();
    assert_eq!(buildings[0].amenity.as_ref().map(|a| a.osm_id), Some(2));
}

#[tokio::test]
async fn test_invalid_radius_is_rejected() {
    let (_, state) = common::create_test_app();

    for radius in [-0.5, f64::NAN, f64::INFINITY] {
        assert!(matches!(
            state.assignment.assign_within(radius).await,
            Err(AppError::BadRequest(_))
        ));
    }
    assert_eq!(state.assignment.assign_within(0.0).await.unwrap().updated, 0);
}

#[tokio::test]
async fn test_building_amenity_prefers_existing_assignment() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    db.load_buildings(&[common::building(100, common::square(14.0, 35.0, 0.001))])
        .await
        .unwrap();
    db.load_amenities(&[common::amenity(5, "school", 14.0005, 35.0005)])
        .await
        .unwrap();
    let building_id = db.get_buildings().await.unwrap()[0].id;
    let school_id = db.get_amenities().await.unwrap()[0].id;
    assert!(db.set_building_amenity(building_id, school_id).await.unwrap());

    // A lower osm_id inside the footprint does not displace the assignment.
    db.load_amenities(&[common::amenity(1, "cafe", 14.0002, 35.0002)])
        .await
        .unwrap();
    let amenity = state
        .assignment
        .get_building_amenity(building_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(amenity.osm_id, 5);
}

#[tokio::test]
async fn test_building_amenity_unknown_building() {
    let (_, state) = common::create_test_app();
    assert!(state
        .assignment
        .get_building_amenity(uuid::Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_closest_amenity_tie_breaks_on_osm_id() {
    let (_, state) = common::create_test_app();
    let db = state.facilities.db();
    // Dyadic coordinates keep the mirrored distances bit-identical.
    db.load_buildings(&[common::building(100, common::square(14.0, 35.0, 0.0009765625))])
        .await
        .unwrap();
    db.load_amenities(&[
        common::amenity(30, "bar", 14.001220703125, 35.00048828125),
        common::amenity(20, "pub", 13.999755859375, 35.00048828125),
    ])
    .await
    .unwrap();
    let building_id = db.get_buildings().await.unwrap()[0].id;

    let closest = state
        .assignment
        .get_closest_amenity(building_id, AmenityCategory::FoodAndDrink)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(closest.amenity.osm_id, 20);
    assert!(closest.distance_meters > 0.0);
}
