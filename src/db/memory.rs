// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process facility store.
//!
//! Mirrors the PostGIS backend's semantics with `geo` predicates and
//! Haversine distances. A single `RwLock` serializes writers, so every
//! mutation (including a whole assignment pass) is atomic to readers.

use crate::error::AppError;
use crate::models::assignment::{pick_nearest, select_nearest, Candidate};
use crate::models::geometry::{point_distance, polygon_contains, polygon_point_distance};
use crate::models::{
    Amenity, AmenityCategory, AmenityUpdate, Building, BuildingUpdate, ClosestAmenity, NewAmenity,
    NewBuilding,
};
use chrono::Utc;
use geo::{BoundingRect, Point, Rect};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Meters per degree of latitude, rounded down so the envelope never undershoots.
const METERS_PER_DEGREE: f64 = 111_000.0;

#[derive(Default)]
struct State {
    buildings: HashMap<Uuid, Building>,
    amenities: HashMap<Uuid, Amenity>,
    building_osm_ids: BTreeMap<i64, Uuid>,
    amenity_osm_ids: BTreeMap<i64, Uuid>,
}

impl State {
    fn with_amenity(&self, building: &Building) -> Building {
        let mut building = building.clone();
        building.amenity = building
            .amenity_id
            .and_then(|id| self.amenities.get(&id))
            .cloned();
        building
    }

    fn candidates_for<'a>(
        &'a self,
        building: &'a Building,
        radius_meters: f64,
    ) -> impl Iterator<Item = (Candidate, &'a Amenity)> + 'a {
        let envelope = building
            .geometry
            .bounding_rect()
            .map(|rect| expand(rect, radius_meters));

        self.amenities.values().filter_map(move |amenity| {
            if let Some(envelope) = envelope {
                if !rect_contains(&envelope, &amenity.geometry) {
                    return None;
                }
            }
            let distance = polygon_point_distance(&building.geometry, &amenity.geometry);
            (distance <= radius_meters).then_some((
                Candidate {
                    building_id: building.id,
                    amenity_id: amenity.id,
                    amenity_osm_id: amenity.osm_id,
                    distance_meters: distance,
                },
                amenity,
            ))
        })
    }
}

/// Grow a lon/lat rectangle by at least `radius_meters` on every side.
fn expand(rect: Rect<f64>, radius_meters: f64) -> Rect<f64> {
    let dlat = radius_meters / METERS_PER_DEGREE;
    let max_abs_lat = rect.min().y.abs().max(rect.max().y.abs()).min(89.0);
    let dlon = radius_meters / (METERS_PER_DEGREE * max_abs_lat.to_radians().cos());
    Rect::new(
        (rect.min().x - dlon, rect.min().y - dlat),
        (rect.max().x + dlon, rect.max().y + dlat),
    )
}

fn rect_contains(rect: &Rect<f64>, point: &Point<f64>) -> bool {
    point.x() >= rect.min().x
        && point.x() <= rect.max().x
        && point.y() >= rect.min().y
        && point.y() <= rect.max().y
}

fn by_osm_id<T>(index: &BTreeMap<i64, Uuid>, records: &HashMap<Uuid, T>) -> Vec<T>
where
    T: Clone,
{
    index
        .values()
        .filter_map(|id| records.get(id))
        .cloned()
        .collect()
}

/// In-process facility store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_buildings(&self, buildings: &[NewBuilding]) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut inserted = 0;

        for new in buildings {
            if state.building_osm_ids.contains_key(&new.osm_id) {
                continue;
            }
            let building = Building {
                id: Uuid::new_v4(),
                osm_id: new.osm_id,
                information: new.information.clone(),
                geometry: new.geometry.clone(),
                requires_maintenance: false,
                amenity_id: None,
                amenity: None,
                updated_at: now,
                updated_by: None,
            };
            state.building_osm_ids.insert(building.osm_id, building.id);
            state.buildings.insert(building.id, building);
            inserted += 1;
        }

        Ok(inserted)
    }

    pub async fn load_amenities(&self, amenities: &[NewAmenity]) -> Result<u64, AppError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let mut inserted = 0;

        for new in amenities {
            if state.amenity_osm_ids.contains_key(&new.osm_id) {
                continue;
            }
            let amenity = Amenity {
                id: Uuid::new_v4(),
                osm_id: new.osm_id,
                name: new.name.clone(),
                amenity_type: new.amenity_type.clone(),
                category: new.category,
                address: new.address.clone(),
                opening_hours: new.opening_hours.clone(),
                geometry: new.geometry,
                updated_at: now,
                updated_by: None,
            };
            state.amenity_osm_ids.insert(amenity.osm_id, amenity.id);
            state.amenities.insert(amenity.id, amenity);
            inserted += 1;
        }

        Ok(inserted)
    }

    pub async fn get_buildings(&self) -> Result<Vec<Building>, AppError> {
        let state = self.state.read().await;
        Ok(by_osm_id(&state.building_osm_ids, &state.buildings)
            .iter()
            .map(|b| state.with_amenity(b))
            .collect())
    }

    pub async fn get_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        let state = self.state.read().await;
        Ok(by_osm_id(&state.amenity_osm_ids, &state.amenities))
    }

    pub async fn get_building(&self, id: Uuid) -> Result<Option<Building>, AppError> {
        let state = self.state.read().await;
        Ok(state.buildings.get(&id).map(|b| state.with_amenity(b)))
    }

    pub async fn get_amenity(&self, id: Uuid) -> Result<Option<Amenity>, AppError> {
        Ok(self.state.read().await.amenities.get(&id).cloned())
    }

    pub async fn update_building(
        &self,
        id: Uuid,
        update: &BuildingUpdate,
    ) -> Result<Option<Building>, AppError> {
        let mut state = self.state.write().await;
        let Some(building) = state.buildings.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(information) = &update.information {
            building.information = information.clone();
        }
        if let Some(requires_maintenance) = update.requires_maintenance {
            building.requires_maintenance = requires_maintenance;
        }
        if let Some(updated_by) = &update.updated_by {
            building.updated_by = Some(updated_by.clone());
        }
        building.updated_at = Utc::now();

        let building = building.clone();
        Ok(Some(state.with_amenity(&building)))
    }

    pub async fn update_amenity(
        &self,
        id: Uuid,
        update: &AmenityUpdate,
    ) -> Result<Option<Amenity>, AppError> {
        let mut state = self.state.write().await;
        let Some(amenity) = state.amenities.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            amenity.name = Some(name.clone());
        }
        if let Some(amenity_type) = &update.amenity_type {
            amenity.amenity_type = Some(amenity_type.clone());
        }
        if let Some(category) = update.category() {
            amenity.category = category;
        }
        if let Some(address) = &update.address {
            amenity.address = Some(address.clone());
        }
        if let Some(opening_hours) = &update.opening_hours {
            amenity.opening_hours = Some(opening_hours.clone());
        }
        if let Some(updated_by) = &update.updated_by {
            amenity.updated_by = Some(updated_by.clone());
        }
        amenity.updated_at = Utc::now();

        Ok(Some(amenity.clone()))
    }

    pub async fn delete_building(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let Some(building) = state.buildings.remove(&id) else {
            return Ok(false);
        };
        state.building_osm_ids.remove(&building.osm_id);
        Ok(true)
    }

    pub async fn delete_amenity(&self, id: Uuid) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let Some(amenity) = state.amenities.remove(&id) else {
            return Ok(false);
        };
        state.amenity_osm_ids.remove(&amenity.osm_id);

        for building in state.buildings.values_mut() {
            if building.amenity_id == Some(id) {
                building.amenity_id = None;
            }
        }
        Ok(true)
    }

    pub async fn find_contained_amenity(
        &self,
        building_id: Uuid,
    ) -> Result<Option<Amenity>, AppError> {
        let state = self.state.read().await;
        let Some(building) = state.buildings.get(&building_id) else {
            return Ok(None);
        };

        Ok(state
            .amenities
            .values()
            .filter(|a| polygon_contains(&building.geometry, &a.geometry))
            .min_by(|a, b| a.osm_id.cmp(&b.osm_id).then(a.id.cmp(&b.id)))
            .cloned())
    }

    pub async fn amenities_within_radius(
        &self,
        point: Point<f64>,
        radius_meters: f64,
    ) -> Result<Vec<Amenity>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .amenities
            .values()
            .filter(|a| point_distance(&point, &a.geometry) <= radius_meters)
            .cloned()
            .collect())
    }

    pub async fn set_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if !state.amenities.contains_key(&amenity_id) {
            return Ok(false);
        }
        match state.buildings.get_mut(&building_id) {
            Some(building) => {
                building.amenity_id = Some(amenity_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn fill_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        if !state.amenities.contains_key(&amenity_id) {
            return Ok(false);
        }
        match state.buildings.get_mut(&building_id) {
            Some(building) if building.amenity_id.is_none() => {
                building.amenity_id = Some(amenity_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub async fn assign_closest_amenities(&self, radius_meters: f64) -> Result<u64, AppError> {
        let mut state = self.state.write().await;

        let candidates: Vec<Candidate> = {
            let view: &State = &state;
            view.buildings
                .values()
                .flat_map(|b| view.candidates_for(b, radius_meters).map(|(c, _)| c))
                .collect()
        };
        let winners = select_nearest(candidates);

        let mut updated = 0;
        for (building_id, winner) in winners {
            if let Some(building) = state.buildings.get_mut(&building_id) {
                if building.amenity_id != Some(winner.amenity_id) {
                    building.amenity_id = Some(winner.amenity_id);
                    updated += 1;
                }
            }
        }

        Ok(updated)
    }

    pub async fn closest_amenity(
        &self,
        building_id: Uuid,
        category: AmenityCategory,
        radius_meters: f64,
    ) -> Result<Option<ClosestAmenity>, AppError> {
        let state = self.state.read().await;
        let Some(building) = state.buildings.get(&building_id) else {
            return Ok(None);
        };

        let in_category: Vec<(Candidate, &Amenity)> = state
            .candidates_for(building, radius_meters)
            .filter(|(_, a)| a.category == category)
            .collect();

        let Some(best) = pick_nearest(in_category.iter().map(|(c, _)| *c)) else {
            return Ok(None);
        };

        Ok(in_category
            .into_iter()
            .find(|(c, _)| c.amenity_id == best.amenity_id)
            .map(|(c, amenity)| ClosestAmenity {
                amenity: amenity.clone(),
                distance_meters: c.distance_meters,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Polygon;

    fn square(lon: f64, lat: f64, size: f64) -> Polygon<f64> {
        Polygon::new(
            geo::LineString::from(vec![
                (lon, lat),
                (lon + size, lat),
                (lon + size, lat + size),
                (lon, lat + size),
                (lon, lat),
            ]),
            vec![],
        )
    }

    fn new_building(osm_id: i64, polygon: Polygon<f64>) -> NewBuilding {
        NewBuilding {
            osm_id,
            information: serde_json::Map::new(),
            geometry: polygon,
        }
    }

    fn new_amenity(osm_id: i64, amenity_type: &str, lon: f64, lat: f64) -> NewAmenity {
        NewAmenity::new(
            osm_id,
            Some(format!("amenity {}", osm_id)),
            Some(amenity_type.to_string()),
            None,
            None,
            Point::new(lon, lat),
        )
    }

    #[tokio::test]
    async fn test_load_is_idempotent_first_write_wins() {
        let store = MemoryStore::new();
        let first = new_amenity(1, "cafe", 14.0, 35.0);
        let mut second = new_amenity(1, "bank", 14.0, 35.0);
        second.name = Some("renamed".to_string());

        assert_eq!(store.load_amenities(&[first]).await.unwrap(), 1);
        assert_eq!(store.load_amenities(&[second]).await.unwrap(), 0);

        let all = store.get_amenities().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name.as_deref(), Some("amenity 1"));
        assert_eq!(all[0].category, AmenityCategory::FoodAndDrink);
    }

    #[tokio::test]
    async fn test_delete_amenity_clears_assignment() {
        let store = MemoryStore::new();
        store
            .load_buildings(&[new_building(10, square(14.0, 35.0, 0.0001))])
            .await
            .unwrap();
        store
            .load_amenities(&[new_amenity(1, "cafe", 14.00005, 35.00005)])
            .await
            .unwrap();

        assert_eq!(store.assign_closest_amenities(5.0).await.unwrap(), 1);
        let amenity = store.get_amenities().await.unwrap().remove(0);
        let building = store.get_buildings().await.unwrap().remove(0);
        assert_eq!(building.amenity_id, Some(amenity.id));
        assert_eq!(building.amenity.as_ref().map(|a| a.id), Some(amenity.id));

        assert!(store.delete_amenity(amenity.id).await.unwrap());
        let building = store.get_building(building.id).await.unwrap().unwrap();
        assert!(building.amenity_id.is_none());
        assert!(building.amenity.is_none());
    }

    #[tokio::test]
    async fn test_delete_building_keeps_amenity() {
        let store = MemoryStore::new();
        store
            .load_buildings(&[new_building(10, square(14.0, 35.0, 0.0001))])
            .await
            .unwrap();
        store
            .load_amenities(&[new_amenity(1, "cafe", 14.00005, 35.00005)])
            .await
            .unwrap();
        store.assign_closest_amenities(5.0).await.unwrap();

        let building = store.get_buildings().await.unwrap().remove(0);
        assert!(store.delete_building(building.id).await.unwrap());
        assert!(!store.delete_building(building.id).await.unwrap());
        assert_eq!(store.get_amenities().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_amenity_recomputes_category() {
        let store = MemoryStore::new();
        store
            .load_amenities(&[new_amenity(1, "cafe", 14.0, 35.0)])
            .await
            .unwrap();
        let id = store.get_amenities().await.unwrap()[0].id;

        let update = AmenityUpdate {
            amenity_type: Some("bank".to_string()),
            ..Default::default()
        };
        let updated = store.update_amenity(id, &update).await.unwrap().unwrap();
        assert_eq!(updated.amenity_type.as_deref(), Some("bank"));
        assert_eq!(updated.category, AmenityCategory::CommercialAndFinancial);
        assert_eq!(updated.name.as_deref(), Some("amenity 1"));

        assert!(store
            .update_amenity(Uuid::new_v4(), &update)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_contained_amenity_boundary_excluded() {
        let store = MemoryStore::new();
        store
            .load_buildings(&[new_building(10, square(14.0, 35.0, 0.001))])
            .await
            .unwrap();
        // On the western edge: not contained.
        store
            .load_amenities(&[new_amenity(1, "cafe", 14.0, 35.0005)])
            .await
            .unwrap();
        let building = store.get_buildings().await.unwrap().remove(0);
        assert!(store
            .find_contained_amenity(building.id)
            .await
            .unwrap()
            .is_none());

        store
            .load_amenities(&[
                new_amenity(3, "bank", 14.0007, 35.0007),
                new_amenity(2, "pub", 14.0003, 35.0003),
            ])
            .await
            .unwrap();
        let found = store
            .find_contained_amenity(building.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.osm_id, 2);
    }

    #[tokio::test]
    async fn test_set_building_amenity_requires_both() {
        let store = MemoryStore::new();
        store
            .load_buildings(&[new_building(10, square(14.0, 35.0, 0.001))])
            .await
            .unwrap();
        let building = store.get_buildings().await.unwrap().remove(0);
        assert!(!store
            .set_building_amenity(building.id, Uuid::new_v4())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fill_building_amenity_keeps_existing() {
        let store = MemoryStore::new();
        store
            .load_buildings(&[new_building(10, square(14.0, 35.0, 0.001))])
            .await
            .unwrap();
        store
            .load_amenities(&[
                new_amenity(1, "cafe", 14.0005, 35.0005),
                new_amenity(2, "bank", 14.0002, 35.0002),
            ])
            .await
            .unwrap();
        let building = store.get_buildings().await.unwrap().remove(0);
        let amenities = store.get_amenities().await.unwrap();
        let id_of = |osm_id: i64| amenities.iter().find(|a| a.osm_id == osm_id).unwrap().id;

        assert!(store.fill_building_amenity(building.id, id_of(1)).await.unwrap());
        assert!(!store.fill_building_amenity(building.id, id_of(2)).await.unwrap());

        let building = store.get_building(building.id).await.unwrap().unwrap();
        assert_eq!(building.amenity_id, Some(id_of(1)));
    }

    #[test]
    fn test_expand_covers_radius() {
        let rect = Rect::new((14.0, 35.0), (14.001, 35.001));
        let grown = expand(rect, 100.0);
        // A point 100 m due north of the top edge is inside the envelope.
        assert!(rect_contains(&grown, &Point::new(14.0005, 35.001 + 100.0 / 111_195.0)));
        assert!(!rect_contains(&grown, &Point::new(14.0005, 35.01)));
    }
}
