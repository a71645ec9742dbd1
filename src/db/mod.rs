// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility store.
//!
//! Two backends share one interface: PostGIS for deployments and an
//! in-process store used when no database is configured (local runs and
//! tests). The store owns the lifecycle of every record; callers only see
//! plain value records and go through these operations for every mutation.

pub mod memory;
pub mod postgis;

pub use memory::MemoryStore;
pub use postgis::PostgisStore;

use crate::error::AppError;
use crate::models::{
    Amenity, AmenityCategory, AmenityUpdate, Building, BuildingUpdate, ClosestAmenity, NewAmenity,
    NewBuilding,
};
use geo::Point;
use uuid::Uuid;

/// Facility store client.
#[derive(Clone)]
pub enum FacilityDb {
    Postgis(PostgisStore),
    Memory(MemoryStore),
}

impl FacilityDb {
    /// Connect to PostGIS and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let store = PostgisStore::connect(database_url).await?;
        store.ensure_schema().await?;
        Ok(FacilityDb::Postgis(store))
    }

    /// Empty in-process store.
    pub fn new_memory() -> Self {
        FacilityDb::Memory(MemoryStore::new())
    }

    /// Connection pool, when backed by PostGIS.
    pub fn pg_pool(&self) -> Option<&sqlx::PgPool> {
        match self {
            FacilityDb::Postgis(s) => Some(s.pool()),
            FacilityDb::Memory(_) => None,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            FacilityDb::Postgis(_) => "postgis",
            FacilityDb::Memory(_) => "memory",
        }
    }

    // ─── Bulk Load ───────────────────────────────────────────────

    /// Insert buildings, skipping any whose `osm_id` already exists.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn load_buildings(&self, buildings: &[NewBuilding]) -> Result<u64, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.load_buildings(buildings).await,
            FacilityDb::Memory(s) => s.load_buildings(buildings).await,
        }
    }

    /// Insert amenities, skipping any whose `osm_id` already exists.
    pub async fn load_amenities(&self, amenities: &[NewAmenity]) -> Result<u64, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.load_amenities(amenities).await,
            FacilityDb::Memory(s) => s.load_amenities(amenities).await,
        }
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// All buildings, ordered by `osm_id`, with their assigned amenity joined.
    pub async fn get_buildings(&self) -> Result<Vec<Building>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.get_buildings().await,
            FacilityDb::Memory(s) => s.get_buildings().await,
        }
    }

    /// All amenities, ordered by `osm_id`.
    pub async fn get_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.get_amenities().await,
            FacilityDb::Memory(s) => s.get_amenities().await,
        }
    }

    pub async fn get_building(&self, id: Uuid) -> Result<Option<Building>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.get_building(id).await,
            FacilityDb::Memory(s) => s.get_building(id).await,
        }
    }

    pub async fn get_amenity(&self, id: Uuid) -> Result<Option<Amenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.get_amenity(id).await,
            FacilityDb::Memory(s) => s.get_amenity(id).await,
        }
    }

    // ─── Mutations ───────────────────────────────────────────────

    /// Apply a partial update. `updated_at` is always set to the current time.
    pub async fn update_building(
        &self,
        id: Uuid,
        update: &BuildingUpdate,
    ) -> Result<Option<Building>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.update_building(id, update).await,
            FacilityDb::Memory(s) => s.update_building(id, update).await,
        }
    }

    /// Apply a partial update, recomputing the category when `amenity_type` changes.
    pub async fn update_amenity(
        &self,
        id: Uuid,
        update: &AmenityUpdate,
    ) -> Result<Option<Amenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.update_amenity(id, update).await,
            FacilityDb::Memory(s) => s.update_amenity(id, update).await,
        }
    }

    /// Hard delete. The building's amenity is left untouched.
    pub async fn delete_building(&self, id: Uuid) -> Result<bool, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.delete_building(id).await,
            FacilityDb::Memory(s) => s.delete_building(id).await,
        }
    }

    /// Hard delete. Every building assigned to this amenity loses its assignment.
    pub async fn delete_amenity(&self, id: Uuid) -> Result<bool, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.delete_amenity(id).await,
            FacilityDb::Memory(s) => s.delete_amenity(id).await,
        }
    }

    // ─── Spatial Queries ─────────────────────────────────────────

    /// Amenity strictly inside the building footprint, lowest `osm_id` first.
    pub async fn find_contained_amenity(
        &self,
        building_id: Uuid,
    ) -> Result<Option<Amenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.find_contained_amenity(building_id).await,
            FacilityDb::Memory(s) => s.find_contained_amenity(building_id).await,
        }
    }

    /// Amenities within `radius_meters` of a point (inclusive), unordered.
    pub async fn amenities_within_radius(
        &self,
        point: Point<f64>,
        radius_meters: f64,
    ) -> Result<Vec<Amenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.amenities_within_radius(point, radius_meters).await,
            FacilityDb::Memory(s) => s.amenities_within_radius(point, radius_meters).await,
        }
    }

    /// Point a building at an amenity. `false` when either does not exist.
    pub async fn set_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.set_building_amenity(building_id, amenity_id).await,
            FacilityDb::Memory(s) => s.set_building_amenity(building_id, amenity_id).await,
        }
    }

    /// Like `set_building_amenity`, but only when the building has no
    /// assignment yet. `false` when it already has one or either is missing.
    pub async fn fill_building_amenity(
        &self,
        building_id: Uuid,
        amenity_id: Uuid,
    ) -> Result<bool, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.fill_building_amenity(building_id, amenity_id).await,
            FacilityDb::Memory(s) => s.fill_building_amenity(building_id, amenity_id).await,
        }
    }

    // ─── Assignment ──────────────────────────────────────────────

    /// Assign every building its nearest amenity within `radius_meters`.
    ///
    /// Ranking is (distance, amenity `osm_id`, amenity `id`). Buildings with no
    /// amenity in range keep their previous assignment, and rows whose winner
    /// is unchanged are not rewritten. Returns the number of rows written.
    pub async fn assign_closest_amenities(&self, radius_meters: f64) -> Result<u64, AppError> {
        match self {
            FacilityDb::Postgis(s) => s.assign_closest_amenities(radius_meters).await,
            FacilityDb::Memory(s) => s.assign_closest_amenities(radius_meters).await,
        }
    }

    /// Nearest amenity of `category` within `radius_meters` of the building.
    pub async fn closest_amenity(
        &self,
        building_id: Uuid,
        category: AmenityCategory,
        radius_meters: f64,
    ) -> Result<Option<ClosestAmenity>, AppError> {
        match self {
            FacilityDb::Postgis(s) => {
                s.closest_amenity(building_id, category, radius_meters)
                    .await
            }
            FacilityDb::Memory(s) => {
                s.closest_amenity(building_id, category, radius_meters)
                    .await
            }
        }
    }
}
