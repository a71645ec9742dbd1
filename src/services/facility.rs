// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility reads and mutations with cache maintenance.
//!
//! List reads go through the response cache. Every mutation that changes a
//! list invalidates the affected keys before returning, so a read issued
//! after a mutation returns never sees the old list.

use crate::cache::{CacheKey, ResponseCache};
use crate::db::FacilityDb;
use crate::error::AppError;
use crate::models::{
    Amenity, AmenityUpdate, Building, BuildingUpdate, NewAmenity, NewBuilding,
};
use uuid::Uuid;

/// Buildings embed their assigned amenity, so amenity changes touch both lists.
const AMENITY_KEYS: &[CacheKey] = &[CacheKey::Amenities, CacheKey::Buildings];
const BUILDING_KEYS: &[CacheKey] = &[CacheKey::Buildings];

#[derive(Clone)]
pub struct FacilityService {
    db: FacilityDb,
    cache: ResponseCache,
}

impl FacilityService {
    pub fn new(db: FacilityDb, cache: ResponseCache) -> Self {
        Self { db, cache }
    }

    pub fn db(&self) -> &FacilityDb {
        &self.db
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    // ─── Reads ───────────────────────────────────────────────────

    pub async fn get_buildings(&self) -> Result<Vec<Building>, AppError> {
        self.cache
            .get_or_load(CacheKey::Buildings, || self.db.get_buildings())
            .await
    }

    pub async fn get_amenities(&self) -> Result<Vec<Amenity>, AppError> {
        self.cache
            .get_or_load(CacheKey::Amenities, || self.db.get_amenities())
            .await
    }

    pub async fn get_building(&self, id: Uuid) -> Result<Option<Building>, AppError> {
        self.db.get_building(id).await
    }

    pub async fn get_amenity(&self, id: Uuid) -> Result<Option<Amenity>, AppError> {
        self.db.get_amenity(id).await
    }

    // ─── Mutations ───────────────────────────────────────────────

    pub async fn load_buildings(&self, buildings: &[NewBuilding]) -> Result<u64, AppError> {
        let inserted = self.db.load_buildings(buildings).await?;
        if inserted > 0 {
            self.cache.invalidate(BUILDING_KEYS).await;
        }
        tracing::info!(
            received = buildings.len(),
            inserted,
            "Buildings loaded"
        );
        Ok(inserted)
    }

    pub async fn load_amenities(&self, amenities: &[NewAmenity]) -> Result<u64, AppError> {
        let inserted = self.db.load_amenities(amenities).await?;
        if inserted > 0 {
            self.cache.invalidate(&[CacheKey::Amenities]).await;
        }
        tracing::info!(
            received = amenities.len(),
            inserted,
            "Amenities loaded"
        );
        Ok(inserted)
    }

    pub async fn update_building(
        &self,
        id: Uuid,
        update: &BuildingUpdate,
    ) -> Result<Option<Building>, AppError> {
        let updated = self.db.update_building(id, update).await?;
        if updated.is_some() {
            self.cache.invalidate(BUILDING_KEYS).await;
            tracing::info!(building_id = %id, "Building updated");
        }
        Ok(updated)
    }

    pub async fn update_amenity(
        &self,
        id: Uuid,
        update: &AmenityUpdate,
    ) -> Result<Option<Amenity>, AppError> {
        let updated = self.db.update_amenity(id, update).await?;
        if updated.is_some() {
            self.cache.invalidate(AMENITY_KEYS).await;
            tracing::info!(amenity_id = %id, "Amenity updated");
        }
        Ok(updated)
    }

    pub async fn delete_building(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = self.db.delete_building(id).await?;
        if deleted {
            self.cache.invalidate(BUILDING_KEYS).await;
            tracing::info!(building_id = %id, "Building deleted");
        }
        Ok(deleted)
    }

    pub async fn delete_amenity(&self, id: Uuid) -> Result<bool, AppError> {
        let deleted = self.db.delete_amenity(id).await?;
        if deleted {
            self.cache.invalidate(AMENITY_KEYS).await;
            tracing::info!(amenity_id = %id, "Amenity deleted");
        }
        Ok(deleted)
    }

    /// Drop cached building lists after assignments changed.
    pub async fn assignments_changed(&self) {
        self.cache.invalidate(BUILDING_KEYS).await;
    }
}
