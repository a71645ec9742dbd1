// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nearest-amenity assignment.
//!
//! Ranking is always (distance, amenity `osm_id`, amenity `id`) so repeated
//! runs over the same data pick the same winners. The store evaluates the
//! ranking set-wise; this service adds radii, cache invalidation and the
//! single-building write-through.

use crate::error::AppError;
use crate::models::{Amenity, AmenityCategory, AssignmentReport, ClosestAmenity};
use crate::services::FacilityService;
use crate::time_utils::elapsed_ms;
use std::time::Instant;
use uuid::Uuid;

#[derive(Clone)]
pub struct AssignmentService {
    facilities: FacilityService,
    radius_meters: f64,
    closest_radius_meters: f64,
}

impl AssignmentService {
    pub fn new(facilities: FacilityService, radius_meters: f64, closest_radius_meters: f64) -> Self {
        Self {
            facilities,
            radius_meters,
            closest_radius_meters,
        }
    }

    /// Assign every building its nearest amenity within the batch radius.
    pub async fn assign_closest_amenities(&self) -> Result<AssignmentReport, AppError> {
        self.assign_within(self.radius_meters).await
    }

    /// Batch assignment with an explicit radius.
    pub async fn assign_within(&self, radius_meters: f64) -> Result<AssignmentReport, AppError> {
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(AppError::BadRequest(format!(
                "radius must be a non-negative number of meters, got {}",
                radius_meters
            )));
        }

        let started = Instant::now();
        let updated = self
            .facilities
            .db()
            .assign_closest_amenities(radius_meters)
            .await?;
        if updated > 0 {
            self.facilities.assignments_changed().await;
        }

        let report = AssignmentReport {
            updated,
            radius_meters,
            elapsed_ms: elapsed_ms(started),
        };
        tracing::info!(
            updated = report.updated,
            radius_meters,
            elapsed_ms = report.elapsed_ms,
            "Closest amenities assigned"
        );
        Ok(report)
    }

    /// The building's amenity: its assignment, else an amenity inside its footprint.
    ///
    /// A contained amenity found here is persisted as the assignment, unless
    /// the building was assigned in the meantime. `None` when the building does not exist or has neither.
    pub async fn get_building_amenity(&self, building_id: Uuid) -> Result<Option<Amenity>, AppError> {
        let db = self.facilities.db();
        let Some(building) = db.get_building(building_id).await? else {
            return Ok(None);
        };

        if let Some(amenity) = building.amenity {
            return Ok(Some(amenity));
        }

        let Some(amenity) = db.find_contained_amenity(building_id).await? else {
            return Ok(None);
        };

        if db.fill_building_amenity(building_id, amenity.id).await? {
            self.facilities.assignments_changed().await;
            tracing::info!(
                building_id = %building_id,
                amenity_id = %amenity.id,
                "Contained amenity assigned"
            );
            return Ok(Some(amenity));
        }

        // An assignment landed since the read; it wins.
        Ok(db
            .get_building(building_id)
            .await?
            .and_then(|building| building.amenity))
    }

    /// Nearest amenity of `category` within the extended radius.
    pub async fn get_closest_amenity(
        &self,
        building_id: Uuid,
        category: AmenityCategory,
    ) -> Result<Option<ClosestAmenity>, AppError> {
        self.facilities
            .db()
            .closest_amenity(building_id, category, self.closest_radius_meters)
            .await
    }
}
