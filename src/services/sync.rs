// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync pipeline: boundary → extraction → load → batch assignment.
//!
//! Only one run may be active at a time. Each step failure is logged and
//! recorded in the report; the remaining independent steps still run and
//! existing data is never removed. Cancellation is checked between steps.

use crate::error::AppError;
use crate::models::{AssignmentReport, BoundingBox, NewAmenity, NewBuilding};
use crate::services::{AssignmentService, BoundaryResolver, FacilityService, OverpassClient};
use crate::time_utils::format_timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Which steps a run performs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum SyncScope {
    /// Buildings, amenities, then batch assignment
    #[default]
    All,
    Buildings,
    Amenities,
}

impl SyncScope {
    fn buildings(self) -> bool {
        matches!(self, SyncScope::All | SyncScope::Buildings)
    }

    fn amenities(self) -> bool {
        matches!(self, SyncScope::All | SyncScope::Amenities)
    }

    fn assign(self) -> bool {
        self == SyncScope::All
    }
}

/// Outcome of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub enum StepOutcome {
    /// Not part of this run's scope
    NotRun,
    Completed {
        #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
        count: u64,
    },
    Failed {
        error: String,
    },
    Cancelled,
}

/// Summary of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SyncReport {
    pub scope: SyncScope,
    pub started_at: String,
    pub finished_at: String,
    pub bounding_box: Option<BoundingBox>,
    pub boundary: StepOutcome,
    /// Buildings inserted (existing `osm_id`s are skipped)
    pub buildings: StepOutcome,
    /// Amenities inserted
    pub amenities: StepOutcome,
    /// Assignments written
    pub assignment: StepOutcome,
    pub cancelled: bool,
}

impl SyncReport {
    fn new(scope: SyncScope) -> Self {
        Self {
            scope,
            started_at: format_timestamp(Utc::now()),
            finished_at: String::new(),
            bounding_box: None,
            boundary: StepOutcome::NotRun,
            buildings: StepOutcome::NotRun,
            amenities: StepOutcome::NotRun,
            assignment: StepOutcome::NotRun,
            cancelled: false,
        }
    }

    /// True when no step failed.
    pub fn succeeded(&self) -> bool {
        ![
            &self.boundary,
            &self.buildings,
            &self.amenities,
            &self.assignment,
        ]
        .iter()
        .any(|s| matches!(s, StepOutcome::Failed { .. }))
    }
}

/// Shared cancellation flag for the active run.
#[derive(Debug, Clone, Default)]
pub struct SyncCancellation {
    flag: Arc<AtomicBool>,
}

impl SyncCancellation {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Clears the running flag when a run ends, however it ends.
struct RunGuard {
    running: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone)]
pub struct SyncService {
    boundary: BoundaryResolver,
    overpass: OverpassClient,
    facilities: FacilityService,
    assignment: AssignmentService,
    collection_id: String,
    feature_id: String,
    running: Arc<AtomicBool>,
    cancellation: SyncCancellation,
}

impl SyncService {
    pub fn new(
        boundary: BoundaryResolver,
        overpass: OverpassClient,
        facilities: FacilityService,
        assignment: AssignmentService,
        collection_id: String,
        feature_id: String,
    ) -> Self {
        Self {
            boundary,
            overpass,
            facilities,
            assignment,
            collection_id,
            feature_id,
            running: Arc::new(AtomicBool::new(false)),
            cancellation: SyncCancellation::default(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Request cancellation of the active run. `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        if !self.is_running() {
            return false;
        }
        tracing::info!("Sync cancellation requested");
        self.cancellation.cancel();
        true
    }

    /// Full pipeline.
    pub async fn run(&self) -> Result<SyncReport, AppError> {
        self.run_scope(SyncScope::All).await
    }

    /// Refresh buildings only.
    pub async fn sync_buildings(&self) -> Result<SyncReport, AppError> {
        self.run_scope(SyncScope::Buildings).await
    }

    /// Refresh amenities only.
    pub async fn sync_amenities(&self) -> Result<SyncReport, AppError> {
        self.run_scope(SyncScope::Amenities).await
    }

    /// Run the steps in `scope`. Fails with `Conflict` when a run is active.
    pub async fn run_scope(&self, scope: SyncScope) -> Result<SyncReport, AppError> {
        let _guard = self.begin()?;
        tracing::info!(scope = ?scope, "Sync started");

        let mut report = SyncReport::new(scope);
        self.run_steps(scope, &mut report).await;
        report.finished_at = format_timestamp(Utc::now());

        if report.cancelled {
            tracing::warn!(scope = ?scope, "Sync cancelled");
        } else if report.succeeded() {
            tracing::info!(scope = ?scope, "Sync finished");
        } else {
            tracing::warn!(scope = ?scope, "Sync finished with failures");
        }
        Ok(report)
    }

    fn begin(&self) -> Result<RunGuard, AppError> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| AppError::Conflict("A sync is already running".to_string()))?;
        self.cancellation.reset();
        Ok(RunGuard {
            running: self.running.clone(),
        })
    }

    fn check_cancelled(&self, report: &mut SyncReport) -> bool {
        if self.cancellation.is_cancelled() {
            report.cancelled = true;
        }
        report.cancelled
    }

    async fn run_steps(&self, scope: SyncScope, report: &mut SyncReport) {
        // ─── Boundary ───
        if self.check_cancelled(report) {
            report.boundary = StepOutcome::Cancelled;
            return;
        }
        let bbox = match self
            .boundary
            .resolve_bounding_box(&self.collection_id, &self.feature_id)
            .await
        {
            Ok(bbox) => bbox,
            Err(e) => {
                tracing::error!(error = %e, "Boundary resolution failed, aborting sync");
                report.boundary = StepOutcome::Failed {
                    error: e.to_string(),
                };
                return;
            }
        };
        report.boundary = StepOutcome::Completed { count: 1 };
        report.bounding_box = Some(bbox);

        // ─── Extraction ───
        if self.check_cancelled(report) {
            self.mark_remaining_cancelled(scope, report);
            return;
        }
        let (buildings, amenities) = tokio::join!(
            self.extract_buildings(scope, &bbox),
            self.extract_amenities(scope, &bbox),
        );

        // ─── Load ───
        if let Some(extracted) = buildings {
            report.buildings = if self.check_cancelled(report) {
                StepOutcome::Cancelled
            } else {
                self.load_buildings(extracted).await
            };
        }
        if let Some(extracted) = amenities {
            report.amenities = if self.check_cancelled(report) {
                StepOutcome::Cancelled
            } else {
                self.load_amenities(extracted).await
            };
        }

        // ─── Assignment ───
        if scope.assign() {
            report.assignment = if self.check_cancelled(report) {
                StepOutcome::Cancelled
            } else {
                match self.assignment.assign_closest_amenities().await {
                    Ok(AssignmentReport { updated, .. }) => {
                        StepOutcome::Completed { count: updated }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Batch assignment failed");
                        StepOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            };
        }
    }

    fn mark_remaining_cancelled(&self, scope: SyncScope, report: &mut SyncReport) {
        if scope.buildings() {
            report.buildings = StepOutcome::Cancelled;
        }
        if scope.amenities() {
            report.amenities = StepOutcome::Cancelled;
        }
        if scope.assign() {
            report.assignment = StepOutcome::Cancelled;
        }
    }

    /// `None` when out of scope.
    async fn extract_buildings(
        &self,
        scope: SyncScope,
        bbox: &BoundingBox,
    ) -> Option<Result<Vec<NewBuilding>, String>> {
        if !scope.buildings() {
            return None;
        }
        Some(self.overpass.extract_buildings(bbox).await.map_err(|e| {
            tracing::error!(error = %e, "Building extraction failed, keeping existing data");
            e.to_string()
        }))
    }

    async fn extract_amenities(
        &self,
        scope: SyncScope,
        bbox: &BoundingBox,
    ) -> Option<Result<Vec<NewAmenity>, String>> {
        if !scope.amenities() {
            return None;
        }
        Some(self.overpass.extract_amenities(bbox).await.map_err(|e| {
            tracing::error!(error = %e, "Amenity extraction failed, keeping existing data");
            e.to_string()
        }))
    }

    async fn load_buildings(&self, extracted: Result<Vec<NewBuilding>, String>) -> StepOutcome {
        let buildings = match extracted {
            Ok(b) => b,
            Err(error) => return StepOutcome::Failed { error },
        };
        match self.facilities.load_buildings(&buildings).await {
            Ok(count) => StepOutcome::Completed { count },
            Err(e) => {
                tracing::error!(error = %e, "Building load failed");
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn load_amenities(&self, extracted: Result<Vec<NewAmenity>, String>) -> StepOutcome {
        let amenities = match extracted {
            Ok(a) => a,
            Err(error) => return StepOutcome::Failed { error },
        };
        match self.facilities.load_amenities(&amenities).await {
            Ok(count) => StepOutcome::Completed { count },
            Err(e) => {
                tracing::error!(error = %e, "Amenity load failed");
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}
