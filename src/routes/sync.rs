// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sync and assignment trigger routes.

use crate::error::Result;
use crate::models::AssignmentReport;
use crate::services::{SyncReport, SyncScope};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sync", post(run_sync).delete(cancel_sync))
        .route("/api/sync/status", get(sync_status))
        .route("/api/assignments", post(run_assignment))
}

#[derive(Debug, Default, Deserialize)]
struct SyncParams {
    #[serde(default)]
    scope: SyncScope,
}

#[derive(Debug, Serialize)]
struct SyncStatus {
    running: bool,
}

#[derive(Debug, Default, Deserialize)]
struct AssignmentParams {
    radius_meters: Option<f64>,
}

// ─── Sync ────────────────────────────────────────────────────

/// Run a sync to completion and return its report.
///
/// A run that is already active yields 409.
async fn run_sync(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SyncParams>,
) -> Result<Json<SyncReport>> {
    let report = state.sync.run_scope(params.scope).await?;
    Ok(Json(report))
}

/// Request cancellation. 202 when a run was signalled, 204 when idle.
async fn cancel_sync(State(state): State<Arc<AppState>>) -> StatusCode {
    if state.sync.cancel() {
        StatusCode::ACCEPTED
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn sync_status(State(state): State<Arc<AppState>>) -> Json<SyncStatus> {
    Json(SyncStatus {
        running: state.sync.is_running(),
    })
}

// ─── Assignment ──────────────────────────────────────────────

async fn run_assignment(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AssignmentParams>,
) -> Result<Json<AssignmentReport>> {
    let report = match params.radius_meters {
        Some(radius) => state.assignment.assign_within(radius).await?,
        None => state.assignment.assign_closest_amenities().await?,
    };
    Ok(Json(report))
}
