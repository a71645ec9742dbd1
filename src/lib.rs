// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Facility-Sync: nearest-amenity assignment for OpenStreetMap facilities
//!
//! This crate syncs buildings and amenities for a bounded area from the
//! Overpass API into a spatial store and assigns each building its nearest
//! amenity.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use cache::ResponseCache;
use config::Config;
use db::FacilityDb;
use services::{
    AssignmentService, BoundaryResolver, CredentialHolder, FacilityService, FeatureServiceClient,
    OverpassClient, SyncService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub facilities: FacilityService,
    pub assignment: AssignmentService,
    pub sync: SyncService,
}

impl AppState {
    /// Wire every service on top of an already-opened store.
    pub fn build(config: Config, db: FacilityDb) -> anyhow::Result<Self> {
        let http = services::http_client(config.http_timeout)?;

        let cache = ResponseCache::from_kind(config.cache_backend, db.pg_pool(), config.cache_ttl);
        let facilities = FacilityService::new(db, cache);
        let assignment = AssignmentService::new(
            facilities.clone(),
            config.assignment_radius_meters,
            config.closest_amenity_radius_meters,
        );

        let credentials = Arc::new(CredentialHolder::new(
            http.clone(),
            config.feature_service_token_url.clone(),
            config.feature_service_client_id.clone(),
            config.feature_service_client_secret.clone(),
        ));
        let features =
            FeatureServiceClient::new(http.clone(), config.feature_service_url.clone(), credentials);
        let overpass = OverpassClient::new(
            http,
            config.overpass_url.clone(),
            config.http_timeout.as_secs(),
        );

        let sync = SyncService::new(
            BoundaryResolver::new(features),
            overpass,
            facilities.clone(),
            assignment.clone(),
            config.boundaries_collection_id.clone(),
            config.boundaries_feature_id.clone(),
        );

        tracing::info!(
            store = facilities.db().backend_name(),
            cache = facilities.cache().backend_name(),
            cache_ttl_secs = config.cache_ttl.as_secs(),
            "Services initialized"
        );

        Ok(Self {
            config,
            facilities,
            assignment,
            sync,
        })
    }
}
