// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod assignment;
pub mod boundary;
pub mod facility;
pub mod features;
pub mod overpass;
pub mod sync;

pub use assignment::AssignmentService;
pub use boundary::{BoundaryError, BoundaryResolver};
pub use facility::FacilityService;
pub use features::{CredentialHolder, FeatureServiceClient, FeatureServiceError};
pub use overpass::{ExtractionError, OverpassClient};
pub use sync::{SyncCancellation, SyncReport, SyncScope, SyncService};

use std::time::Duration;

/// HTTP client shared by the outbound clients, with a bounded request timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
}
