// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Facility-Sync API Server
//!
//! Syncs OpenStreetMap buildings and amenities for a bounded area and
//! assigns each building its nearest amenity.

use anyhow::Context;
use clap::{Parser, Subcommand};
use facility_sync::{config::Config, db::FacilityDb, services::SyncScope, AppState};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(version, about = "Facility sync and nearest-amenity assignment")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve,
    /// Run one sync and exit
    Sync {
        #[arg(long, value_enum, default_value_t = ScopeArg::All)]
        scope: ScopeArg,
    },
    /// Run batch assignment and exit
    Assign {
        /// Override the configured radius
        #[arg(long)]
        radius_meters: Option<f64>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum ScopeArg {
    All,
    Buildings,
    Amenities,
}

impl From<ScopeArg> for SyncScope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::All => SyncScope::All,
            ScopeArg::Buildings => SyncScope::Buildings,
            ScopeArg::Amenities => SyncScope::Amenities,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;

    let db = match config.database_url.as_deref() {
        Some(url) => FacilityDb::connect(url)
            .await
            .context("Failed to connect to PostGIS")?,
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            FacilityDb::new_memory()
        }
    };

    let state = Arc::new(AppState::build(config, db)?);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(state).await,
        Command::Sync { scope } => {
            let report = state.sync.run_scope(scope.into()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.succeeded() {
                anyhow::bail!("sync finished with failures");
            }
            Ok(())
        }
        Command::Assign { radius_meters } => {
            let report = match radius_meters {
                Some(radius) => state.assignment.assign_within(radius).await?,
                None => state.assignment.assign_closest_amenities().await?,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", state.config.port);
    tracing::info!(port = state.config.port, "Starting Facility-Sync API");

    let app = facility_sync::routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facility_sync=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
