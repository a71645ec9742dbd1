// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Where list responses are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// `query_cache` table, shared across instances
    Postgres,
    /// In-process map
    Local,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(CacheBackendKind::Postgres),
            "local" => Ok(CacheBackendKind::Local),
            _ => Err(ConfigError::Invalid("CACHE_BACKEND", s.to_string())),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// PostGIS connection string. `None` runs against the in-process store.
    pub database_url: Option<String>,
    pub cache_backend: CacheBackendKind,
    pub cache_ttl: Duration,

    // --- Map-data source ---
    pub overpass_url: String,

    // --- Feature service (area boundaries) ---
    pub feature_service_url: String,
    pub feature_service_token_url: String,
    pub feature_service_client_id: String,
    pub feature_service_client_secret: String,
    pub boundaries_collection_id: String,
    pub boundaries_feature_id: String,

    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,

    // --- Assignment ---
    /// Search radius for the batch assignment
    pub assignment_radius_meters: f64,
    /// Search radius for the per-category closest-amenity lookup
    pub closest_amenity_radius_meters: f64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let database_url = env::var("DATABASE_URL").ok().filter(|v| !v.trim().is_empty());
        let cache_backend = match env::var("CACHE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) if database_url.is_some() => CacheBackendKind::Postgres,
            Err(_) => CacheBackendKind::Local,
        };

        let feature_service_url = required("FEATURE_SERVICE_URL")?
            .trim_end_matches('/')
            .to_string();
        let feature_service_token_url = env::var("FEATURE_SERVICE_TOKEN_URL")
            .unwrap_or_else(|_| format!("{}/auth/token", feature_service_url));

        Ok(Self {
            port: parsed("PORT", 8080)?,
            database_url,
            cache_backend,
            cache_ttl: Duration::from_secs(parsed("CACHE_TTL_SECS", 3600)?),
            overpass_url: env::var("OVERPASS_URL")
                .unwrap_or_else(|_| DEFAULT_OVERPASS_URL.to_string()),
            feature_service_url,
            feature_service_token_url,
            feature_service_client_id: required("FEATURE_SERVICE_CLIENT_ID")?,
            feature_service_client_secret: required("FEATURE_SERVICE_CLIENT_SECRET")?
                .trim()
                .to_string(),
            boundaries_collection_id: required("AREA_BOUNDARIES_COLLECTION_ID")?,
            boundaries_feature_id: required("AREA_BOUNDARIES_FEATURE_ID")?,
            http_timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 30)?),
            assignment_radius_meters: parsed("ASSIGNMENT_RADIUS_METERS", 5.0)?,
            closest_amenity_radius_meters: parsed("CLOSEST_AMENITY_RADIUS_METERS", 5000.0)?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            port: 8080,
            database_url: None,
            cache_backend: CacheBackendKind::Local,
            cache_ttl: Duration::from_secs(3600),
            overpass_url: "http://127.0.0.1:9/api/interpreter".to_string(),
            feature_service_url: "http://127.0.0.1:9".to_string(),
            feature_service_token_url: "http://127.0.0.1:9/auth/token".to_string(),
            feature_service_client_id: "test_client_id".to_string(),
            feature_service_client_secret: "test_secret".to_string(),
            boundaries_collection_id: "boundaries".to_string(),
            boundaries_feature_id: "area-1".to_string(),
            http_timeout: Duration::from_secs(2),
            assignment_radius_meters: 5.0,
            closest_amenity_radius_meters: 5000.0,
        }
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
