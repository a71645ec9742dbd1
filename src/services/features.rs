// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Feature-service client for the hosted area boundaries.
//!
//! Authenticates with OAuth2 client credentials. The access token lives in a
//! `CredentialHolder` that is injected into the client, so its lifetime is
//! explicit and tests can construct one without touching the network.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Refresh tokens this long before they expire.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;
/// Lifetime assumed for tokens issued without `expires_in`.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// Errors talking to the feature service.
#[derive(Debug, thiserror::Error)]
pub enum FeatureServiceError {
    #[error("Feature service request failed: {0}")]
    Transport(String),

    #[error("Feature service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Feature service rejected the access token")]
    Unauthorized,

    #[error("Invalid feature service response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for FeatureServiceError {
    fn from(e: reqwest::Error) -> Self {
        FeatureServiceError::Transport(e.to_string())
    }
}

/// Token endpoint response. Both snake_case and camelCase spellings occur.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "expiresIn")]
    pub expires_in: Option<i64>,
}

/// Access token with its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl CachedToken {
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        let lifetime = response
            .expires_in
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Self {
            access_token: response.access_token,
            expires_at: now + Duration::seconds(lifetime),
        }
    }

    /// Usable at `now` with the refresh margin to spare.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) < self.expires_at
    }
}

/// Holds the client credentials and the current access token.
pub struct CredentialHolder {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<CachedToken>>,
    refresh_lock: Mutex<()>,
}

impl CredentialHolder {
    pub fn new(
        http: reqwest::Client,
        token_url: String,
        client_id: String,
        client_secret: String,
    ) -> Self {
        Self {
            http,
            token_url,
            client_id,
            client_secret,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Seed the holder with a known token.
    pub async fn set_token(&self, token: CachedToken) {
        *self.token.write().await = Some(token);
    }

    /// Forget the current token so the next request fetches a new one.
    pub async fn invalidate(&self) {
        *self.token.write().await = None;
    }

    /// Return a valid access token, fetching a new one when needed.
    ///
    /// Concurrent callers that find the token stale wait on a single refresh.
    pub async fn access_token(&self) -> Result<String, FeatureServiceError> {
        if let Some(token) = self.current(Utc::now()).await {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(token) = self.current(Utc::now()).await {
            return Ok(token);
        }

        tracing::debug!("Fetching feature service access token");
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;

        let response: TokenResponse = check_response_json(response).await?;
        let token = CachedToken::from_response(response, Utc::now());
        let access_token = token.access_token.clone();
        tracing::info!(expires_at = %token.expires_at, "Feature service token refreshed");
        self.set_token(token).await;

        Ok(access_token)
    }

    async fn current(&self, now: DateTime<Utc>) -> Option<String> {
        self.token
            .read()
            .await
            .as_ref()
            .filter(|t| t.is_fresh(now))
            .map(|t| t.access_token.clone())
    }
}

/// Feature-service API client.
#[derive(Clone)]
pub struct FeatureServiceClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialHolder>,
}

impl FeatureServiceClient {
    pub fn new(http: reqwest::Client, base_url: String, credentials: Arc<CredentialHolder>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    /// Fetch one feature of a collection as raw JSON.
    ///
    /// The service may wrap the feature as `{"feature": {...}}`; the
    /// envelope is removed here.
    pub async fn get_feature(
        &self,
        collection_id: &str,
        feature_id: &str,
    ) -> Result<serde_json::Value, FeatureServiceError> {
        let url = format!(
            "{}/collections/{}/features/{}",
            self.base_url,
            urlencoding::encode(collection_id),
            urlencoding::encode(feature_id)
        );
        let token = self.credentials.access_token().await?;

        let response = self.http.get(&url).bearer_auth(token).send().await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.credentials.invalidate().await;
            return Err(FeatureServiceError::Unauthorized);
        }

        let body: serde_json::Value = check_response_json(response).await?;
        Ok(unwrap_feature(body))
    }
}

/// Strip a `{"feature": ...}` envelope when present.
pub fn unwrap_feature(body: serde_json::Value) -> serde_json::Value {
    match body {
        serde_json::Value::Object(mut map) if map.get("feature").is_some_and(|f| f.is_object()) => {
            map.remove("feature").unwrap_or_default()
        }
        other => other,
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, FeatureServiceError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(FeatureServiceError::Unauthorized);
        }

        return Err(FeatureServiceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    response
        .json()
        .await
        .map_err(|e| FeatureServiceError::Decode(e.to_string()))
}
