// ABOUTME: OAuth2 client_credentials flow with a signed JWT client assertion
// ABOUTME: Obtains scope-limited LMS access tokens with an optional short-lived per-scope cache
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OAuth2 Assertion Client
//!
//! The tool authenticates to a platform token endpoint with an RS256 assertion
//! (`iss = sub = client_id`, `aud = token endpoint`, unique `jti`, 5 minute
//! lifetime) and requests a space-joined scope list.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::ToolKeyPair;
use crate::errors::{AppError, AppResult};
use crate::lms_http::LmsHttpClient;
use crate::platform_store::PlatformStore;
use lti_core::constants::lifetimes::{ACCESS_TOKEN_EXPIRY_MARGIN_SECS, CLIENT_ASSERTION_SECS};
use lti_core::constants::oauth::{CLIENT_ASSERTION_TYPE, GRANT_TYPE_CLIENT_CREDENTIALS};

/// Claims of the client assertion
#[derive(Debug, Serialize)]
struct ClientAssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    jti: String,
    iat: i64,
    exp: i64,
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for LTI service calls
    pub access_token: String,
    /// Usually `Bearer`
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Scopes actually granted
    #[serde(default)]
    pub scope: Option<String>,
}

/// Cache key: platform plus sorted, de-duplicated scope set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    platform_id: String,
    scopes: Vec<String>,
}

impl CacheKey {
    fn new(platform_id: &str, scopes: &[&str]) -> Self {
        let mut scopes: Vec<String> = scopes.iter().map(|s| (*s).to_owned()).collect();
        scopes.sort();
        scopes.dedup();
        Self {
            platform_id: platform_id.to_owned(),
            scopes,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

/// Slot per cache key; the mutex serialises concurrent fetches for the same key
type TokenSlot = Arc<Mutex<Option<CachedToken>>>;

/// Client for platform token endpoints
#[derive(Clone)]
pub struct AccessTokenClient {
    http: LmsHttpClient,
    keys: Arc<ToolKeyPair>,
    store: Arc<dyn PlatformStore>,
    cache_ttl: Option<Duration>,
    slots: Arc<DashMap<CacheKey, TokenSlot>>,
}

impl AccessTokenClient {
    /// Create a client; `cache_secs == 0` disables caching
    #[must_use]
    pub fn new(
        http: LmsHttpClient,
        keys: Arc<ToolKeyPair>,
        store: Arc<dyn PlatformStore>,
        cache_secs: u64,
    ) -> Self {
        Self {
            http,
            keys,
            store,
            cache_ttl: (cache_secs > 0).then(|| Duration::from_secs(cache_secs)),
            slots: Arc::new(DashMap::new()),
        }
    }

    /// Get an access token for `scopes` on the platform
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown platform; an upstream error carrying status
    /// and body when the token endpoint rejects the request
    pub async fn get_access_token(&self, platform_id: &str, scopes: &[&str]) -> AppResult<String> {
        let Some(ttl) = self.cache_ttl else {
            return Ok(self.request_token(platform_id, scopes).await?.access_token);
        };

        let key = CacheKey::new(platform_id, scopes);
        let slot = Arc::clone(self.slots.entry(key).or_default().value());
        let mut cached = slot.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| t.expires_at > Instant::now()) {
            debug!(platform_id, "Using cached access token");
            return Ok(token.access_token.clone());
        }

        let response = self.request_token(platform_id, scopes).await?;
        let lifetime = response.expires_in.map_or(ttl, |secs| {
            ttl.min(Duration::from_secs(
                secs.saturating_sub(ACCESS_TOKEN_EXPIRY_MARGIN_SECS),
            ))
        });
        *cached = (!lifetime.is_zero()).then(|| CachedToken {
            access_token: response.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(response.access_token)
    }

    /// Request a fresh token, bypassing the cache
    ///
    /// # Errors
    ///
    /// See [`Self::get_access_token`]
    pub async fn request_token(&self, platform_id: &str, scopes: &[&str]) -> AppResult<TokenResponse> {
        let platform = self
            .store
            .find_by_id(platform_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Platform {platform_id}")))?;

        let now = Utc::now().timestamp();
        let claims = ClientAssertionClaims {
            iss: &platform.client_id,
            sub: &platform.client_id,
            aud: &platform.auth_token_url,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + CLIENT_ASSERTION_SECS,
        };
        let assertion = self
            .keys
            .sign(&claims, CLIENT_ASSERTION_SECS, Some(self.keys.kid()))?;
        let scope = scopes.join(" ");

        let form = [
            ("grant_type", GRANT_TYPE_CLIENT_CREDENTIALS),
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", assertion.as_str()),
            ("scope", scope.as_str()),
        ];
        let request = self
            .http
            .post(&platform.auth_token_url, None, "application/json")
            .form(&form);

        debug!(platform_id, scope = %scope, "Requesting LMS access token");
        let response: TokenResponse = LmsHttpClient::send_json(request, "Token request")
            .await
            .map_err(|e| e.with_platform_id(platform_id))?;

        if response.access_token.is_empty() {
            return Err(AppError::external_service(
                "Token request",
                "response did not include an access_token",
            )
            .with_platform_id(platform_id));
        }
        Ok(response)
    }
}
