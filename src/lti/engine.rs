// ABOUTME: Explicitly constructed LTI protocol engine wiring keys, registry, and rewrite table
// ABOUTME: Builds the shared HTTP client and every protocol component once at startup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use tracing::info;

use super::access_token::AccessTokenClient;
use super::ags::AgsClient;
use super::grading::GradeSync;
use super::launch::LaunchHandshake;
use super::nrps::NrpsClient;
use super::registration::DynamicRegistration;
use crate::crypto::ToolKeyPair;
use crate::errors::AppResult;
use crate::lms_http::LmsHttpClient;
use crate::platform_store::PlatformStore;
use crate::rewrite::UrlRewriter;
use lti_core::constants::nrps::DEFAULT_MAX_PAGES;

/// Settings the protocol engine needs; everything else is passed in directly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Browser-facing base URL
    pub public_url: String,
    /// LMS-reachable base URL for the key set
    pub tool_url: String,
    /// Reject plain-HTTP `openid_configuration` URLs
    pub require_https_registration: bool,
    /// Outbound request timeout
    pub http_timeout_secs: u64,
    /// Outbound connect timeout
    pub http_connect_timeout_secs: u64,
    /// Access token cache lifetime, 0 disables
    pub token_cache_secs: u64,
    /// Roster pagination ceiling
    pub nrps_max_pages: usize,
    /// Tool display name
    pub tool_name: String,
    /// Tool description
    pub tool_description: String,
    /// Tool logo
    pub tool_logo_uri: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            public_url: "http://localhost:3000".to_owned(),
            tool_url: "http://localhost:3000".to_owned(),
            require_https_registration: false,
            http_timeout_secs: 15,
            http_connect_timeout_secs: 5,
            token_cache_secs: 0,
            nrps_max_pages: DEFAULT_MAX_PAGES,
            tool_name: "LTI Assessment Tool".to_owned(),
            tool_description: "Assessment plugin for LTI 1.3 Advantage platforms".to_owned(),
            tool_logo_uri: None,
        }
    }
}

/// The LTI 1.3 Advantage trust and service engine
#[derive(Clone)]
pub struct LtiEngine {
    settings: Arc<EngineSettings>,
    keys: Arc<ToolKeyPair>,
    store: Arc<dyn PlatformStore>,
    http: LmsHttpClient,
    tokens: AccessTokenClient,
    launch: LaunchHandshake,
    registration: DynamicRegistration,
    ags: AgsClient,
    nrps: NrpsClient,
    grades: GradeSync,
}

impl LtiEngine {
    /// Wire the engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built
    pub fn new(
        settings: EngineSettings,
        keys: ToolKeyPair,
        store: Arc<dyn PlatformStore>,
        rewriter: UrlRewriter,
    ) -> AppResult<Self> {
        let keys = Arc::new(keys);
        let rewrite_rules = rewriter.len();
        let http = LmsHttpClient::with_timeouts(
            settings.http_timeout_secs,
            settings.http_connect_timeout_secs,
            Arc::new(rewriter),
        )?;

        let tokens = AccessTokenClient::new(
            http.clone(),
            Arc::clone(&keys),
            Arc::clone(&store),
            settings.token_cache_secs,
        );
        let launch = LaunchHandshake::new(
            Arc::clone(&keys),
            Arc::clone(&store),
            http.clone(),
            &settings.public_url,
        );
        let registration = DynamicRegistration::new(http.clone(), Arc::clone(&store), &settings);
        let ags = AgsClient::new(http.clone(), tokens.clone(), settings.tool_name.clone());
        let nrps = NrpsClient::new(http.clone(), tokens.clone(), settings.nrps_max_pages);
        let grades = GradeSync::new(ags.clone(), Arc::clone(&store));

        info!(
            kid = %keys.kid(),
            public_url = %settings.public_url,
            tool_url = %settings.tool_url,
            rewrite_rules,
            token_cache_secs = settings.token_cache_secs,
            "LTI engine initialized"
        );

        Ok(Self {
            settings: Arc::new(settings),
            keys,
            store,
            http,
            tokens,
            launch,
            registration,
            ags,
            nrps,
            grades,
        })
    }

    /// Engine settings
    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Tool key pair
    #[must_use]
    pub fn keys(&self) -> &ToolKeyPair {
        &self.keys
    }

    /// Platform registry
    #[must_use]
    pub fn store(&self) -> &Arc<dyn PlatformStore> {
        &self.store
    }

    /// Shared outbound client
    #[must_use]
    pub const fn http(&self) -> &LmsHttpClient {
        &self.http
    }

    /// OAuth2 assertion client
    #[must_use]
    pub const fn tokens(&self) -> &AccessTokenClient {
        &self.tokens
    }

    /// OIDC login and launch
    #[must_use]
    pub const fn launch(&self) -> &LaunchHandshake {
        &self.launch
    }

    /// Dynamic registration
    #[must_use]
    pub const fn registration(&self) -> &DynamicRegistration {
        &self.registration
    }

    /// Grade service client
    #[must_use]
    pub const fn ags(&self) -> &AgsClient {
        &self.ags
    }

    /// Roster service client
    #[must_use]
    pub const fn nrps(&self) -> &NrpsClient {
        &self.nrps
    }

    /// Batch grade passback
    #[must_use]
    pub const fn grades(&self) -> &GradeSync {
        &self.grades
    }
}
