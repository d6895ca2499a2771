// ABOUTME: Platform registration model for LMS deployments trusted by the tool
// ABOUTME: Platform rows are unique on (issuer, client_id) and written only by registration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// A registered LMS deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    /// Stable identifier (UUID v4 string)
    pub id: String,
    /// Issuer URL as it appears in `iss` claims
    pub issuer: String,
    /// Client id the LMS assigned to this tool
    pub client_id: String,
    /// Deployment id, when known
    pub deployment_id: Option<String>,
    /// Browser-facing OIDC authorization endpoint
    pub auth_login_url: String,
    /// OAuth2 token endpoint (server-to-server)
    pub auth_token_url: String,
    /// Platform key set URL (server-to-server)
    pub keyset_url: String,
    /// Credential for the third-party assessment service, if configured
    #[serde(skip_serializing)]
    pub service_credential: Option<String>,
    /// When this platform was first registered
    pub created_at: DateTime<Utc>,
    /// Last re-registration or credential rotation
    pub updated_at: DateTime<Utc>,
}

/// Registration input for creating or refreshing a [`Platform`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPlatform {
    /// Issuer URL
    pub issuer: String,
    /// Client id
    pub client_id: String,
    /// Deployment id, when known
    pub deployment_id: Option<String>,
    /// Authorization endpoint
    pub auth_login_url: String,
    /// Token endpoint
    pub auth_token_url: String,
    /// Key set URL
    pub keyset_url: String,
}

impl NewPlatform {
    /// Reject registrations with blank required fields
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the first empty field
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("issuer", &self.issuer),
            ("client_id", &self.client_id),
            ("auth_login_url", &self.auth_login_url),
            ("auth_token_url", &self.auth_token_url),
            ("keyset_url", &self.keyset_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::missing_field(name));
            }
        }
        Ok(())
    }
}
