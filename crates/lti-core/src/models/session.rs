// ABOUTME: Payloads of the tool's self-signed state and session tokens
// ABOUTME: Session claims snapshot the launch context and the granted service endpoints
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};

/// Login state bound into the OIDC `state` parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateClaims {
    /// Random nonce the launch `id_token` must echo
    pub nonce: String,
    /// Platform the login was initiated for
    pub platform_id: String,
    /// Issued at (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry (seconds since epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Course context of a launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtiContext {
    /// Context id
    pub id: String,
    /// Context title (falls back to the label)
    pub title: String,
    /// Short label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Context type URIs
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub context_type: Vec<String>,
}

impl Default for LtiContext {
    fn default() -> Self {
        Self {
            id: "unknown".to_owned(),
            title: "Unknown".to_owned(),
            label: None,
            context_type: Vec::new(),
        }
    }
}

/// Grade service snapshot taken at launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgsEndpoint {
    /// Line item collection URL for the resource link
    pub lineitems: String,
    /// Scopes the LMS granted
    #[serde(default)]
    pub scope: Vec<String>,
}

/// Roster service snapshot taken at launch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NrpsEndpoint {
    /// Membership URL for the course context
    pub context_memberships_url: String,
    /// Supported service versions
    #[serde(default)]
    pub service_versions: Vec<String>,
}

/// Verified launch context carried by the bearer session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// LMS user id
    pub sub: String,
    /// Display name
    pub name: String,
    /// Email, empty when the LMS withholds it
    pub email: String,
    /// Role URIs
    pub roles: Vec<String>,
    /// Course context
    pub context: LtiContext,
    /// Platform issuer
    pub issuer: String,
    /// Client id of this tool on the platform
    pub client_id: String,
    /// Deployment id from the launch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    /// Registry id of the platform
    pub platform_id: String,
    /// Grade service snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ags: Option<AgsEndpoint>,
    /// Roster service snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nrps: Option<NrpsEndpoint>,
    /// Issued at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}
