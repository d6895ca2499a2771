// ABOUTME: Names and Role Provisioning Services roster member and container types
// ABOUTME: Members are transient and fetched fresh for every roster request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::nrps::STATUS_ACTIVE;

/// One course participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMember {
    /// LMS user id
    pub user_id: String,
    /// Full name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Given name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    /// Family name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    /// Email
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role URNs or short names
    #[serde(default)]
    pub roles: Vec<String>,
    /// Membership status (`Active`, `Inactive`, `Deleted`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl RosterMember {
    /// Members without a status are treated as active
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.as_deref().is_none_or(|s| s == STATUS_ACTIVE)
    }
}

/// One page of a membership listing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MembershipContainer {
    /// Container URL
    #[serde(default)]
    pub id: Option<String>,
    /// Course context echo
    #[serde(default)]
    pub context: Option<Value>,
    /// Members on this page
    #[serde(default)]
    pub members: Vec<RosterMember>,
}
