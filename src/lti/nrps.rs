// ABOUTME: Names and Role Provisioning Services client with pagination and role normalisation
// ABOUTME: Follows Link rel="next" headers under a page ceiling and filters members client-side
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::collections::HashSet;

use http::header::LINK;
use tracing::{debug, warn};

use super::access_token::AccessTokenClient;
use super::ags::append_query;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::lms_http::{decode_json, LmsHttpClient};
use crate::models::{MembershipContainer, RosterMember, SessionClaims};
use lti_core::constants::nrps::{
    ALL_ROLES, MEDIA_TYPE_MEMBERSHIP_CONTAINER, SCOPE_MEMBERSHIP_READONLY,
};
use lti_core::constants::roles::SHORT_NAMES;

const SERVICE: &str = "NRPS request";

/// Map a role short name to its LIS URN; unknown values pass through unchanged
#[must_use]
pub fn normalize_role(role: &str) -> String {
    let key = role.trim().to_lowercase();
    SHORT_NAMES
        .iter()
        .find(|(short, _)| *short == key)
        .map_or_else(|| role.trim().to_owned(), |(_, urn)| (*urn).to_owned())
}

/// Segment after `#`, else after the last `/`, lowercased
fn short_role_name(role: &str) -> String {
    role.split_once('#')
        .map_or_else(|| role.rsplit('/').next().unwrap_or(role), |(_, short)| short)
        .to_lowercase()
}

/// Exact match, sub-role prefix match, or case-insensitive short name match
#[must_use]
pub fn member_has_role(member: &RosterMember, role_urn: &str) -> bool {
    let wanted = short_role_name(role_urn);
    member
        .roles
        .iter()
        .any(|r| r == role_urn || r.starts_with(role_urn) || short_role_name(r) == wanted)
}

/// Target of the `rel="next"` entry of a `Link` header
#[must_use]
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params.split(';').any(|param| {
            param
                .trim()
                .strip_prefix("rel=")
                .is_some_and(|rel| rel.trim_matches('"').split_whitespace().any(|r| r == "next"))
        });
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        is_next.then(|| target.trim().to_owned())
    })
}

/// Roster client
#[derive(Clone)]
pub struct NrpsClient {
    http: LmsHttpClient,
    tokens: AccessTokenClient,
    max_pages: usize,
}

impl NrpsClient {
    /// Create a client that fetches at most `max_pages` pages per roster
    #[must_use]
    pub fn new(http: LmsHttpClient, tokens: AccessTokenClient, max_pages: usize) -> Self {
        Self {
            http,
            tokens,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch the roster of the session's course
    ///
    /// `role` is a short name or URN; `"all"` disables role filtering.
    /// Inactive members are always dropped.
    ///
    /// # Errors
    ///
    /// Validation error when the launch granted no roster service; upstream
    /// errors for failed pages or when the page ceiling is exceeded
    pub async fn get_members(&self, session: &SessionClaims, role: &str) -> AppResult<Vec<RosterMember>> {
        let endpoint = session.nrps.as_ref().ok_or_else(|| {
            AppError::invalid_input(
                "NRPS endpoint not available in this context. Ensure the LMS has granted \
                 Names & Roles Provisioning Service permissions.",
            )
            .with_platform_id(&session.platform_id)
        })?;

        let token = self
            .tokens
            .get_access_token(&session.platform_id, &[SCOPE_MEMBERSHIP_READONLY])
            .await?;

        let role_urn = (!role.trim().eq_ignore_ascii_case(ALL_ROLES)).then(|| normalize_role(role));
        let start_url = match &role_urn {
            Some(urn) => append_query(&endpoint.context_memberships_url, "role", urn),
            None => endpoint.context_memberships_url.clone(),
        };

        let members = self
            .fetch_all_pages(&session.platform_id, start_url, &token)
            .await?;

        Ok(members
            .into_iter()
            .filter(RosterMember::is_active)
            .filter(|m| role_urn.as_deref().is_none_or(|urn| member_has_role(m, urn)))
            .collect())
    }

    async fn fetch_all_pages(
        &self,
        platform_id: &str,
        start_url: String,
        token: &str,
    ) -> AppResult<Vec<RosterMember>> {
        let mut members = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(start_url);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                warn!(platform_id, url = %url, "NRPS next link revisits a fetched page, stopping");
                break;
            }
            if visited.len() > self.max_pages {
                return Err(AppError::new(
                    ErrorCode::ExternalServiceError,
                    format!("{SERVICE}: roster exceeds {} pages", self.max_pages),
                )
                .with_platform_id(platform_id)
                .with_resource_id(url));
            }

            let (page, next_url) = self.fetch_page(&url, token).await?;
            debug!(platform_id, url = %url, count = page.members.len(), "Fetched roster page");
            members.extend(page.members);
            next = next_url;
        }
        Ok(members)
    }

    async fn fetch_page(&self, url: &str, token: &str) -> AppResult<(MembershipContainer, Option<String>)> {
        let request = self
            .http
            .get(url, Some(token), MEDIA_TYPE_MEMBERSHIP_CONTAINER);
        let response = LmsHttpClient::send(request, SERVICE).await?;
        let next_url = response
            .headers()
            .get_all(LINK)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(parse_next_link);
        let page = decode_json(response, SERVICE).await?;
        Ok((page, next_url))
    }
}
