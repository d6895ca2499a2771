// ABOUTME: Dashboard API routes authenticated by the launch session token
// ABOUTME: Session info, course roster, and grade results with best-effort roster enrichment
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Protected API routes
//!
//! These handlers are the only place where protocol failures are softened
//! into empty results; the engine itself always reports them.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ServerResources;
use crate::errors::AppResult;
use crate::middleware::AuthenticatedSession;
use crate::models::{RosterMember, SessionClaims};
use lti_core::constants::nrps::{ALL_ROLES, DEFAULT_ROLE, STATUS_ACTIVE};

const NRPS_UNAVAILABLE: &str = "Names & Roles Provisioning Service (NRPS) is not available for \
this LMS context. Ask your LMS administrator to enable the service and grant access to this tool.";

#[derive(Debug, Deserialize)]
struct MembersQuery {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ScoresQuery {
    assessment_id: String,
}

/// One roster entry as the dashboard sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberView {
    /// LMS user id
    pub user_id: String,
    /// Name, if released
    pub name: Option<String>,
    /// Email, if released
    pub email: Option<String>,
    /// Role URIs
    pub roles: Vec<String>,
    /// Membership status, `Active` when the LMS omits it
    pub status: String,
}

impl From<RosterMember> for MemberView {
    fn from(member: RosterMember) -> Self {
        Self {
            user_id: member.user_id,
            name: member.name,
            email: member.email,
            roles: member.roles,
            status: member.status.unwrap_or_else(|| STATUS_ACTIVE.to_owned()),
        }
    }
}

/// Roster response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersResponse {
    /// Members after filtering
    pub members: Vec<MemberView>,
    /// Course context id
    pub context_id: String,
    /// Role that was requested
    pub role: String,
    /// Number of members
    pub total: usize,
    /// Set when the launch granted no roster service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// One result row enriched with roster details
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreView {
    /// Student user id
    pub user_id: String,
    /// Student name from the roster
    pub user_name: Option<String>,
    /// Student email from the roster
    pub user_email: Option<String>,
    /// Score recorded
    pub score_given: Option<f64>,
    /// Score maximum
    pub score_maximum: Option<f64>,
    /// Gradebook comment
    pub comment: Option<String>,
}

/// Scores response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoresResponse {
    /// Results for the assessment's line item
    pub scores: Vec<ScoreView>,
}

/// Session-authenticated dashboard routes
pub struct ApiRoutes;

impl ApiRoutes {
    /// Create all protected API routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route("/api/me", get(Self::handle_me))
            .route("/api/members", get(Self::handle_members))
            .route("/api/scores", get(Self::handle_scores))
            .with_state(resources)
    }

    async fn handle_me(AuthenticatedSession(session): AuthenticatedSession) -> Json<SessionClaims> {
        Json(session)
    }

    async fn handle_members(
        State(resources): State<Arc<ServerResources>>,
        AuthenticatedSession(session): AuthenticatedSession,
        Query(query): Query<MembersQuery>,
    ) -> AppResult<Json<MembersResponse>> {
        let role = query
            .role
            .map(|r| r.trim().to_owned())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_owned());

        if session.nrps.is_none() {
            return Ok(Json(MembersResponse {
                members: Vec::new(),
                context_id: session.context.id,
                role,
                total: 0,
                warning: Some(NRPS_UNAVAILABLE.to_owned()),
            }));
        }

        let members: Vec<MemberView> = resources
            .engine
            .nrps()
            .get_members(&session, &role)
            .await?
            .into_iter()
            .map(MemberView::from)
            .collect();

        Ok(Json(MembersResponse {
            total: members.len(),
            members,
            context_id: session.context.id,
            role,
            warning: None,
        }))
    }

    async fn handle_scores(
        State(resources): State<Arc<ServerResources>>,
        AuthenticatedSession(session): AuthenticatedSession,
        Query(query): Query<ScoresQuery>,
    ) -> AppResult<Json<ScoresResponse>> {
        let Some(ags) = &session.ags else {
            return Ok(Json(ScoresResponse { scores: Vec::new() }));
        };
        let engine = &resources.engine;

        let Some(line_item) = engine
            .ags()
            .find_line_item(&session.platform_id, &ags.lineitems, &query.assessment_id)
            .await
        else {
            return Ok(Json(ScoresResponse { scores: Vec::new() }));
        };

        let results = engine
            .ags()
            .get_scores(&session.platform_id, &line_item.id)
            .await?;

        let roster: HashMap<String, RosterMember> = if session.nrps.is_some() {
            match engine.nrps().get_members(&session, ALL_ROLES).await {
                Ok(members) => members
                    .into_iter()
                    .map(|m| (m.user_id.clone(), m))
                    .collect(),
                Err(e) => {
                    warn!(platform_id = %session.platform_id, error = %e, "Roster enrichment skipped");
                    HashMap::new()
                }
            }
        } else {
            HashMap::new()
        };

        let scores = results
            .into_iter()
            .map(|result| {
                let member = roster.get(&result.user_id);
                ScoreView {
                    user_name: member.and_then(|m| m.name.clone()),
                    user_email: member.and_then(|m| m.email.clone()),
                    user_id: result.user_id,
                    score_given: result.result_score,
                    score_maximum: result.result_maximum,
                    comment: result.comment,
                }
            })
            .collect();

        Ok(Json(ScoresResponse { scores }))
    }
}
