// ABOUTME: Bearer session token authentication for protected dashboard API routes
// ABOUTME: Accepts the token from the Authorization header or the ltik query parameter
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use http::{header::AUTHORIZATION, request::Parts, HeaderMap};
use tracing::debug;
use url::form_urlencoded;

use crate::errors::AppError;
use crate::models::SessionClaims;
use crate::routes::ServerResources;

/// Query parameter the launch redirect carries the session token in
pub const SESSION_QUERY_PARAM: &str = "ltik";

/// Verified launch session of the caller
#[derive(Debug, Clone)]
pub struct AuthenticatedSession(pub SessionClaims);

/// Session token from `Authorization: Bearer ...`, else from `?ltik=`
#[must_use]
pub fn extract_session_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    from_header.or_else(|| {
        form_urlencoded::parse(query?.as_bytes())
            .find(|(key, _)| key == SESSION_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|token| !token.is_empty())
    })
}

#[async_trait]
impl FromRequestParts<Arc<ServerResources>> for AuthenticatedSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        resources: &Arc<ServerResources>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers, parts.uri.query())
            .ok_or_else(AppError::auth_required)?;

        let session = resources.engine.launch().verify_session(&token).map_err(|e| {
            debug!(code = ?e.code, "Session token rejected");
            e
        })?;
        Ok(Self(session))
    }
}
