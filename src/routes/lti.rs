// ABOUTME: LTI protocol endpoints: OIDC login, launch, dynamic registration, and the tool key set
// ABOUTME: Thin handlers that translate engine outcomes into redirects, pages, and JSON
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! LTI routes
//!
//! - `GET|POST /api/lti/login`: 302 to the platform authorization endpoint
//! - `POST /api/lti/launch`: 302 to the dashboard with the session token
//! - `GET /api/lti/register`: dynamic registration, answers with the close page
//! - `GET /api/lti/keys`, `GET /.well-known/jwks.json`: the tool key set

use std::sync::Arc;

use axum::{
    extract::{Form, Query, State},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http::{
    header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, LOCATION, PRAGMA, X_FRAME_OPTIONS},
    HeaderValue, StatusCode,
};
use serde::Deserialize;
use url::Url;

use super::ServerResources;
use crate::errors::{AppError, AppResult};
use crate::lti::{close_page_html, LoginRequest, RegistrationRequest};
use crate::middleware::SESSION_QUERY_PARAM;
use lti_core::constants::lifetimes::JWKS_MAX_AGE_SECS;
use lti_core::constants::registration::{DASHBOARD_PATH, KEYS_PATH, LAUNCH_PATH, LOGIN_PATH};

/// Launch form posted by the platform
#[derive(Debug, Deserialize)]
struct LaunchForm {
    #[serde(default)]
    id_token: String,
    #[serde(default)]
    state: String,
}

/// LTI protocol routes
pub struct LtiRoutes;

impl LtiRoutes {
    /// Create all LTI protocol routes
    pub fn routes(resources: Arc<ServerResources>) -> Router {
        Router::new()
            .route(
                LOGIN_PATH,
                get(Self::handle_login_get).post(Self::handle_login_post),
            )
            .route(LAUNCH_PATH, post(Self::handle_launch))
            .route("/api/lti/register", get(Self::handle_register))
            .route(KEYS_PATH, get(Self::handle_keys))
            .route("/.well-known/jwks.json", get(Self::handle_keys))
            .with_state(resources)
    }

    async fn handle_login_get(
        State(resources): State<Arc<ServerResources>>,
        Query(request): Query<LoginRequest>,
    ) -> AppResult<Response> {
        Self::login(&resources, &request).await
    }

    async fn handle_login_post(
        State(resources): State<Arc<ServerResources>>,
        Form(request): Form<LoginRequest>,
    ) -> AppResult<Response> {
        Self::login(&resources, &request).await
    }

    async fn login(resources: &ServerResources, request: &LoginRequest) -> AppResult<Response> {
        let redirect = resources.engine.launch().initiate_login(request).await?;
        found(&redirect.url)
    }

    async fn handle_launch(
        State(resources): State<Arc<ServerResources>>,
        Form(form): Form<LaunchForm>,
    ) -> AppResult<Response> {
        let outcome = resources
            .engine
            .launch()
            .verify_launch(&form.id_token, &form.state)
            .await?;

        let dashboard = format!("{}{DASHBOARD_PATH}", resources.engine.settings().public_url);
        let mut url = Url::parse(&dashboard)
            .map_err(|e| AppError::config(format!("Invalid dashboard URL {dashboard}: {e}")))?;
        url.query_pairs_mut()
            .append_pair(SESSION_QUERY_PARAM, &outcome.session_token);
        found(url.as_str())
    }

    async fn handle_register(
        State(resources): State<Arc<ServerResources>>,
        Query(request): Query<RegistrationRequest>,
    ) -> AppResult<Response> {
        resources.engine.registration().register(&request).await?;

        let csp = format!(
            "default-src 'none'; script-src 'unsafe-inline'; frame-ancestors {};",
            resources.frame_ancestors
        );
        let csp = HeaderValue::from_str(&csp)
            .map_err(|e| AppError::config(format!("Invalid LMS_ORIGINS for CSP: {e}")))?;

        Ok((
            [
                (CONTENT_SECURITY_POLICY, csp),
                (X_FRAME_OPTIONS, HeaderValue::from_static("ALLOWALL")),
                (
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-store, no-cache, must-revalidate"),
                ),
                (PRAGMA, HeaderValue::from_static("no-cache")),
            ],
            Html(close_page_html()),
        )
            .into_response())
    }

    async fn handle_keys(State(resources): State<Arc<ServerResources>>) -> Response {
        let cache = format!("public, max-age={JWKS_MAX_AGE_SECS}");
        let mut response = Json(resources.engine.keys().jwks()).into_response();
        if let Ok(value) = HeaderValue::from_str(&cache) {
            response.headers_mut().insert(CACHE_CONTROL, value);
        }
        response
    }
}

/// 302 Found with a `Location` header
fn found(location: &str) -> AppResult<Response> {
    let location = HeaderValue::from_str(location)
        .map_err(|e| AppError::internal(format!("Redirect target is not a valid header: {e}")))?;
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}
