// ABOUTME: Route module organization for the LTI tool HTTP endpoints
// ABOUTME: Shares one engine through ServerResources and assembles the application router
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Route module
//!
//! Each domain module holds route definitions and thin handlers that delegate
//! to the protocol engine.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use http::{header::X_CONTENT_TYPE_OPTIONS, HeaderValue, StatusCode};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer, set_header::SetResponseHeaderLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::lti::LtiEngine;

/// Session-authenticated dashboard API
pub mod api;
/// Liveness and readiness
pub mod health;
/// LTI protocol endpoints
pub mod lti;

pub use api::ApiRoutes;
pub use health::HealthRoutes;
pub use lti::LtiRoutes;

/// Upper bound for a whole inbound request, outbound LMS calls included
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// State shared by every handler
pub struct ServerResources {
    /// The protocol engine
    pub engine: LtiEngine,
    /// `frame-ancestors` source list for the registration close page
    pub frame_ancestors: String,
}

impl ServerResources {
    /// Bundle the engine with HTTP-only settings
    #[must_use]
    pub fn new(engine: LtiEngine, frame_ancestors: impl Into<String>) -> Self {
        Self {
            engine,
            frame_ancestors: frame_ancestors.into(),
        }
    }
}

/// Build the full application router
///
/// CORS applies to the dashboard API only; LTI endpoints are reached by
/// browser navigation and LMS servers.
pub fn build_router(resources: Arc<ServerResources>, cors: CorsLayer) -> Router {
    Router::new()
        .merge(LtiRoutes::routes(Arc::clone(&resources)))
        .merge(ApiRoutes::routes(Arc::clone(&resources)).layer(cors))
        .merge(HealthRoutes::routes(resources))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    Duration::from_secs(REQUEST_TIMEOUT_SECS),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                )),
        )
}
