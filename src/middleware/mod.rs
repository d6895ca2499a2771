// ABOUTME: HTTP middleware for the LTI tool server
// ABOUTME: Session token authentication and CORS configuration
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Bearer session token authentication
pub mod auth;
/// Cross-origin resource sharing
pub mod cors;

pub use auth::{extract_session_token, AuthenticatedSession, SESSION_QUERY_PARAM};
pub use cors::{cors_layer, setup_cors};
