// ABOUTME: Main library entry point for the LTI 1.3 Advantage trust-and-service engine
// ABOUTME: Provides the OIDC launch handshake, dynamic registration, AGS and NRPS clients, and axum routes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # LTI Advantage Server
//!
//! Lets an external assessment tool run inside a Learning Management System
//! using the LTI 1.3 Advantage protocol family.
//!
//! ## Architecture
//!
//! - **Crypto**: the tool's RSA key pair, RS256 signing/verification, remote key sets
//! - **Rewrite**: dev-only outbound URL rewriting with Host header spoofing
//! - **LTI**: launch handshake, dynamic registration, access tokens, AGS, NRPS, grade sync
//! - **Platform store**: the registry of trusted LMS deployments
//! - **Routes**: the axum adapter that turns protocol outcomes into HTTP responses
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lti_advantage_server::config::environment::ServerConfig;
//! use lti_advantage_server::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     let config = ServerConfig::from_env()?;
//!     println!("LTI tool configured on port {}", config.http_port);
//!     Ok(())
//! }
//! ```

/// Environment-driven configuration
pub mod config;

/// Tool key pair, token signing and verification, key sets
pub mod crypto;

/// Unified error handling (re-exported from `lti-core`)
pub mod errors;

/// Outbound HTTP client for LMS endpoints
pub mod lms_http;

/// Structured logging setup
pub mod logging;

/// LTI 1.3 protocol engine
pub mod lti;

/// HTTP middleware (bearer session auth, CORS)
pub mod middleware;

/// Registry of trusted LMS platforms
pub mod platform_store;

/// Dev-only URL rewrite and Host spoof adapter
pub mod rewrite;

/// axum route handlers
pub mod routes;

/// Protocol constants
pub use lti_core::constants;

/// Core data models
pub use lti_core::models;
