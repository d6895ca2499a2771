// ABOUTME: LTI 1.3 Advantage protocol engine: launch, registration, tokens, grades, and rosters
// ABOUTME: Components are built once by LtiEngine and shared by the HTTP layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # LTI Protocol Engine
//!
//! - [`LaunchHandshake`]: OIDC third-party login and launch verification
//! - [`DynamicRegistration`]: tool self-registration with an LMS
//! - [`AccessTokenClient`]: OAuth2 client credentials with a signed assertion
//! - [`AgsClient`] / [`GradeSync`]: line items and score passback
//! - [`NrpsClient`]: course rosters

/// OAuth2 assertion client
pub mod access_token;
/// Assignment and Grade Services
pub mod ags;
/// Engine wiring
pub mod engine;
/// Batch grade passback
pub mod grading;
/// OIDC launch handshake
pub mod launch;
/// Names and Role Provisioning Services
pub mod nrps;
/// Dynamic registration
pub mod registration;

pub use access_token::{AccessTokenClient, TokenResponse};
pub use ags::{AgsClient, ScoreSubmission};
pub use engine::{EngineSettings, LtiEngine};
pub use grading::{Grade, GradeSync, GradeTarget, SubmissionOutcome, SubmissionStatus};
pub use launch::{LaunchHandshake, LaunchOutcome, LoginRedirect, LoginRequest};
pub use nrps::{member_has_role, normalize_role, parse_next_link, NrpsClient};
pub use registration::{
    close_page_html, DynamicRegistration, OpenIdConfiguration, RegistrationOutcome,
    RegistrationRequest, ToolRegistration,
};
