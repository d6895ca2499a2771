// ABOUTME: Core data models for the LTI 1.3 Advantage protocol engine
// ABOUTME: Re-exports platform registrations, token payloads, AGS and NRPS resources
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! - `Platform`: a registered LMS deployment, unique on (issuer, client id)
//! - `StateClaims` / `SessionClaims`: payloads of the tool's self-signed tokens
//! - `LineItem`, `Score`, `LineItemResult`: grade service resources
//! - `RosterMember`: one course participant returned by the roster service

mod ags;
mod nrps;
mod platform;
mod session;

pub use ags::{
    ActivityProgress, GradingProgress, LineItem, LineItemContainer, LineItemResult, NewLineItem,
    ResultContainer, Score,
};
pub use nrps::{MembershipContainer, RosterMember};
pub use platform::{NewPlatform, Platform};
pub use session::{AgsEndpoint, LtiContext, NrpsEndpoint, SessionClaims, StateClaims};
