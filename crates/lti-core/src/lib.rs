// ABOUTME: Core types and constants for the LTI 1.3 Advantage protocol engine
// ABOUTME: Foundation crate with error handling, protocol constants, and the platform/service data model
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # LTI Core
//!
//! Foundation crate providing shared types and constants for the LTI 1.3
//! trust-and-service engine. This crate is designed to change infrequently,
//! enabling incremental compilation benefits in the workspace.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError`, `ErrorCode`, and the protocol error taxonomy
//! - **constants**: Claim URIs, OAuth scopes, media types, token lifetimes, role vocabulary
//! - **models**: Platform registrations, token payloads, AGS and NRPS resources

/// Unified error handling system with standard error codes and HTTP responses
pub mod errors;

/// Protocol constants grouped by IMS service
pub mod constants;

/// Core data models (Platform, session claims, line items, roster members)
pub mod models;
