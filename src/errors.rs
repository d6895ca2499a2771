// ABOUTME: Unified error handling for the server crate, re-exported from lti-core
// ABOUTME: Keeps `crate::errors::AppError` paths stable for handlers and protocol code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Re-exports of the workspace error type.

pub use lti_core::errors::{
    AppError, AppResult, ErrorCategory, ErrorCode, ErrorContext, ErrorResponse,
    ErrorResponseDetails,
};
