// ABOUTME: Configuration module for environment-driven server settings
// ABOUTME: All settings come from environment variables, no config files
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Environment-based configuration for the LTI tool
pub mod environment;
