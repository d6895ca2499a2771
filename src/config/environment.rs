// ABOUTME: Environment configuration management for deployment-specific settings
// ABOUTME: Handles environment variables, deployment modes, key material, and outbound limits
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Environment-based configuration management for production deployment

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::lti::EngineSettings;
use crate::rewrite::UrlRewriter;
use lti_core::constants::nrps::DEFAULT_MAX_PAGES;

/// Default HTTP port
const DEFAULT_HTTP_PORT: u16 = 3000;
/// Default browser-facing base URL
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
/// Default platform registry location
const DEFAULT_DATABASE_URL: &str = "sqlite:./data/lti.db";
/// Outbound request timeout
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
/// Outbound connect timeout
const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 5;
/// Access token cache lifetime (4 minutes)
const DEFAULT_TOKEN_CACHE_SECS: u64 = 240;
/// Tool name advertised during registration
const DEFAULT_TOOL_NAME: &str = "LTI Assessment Tool";
/// Tool description advertised during registration
const DEFAULT_TOOL_DESCRIPTION: &str = "Assessment plugin for LTI 1.3 Advantage platforms";

/// Environment type for security and other configurations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (plain http allowed)
    #[default]
    Development,
    /// Production deployment
    Production,
    /// Automated tests
    Testing,
}

impl Environment {
    /// Parse from string with fallback
    #[must_use]
    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "testing" | "test" => Self::Testing,
            _ => Self::Development,
        }
    }

    /// Check if this is a production environment
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
            Self::Testing => write!(f, "testing"),
        }
    }
}

/// PEM key material that never shows up in logs or debug output
#[derive(Clone, Default)]
pub struct KeyMaterial(String);

impl KeyMaterial {
    /// Wrap PEM text, expanding literal `\n` escapes from single-line env values
    #[must_use]
    pub fn from_env_value(raw: &str) -> Self {
        Self(raw.replace("\\n", "\n"))
    }

    /// PEM text
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial([redacted; {} bytes])", self.0.len())
    }
}

/// Platform registry location
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
}

/// Cross-origin settings for the protected dashboard API
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Comma-separated origins, or `*`
    pub allowed_origins: String,
}

/// Bounds for every outbound LMS call
#[derive(Debug, Clone, Copy)]
pub struct HttpClientConfig {
    /// Whole-request timeout
    pub timeout_secs: u64,
    /// TCP/TLS connect timeout
    pub connect_timeout_secs: u64,
}

/// Branding advertised in the registration document
#[derive(Debug, Clone)]
pub struct ToolIdentity {
    /// `client_name`
    pub name: String,
    /// Tool configuration description
    pub description: String,
    /// `logo_uri`, omitted when unset
    pub logo_uri: Option<String>,
}

/// Server configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port
    pub http_port: u16,
    /// Deployment mode
    pub environment: Environment,
    /// Browser-facing base URL (login, launch, dashboard)
    pub public_url: String,
    /// LMS-reachable base URL (key set endpoint)
    pub tool_url: String,
    /// Tool RSA private key
    pub lti_key: KeyMaterial,
    /// Outbound URL rewrite table
    pub rewrites: UrlRewriter,
    /// Platform registry
    pub database: DatabaseConfig,
    /// Origins allowed to frame the registration page
    pub lms_origins: Vec<String>,
    /// Dashboard CORS
    pub cors: CorsConfig,
    /// Outbound call bounds
    pub http_client: HttpClientConfig,
    /// Access token cache lifetime, 0 disables caching
    pub token_cache_secs: u64,
    /// Roster pagination ceiling
    pub nrps_max_pages: usize,
    /// Registration branding
    pub tool: ToolIdentity,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `LTI_KEY` is missing, a numeric
    /// variable does not parse, or a base URL is not a valid URL
    pub fn from_env() -> AppResult<Self> {
        info!("Loading configuration from environment variables");

        let lti_key = match env::var("LTI_KEY") {
            Ok(raw) if !raw.trim().is_empty() => KeyMaterial::from_env_value(&raw),
            _ => {
                return Err(AppError::new(
                    ErrorCode::ConfigMissing,
                    "LTI_KEY environment variable is not set",
                ))
            }
        };

        let public_url = trim_base_url(&first_env_var(
            &["PUBLIC_URL", "NEXT_PUBLIC_APP_URL", "UI_URL", "SERVER_URL"],
            DEFAULT_PUBLIC_URL,
        ));
        let tool_url = env::var("TOOL_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(|| public_url.clone(), |v| trim_base_url(&v));

        let config = Self {
            http_port: parse_env("HTTP_PORT", DEFAULT_HTTP_PORT)?,
            environment: Environment::from_str_or_default(&env_var_or(
                "ENVIRONMENT",
                "development",
            )),
            public_url,
            tool_url,
            lti_key,
            rewrites: UrlRewriter::parse(&env_var_or("DEV_LTI_REWRITES", "")),
            database: DatabaseConfig {
                url: env_var_or("DATABASE_URL", DEFAULT_DATABASE_URL),
            },
            lms_origins: parse_origins(&env_var_or("LMS_ORIGINS", "*")),
            cors: CorsConfig {
                allowed_origins: env_var_or("CORS_ALLOWED_ORIGINS", "*"),
            },
            http_client: HttpClientConfig {
                timeout_secs: parse_env("LTI_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?,
                connect_timeout_secs: parse_env(
                    "LTI_HTTP_CONNECT_TIMEOUT_SECS",
                    DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
                )?,
            },
            token_cache_secs: parse_env("LTI_TOKEN_CACHE_SECS", DEFAULT_TOKEN_CACHE_SECS)?,
            nrps_max_pages: parse_env("NRPS_MAX_PAGES", DEFAULT_MAX_PAGES)?,
            tool: ToolIdentity {
                name: env_var_or("TOOL_NAME", DEFAULT_TOOL_NAME),
                description: env_var_or("TOOL_DESCRIPTION", DEFAULT_TOOL_DESCRIPTION),
                logo_uri: env::var("TOOL_LOGO_URI")
                    .ok()
                    .filter(|v| !v.trim().is_empty()),
            },
        };

        config.validate()?;
        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a configuration error for unusable base URLs or limits
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [("PUBLIC_URL", &self.public_url), ("TOOL_URL", &self.tool_url)] {
            Url::parse(value).map_err(|e| {
                AppError::new(ErrorCode::ConfigInvalid, format!("{name} is not a valid URL: {e}"))
            })?;
        }
        if self.nrps_max_pages == 0 {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "NRPS_MAX_PAGES must be at least 1",
            ));
        }
        if self.environment.is_production() && !self.rewrites.is_empty() {
            warn!("DEV_LTI_REWRITES is set in production; outbound LMS URLs will be rewritten");
        }
        Ok(())
    }

    /// Protocol engine settings derived from this configuration
    #[must_use]
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            public_url: self.public_url.clone(),
            tool_url: self.tool_url.clone(),
            require_https_registration: self.environment.is_production(),
            http_timeout_secs: self.http_client.timeout_secs,
            http_connect_timeout_secs: self.http_client.connect_timeout_secs,
            token_cache_secs: self.token_cache_secs,
            nrps_max_pages: self.nrps_max_pages,
            tool_name: self.tool.name.clone(),
            tool_description: self.tool.description.clone(),
            tool_logo_uri: self.tool.logo_uri.clone(),
        }
    }

    /// `frame-ancestors` source list for the registration close page
    #[must_use]
    pub fn frame_ancestors(&self) -> String {
        if self.lms_origins.is_empty() {
            "*".to_owned()
        } else {
            self.lms_origins.join(" ")
        }
    }

    /// Get a summary of the configuration for logging (without secrets)
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "LTI Server Configuration:\n\
             - HTTP Port: {}\n\
             - Environment: {}\n\
             - Public URL: {}\n\
             - Tool URL: {}\n\
             - Database: {}\n\
             - URL Rewrites: {}\n\
             - Token Cache: {}s\n\
             - NRPS Max Pages: {}",
            self.http_port,
            self.environment,
            self.public_url,
            self.tool_url,
            self.database.url,
            self.rewrites.len(),
            self.token_cache_secs,
            self.nrps_max_pages,
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// First non-empty variable among `keys`, else `default`
fn first_env_var(keys: &[&str], default: &str) -> String {
    keys.iter()
        .filter_map(|key| env::var(key).ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_owned())
}

/// Parse a numeric variable, falling back to `default` when unset
fn parse_env<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|e| {
            AppError::new(ErrorCode::ConfigInvalid, format!("Invalid {key} value: {e}"))
        }),
        _ => Ok(default),
    }
}

/// Drop trailing slashes so paths can be appended with `format!`
fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_owned()
}

/// Parse comma-separated origins
fn parse_origins(origins_str: &str) -> Vec<String> {
    if origins_str.trim() == "*" {
        vec!["*".to_owned()]
    } else {
        origins_str
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins() {
        assert_eq!(parse_origins("*"), vec!["*"]);
        assert_eq!(
            parse_origins("https://lms.example.edu, https://canvas.example.com ,"),
            vec!["https://lms.example.edu", "https://canvas.example.com"]
        );
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::from_str_or_default("PROD"),
            Environment::Production
        );
        assert_eq!(Environment::from_str_or_default("test"), Environment::Testing);
        assert_eq!(
            Environment::from_str_or_default("staging"),
            Environment::Development
        );
    }

    #[test]
    fn test_key_material_expands_escapes_and_redacts() {
        let key = KeyMaterial::from_env_value("-----BEGIN-----\\nabc\\n-----END-----");
        assert_eq!(key.expose(), "-----BEGIN-----\nabc\n-----END-----");
        assert!(!format!("{key:?}").contains("abc"));
    }

    #[test]
    fn test_trim_base_url() {
        assert_eq!(trim_base_url("https://tool.example.com/ "), "https://tool.example.com");
    }
}
