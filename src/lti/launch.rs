// ABOUTME: OIDC third-party login initiation and LTI 1.3 launch verification
// ABOUTME: Issues signed state at login and turns a verified id_token into a signed session token
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # OIDC Launch Handshake
//!
//! `LoginInitiated -> StateIssued -> LaunchVerified -> SessionIssued`
//!
//! Verification order at launch: state token, platform, `kid`, platform key,
//! signature, issuer, audience, nonce. Nothing is created unless every check
//! passes.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::crypto::{decode_unverified, fetch_remote_key, random_nonce, verify_with_key, ToolKeyPair};
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::lms_http::LmsHttpClient;
use crate::logging::LtiLogger;
use crate::models::{AgsEndpoint, LtiContext, NrpsEndpoint, Platform, SessionClaims, StateClaims};
use crate::platform_store::PlatformStore;
use lti_core::constants::claims::{
    AGS_ENDPOINT, CONTEXT, DEPLOYMENT_ID, MESSAGE_TYPE, NRPS_SERVICE, ROLES, TARGET_LINK_URI,
};
use lti_core::constants::lifetimes::{SESSION_TOKEN_SECS, STATE_TOKEN_SECS};
use lti_core::constants::nrps::DEFAULT_SERVICE_VERSION;
use lti_core::constants::oidc::{PROMPT, RESPONSE_MODE, RESPONSE_TYPE, SCOPE};
use lti_core::constants::registration::LAUNCH_PATH;

/// Third-party initiated login parameters (query string or form)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    /// Platform issuer
    pub iss: Option<String>,
    /// Opaque user hint, echoed back to the platform
    pub login_hint: Option<String>,
    /// Client id, disambiguates multiple registrations of one issuer
    pub client_id: Option<String>,
    /// Launch target
    pub target_link_uri: Option<String>,
    /// Opaque message hint, echoed back to the platform
    pub lti_message_hint: Option<String>,
    /// Deployment the login is for
    pub lti_deployment_id: Option<String>,
}

/// Redirect to the platform authorization endpoint
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    /// Full authorization URL with query parameters
    pub url: String,
    /// Signed state token
    pub state: String,
    /// Nonce the id_token must echo
    pub nonce: String,
    /// Platform the login resolved to
    pub platform_id: String,
}

/// Result of a verified launch
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    /// Signed bearer session token
    pub session_token: String,
    /// The claims inside `session_token`
    pub session: SessionClaims,
    /// `LtiResourceLinkRequest`, `LtiDeepLinkingRequest`, ...
    pub message_type: Option<String>,
    /// Launch target
    pub target_link_uri: Option<String>,
}

/// `aud` may be a single string or an array
fn audience_contains(aud: Option<&Value>, client_id: &str) -> bool {
    match aud {
        Some(Value::String(aud)) => aud == client_id,
        Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(client_id)),
        _ => false,
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContextClaim {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(rename = "type", default)]
    context_type: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct AgsClaim {
    #[serde(default)]
    scope: Option<Vec<String>>,
    #[serde(default)]
    lineitems: Option<String>,
    #[serde(default)]
    lineitem: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct NrpsClaim {
    #[serde(default)]
    context_memberships_url: Option<String>,
    #[serde(default)]
    service_versions: Option<Vec<String>>,
}

/// The id_token claims this tool reads after issuer, audience, and nonce pass
///
/// Every field is optional; a null or malformed claim reads as absent.
#[derive(Debug, Clone)]
struct LaunchClaims {
    sub: Option<String>,
    name: Option<String>,
    given_name: Option<String>,
    email: Option<String>,
    message_type: Option<String>,
    roles: Vec<String>,
    context: Option<ContextClaim>,
    deployment_id: Option<String>,
    target_link_uri: Option<String>,
    ags: Option<AgsClaim>,
    nrps: Option<NrpsClaim>,
}

impl LaunchClaims {
    fn from_value(claims: &Value) -> Self {
        let text = |key: &str| claims.get(key).and_then(Value::as_str).map(str::to_owned);
        let roles = claims
            .get(ROLES)
            .and_then(Value::as_array)
            .map(|roles| {
                roles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            sub: text("sub"),
            name: text("name"),
            given_name: text("given_name"),
            email: text("email"),
            message_type: text(MESSAGE_TYPE),
            roles,
            context: optional_claim(claims, CONTEXT),
            deployment_id: text(DEPLOYMENT_ID),
            target_link_uri: text(TARGET_LINK_URI),
            ags: optional_claim(claims, AGS_ENDPOINT),
            nrps: optional_claim(claims, NRPS_SERVICE),
        }
    }
}

fn optional_claim<T: DeserializeOwned>(claims: &Value, key: &str) -> Option<T> {
    let value = claims.get(key).filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(claim) => Some(claim),
        Err(e) => {
            debug!(claim = key, error = %e, "Ignoring malformed launch claim");
            None
        }
    }
}

/// The two-call OIDC state machine
#[derive(Clone)]
pub struct LaunchHandshake {
    keys: Arc<ToolKeyPair>,
    store: Arc<dyn PlatformStore>,
    http: LmsHttpClient,
    redirect_uri: String,
}

impl LaunchHandshake {
    /// Create the handshake; `public_url` is the browser-facing base URL
    #[must_use]
    pub fn new(
        keys: Arc<ToolKeyPair>,
        store: Arc<dyn PlatformStore>,
        http: LmsHttpClient,
        public_url: &str,
    ) -> Self {
        Self {
            keys,
            store,
            http,
            redirect_uri: format!("{public_url}{LAUNCH_PATH}"),
        }
    }

    /// Redirect URI registered with platforms
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Handle a third-party initiated login
    ///
    /// # Errors
    ///
    /// Validation error when `iss` or `login_hint` is missing, `NotFound` when
    /// no platform is registered for the issuer
    pub async fn initiate_login(&self, request: &LoginRequest) -> AppResult<LoginRedirect> {
        let issuer = non_empty(request.iss.as_deref()).ok_or_else(|| {
            AppError::invalid_input("Missing required parameters: iss, login_hint")
        })?;
        let login_hint = non_empty(request.login_hint.as_deref()).ok_or_else(|| {
            AppError::invalid_input("Missing required parameters: iss, login_hint")
        })?;

        let platform = self
            .store
            .find_by_issuer(issuer, non_empty(request.client_id.as_deref()))
            .await?
            .ok_or_else(|| AppError::not_found(format!("Platform for issuer {issuer}")))?;

        let nonce = random_nonce();
        let state_claims = StateClaims {
            nonce: nonce.clone(),
            platform_id: platform.id.clone(),
            iat: None,
            exp: None,
        };
        let state = self.keys.sign(&state_claims, STATE_TOKEN_SECS, None)?;

        // lti_message_hint wins; otherwise the target link stands in for it
        let message_hint = non_empty(request.lti_message_hint.as_deref())
            .or_else(|| non_empty(request.target_link_uri.as_deref()));

        let mut params = vec![
            ("scope", SCOPE),
            ("response_type", RESPONSE_TYPE),
            ("response_mode", RESPONSE_MODE),
            ("prompt", PROMPT),
            ("client_id", platform.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("login_hint", login_hint),
            ("state", state.as_str()),
            ("nonce", nonce.as_str()),
        ];
        if let Some(hint) = message_hint {
            params.push(("lti_message_hint", hint));
        }
        if let Some(deployment_id) = non_empty(request.lti_deployment_id.as_deref()) {
            params.push(("lti_deployment_id", deployment_id));
        }
        let url = authorization_url(&platform, &params)?;

        debug!(platform_id = %platform.id, issuer, "OIDC login initiated");
        Ok(LoginRedirect {
            url,
            state,
            nonce,
            platform_id: platform.id,
        })
    }

    /// Verify the platform's form post and issue a session token
    ///
    /// # Errors
    ///
    /// Validation for a bad state token or missing `kid`, `NotFound` for an
    /// unknown platform, `KeyNotFound`/upstream for key set problems, token
    /// errors for a bad signature, then issuer/audience/nonce mismatches
    pub async fn verify_launch(&self, id_token: &str, state: &str) -> AppResult<LaunchOutcome> {
        if id_token.is_empty() || state.is_empty() {
            return Err(AppError::invalid_input("Missing id_token or state"));
        }

        let state_claims: StateClaims = self.keys.verify_self(state).map_err(|e| {
            warn!(error = %e, "Launch rejected: invalid state token");
            AppError::invalid_input(format!("Invalid state: {}", e.message)).with_source(e)
        })?;

        let platform = self
            .store
            .find_by_id(&state_claims.platform_id)
            .await?
            .ok_or_else(|| AppError::not_found("Platform"))?;

        let decoded = decode_unverified(id_token)
            .map_err(|e| AppError::invalid_input(format!("Invalid id_token: {}", e.message)))?;
        let kid = decoded
            .kid()
            .ok_or_else(|| AppError::invalid_input("id_token missing kid in header"))?
            .to_owned();

        let platform_key = fetch_remote_key(&self.http, &platform.keyset_url, &kid)
            .await
            .map_err(|e| e.with_platform_id(&platform.id))?;
        let raw_claims: Value = verify_with_key(id_token, &platform_key)?;
        validate_claims(&raw_claims, &platform, &state_claims.nonce)?;

        let claims = LaunchClaims::from_value(&raw_claims);
        let message_type = claims.message_type.clone();
        let target_link_uri = claims.target_link_uri.clone();
        let session = build_session(claims, &platform);
        let session_token = self.keys.sign(&session, SESSION_TOKEN_SECS, None)?;

        LtiLogger::log_launch(
            &platform.id,
            &platform.issuer,
            &session.sub,
            message_type.as_deref().unwrap_or("unknown"),
        );
        Ok(LaunchOutcome {
            session_token,
            session,
            message_type,
            target_link_uri,
        })
    }

    /// Verify a bearer session token issued by [`Self::verify_launch`]
    ///
    /// # Errors
    ///
    /// Token errors for expired, forged, or malformed tokens
    pub fn verify_session(&self, token: &str) -> AppResult<SessionClaims> {
        self.keys.verify_self(token)
    }
}

/// Issuer, audience, then nonce
fn validate_claims(claims: &Value, platform: &Platform, nonce: &str) -> AppResult<()> {
    let issuer = claims
        .get("iss")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if issuer != platform.issuer {
        return Err(AppError::new(
            ErrorCode::IssuerMismatch,
            format!("Issuer mismatch: expected {}, got {issuer}", platform.issuer),
        )
        .with_platform_id(&platform.id));
    }

    if !audience_contains(claims.get("aud"), &platform.client_id) {
        return Err(AppError::new(ErrorCode::AudienceMismatch, "Audience mismatch")
            .with_platform_id(&platform.id));
    }

    if claims.get("nonce").and_then(Value::as_str) != Some(nonce) {
        return Err(
            AppError::new(ErrorCode::NonceMismatch, "Nonce mismatch").with_platform_id(&platform.id)
        );
    }
    Ok(())
}

/// Snapshot the launch context and service endpoints
fn build_session(claims: LaunchClaims, platform: &Platform) -> SessionClaims {
    let context = claims.context.map_or_else(LtiContext::default, |ctx| {
        let fallback = LtiContext::default();
        LtiContext {
            id: ctx.id.unwrap_or(fallback.id),
            title: ctx
                .title
                .filter(|t| !t.is_empty())
                .or_else(|| ctx.label.clone())
                .unwrap_or(fallback.title),
            label: ctx.label,
            context_type: ctx.context_type.unwrap_or_default(),
        }
    });

    let ags = claims.ags.and_then(|ags| {
        ags.lineitems.or(ags.lineitem).map(|lineitems| AgsEndpoint {
            lineitems,
            scope: ags.scope.unwrap_or_default(),
        })
    });

    // A roster claim without a memberships URL grants nothing
    let nrps = claims.nrps.and_then(|nrps| {
        let url = nrps.context_memberships_url.filter(|u| !u.is_empty())?;
        Some(NrpsEndpoint {
            context_memberships_url: url,
            service_versions: nrps
                .service_versions
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| vec![DEFAULT_SERVICE_VERSION.to_owned()]),
        })
    });

    SessionClaims {
        sub: claims.sub.unwrap_or_default(),
        name: non_empty(claims.name.as_deref())
            .or_else(|| non_empty(claims.given_name.as_deref()))
            .unwrap_or("Unknown")
            .to_owned(),
        email: claims.email.unwrap_or_default(),
        roles: claims.roles,
        context,
        issuer: platform.issuer.clone(),
        client_id: platform.client_id.clone(),
        deployment_id: claims.deployment_id,
        platform_id: platform.id.clone(),
        ags,
        nrps,
        iat: None,
        exp: None,
    }
}

fn authorization_url(platform: &Platform, params: &[(&str, &str)]) -> AppResult<String> {
    let mut url = Url::parse(&platform.auth_login_url).map_err(|e| {
        AppError::invalid_input(format!(
            "Platform authorization endpoint is not a valid URL: {e}"
        ))
        .with_platform_id(&platform.id)
    })?;
    url.query_pairs_mut().extend_pairs(params);
    Ok(url.into())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
