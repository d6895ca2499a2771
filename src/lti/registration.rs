// ABOUTME: LTI 1.3 Dynamic Registration: the tool registers itself with a new LMS deployment
// ABOUTME: Fetches the platform OpenID configuration, posts the tool document, stores the platform
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Dynamic Registration
//!
//! One synchronous flow per new LMS deployment:
//!
//! 1. Validate the `openid_configuration` URL (HTTPS required in production)
//! 2. Fetch the configuration through the rewrite adapter
//! 3. Require `issuer`, `authorization_endpoint`, `token_endpoint`,
//!    `jwks_uri` and `registration_endpoint` before any further network call
//! 4. POST the tool registration document, with the optional bearer token
//! 5. Upsert the platform keyed by (issuer, `client_id`)
//!
//! The browser-facing authorization endpoint is stored as given; the token and
//! key set endpoints are server-to-server and go through the rewrite table.

use std::iter;
use std::sync::Arc;

use http::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::engine::EngineSettings;
use crate::errors::{AppError, AppResult, ErrorCode};
use crate::lms_http::{decode_json, LmsHttpClient};
use crate::logging::LtiLogger;
use crate::models::{NewPlatform, Platform};
use crate::platform_store::PlatformStore;
use lti_core::constants::ags::FULL_SCOPES;
use lti_core::constants::nrps::SCOPE_MEMBERSHIP_READONLY;
use lti_core::constants::oidc::{RESPONSE_TYPE, SCOPE};
use lti_core::constants::registration::{
    CLOSE_SUBJECT, KEYS_PATH, LAUNCH_PATH, LOGIN_PATH, MESSAGE_DEEP_LINKING,
    MESSAGE_RESOURCE_LINK, REQUESTED_CLAIMS,
};

const CONFIG_SERVICE: &str = "OpenID configuration";
const REGISTRATION_SERVICE: &str = "Registration";

const AUTH_HEADER_STRIPPED: &str = "LMS rejected the registration with 401 Unauthorized. \
This is typically caused by a web server (Apache/Nginx) stripping the Authorization header \
before it reaches the LMS application.\n\n\
Fix for Apache, in the LMS vhost or .htaccess:\n  \
SetEnvIf Authorization '(.*)' HTTP_AUTHORIZATION=$1\n  \
# or:\n  \
RewriteRule .* - [E=HTTP_AUTHORIZATION:%{HTTP:Authorization}]\n\n\
Fix for Nginx, proxy the Authorization header:\n  \
proxy_pass_header Authorization;\n  \
# or:\n  \
proxy_set_header Authorization $http_authorization;";

/// Query parameters the LMS opens the registration URL with
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationRequest {
    /// Platform OpenID configuration URL
    pub openid_configuration: Option<String>,
    /// Bearer credential for the registration POST
    pub registration_token: Option<String>,
}

/// Platform OpenID configuration, only the fields registration reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenIdConfiguration {
    /// Platform issuer
    #[serde(default)]
    pub issuer: Option<String>,
    /// Browser-facing OIDC authorization endpoint
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    /// OAuth2 token endpoint
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// Platform key set
    #[serde(default)]
    pub jwks_uri: Option<String>,
    /// Dynamic registration endpoint
    #[serde(default)]
    pub registration_endpoint: Option<String>,
}

/// The five endpoints registration cannot proceed without
#[derive(Debug, Clone)]
struct RequiredEndpoints {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    jwks_uri: String,
    registration_endpoint: String,
}

impl OpenIdConfiguration {
    fn require(self) -> AppResult<RequiredEndpoints> {
        fn field(value: Option<String>, name: &str) -> AppResult<String> {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    AppError::new(
                        ErrorCode::MissingRequiredField,
                        format!("OpenID configuration missing required field: \"{name}\""),
                    )
                })
        }

        Ok(RequiredEndpoints {
            issuer: field(self.issuer, "issuer")?,
            authorization_endpoint: field(self.authorization_endpoint, "authorization_endpoint")?,
            token_endpoint: field(self.token_endpoint, "token_endpoint")?,
            jwks_uri: field(self.jwks_uri, "jwks_uri")?,
            registration_endpoint: field(self.registration_endpoint, "registration_endpoint")?,
        })
    }
}

/// One LTI message the tool supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolMessage {
    /// LTI message type
    #[serde(rename = "type")]
    pub message_type: String,
    /// Launch URL for the message
    pub target_link_uri: String,
    /// Label shown in the LMS
    pub label: String,
}

/// LTI tool configuration block of the registration document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConfiguration {
    /// Public host of the tool
    pub domain: String,
    /// Tool description
    pub description: String,
    /// Default launch URL
    pub target_link_uri: String,
    /// Identity claims the tool wants in launches
    pub claims: Vec<String>,
    /// Supported messages
    pub messages: Vec<ToolMessage>,
}

/// Tool registration document posted to the LMS
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolRegistration {
    /// Always `web`
    pub application_type: String,
    /// Always `[id_token]`
    pub response_types: Vec<String>,
    /// `implicit` for launches, `client_credentials` for services
    pub grant_types: Vec<String>,
    /// Login initiation URL
    pub initiate_login_uri: String,
    /// Launch URLs
    pub redirect_uris: Vec<String>,
    /// Display name
    pub client_name: String,
    /// Tool key set, reached by the LMS server
    pub jwks_uri: String,
    /// Logo shown by the LMS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    /// Always `private_key_jwt`
    pub token_endpoint_auth_method: String,
    /// Space-joined scope list
    pub scope: String,
    /// LTI tool configuration
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-tool-configuration")]
    pub tool_configuration: ToolConfiguration,
}

/// LMS answer to the registration POST
#[derive(Debug, Clone, Deserialize)]
struct RegistrationResponse {
    #[serde(default)]
    client_id: Option<String>,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-tool-configuration", default)]
    tool_configuration: Option<Value>,
}

impl RegistrationResponse {
    fn deployment_id(&self) -> Option<String> {
        self.tool_configuration
            .as_ref()
            .and_then(|config| config.get("deployment_id"))
            .and_then(|id| match id {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    }
}

/// Result of a completed registration
#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    /// The stored platform row
    pub platform: Platform,
    /// Deployment id the LMS assigned, if it reported one
    pub deployment_id: Option<String>,
}

/// Self-registration of the tool with an LMS
#[derive(Clone)]
pub struct DynamicRegistration {
    http: LmsHttpClient,
    store: Arc<dyn PlatformStore>,
    public_url: String,
    tool_url: String,
    require_https: bool,
    tool_name: String,
    tool_description: String,
    tool_logo_uri: Option<String>,
}

impl DynamicRegistration {
    /// Create the flow from engine settings
    #[must_use]
    pub fn new(http: LmsHttpClient, store: Arc<dyn PlatformStore>, settings: &EngineSettings) -> Self {
        Self {
            http,
            store,
            public_url: settings.public_url.clone(),
            tool_url: settings.tool_url.clone(),
            require_https: settings.require_https_registration,
            tool_name: settings.tool_name.clone(),
            tool_description: settings.tool_description.clone(),
            tool_logo_uri: settings.tool_logo_uri.clone(),
        }
    }

    /// Run the registration flow
    ///
    /// # Errors
    ///
    /// Validation errors for a missing or malformed configuration URL and for
    /// a configuration lacking a required endpoint; upstream errors for
    /// network failures, non-success responses, invalid JSON, or a response
    /// without `client_id`
    pub async fn register(&self, request: &RegistrationRequest) -> AppResult<RegistrationOutcome> {
        let config_url = request
            .openid_configuration
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AppError::missing_field("openid_configuration").with_details(serde_json::json!({
                    "hint": "Ensure this URL is opened by the LMS dynamic registration flow"
                }))
            })?;
        self.validate_config_url(config_url)?;

        let registration_token = request
            .registration_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());

        info!(
            public_url = %self.public_url,
            tool_url = %self.tool_url,
            openid_configuration = %config_url,
            registration_token_len = registration_token.map_or(0, str::len),
            "Dynamic registration started"
        );

        let endpoints = self.fetch_configuration(config_url).await?.require()?;
        info!(
            issuer = %endpoints.issuer,
            registration_endpoint = %endpoints.registration_endpoint,
            "OpenID configuration accepted"
        );

        let document = self.tool_registration()?;
        let response = self
            .post_registration(&endpoints.registration_endpoint, registration_token, &document)
            .await?;

        let client_id = response
            .client_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                AppError::external_service(
                    REGISTRATION_SERVICE,
                    "LMS registration response is missing client_id. \
                     The LMS may not support LTI 1.3 dynamic registration.",
                )
            })?;
        let deployment_id = response.deployment_id();

        let rewriter = self.http.rewriter();
        let platform = self
            .store
            .upsert(NewPlatform {
                issuer: endpoints.issuer,
                client_id,
                deployment_id: deployment_id.clone(),
                auth_login_url: endpoints.authorization_endpoint,
                auth_token_url: rewriter.apply(&endpoints.token_endpoint),
                keyset_url: rewriter.apply(&endpoints.jwks_uri),
            })
            .await?;

        LtiLogger::log_registration(&platform.issuer, &platform.client_id, &platform.id);
        Ok(RegistrationOutcome {
            platform,
            deployment_id,
        })
    }

    /// The registration document this tool advertises
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the public URL has no host
    pub fn tool_registration(&self) -> AppResult<ToolRegistration> {
        let domain = Url::parse(&self.public_url)
            .ok()
            .and_then(|url| {
                url.host_str().map(|host| match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host.to_owned(),
                })
            })
            .ok_or_else(|| {
                AppError::config(format!("PUBLIC_URL has no host: {}", self.public_url))
            })?;

        let launch_url = format!("{}{LAUNCH_PATH}", self.public_url);
        let scope = iter::once(SCOPE)
            .chain(FULL_SCOPES)
            .chain(iter::once(SCOPE_MEMBERSHIP_READONLY))
            .collect::<Vec<_>>()
            .join(" ");

        Ok(ToolRegistration {
            application_type: "web".to_owned(),
            response_types: vec![RESPONSE_TYPE.to_owned()],
            grant_types: vec!["implicit".to_owned(), "client_credentials".to_owned()],
            initiate_login_uri: format!("{}{LOGIN_PATH}", self.public_url),
            redirect_uris: vec![launch_url.clone()],
            client_name: self.tool_name.clone(),
            jwks_uri: format!("{}{KEYS_PATH}", self.tool_url),
            logo_uri: self.tool_logo_uri.clone(),
            token_endpoint_auth_method: "private_key_jwt".to_owned(),
            scope,
            tool_configuration: ToolConfiguration {
                domain,
                description: self.tool_description.clone(),
                target_link_uri: launch_url.clone(),
                claims: REQUESTED_CLAIMS.iter().map(|c| (*c).to_owned()).collect(),
                messages: vec![
                    ToolMessage {
                        message_type: MESSAGE_RESOURCE_LINK.to_owned(),
                        target_link_uri: launch_url.clone(),
                        label: self.tool_name.clone(),
                    },
                    ToolMessage {
                        message_type: MESSAGE_DEEP_LINKING.to_owned(),
                        target_link_uri: launch_url,
                        label: format!("{} - Select Assessment", self.tool_name),
                    },
                ],
            },
        })
    }

    fn validate_config_url(&self, config_url: &str) -> AppResult<()> {
        let parsed = Url::parse(config_url).map_err(|e| {
            AppError::new(
                ErrorCode::InvalidFormat,
                format!("Invalid openid_configuration URL \"{config_url}\": {e}"),
            )
        })?;
        if self.require_https && parsed.scheme() != "https" {
            return Err(AppError::invalid_input(
                "openid_configuration must use HTTPS in production environments",
            ));
        }
        Ok(())
    }

    async fn fetch_configuration(&self, config_url: &str) -> AppResult<OpenIdConfiguration> {
        let request = self.http.get(config_url, None, "application/json");
        let response = LmsHttpClient::send(request, CONFIG_SERVICE)
            .await
            .map_err(|e| e.with_resource_id(config_url))?;
        decode_json(response, CONFIG_SERVICE).await
    }

    async fn post_registration(
        &self,
        registration_endpoint: &str,
        registration_token: Option<&str>,
        document: &ToolRegistration,
    ) -> AppResult<RegistrationResponse> {
        let request = self
            .http
            .post(registration_endpoint, registration_token, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(document);

        info!(
            registration_endpoint,
            rewritten = %self.http.rewriter().apply(registration_endpoint),
            "Posting tool registration"
        );

        let response = match LmsHttpClient::send(request, REGISTRATION_SERVICE).await {
            Ok(response) => response,
            Err(e) => return Err(classify_registration_failure(e)),
        };
        decode_json(response, REGISTRATION_SERVICE).await
    }
}

/// Replace the generic upstream message with actionable text for 401 and 400
fn classify_registration_failure(error: AppError) -> AppError {
    let Some(status) = error.upstream_status() else {
        return error;
    };
    let body = error.upstream_body().unwrap_or_default().to_owned();
    warn!(status, body = %body, "Registration POST rejected");

    let message = match status {
        401 => AUTH_HEADER_STRIPPED.to_owned(),
        400 => format!(
            "LMS rejected the registration payload (HTTP 400): {body}. \
             Check that the tool URLs are reachable by the LMS."
        ),
        _ if body.is_empty() => format!("Registration failed with HTTP {status}."),
        _ => format!("Registration failed with HTTP {status}: {body}"),
    };
    AppError::new(ErrorCode::ExternalServiceError, message).with_details(serde_json::json!({
        "status": status,
        "body": body,
    }))
}

/// Page that tells the LMS window to close the registration iframe or popup
#[must_use]
pub fn close_page_html() -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Registration Complete</title>
  <style>
    body {{ font-family: system-ui, sans-serif; text-align: center; padding: 2rem; color: #333; }}
    p {{ margin: 0; font-size: 1rem; }}
  </style>
</head>
<body>
  <p>Registration complete. This window will close automatically.</p>
  <script>
  (function () {{
    var msg = {{ subject: '{CLOSE_SUBJECT}' }};
    var targets = [window.parent, window.opener, window.top];
    for (var i = 0; i < targets.length; i++) {{
      try {{
        if (targets[i] && targets[i] !== window) {{
          targets[i].postMessage(msg, '*');
        }}
      }} catch (e) {{}}
    }}
    setTimeout(function () {{ window.close(); }}, 2000);
  }})();
  </script>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_jwks_uri_is_rejected() {
        let config = OpenIdConfiguration {
            issuer: Some("https://lms".into()),
            authorization_endpoint: Some("https://lms/auth".into()),
            token_endpoint: Some("https://lms/token".into()),
            jwks_uri: None,
            registration_endpoint: Some("https://lms/register".into()),
        };
        let err = config.require().unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingRequiredField);
        assert!(err.message.contains("jwks_uri"));
    }

    #[test]
    fn test_classify_401_mentions_authorization_header() {
        let err = classify_registration_failure(AppError::upstream("Registration", 401, "nope"));
        assert!(err.message.contains("Authorization header"));
        assert_eq!(err.upstream_status(), Some(401));
    }

    #[test]
    fn test_deployment_id_accepts_numbers() {
        let response: RegistrationResponse = serde_json::from_value(serde_json::json!({
            "client_id": "abc",
            "https://purl.imsglobal.org/spec/lti-tool-configuration": { "deployment_id": 7 }
        }))
        .unwrap();
        assert_eq!(response.deployment_id().as_deref(), Some("7"));
    }

    #[test]
    fn test_close_page_posts_close_subject() {
        let html = close_page_html();
        assert!(html.contains("org.imsglobal.lti.close"));
        assert!(html.contains("window.close()"));
    }
}
