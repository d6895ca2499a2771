// ABOUTME: JSON Web Key types and lookup of a platform's signing key by key id
// ABOUTME: Converts RSA JWKs into verification keys for LMS-issued id_tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, AppResult, ErrorCode};
use crate::lms_http::LmsHttpClient;

/// JWK (JSON Web Key) representation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    /// Key type (always "RSA" for RS256)
    pub kty: String,
    /// Public key use (always "sig" for signature)
    #[serde(rename = "use", default)]
    pub key_use: String,
    /// Key ID
    #[serde(default)]
    pub kid: String,
    /// Algorithm (RS256)
    #[serde(default)]
    pub alg: String,
    /// RSA modulus (base64url encoded)
    pub n: String,
    /// RSA exponent (base64url encoded)
    pub e: String,
}

impl JsonWebKey {
    /// Verification key for RS256 tokens signed with this key
    ///
    /// # Errors
    ///
    /// Returns an upstream error if the key is not RSA or its components do not decode
    pub fn decoding_key(&self) -> AppResult<DecodingKey> {
        if self.kty != "RSA" {
            return Err(AppError::external_service(
                "Platform key set",
                format!("key {} has unsupported type {}", self.kid, self.kty),
            ));
        }
        DecodingKey::from_rsa_components(&self.n, &self.e).map_err(|e| {
            AppError::external_service(
                "Platform key set",
                format!("key {} has invalid RSA components: {e}", self.kid),
            )
        })
    }
}

/// JWKS (JSON Web Key Set) container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    /// Array of public keys
    pub keys: Vec<JsonWebKey>,
}

/// Remote key sets may mix key types, so entries are parsed one at a time
#[derive(Debug, Deserialize)]
struct RemoteKeySet {
    #[serde(default)]
    keys: Vec<Value>,
}

/// Fetch a platform key set and return the verification key whose id matches `kid`
///
/// # Errors
///
/// `KeyNotFound` when no key carries `kid`; an upstream error when the fetch
/// fails, returns a non-success status, or is not valid JSON
pub async fn fetch_remote_key(
    http: &LmsHttpClient,
    jwks_url: &str,
    kid: &str,
) -> AppResult<DecodingKey> {
    let request = http.get(jwks_url, None, "application/json");
    let key_set: RemoteKeySet = LmsHttpClient::send_json(request, "Platform key set").await?;

    let entry = key_set
        .keys
        .into_iter()
        .find(|key| key.get("kid").and_then(Value::as_str) == Some(kid))
        .ok_or_else(|| {
            AppError::new(
                ErrorCode::KeyNotFound,
                format!("Key with kid \"{kid}\" not found in platform key set"),
            )
            .with_resource_id(jwks_url)
        })?;

    let jwk: JsonWebKey = serde_json::from_value(entry).map_err(|e| {
        AppError::external_service("Platform key set", format!("key {kid} is not an RSA JWK: {e}"))
    })?;
    tracing::debug!(kid, url = %jwks_url, "Resolved platform signing key");
    jwk.decoding_key()
}
