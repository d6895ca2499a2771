// ABOUTME: Tool RSA key pair with RS256 signing and verification of compact JWTs
// ABOUTME: Derives a stable key id from the public key so key set responses stay cacheable
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Tool key management
//!
//! - One RSA key pair per deployment, loaded from PEM (PKCS#8 or PKCS#1)
//! - Key id = first 16 hex chars of SHA-256 over the SPKI public key PEM
//! - Self-issued tokens (state, session, client assertions) are RS256
//! - Verification distinguishes expired, forged, and malformed tokens

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode,
    errors::{Error as JwtError, ErrorKind},
    Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use rsa::{
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    traits::PublicKeyParts,
    RsaPrivateKey, RsaPublicKey,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::jwks::{JsonWebKey, JsonWebKeySet};
use crate::errors::{AppError, AppResult, ErrorCode};
use lti_core::constants::oidc::{NONCE_LENGTH, SIGNING_ALG};

/// RSA key size for generated keys (2048 bits minimum for RS256)
pub const RSA_KEY_SIZE: usize = 2048;

/// Header and payload of a token read without signature checks
#[derive(Debug, Clone)]
pub struct DecodedToken {
    /// JOSE header
    pub header: Value,
    /// Claims
    pub payload: Value,
}

impl DecodedToken {
    /// `kid` from the header, if present and non-empty
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header
            .get("kid")
            .and_then(Value::as_str)
            .filter(|kid| !kid.is_empty())
    }
}

/// The tool's signing key pair
#[derive(Clone)]
pub struct ToolKeyPair {
    kid: String,
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl fmt::Debug for ToolKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolKeyPair")
            .field("kid", &self.kid)
            .finish_non_exhaustive()
    }
}

impl ToolKeyPair {
    /// Load the private key from PEM, accepting PKCS#8 and PKCS#1 encodings
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the PEM is not an RSA private key
    pub fn from_pem(pem: &str) -> AppResult<Self> {
        let pem = pem.trim();
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| {
                AppError::new(
                    ErrorCode::ConfigInvalid,
                    format!("LTI_KEY is not a valid RSA private key: {e}"),
                )
            })?;
        Self::from_private_key(private_key)
    }

    /// Generate a fresh key pair
    ///
    /// Use 2048 bits for tests and development.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation fails
    pub fn generate_with_key_size(key_size_bits: usize) -> AppResult<Self> {
        let mut rng = OsRng;
        let private_key = RsaPrivateKey::new(&mut rng, key_size_bits)
            .map_err(|e| AppError::internal(format!("Failed to generate RSA private key: {e}")))?;
        Self::from_private_key(private_key)
    }

    /// Build signing and verification keys from a parsed private key
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be re-encoded for the JWT backend
    pub fn from_private_key(private_key: RsaPrivateKey) -> AppResult<Self> {
        let public_key = RsaPublicKey::from(&private_key);

        let public_pem = public_key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| AppError::config(format!("Failed to export public key: {e}")))?;
        let digest = Sha256::digest(public_pem.as_bytes());
        let kid = hex::encode(&digest[..8]);

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| AppError::config(format!("Failed to export private key: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| AppError::config(format!("Failed to create encoding key: {e}")))?;

        let (n, e) = components(&public_key);
        let decoding_key = DecodingKey::from_rsa_components(&n, &e)
            .map_err(|e| AppError::config(format!("Failed to create decoding key: {e}")))?;

        Ok(Self {
            kid,
            private_key,
            public_key,
            encoding_key,
            decoding_key,
        })
    }

    /// Deterministic key id
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// The public key in JSON Web Key form
    #[must_use]
    pub fn public_key_as_jwk(&self) -> JsonWebKey {
        let (n, e) = components(&self.public_key);
        JsonWebKey {
            kty: "RSA".to_owned(),
            key_use: "sig".to_owned(),
            kid: self.kid.clone(),
            alg: SIGNING_ALG.to_owned(),
            n,
            e,
        }
    }

    /// Key set document published at the tool's key endpoint
    #[must_use]
    pub fn jwks(&self) -> JsonWebKeySet {
        JsonWebKeySet {
            keys: vec![self.public_key_as_jwk()],
        }
    }

    /// Export private key as PKCS#8 PEM
    ///
    /// # Errors
    ///
    /// Returns an error if PEM encoding fails
    pub fn export_private_key_pem(&self) -> AppResult<String> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| AppError::internal(format!("Failed to export private key as PEM: {e}")))
    }

    /// Sign a JSON object payload as a compact RS256 token
    ///
    /// `iat` and `exp` are injected unless the payload already carries them.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the payload is not a JSON object
    pub fn sign<T: Serialize>(
        &self,
        payload: &T,
        expiry_secs: i64,
        kid: Option<&str>,
    ) -> AppResult<String> {
        let mut claims = serde_json::to_value(payload)?;
        let object = claims
            .as_object_mut()
            .ok_or_else(|| AppError::invalid_input("Token payload must be a JSON object"))?;

        let now = Utc::now().timestamp();
        object.entry("iat").or_insert_with(|| Value::from(now));
        object
            .entry("exp")
            .or_insert_with(|| Value::from(now + expiry_secs));

        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_owned);

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to sign RS256 token: {e}")))
    }

    /// Verify a token signed by this tool
    ///
    /// # Errors
    ///
    /// `AuthMalformed` when the token is not three segments, `AuthInvalid` on
    /// a bad signature, `AuthExpired` when `exp` has passed
    pub fn verify_self<T: DeserializeOwned>(&self, token: &str) -> AppResult<T> {
        verify_with_key(token, &self.decoding_key)
    }
}

/// Verify a token with a caller-supplied public key (LMS-issued tokens)
///
/// # Errors
///
/// Same classification as [`ToolKeyPair::verify_self`]
pub fn verify_with_key<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> AppResult<T> {
    if token.split('.').count() != 3 {
        return Err(AppError::auth_malformed(
            "Token must have exactly three segments",
        ));
    }

    let mut validation = Validation::new(Algorithm::RS256);
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    let data = decode::<Value>(token, key, &validation).map_err(|e| convert_jwt_error(&e))?;
    serde_json::from_value(data.claims)
        .map_err(|e| AppError::auth_malformed(format!("Token claims have an unexpected shape: {e}")))
}

/// Read header and payload without checking the signature
///
/// Used only to pick the verification key by `kid`.
///
/// # Errors
///
/// Returns `AuthMalformed` if the token is not three decodable JSON segments
pub fn decode_unverified(token: &str) -> AppResult<DecodedToken> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, _signature] = segments.as_slice() else {
        return Err(AppError::auth_malformed(
            "Token must have exactly three segments",
        ));
    };
    Ok(DecodedToken {
        header: decode_segment(header)?,
        payload: decode_segment(payload)?,
    })
}

/// Cryptographically random hex string of the nonce length
#[must_use]
pub fn random_nonce() -> String {
    let mut bytes = [0u8; NONCE_LENGTH / 2];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn decode_segment(segment: &str) -> AppResult<Value> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| AppError::auth_malformed(format!("Token contains invalid base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AppError::auth_malformed(format!("Token contains invalid JSON: {e}")))
}

/// Base64url modulus and exponent
fn components(public_key: &RsaPublicKey) -> (String, String) {
    (
        URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
        URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
    )
}

/// Convert JWT library errors into the token error classes
fn convert_jwt_error(e: &JwtError) -> AppError {
    match e.kind() {
        ErrorKind::ExpiredSignature => AppError::auth_expired(),
        ErrorKind::InvalidSignature => {
            AppError::auth_invalid("Token signature verification failed")
        }
        ErrorKind::InvalidAlgorithm => {
            AppError::auth_invalid("Token is not signed with RS256")
        }
        ErrorKind::InvalidToken => AppError::auth_malformed("Token format is invalid"),
        ErrorKind::Base64(err) => {
            AppError::auth_malformed(format!("Token contains invalid base64: {err}"))
        }
        ErrorKind::Json(err) => {
            AppError::auth_malformed(format!("Token contains invalid JSON: {err}"))
        }
        ErrorKind::Utf8(err) => {
            AppError::auth_malformed(format!("Token contains invalid UTF-8: {err}"))
        }
        _ => AppError::auth_invalid(format!("Token validation failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_nonce_is_hex_of_expected_length() {
        let a = random_nonce();
        let b = random_nonce();
        assert_eq!(a.len(), NONCE_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_decode_unverified_rejects_two_segments() {
        let err = decode_unverified("abc.def").unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthMalformed);
    }
}
