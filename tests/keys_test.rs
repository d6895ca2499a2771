// ABOUTME: Integration tests for tool key handling: signing, verification, and key set publication
// ABOUTME: Covers expiry, forged signatures, malformed tokens, and kid stability across reloads
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use lti_advantage_server::{
    config::environment::KeyMaterial,
    crypto::{decode_unverified, random_nonce, verify_with_key, ToolKeyPair},
    errors::{ErrorCategory, ErrorCode},
};
use serde_json::{json, Value};

#[test]
fn test_sign_and_verify_round_trip_injects_lifetimes() {
    let keys = common::tool_keys();
    let token = keys.sign(&json!({ "sub": "user-1" }), 600, None).unwrap();

    let claims: Value = keys.verify_self(&token).unwrap();
    assert_eq!(claims["sub"], "user-1");

    let iat = claims["iat"].as_i64().unwrap();
    let exp = claims["exp"].as_i64().unwrap();
    assert_eq!(exp - iat, 600);
    assert!((Utc::now().timestamp() - iat).abs() < 5);
}

#[test]
fn test_explicit_exp_is_kept() {
    let keys = common::tool_keys();
    let exp = Utc::now().timestamp() + 42;
    let token = keys.sign(&json!({ "exp": exp }), 600, None).unwrap();

    let claims: Value = keys.verify_self(&token).unwrap();
    assert_eq!(claims["exp"].as_i64(), Some(exp));
}

#[test]
fn test_expired_token_is_rejected_as_expired() {
    let keys = common::tool_keys();
    let past = Utc::now().timestamp() - 120;
    let token = keys
        .sign(&json!({ "sub": "user-1", "iat": past - 60, "exp": past }), 60, None)
        .unwrap();

    let err = keys.verify_self::<Value>(&token).unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthExpired);
}

#[test]
fn test_tampered_payload_is_rejected_as_invalid() {
    let keys = common::tool_keys();
    let token = keys.sign(&json!({ "sub": "user-1" }), 600, None).unwrap();
    let segments: Vec<&str> = token.split('.').collect();

    let mut payload: Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segments[1]).unwrap()).unwrap();
    payload["sub"] = json!("admin");
    let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&payload).unwrap());
    let forged = format!("{}.{forged_payload}.{}", segments[0], segments[2]);

    let err = keys.verify_self::<Value>(&forged).unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthInvalid);
}

#[test]
fn test_token_signed_by_another_key_is_rejected() {
    let tool = common::tool_keys();
    let other = common::platform_keys();
    let token = other.sign(&json!({ "sub": "user-1" }), 600, None).unwrap();

    let err = tool.verify_self::<Value>(&token).unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthInvalid);
}

#[test]
fn test_two_segment_token_is_malformed() {
    let keys = common::tool_keys();
    let err = keys.verify_self::<Value>("abc.def").unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthMalformed);

    let err = decode_unverified("abc.def").unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthMalformed);
}

#[test]
fn test_garbage_segments_are_malformed() {
    let keys = common::tool_keys();
    let err = keys.verify_self::<Value>("not.a.token").unwrap_err();
    assert_eq!(err.code, ErrorCode::AuthMalformed);
}

#[test]
fn test_decode_unverified_exposes_kid() {
    let keys = common::platform_keys();
    let token = keys
        .sign(&json!({ "iss": "https://lms.example" }), 60, Some(keys.kid()))
        .unwrap();

    let decoded = decode_unverified(&token).unwrap();
    assert_eq!(decoded.kid(), Some(keys.kid()));
    assert_eq!(decoded.payload["iss"], "https://lms.example");
}

#[test]
fn test_verify_with_published_key() {
    let keys = common::platform_keys();
    let token = keys.sign(&json!({ "sub": "s" }), 60, Some(keys.kid())).unwrap();

    let jwk = keys.jwks().keys.into_iter().next().unwrap();
    let decoding_key = jwk.decoding_key().unwrap();
    let claims: Value = verify_with_key(&token, &decoding_key).unwrap();
    assert_eq!(claims["sub"], "s");
}

#[test]
fn test_kid_is_stable_across_pem_reload() {
    let keys = common::tool_keys();
    let pem = keys.export_private_key_pem().unwrap();
    let reloaded = ToolKeyPair::from_pem(&pem).unwrap();

    assert_eq!(keys.kid(), reloaded.kid());
    assert_ne!(keys.kid(), common::platform_keys().kid());

    // A token signed before the reload still verifies after it
    let token = keys.sign(&json!({ "sub": "s" }), 60, None).unwrap();
    assert!(reloaded.verify_self::<Value>(&token).is_ok());
}

#[test]
fn test_escaped_newline_pem_is_accepted() {
    let pem = common::tool_keys().export_private_key_pem().unwrap();
    let escaped = pem.replace('\n', "\\n");
    let material = KeyMaterial::from_env_value(&escaped);
    let reloaded = ToolKeyPair::from_pem(material.expose()).unwrap();
    assert_eq!(reloaded.kid(), common::tool_keys().kid());
}

#[test]
fn test_invalid_pem_is_a_configuration_error() {
    let err = ToolKeyPair::from_pem("not a key").unwrap_err();
    assert_eq!(err.code.category(), ErrorCategory::Configuration);
}

#[test]
fn test_jwks_shape() {
    let keys = common::tool_keys();
    let jwks = serde_json::to_value(keys.jwks()).unwrap();
    let key = &jwks["keys"][0];

    assert_eq!(jwks["keys"].as_array().unwrap().len(), 1);
    assert_eq!(key["kty"], "RSA");
    assert_eq!(key["alg"], "RS256");
    assert_eq!(key["use"], "sig");
    assert_eq!(key["kid"], keys.kid());
    assert!(key["n"].as_str().is_some_and(|n| !n.is_empty()));
    assert_eq!(key["e"], "AQAB");
}

#[test]
fn test_random_nonce_is_unique_hex() {
    let a = random_nonce();
    let b = random_nonce();
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
}
