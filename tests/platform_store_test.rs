// ABOUTME: Integration tests for the SQLite platform registry
// ABOUTME: Covers upsert identity, issuer lookups, credential rotation, and file-backed persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::time::Duration;

use lti_advantage_server::{
    errors::{ErrorCategory, ErrorCode},
    models::NewPlatform,
    platform_store::{PlatformStore, SqlitePlatformStore},
};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::time::sleep;

fn new_platform(issuer: &str, client_id: &str) -> NewPlatform {
    NewPlatform {
        issuer: issuer.to_owned(),
        client_id: client_id.to_owned(),
        deployment_id: Some("1".to_owned()),
        auth_login_url: format!("{issuer}/auth"),
        auth_token_url: format!("{issuer}/token"),
        keyset_url: format!("{issuer}/jwks"),
    }
}

#[tokio::test]
async fn test_upsert_inserts_then_updates_in_place() {
    let store = common::create_test_store().await;
    let first = store
        .upsert(new_platform("https://lms.example", "client-a"))
        .await
        .unwrap();

    sleep(Duration::from_millis(5)).await;
    let mut changed = new_platform("https://lms.example", "client-a");
    changed.keyset_url = "https://lms.example/rotated-jwks".to_owned();
    changed.deployment_id = None;
    let second = store.upsert(changed).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.created_at, second.created_at);
    assert!(second.updated_at > first.updated_at);
    assert_eq!(second.keyset_url, "https://lms.example/rotated-jwks");
    // A missing deployment id keeps the stored one
    assert_eq!(second.deployment_id.as_deref(), Some("1"));
    assert_eq!(store.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_same_issuer_different_clients_are_separate_rows() {
    let store = common::create_test_store().await;
    let a = store
        .upsert(new_platform("https://lms.example", "client-a"))
        .await
        .unwrap();
    let b = store
        .upsert(new_platform("https://lms.example", "client-b"))
        .await
        .unwrap();
    assert_ne!(a.id, b.id);

    let found = store
        .find_by_issuer("https://lms.example", Some("client-a"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, a.id);

    // Without a client id the most recently updated row wins
    let latest = store
        .find_by_issuer("https://lms.example", None)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, b.id);
}

#[tokio::test]
async fn test_unknown_lookups_return_none() {
    let store = common::create_test_store().await;
    assert!(store
        .find_by_issuer("https://nowhere.example", None)
        .await
        .unwrap()
        .is_none());
    assert!(store.find_by_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_upsert_rejects_blank_required_fields() {
    let store = common::create_test_store().await;
    let mut platform = new_platform("https://lms.example", "client-a");
    platform.keyset_url = "  ".to_owned();

    let err = store.upsert(platform).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MissingRequiredField);
}

#[tokio::test]
async fn test_service_credential_is_stored_but_never_serialized() {
    let store = common::create_test_store().await;
    let platform = store
        .upsert(new_platform("https://lms.example", "client-a"))
        .await
        .unwrap();

    store
        .set_service_credential(&platform.id, Some("s3cret"))
        .await
        .unwrap();
    let stored = store.find_by_id(&platform.id).await.unwrap().unwrap();
    assert_eq!(stored.service_credential.as_deref(), Some("s3cret"));

    let json = serde_json::to_string(&stored).unwrap();
    assert!(!json.contains("s3cret"));

    store.set_service_credential(&platform.id, None).await.unwrap();
    let cleared = store.find_by_id(&platform.id).await.unwrap().unwrap();
    assert!(cleared.service_credential.is_none());
}

#[tokio::test]
async fn test_credential_for_unknown_platform_is_not_found() {
    let store = common::create_test_store().await;
    let err = store
        .set_service_credential("missing", Some("x"))
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn test_file_database_persists_across_connections() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("nested/lti.db").display());

    let id = {
        let store = SqlitePlatformStore::connect(&url).await.unwrap();
        store
            .upsert(new_platform("https://lms.example", "client-a"))
            .await
            .unwrap()
            .id
    };

    let reopened = SqlitePlatformStore::connect(&url).await.unwrap();
    let found = reopened.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(found.issuer, "https://lms.example");
}

#[tokio::test]
async fn test_undecodable_column_is_database_error() {
    let dir = TempDir::new().unwrap();
    let url = format!("sqlite:{}", dir.path().join("lti.db").display());
    let store = SqlitePlatformStore::connect(&url).await.unwrap();
    let platform = store
        .upsert(new_platform("https://lms.example", "client-a"))
        .await
        .unwrap();

    // A BLOB where a TEXT column is expected
    let pool = SqlitePool::connect(&url).await.unwrap();
    sqlx::query("UPDATE lti_platforms SET keyset_url = X'00FF' WHERE id = $1")
        .bind(&platform.id)
        .execute(&pool)
        .await
        .unwrap();

    let err = store.find_by_id(&platform.id).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::DatabaseError);
    assert!(err.message.contains("keyset_url"));

    let err = store
        .find_by_issuer("https://lms.example", None)
        .await
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Internal);
}
