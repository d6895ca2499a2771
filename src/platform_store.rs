// ABOUTME: Registry of trusted LMS platforms keyed by (issuer, client_id)
// ABOUTME: PlatformStore trait with a SQLite implementation using atomic upserts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Platform Registry
//!
//! Read on every login and service call, written only by registration and
//! credential rotation. Rows are never deleted here.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Decode, Pool, Row, Sqlite, Type,
};
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{NewPlatform, Platform};

/// Storage for platform registrations
#[async_trait]
pub trait PlatformStore: Send + Sync {
    /// Look up by issuer, narrowed by client id when given
    ///
    /// Without a client id the most recently updated registration wins.
    async fn find_by_issuer(&self, issuer: &str, client_id: Option<&str>)
        -> AppResult<Option<Platform>>;

    /// Look up by registry id
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Platform>>;

    /// Insert, or refresh the endpoints of the existing (issuer, client id) row
    async fn upsert(&self, platform: NewPlatform) -> AppResult<Platform>;

    /// Rotate or clear the third-party service credential
    async fn set_service_credential(&self, id: &str, credential: Option<&str>) -> AppResult<()>;

    /// All registrations, newest first
    async fn list(&self) -> AppResult<Vec<Platform>>;
}

/// SQLite-backed [`PlatformStore`]
#[derive(Clone)]
pub struct SqlitePlatformStore {
    pool: Pool<Sqlite>,
}

const PLATFORM_COLUMNS: &str = "id, issuer, client_id, deployment_id, auth_login_url, \
     auth_token_url, keyset_url, service_credential, created_at, updated_at";

impl SqlitePlatformStore {
    /// Open (creating if needed) the registry and run migrations
    ///
    /// # Errors
    ///
    /// Returns a database error if the URL is invalid or the database cannot be opened
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let is_memory = database_url.contains(":memory:");
        if !is_memory {
            ensure_parent_dir(database_url)?;
        }

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::database(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true);

        // Each in-memory connection is its own database
        let max_connections = if is_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to open platform registry: {e}")))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Create the registry table
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL fails
    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS lti_platforms (
                id TEXT PRIMARY KEY,
                issuer TEXT NOT NULL,
                client_id TEXT NOT NULL,
                deployment_id TEXT,
                auth_login_url TEXT NOT NULL,
                auth_token_url TEXT NOT NULL,
                keyset_url TEXT NOT NULL,
                service_credential TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(issuer, client_id)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to create lti_platforms table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_lti_platforms_issuer ON lti_platforms(issuer)")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create issuer index: {e}")))?;

        Ok(())
    }

    fn row_to_platform(row: &SqliteRow) -> AppResult<Platform> {
        let created_at: String = column(row, "created_at")?;
        let updated_at: String = column(row, "updated_at")?;
        Ok(Platform {
            id: column(row, "id")?,
            issuer: column(row, "issuer")?,
            client_id: column(row, "client_id")?,
            deployment_id: column(row, "deployment_id")?,
            auth_login_url: column(row, "auth_login_url")?,
            auth_token_url: column(row, "auth_token_url")?,
            keyset_url: column(row, "keyset_url")?,
            service_credential: column(row, "service_credential")?,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
        })
    }
}

/// Decode one column, reporting type mismatches instead of panicking
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> AppResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::database(format!("Failed to read column {name}: {e}")))
}

#[async_trait]
impl PlatformStore for SqlitePlatformStore {
    async fn find_by_issuer(
        &self,
        issuer: &str,
        client_id: Option<&str>,
    ) -> AppResult<Option<Platform>> {
        let row = if let Some(client_id) = client_id {
            sqlx::query(&format!(
                "SELECT {PLATFORM_COLUMNS} FROM lti_platforms WHERE issuer = $1 AND client_id = $2"
            ))
            .bind(issuer)
            .bind(client_id)
            .fetch_optional(&self.pool)
            .await
        } else {
            sqlx::query(&format!(
                "SELECT {PLATFORM_COLUMNS} FROM lti_platforms WHERE issuer = $1 \
                 ORDER BY updated_at DESC, rowid DESC LIMIT 1"
            ))
            .bind(issuer)
            .fetch_optional(&self.pool)
            .await
        }
        .map_err(|e| AppError::database(format!("Failed to look up platform by issuer: {e}")))?;

        row.map(|r| Self::row_to_platform(&r)).transpose()
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Platform>> {
        let row = sqlx::query(&format!(
            "SELECT {PLATFORM_COLUMNS} FROM lti_platforms WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to look up platform {id}: {e}")))?;

        row.map(|r| Self::row_to_platform(&r)).transpose()
    }

    async fn upsert(&self, platform: NewPlatform) -> AppResult<Platform> {
        platform.validate()?;
        let now = format_timestamp(Utc::now());

        // Single statement so concurrent registrations of one deployment cannot race
        let row = sqlx::query(&format!(
            r"
            INSERT INTO lti_platforms (
                id, issuer, client_id, deployment_id, auth_login_url,
                auth_token_url, keyset_url, service_credential, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, $8, $8)
            ON CONFLICT(issuer, client_id) DO UPDATE SET
                deployment_id = COALESCE(excluded.deployment_id, lti_platforms.deployment_id),
                auth_login_url = excluded.auth_login_url,
                auth_token_url = excluded.auth_token_url,
                keyset_url = excluded.keyset_url,
                updated_at = excluded.updated_at
            RETURNING {PLATFORM_COLUMNS}
            "
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&platform.issuer)
        .bind(&platform.client_id)
        .bind(&platform.deployment_id)
        .bind(&platform.auth_login_url)
        .bind(&platform.auth_token_url)
        .bind(&platform.keyset_url)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to upsert platform: {e}")))?;

        let stored = Self::row_to_platform(&row)?;
        info!(
            platform_id = %stored.id,
            issuer = %stored.issuer,
            client_id = %stored.client_id,
            "Platform registration stored"
        );
        Ok(stored)
    }

    async fn set_service_credential(&self, id: &str, credential: Option<&str>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE lti_platforms SET service_credential = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(credential)
        .bind(format_timestamp(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to update service credential: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Platform {id}")));
        }
        Ok(())
    }

    async fn list(&self) -> AppResult<Vec<Platform>> {
        let rows = sqlx::query(&format!(
            "SELECT {PLATFORM_COLUMNS} FROM lti_platforms ORDER BY updated_at DESC, rowid DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list platforms: {e}")))?;

        rows.iter().map(Self::row_to_platform).collect()
    }
}

/// Fixed-width RFC 3339 so text ordering matches time ordering
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::database(format!("Invalid timestamp {value}: {e}")))
}

/// Create the directory holding a file-backed SQLite database
fn ensure_parent_dir(database_url: &str) -> AppResult<()> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::database(format!(
                    "Failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Ok(())
}
