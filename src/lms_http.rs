// ABOUTME: Shared HTTP client for LMS endpoints with bounded timeouts and URL rewriting
// ABOUTME: Every outbound call to an LMS-supplied URL goes through this client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, HOST};
use reqwest::{Client, ClientBuilder, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::errors::{AppError, AppResult};
use crate::rewrite::UrlRewriter;

/// Create a new HTTP client with custom timeout settings
///
/// # Errors
///
/// Returns a configuration error if the TLS backend cannot be initialized
pub fn create_client_with_timeout(timeout_secs: u64, connect_timeout_secs: u64) -> AppResult<Client> {
    ClientBuilder::new()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(connect_timeout_secs))
        .build()
        .map_err(|e| AppError::config(format!("Failed to build HTTP client: {e}")))
}

/// HTTP client for server-to-server LMS calls
///
/// Cloning is cheap; clones share the connection pool and rewrite table.
#[derive(Debug, Clone)]
pub struct LmsHttpClient {
    client: Client,
    rewriter: Arc<UrlRewriter>,
}

impl LmsHttpClient {
    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client, rewriter: Arc<UrlRewriter>) -> Self {
        Self { client, rewriter }
    }

    /// Client with bounded timeouts, suitable for OAuth and LTI service calls
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the client cannot be built
    pub fn with_timeouts(
        timeout_secs: u64,
        connect_timeout_secs: u64,
        rewriter: Arc<UrlRewriter>,
    ) -> AppResult<Self> {
        Ok(Self::new(
            create_client_with_timeout(timeout_secs, connect_timeout_secs)?,
            rewriter,
        ))
    }

    /// The active rewrite table
    #[must_use]
    pub fn rewriter(&self) -> &UrlRewriter {
        &self.rewriter
    }

    /// Start a request to an LMS-supplied URL, applying the rewrite table
    #[must_use]
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let target = self.rewriter.prepare(url);
        let builder = self.client.request(method, &target.url);
        match target.host_header {
            Some(host) => builder.header(HOST, host),
            None => builder,
        }
    }

    /// GET with an optional bearer token and `Accept` media type
    #[must_use]
    pub fn get(&self, url: &str, bearer: Option<&str>, accept: &str) -> RequestBuilder {
        let builder = self.request(Method::GET, url).header(ACCEPT, accept);
        with_bearer(builder, bearer)
    }

    /// POST with an optional bearer token and `Accept` media type
    #[must_use]
    pub fn post(&self, url: &str, bearer: Option<&str>, accept: &str) -> RequestBuilder {
        let builder = self.request(Method::POST, url).header(ACCEPT, accept);
        with_bearer(builder, bearer)
    }

    /// Send and require a 2xx status
    ///
    /// # Errors
    ///
    /// Network failures map to upstream errors; non-success statuses become
    /// upstream errors carrying status and body
    pub async fn send(builder: RequestBuilder, service: &str) -> AppResult<Response> {
        let response = builder.send().await.map_err(|e| {
            AppError::from(e).with_details(serde_json::json!({ "service": service }))
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "(no body)".to_owned());
        tracing::warn!(service, status = status.as_u16(), "LMS request failed");
        Err(AppError::upstream(service, status.as_u16(), body))
    }

    /// Send, require 2xx, and decode a JSON body
    ///
    /// # Errors
    ///
    /// As [`Self::send`], plus an upstream error if the body is not the expected JSON
    pub async fn send_json<T: DeserializeOwned>(
        builder: RequestBuilder,
        service: &str,
    ) -> AppResult<T> {
        let response = Self::send(builder, service).await?;
        decode_json(response, service).await
    }
}

/// Decode a successful response body as JSON
///
/// # Errors
///
/// Returns an upstream error when the body cannot be read or parsed
pub async fn decode_json<T: DeserializeOwned>(response: Response, service: &str) -> AppResult<T> {
    let status = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| AppError::external_service(service, format!("failed to read body: {e}")))?;
    serde_json::from_str(&text).map_err(|e| {
        AppError::external_service(service, format!("invalid JSON response: {e}"))
            .with_details(serde_json::json!({ "status": status, "body": text }))
    })
}

fn with_bearer(builder: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => builder.header(AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}
