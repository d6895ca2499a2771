// ABOUTME: Assignment and Grade Services client for line items, scores, and results
// ABOUTME: Provides the idempotent find-or-create-then-submit workflow used for grade passback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # AGS Client
//!
//! Line item URLs are LMS-assigned and may carry platform-specific query
//! parameters; sub-resources (`/scores`, `/results`) are inserted before the
//! query string so those parameters survive.

use http::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use super::access_token::AccessTokenClient;
use crate::errors::AppResult;
use crate::lms_http::LmsHttpClient;
use crate::models::{LineItem, LineItemContainer, LineItemResult, NewLineItem, ResultContainer, Score};
use lti_core::constants::ags::{
    DEFAULT_LINE_ITEM_LABEL, FULL_SCOPES, MEDIA_TYPE_LINEITEM, MEDIA_TYPE_LINEITEM_CONTAINER,
    MEDIA_TYPE_RESULT_CONTAINER, MEDIA_TYPE_SCORE, RESULTS_SUFFIX, SCOPE_SCORE, SCORES_SUFFIX,
};

/// Result of the find-or-create workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSubmission {
    /// Line item the score was posted to
    pub line_item_id: String,
    /// True when this call created the line item
    pub created: bool,
}

/// Grade passback client
#[derive(Clone)]
pub struct AgsClient {
    http: LmsHttpClient,
    tokens: AccessTokenClient,
    tool_name: String,
}

impl AgsClient {
    /// Create a client; `tool_name` appears in score comments
    #[must_use]
    pub fn new(http: LmsHttpClient, tokens: AccessTokenClient, tool_name: impl Into<String>) -> Self {
        Self {
            http,
            tokens,
            tool_name: tool_name.into(),
        }
    }

    /// Access token for grade calls, narrowing to score-only when the full set is refused
    ///
    /// # Errors
    ///
    /// Returns the score-only failure when both requests fail
    pub async fn access_token(&self, platform_id: &str) -> AppResult<String> {
        match self.tokens.get_access_token(platform_id, &FULL_SCOPES).await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(platform_id, error = %e, "Full AGS scope set refused, retrying with score scope");
                self.tokens.get_access_token(platform_id, &[SCOPE_SCORE]).await
            }
        }
    }

    /// List line items, filtered server-side by `tag` when given
    ///
    /// # Errors
    ///
    /// Upstream error on a non-success response or an unrecognised body
    pub async fn get_line_items(
        &self,
        platform_id: &str,
        lineitems_url: &str,
        tag: Option<&str>,
    ) -> AppResult<Vec<LineItem>> {
        let token = self.access_token(platform_id).await?;
        let url = match tag {
            Some(tag) => append_query(lineitems_url, "tag", tag),
            None => lineitems_url.to_owned(),
        };

        let request = self
            .http
            .get(&url, Some(&token), MEDIA_TYPE_LINEITEM_CONTAINER);
        let container: LineItemContainer =
            LmsHttpClient::send_json(request, "Get line items").await?;
        Ok(container.into_items())
    }

    /// Create a line item on the collection (any inherited query is dropped)
    ///
    /// # Errors
    ///
    /// Upstream error on a non-success response
    pub async fn create_line_item(
        &self,
        platform_id: &str,
        lineitems_url: &str,
        line_item: &NewLineItem,
    ) -> AppResult<LineItem> {
        let token = self.access_token(platform_id).await?;
        let request = self
            .http
            .post(strip_query(lineitems_url), Some(&token), MEDIA_TYPE_LINEITEM)
            .header(CONTENT_TYPE, MEDIA_TYPE_LINEITEM)
            .json(line_item);

        let created: LineItem = LmsHttpClient::send_json(request, "Create line item").await?;
        info!(platform_id, line_item_id = %created.id, "Created line item");
        Ok(created)
    }

    /// Results recorded against a line item
    ///
    /// # Errors
    ///
    /// Upstream error on a non-success response
    pub async fn get_scores(&self, platform_id: &str, line_item_id: &str) -> AppResult<Vec<LineItemResult>> {
        let token = self.access_token(platform_id).await?;
        let url = sub_resource_url(line_item_id, RESULTS_SUFFIX);
        let request = self
            .http
            .get(&url, Some(&token), MEDIA_TYPE_RESULT_CONTAINER);
        let container: ResultContainer = LmsHttpClient::send_json(request, "Get scores").await?;
        Ok(container.into_results())
    }

    /// Post one score; the LMS treats this as an upsert keyed by user
    ///
    /// # Errors
    ///
    /// Upstream error on a non-success response
    pub async fn submit_score(&self, platform_id: &str, line_item_id: &str, score: &Score) -> AppResult<()> {
        let token = self.access_token(platform_id).await?;
        let url = sub_resource_url(line_item_id, SCORES_SUFFIX);
        let request = self
            .http
            .post(&url, Some(&token), "application/json")
            .header(CONTENT_TYPE, MEDIA_TYPE_SCORE)
            .json(score);
        LmsHttpClient::send(request, "Score submission").await?;
        debug!(platform_id, line_item_id, user_id = %score.user_id, "Score submitted");
        Ok(())
    }

    /// Find the line item tagged with `assessment_id`
    ///
    /// A failed tag-filtered lookup is retried unfiltered against the bare
    /// collection URL. Only an item carrying the tag is returned.
    pub async fn find_line_item(
        &self,
        platform_id: &str,
        lineitems_url: &str,
        assessment_id: &str,
    ) -> Option<LineItem> {
        let items = match self
            .get_line_items(platform_id, lineitems_url, Some(assessment_id))
            .await
        {
            Ok(items) => items,
            Err(e) => {
                warn!(platform_id, error = %e, "Tag-filtered line item lookup failed, retrying unfiltered");
                self.get_line_items(platform_id, strip_query(lineitems_url), None)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(platform_id, error = %e, "Unfiltered line item lookup failed");
                        Vec::new()
                    })
            }
        };

        items
            .into_iter()
            .find(|item| item.tag.as_deref() == Some(assessment_id))
    }

    /// Look up or create the assessment's line item, then submit a completed score
    ///
    /// Repeated calls for the same assessment converge on one tagged item.
    ///
    /// # Errors
    ///
    /// Errors from line item creation or score submission; lookup failures
    /// fall through to creation
    #[allow(clippy::too_many_arguments)]
    pub async fn find_or_create_line_item_and_submit_score(
        &self,
        platform_id: &str,
        lineitems_url: &str,
        assessment_id: &str,
        title: &str,
        student_id: &str,
        score: f64,
        max_score: f64,
    ) -> AppResult<ScoreSubmission> {
        let (line_item_id, created) = match self
            .find_line_item(platform_id, lineitems_url, assessment_id)
            .await
        {
            Some(item) => (item.id, false),
            None => {
                let label = if title.trim().is_empty() {
                    DEFAULT_LINE_ITEM_LABEL.to_owned()
                } else {
                    title.to_owned()
                };
                let new_item = NewLineItem {
                    score_maximum: max_score,
                    label,
                    tag: Some(assessment_id.to_owned()),
                    resource_id: Some(assessment_id.to_owned()),
                };
                let item = self
                    .create_line_item(platform_id, lineitems_url, &new_item)
                    .await?;
                (item.id, true)
            }
        };

        let comment = Some(format!("Graded via {}", self.tool_name));
        let submission = Score::completed(student_id, score, max_score, comment);
        self.submit_score(platform_id, &line_item_id, &submission)
            .await?;

        Ok(ScoreSubmission {
            line_item_id,
            created,
        })
    }
}

/// Insert `suffix` into the path, ahead of any query string
#[must_use]
pub fn sub_resource_url(line_item_id: &str, suffix: &str) -> String {
    match line_item_id.split_once('?') {
        Some((path, query)) => format!("{}{suffix}?{query}", path.trim_end_matches('/')),
        None => format!("{}{suffix}", line_item_id.trim_end_matches('/')),
    }
}

/// The URL without its query string
#[must_use]
pub fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// Append one encoded query parameter
#[must_use]
pub fn append_query(url: &str, key: &str, value: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{key}={}", urlencoding::encode(value))
}
