// ABOUTME: Assignment and Grade Services resources: line items, scores, and results
// ABOUTME: Container types accept both the bare-array and wrapped response shapes LMSs return
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gradebook column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// LMS-assigned URL of the line item
    pub id: String,
    /// Maximum score
    pub score_maximum: f64,
    /// Column label
    #[serde(default)]
    pub label: String,
    /// Tool-chosen tag (the assessment id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Tool resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Resource link the item is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_link_id: Option<String>,
}

/// Line item creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    /// Maximum score
    pub score_maximum: f64,
    /// Column label
    pub label: String,
    /// Tag used for later lookups
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Tool resource id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

/// Learner activity state reported with a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityProgress {
    /// Not started
    Initialized,
    /// Started
    Started,
    /// In progress
    InProgress,
    /// Submitted, awaiting completion
    Submitted,
    /// Completed
    Completed,
}

/// Grading state reported with a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradingProgress {
    /// Final grade
    FullyGraded,
    /// Grading pending
    Pending,
    /// Waiting on manual grading
    PendingManual,
    /// Grading failed
    Failed,
    /// Nothing to grade yet
    NotReady,
}

/// One score submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    /// LMS user id of the student
    pub user_id: String,
    /// Points awarded
    pub score_given: f64,
    /// Points possible
    pub score_maximum: f64,
    /// Comment shown in the gradebook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// When the score was produced
    pub timestamp: DateTime<Utc>,
    /// Activity progress
    pub activity_progress: ActivityProgress,
    /// Grading progress
    pub grading_progress: GradingProgress,
}

impl Score {
    /// A completed, fully graded score stamped now
    pub fn completed(
        user_id: impl Into<String>,
        score_given: f64,
        score_maximum: f64,
        comment: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            score_given,
            score_maximum,
            comment,
            timestamp: Utc::now(),
            activity_progress: ActivityProgress::Completed,
            grading_progress: GradingProgress::FullyGraded,
        }
    }
}

/// One row from a line item's results listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemResult {
    /// Result URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Student user id
    pub user_id: String,
    /// Current score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_score: Option<f64>,
    /// Score maximum
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_maximum: Option<f64>,
    /// Gradebook comment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Owning line item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_of: Option<String>,
}

/// Line item listing, either a bare array or `{ "lineItems": [...] }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LineItemContainer {
    /// Bare JSON array
    List(Vec<LineItem>),
    /// Wrapped collection
    Wrapped {
        /// Items
        #[serde(rename = "lineItems")]
        line_items: Vec<LineItem>,
    },
}

impl LineItemContainer {
    /// Flatten either shape into the items
    #[must_use]
    pub fn into_items(self) -> Vec<LineItem> {
        match self {
            Self::List(items) | Self::Wrapped { line_items: items } => items,
        }
    }
}

/// Results listing, either a bare array or `{ "results": [...] }`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ResultContainer {
    /// Bare JSON array
    List(Vec<LineItemResult>),
    /// Wrapped collection
    Wrapped {
        /// Results
        results: Vec<LineItemResult>,
    },
}

impl ResultContainer {
    /// Flatten either shape into the results
    #[must_use]
    pub fn into_results(self) -> Vec<LineItemResult> {
        match self {
            Self::List(results) | Self::Wrapped { results } => results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_item_container_accepts_both_shapes() {
        let bare = r#"[{"id":"https://lms/li/1","scoreMaximum":10,"label":"Quiz","tag":"a1"}]"#;
        let wrapped = r#"{"lineItems":[{"id":"https://lms/li/1","scoreMaximum":10}]}"#;
        let bare: LineItemContainer = serde_json::from_str(bare).unwrap();
        let wrapped: LineItemContainer = serde_json::from_str(wrapped).unwrap();
        assert_eq!(bare.into_items()[0].tag.as_deref(), Some("a1"));
        assert_eq!(wrapped.into_items()[0].id, "https://lms/li/1");
    }

    #[test]
    fn test_score_serializes_progress_enums() {
        let score = Score::completed("u1", 8.0, 10.0, None);
        let json = serde_json::to_value(&score).unwrap();
        assert_eq!(json["activityProgress"], "Completed");
        assert_eq!(json["gradingProgress"], "FullyGraded");
        assert_eq!(json["userId"], "u1");
        assert!(json.get("comment").is_none());
    }
}
