// ABOUTME: Batch grade passback that fans one assessment result out to several course contexts
// ABOUTME: Reports a per-target outcome instead of failing the whole batch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ags::AgsClient;
use crate::platform_store::PlatformStore;
use lti_core::constants::ags::DEFAULT_LINE_ITEM_LABEL;

/// One place a grade should be posted to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeTarget {
    /// Caller's identifier for the target (assignment row id)
    pub id: String,
    /// Platform the course lives on
    #[serde(default)]
    pub platform_id: Option<String>,
    /// Line item collection captured at launch
    #[serde(default)]
    pub lineitems_url: Option<String>,
    /// Title used when a line item has to be created
    #[serde(default)]
    pub assessment_title: Option<String>,
    /// LMS user id of the student
    pub student_id: String,
}

/// The result being posted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    /// Assessment the score belongs to, used as the line item tag
    pub assessment_id: String,
    /// Points awarded
    pub score: f64,
    /// Points possible
    pub max_score: f64,
}

/// Outcome class of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Score posted
    Success,
    /// Target lacks the platform or line item configuration
    Skipped,
    /// Platform no longer registered
    Failed,
    /// Protocol error while posting
    Error,
}

/// Outcome of one target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The target's id
    pub id: String,
    /// Outcome class
    pub status: SubmissionStatus,
    /// Why the target was not a success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SubmissionOutcome {
    fn new(id: &str, status: SubmissionStatus, reason: Option<String>) -> Self {
        Self {
            id: id.to_owned(),
            status,
            reason,
        }
    }
}

/// Posts one grade to every target
#[derive(Clone)]
pub struct GradeSync {
    ags: AgsClient,
    store: Arc<dyn PlatformStore>,
}

impl GradeSync {
    /// Create from the grade client and the registry
    #[must_use]
    pub fn new(ags: AgsClient, store: Arc<dyn PlatformStore>) -> Self {
        Self { ags, store }
    }

    /// Submit `grade` to each target in order
    pub async fn submit_for_targets(&self, targets: &[GradeTarget], grade: &Grade) -> Vec<SubmissionOutcome> {
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            outcomes.push(self.submit_one(target, grade).await);
        }

        let succeeded = outcomes
            .iter()
            .filter(|o| o.status == SubmissionStatus::Success)
            .count();
        info!(
            assessment_id = %grade.assessment_id,
            targets = targets.len(),
            succeeded,
            "Grade sync finished"
        );
        outcomes
    }

    async fn submit_one(&self, target: &GradeTarget, grade: &Grade) -> SubmissionOutcome {
        let (Some(platform_id), Some(lineitems_url)) = (
            target.platform_id.as_deref().filter(|p| !p.is_empty()),
            target.lineitems_url.as_deref().filter(|u| !u.is_empty()),
        ) else {
            return SubmissionOutcome::new(
                &target.id,
                SubmissionStatus::Skipped,
                Some("Missing config".to_owned()),
            );
        };

        match self.store.find_by_id(platform_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return SubmissionOutcome::new(
                    &target.id,
                    SubmissionStatus::Failed,
                    Some("Platform not found".to_owned()),
                )
            }
            Err(e) => {
                return SubmissionOutcome::new(&target.id, SubmissionStatus::Error, Some(e.message))
            }
        }

        let title = target
            .assessment_title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_LINE_ITEM_LABEL);

        match self
            .ags
            .find_or_create_line_item_and_submit_score(
                platform_id,
                lineitems_url,
                &grade.assessment_id,
                title,
                &target.student_id,
                grade.score,
                grade.max_score,
            )
            .await
        {
            Ok(_) => SubmissionOutcome::new(&target.id, SubmissionStatus::Success, None),
            Err(e) => {
                warn!(target_id = %target.id, platform_id, error = %e, "Grade submission failed");
                SubmissionOutcome::new(&target.id, SubmissionStatus::Error, Some(e.message))
            }
        }
    }
}
