//! Crystallization data model
//!
//! Records for the review-to-production lifecycle of generated tests:
//! the per-file `CrystallizedTest`, its embedded review metadata and
//! version history, workflow configuration, and the immutable
//! `CrystallizationOperation` records that form the audit log.

use super::validation::{TestFramework, TestType, ValidationResult};
use crate::error::CrystallizationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of a generated test
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrystallizationStatus {
    /// Freshly generated, not reviewed
    Generated,
    /// Being reviewed
    UnderReview,
    /// Review completed, changes required
    NeedsChanges,
    /// Review completed, approved for crystallization
    Approved,
    /// Locked and ready for production
    Crystallized,
    /// No longer valid
    Deprecated,
}

impl CrystallizationStatus {
    pub const ALL: [CrystallizationStatus; 6] = [
        CrystallizationStatus::Generated,
        CrystallizationStatus::UnderReview,
        CrystallizationStatus::NeedsChanges,
        CrystallizationStatus::Approved,
        CrystallizationStatus::Crystallized,
        CrystallizationStatus::Deprecated,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CrystallizationStatus::Generated => "generated",
            CrystallizationStatus::UnderReview => "under-review",
            CrystallizationStatus::NeedsChanges => "needs-changes",
            CrystallizationStatus::Approved => "approved",
            CrystallizationStatus::Crystallized => "crystallized",
            CrystallizationStatus::Deprecated => "deprecated",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            CrystallizationStatus::Generated => "🧪",
            CrystallizationStatus::UnderReview => "🔍",
            CrystallizationStatus::NeedsChanges => "✏️",
            CrystallizationStatus::Approved => "👍",
            CrystallizationStatus::Crystallized => "💎",
            CrystallizationStatus::Deprecated => "📦",
        }
    }

    /// Parse from the kebab-case name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.name() == s)
    }
}

impl fmt::Display for CrystallizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decision recorded by a reviewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewDecision {
    Approve,
    RequestChanges,
    Reject,
}

impl ReviewDecision {
    pub fn name(&self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approve",
            ReviewDecision::RequestChanges => "request-changes",
            ReviewDecision::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "approve" => Some(ReviewDecision::Approve),
            "request-changes" => Some(ReviewDecision::RequestChanges),
            "reject" => Some(ReviewDecision::Reject),
            _ => None,
        }
    }
}

/// One entry in a test's review history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reviewer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub decision: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes_requested: Vec<String>,
}

impl Reviewer {
    pub fn new(name: impl Into<String>, decision: ReviewDecision, comments: Option<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            timestamp: Utc::now(),
            decision,
            comments,
            changes_requested: Vec::new(),
        }
    }
}

/// Review metadata embedded in each crystallized test
///
/// The reviewer sequence is append-only; it is never reordered or edited
/// in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewMetadata {
    pub id: String,
    reviewers: Vec<Reviewer>,
    pub created_at: DateTime<Utc>,
    pub last_modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_result: Option<ValidationResult>,
    pub quality_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ReviewMetadata {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            reviewers: Vec::new(),
            created_at: now,
            last_modified_at: now,
            validation_result: None,
            quality_score: 0.0,
            notes: None,
            tags: Vec::new(),
        }
    }

    /// Review history in the order reviews were recorded
    pub fn reviewers(&self) -> &[Reviewer] {
        &self.reviewers
    }

    /// Most recent review, if any
    pub fn latest(&self) -> Option<&Reviewer> {
        self.reviewers.last()
    }

    pub(crate) fn append_reviewer(&mut self, reviewer: Reviewer) {
        self.last_modified_at = reviewer.timestamp;
        self.reviewers.push(reviewer);
    }
}

/// Archived version of a test's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizedTestVersion {
    pub version: u32,
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<String>,
    pub quality_score: f64,
}

/// Registry record for one generated test file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizedTest {
    pub id: String,
    pub file_path: String,
    pub framework: TestFramework,
    pub test_type: TestType,
    pub story_id: String,
    pub status: CrystallizationStatus,
    pub review: ReviewMetadata,
    /// `sha256:<hex>` of the file content the record was last reconciled with
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crystallized_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated_at: Option<DateTime<Utc>>,
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_reason: Option<String>,
    pub version: u32,
    #[serde(default)]
    pub history: Vec<CrystallizedTestVersion>,
}

impl CrystallizedTest {
    pub fn new(
        file_path: impl Into<String>,
        story_id: impl Into<String>,
        content_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            file_path: file_path.into(),
            framework: TestFramework::default(),
            test_type: TestType::default(),
            story_id: story_id.into(),
            status: CrystallizationStatus::Generated,
            review: ReviewMetadata::new(now),
            content_hash: content_hash.into(),
            crystallized_at: None,
            last_validated_at: None,
            locked: false,
            lock_reason: None,
            version: 1,
            history: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status != CrystallizationStatus::Deprecated
    }
}

/// Workflow gating configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrystallizationConfig {
    /// Require an attached, valid validation result before crystallizing
    pub require_validation: bool,
    pub min_quality_score: f64,
    pub require_manual_review: bool,
    pub min_reviewers: usize,
    /// Crystallize right after an approving review at or above this score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_crystallize_threshold: Option<f64>,
    pub lock_after_crystallization: bool,
    pub enable_versioning: bool,
    pub max_versions: usize,
}

impl Default for CrystallizationConfig {
    fn default() -> Self {
        Self {
            require_validation: true,
            min_quality_score: 70.0,
            require_manual_review: true,
            min_reviewers: 1,
            auto_crystallize_threshold: None,
            lock_after_crystallization: true,
            enable_versioning: true,
            max_versions: 10,
        }
    }
}

/// Kind of workflow operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationType {
    Register,
    StartReview,
    Review,
    AttachValidation,
    RefreshContent,
    Crystallize,
    Lock,
    Unlock,
    Deprecate,
}

impl OperationType {
    pub fn name(&self) -> &'static str {
        match self {
            OperationType::Register => "register",
            OperationType::StartReview => "start-review",
            OperationType::Review => "review",
            OperationType::AttachValidation => "attach-validation",
            OperationType::RefreshContent => "refresh-content",
            OperationType::Crystallize => "crystallize",
            OperationType::Lock => "lock",
            OperationType::Unlock => "unlock",
            OperationType::Deprecate => "deprecate",
        }
    }
}

/// Immutable record of one workflow operation attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizationOperation {
    pub id: String,
    #[serde(rename = "type")]
    pub op_type: OperationType,
    pub file_path: String,
    pub operator: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub message: String,
    pub previous_status: CrystallizationStatus,
    pub new_status: CrystallizationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<CrystallizationError>,
}

impl CrystallizationOperation {
    pub fn succeeded(
        op_type: OperationType,
        file_path: impl Into<String>,
        operator: impl Into<String>,
        previous_status: CrystallizationStatus,
        new_status: CrystallizationStatus,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op_type,
            file_path: file_path.into(),
            operator: operator.into(),
            timestamp: Utc::now(),
            success: true,
            message: message.into(),
            previous_status,
            new_status,
            failure: None,
        }
    }

    /// A rejected attempt; the record keeps its prior status
    pub fn failed(
        op_type: OperationType,
        file_path: impl Into<String>,
        operator: impl Into<String>,
        status: CrystallizationStatus,
        error: CrystallizationError,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            op_type,
            file_path: file_path.into(),
            operator: operator.into(),
            timestamp: Utc::now(),
            success: false,
            message: error.to_string(),
            previous_status: status,
            new_status: status,
            failure: Some(error),
        }
    }
}

/// Aggregate statistics over the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizationStats {
    pub total: usize,
    pub by_status: BTreeMap<CrystallizationStatus, usize>,
    pub average_quality_score: f64,
    pub crystallized_today: usize,
    pub under_review: usize,
    pub needing_changes: usize,
    pub locked: usize,
    /// Crystallized tests per calendar day
    pub crystallization_rate: f64,
}

impl CrystallizationStats {
    pub fn count(&self, status: CrystallizationStatus) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Options for crystallizing many files in one pass
#[derive(Debug, Clone)]
pub struct BulkCrystallizationOptions {
    pub files: Vec<String>,
    pub reviewer: String,
    pub decision: ReviewDecision,
    pub comments: Option<String>,
    /// Evaluate without mutating the registry
    pub dry_run: bool,
}

/// Outcome of a bulk crystallization pass
#[derive(Debug, Clone, Default)]
pub struct BulkCrystallizationResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub results: BTreeMap<String, CrystallizationOperation>,
    pub errors: BTreeMap<String, String>,
}

/// Point-in-time summary of the registry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrystallizationReport {
    pub generated_at: DateTime<Utc>,
    pub stats: CrystallizationStats,
    pub tests_by_status: BTreeMap<CrystallizationStatus, Vec<String>>,
    pub recent_operations: Vec<CrystallizationOperation>,
    pub recommendations: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_names_round_trip() {
        for status in CrystallizationStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.name()));
            assert_eq!(CrystallizationStatus::parse(status.name()), Some(status));
        }
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(ReviewDecision::parse("APPROVE"), Some(ReviewDecision::Approve));
        assert_eq!(
            ReviewDecision::parse("request-changes"),
            Some(ReviewDecision::RequestChanges)
        );
        assert_eq!(ReviewDecision::parse("maybe"), None);
    }

    #[test]
    fn test_reviewers_append_in_order() {
        let mut review = ReviewMetadata::new(Utc::now());
        review.append_reviewer(Reviewer::new("alice", ReviewDecision::RequestChanges, None));
        review.append_reviewer(Reviewer::new("bob", ReviewDecision::Approve, None));

        let names: Vec<_> = review.reviewers().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alice", "bob"]);
        assert_eq!(review.latest().unwrap().decision, ReviewDecision::Approve);
    }

    #[test]
    fn test_failed_operation_keeps_status() {
        let op = CrystallizationOperation::failed(
            OperationType::Crystallize,
            "a.spec.ts",
            "carol",
            CrystallizationStatus::Generated,
            CrystallizationError::NotFound {
                path: "a.spec.ts".into(),
            },
        );
        assert!(!op.success);
        assert_eq!(op.previous_status, op.new_status);
        assert_eq!(op.message, "test not registered: a.spec.ts");
    }

    #[test]
    fn test_config_defaults_from_partial_toml() {
        let config: CrystallizationConfig = toml::from_str("min_reviewers = 2").unwrap();
        assert_eq!(config.min_reviewers, 2);
        assert_eq!(config.min_quality_score, 70.0);
        assert!(config.lock_after_crystallization);
    }
}
