//! Validation result model
//!
//! Typed records produced by the external test-code validator. The
//! crystallization workflow attaches these as snapshots and the result
//! converters map them onto report items and logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Test framework a generated test targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestFramework {
    Junit,
    #[default]
    Jest,
    Playwright,
    Cypress,
    Vitest,
    Mocha,
}

impl TestFramework {
    pub fn name(&self) -> &'static str {
        match self {
            TestFramework::Junit => "junit",
            TestFramework::Jest => "jest",
            TestFramework::Playwright => "playwright",
            TestFramework::Cypress => "cypress",
            TestFramework::Vitest => "vitest",
            TestFramework::Mocha => "mocha",
        }
    }
}

/// Kind of test derived from a story
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    #[default]
    Unit,
    Component,
    Api,
    Integration,
    Flow,
}

impl TestType {
    pub fn name(&self) -> &'static str {
        match self {
            TestType::Unit => "unit",
            TestType::Component => "component",
            TestType::Api => "api",
            TestType::Integration => "integration",
            TestType::Flow => "flow",
        }
    }
}

/// Severity of a validation issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    /// Must fix, the test is invalid
    Error,
    /// Should fix
    Warning,
    /// Optional
    Info,
    /// Nice to have
    Suggestion,
}

impl ValidationSeverity {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationSeverity::Error => "error",
            ValidationSeverity::Warning => "warning",
            ValidationSeverity::Info => "info",
            ValidationSeverity::Suggestion => "suggestion",
        }
    }
}

/// Category of the rule that raised an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationRuleType {
    Syntax,
    Compilation,
    Assertion,
    Coverage,
    Naming,
    Structure,
    BestPractice,
    Security,
    Performance,
}

/// A single issue found in a test file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub rule_id: String,
    pub severity: ValidationSeverity,
    pub message: String,
    pub file_path: String,
    /// 1-based line number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// 1-based column number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub auto_fixable: bool,
}

impl ValidationIssue {
    pub fn new(
        rule_id: impl Into<String>,
        severity: ValidationSeverity,
        message: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            severity,
            message: message.into(),
            file_path: file_path.into(),
            line: None,
            column: None,
            snippet: None,
            suggestion: None,
            auto_fixable: false,
        }
    }
}

/// Code quality metrics reported by the validator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CodeQualityMetrics {
    pub lines_of_code: u32,
    pub test_case_count: u32,
    pub assertion_count: u32,
    pub assertions_per_test: f64,
    pub has_setup: bool,
    pub has_teardown: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<f64>,
    /// Number of unfinished-work markers left in the code
    pub incomplete_comment_count: u32,
    pub mock_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u64>,
}

impl CodeQualityMetrics {
    /// Heuristic 0-100 quality score used by the validator
    ///
    /// The crystallization workflow treats the score as an opaque input;
    /// this is only offered to callers that hold raw metrics.
    pub fn quality_score(&self) -> f64 {
        let mut score: f64 = 100.0;

        if self.assertion_count == 0 {
            score -= 30.0;
        } else if self.assertions_per_test < 1.0 {
            score -= 15.0;
        }

        if !self.has_setup {
            score -= 5.0;
        }
        if !self.has_teardown {
            score -= 5.0;
        }

        score -= f64::from(self.incomplete_comment_count.saturating_mul(5).min(20));

        if self.test_case_count == 0 {
            score -= 40.0;
        }

        score.max(0.0)
    }
}

/// Validation outcome for a single test file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub file_path: String,
    pub framework: TestFramework,
    pub test_type: TestType,
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<ValidationIssue>,
    #[serde(default)]
    pub metrics: CodeQualityMetrics,
    pub timestamp: DateTime<Utc>,
    /// Validation duration in milliseconds
    #[serde(default)]
    pub duration: u64,
}

impl ValidationResult {
    /// Whether any issue is error-severity
    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == ValidationSeverity::Error)
    }

    /// Count issues of the given severity
    pub fn count_by_severity(&self, severity: ValidationSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// Issue counts per severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuesBySeverity {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub suggestion: usize,
}

/// Summary statistics over a validation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ValidationSummary {
    pub total_tests: usize,
    pub valid_tests: usize,
    pub invalid_tests: usize,
    pub total_issues: usize,
    pub issues_by_severity: IssuesBySeverity,
    pub issues_by_type: BTreeMap<String, usize>,
    pub average_quality_score: f64,
    pub tests_by_framework: BTreeMap<String, usize>,
    pub tests_by_type: BTreeMap<String, usize>,
}

/// Letter grade for a quality assessment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    A,
    B,
    C,
    D,
    F,
}

impl QualityGrade {
    pub fn name(&self) -> &'static str {
        match self {
            QualityGrade::A => "A",
            QualityGrade::B => "B",
            QualityGrade::C => "C",
            QualityGrade::D => "D",
            QualityGrade::F => "F",
        }
    }
}

/// Per-dimension breakdown of a quality assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityBreakdown {
    pub syntax: f64,
    pub structure: f64,
    pub assertions: f64,
    pub coverage: f64,
    pub best_practices: f64,
}

/// Overall quality assessment of a validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub grade: QualityGrade,
    #[serde(default)]
    pub breakdown: QualityBreakdown,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Aggregate validation report for many test files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<ValidationResult>,
    #[serde(default)]
    pub summary: ValidationSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<QualityAssessment>,
}

impl ValidationReport {
    /// Find the result recorded for a file
    pub fn result_for(&self, file_path: &str) -> Option<&ValidationResult> {
        self.results.iter().find(|r| r.file_path == file_path)
    }

    /// Total number of issues across all results
    pub fn total_issues(&self) -> usize {
        self.results.iter().map(|r| r.issues.len()).sum()
    }
}
