//! Validation and Allure result converters
//!
//! Pure functions from external result shapes to `ReportItem`/`ReportLog`.
//! Every status and severity maps to exactly one output; unknown input
//! values are already rejected when the result files are deserialized.

use crate::models::{
    AllureParameter, AllureResult, AllureStatus, AllureStatusDetails, AllureStep, Attribute,
    ItemType, LogLevel, Parameter, ReportItem, ReportLog, ReportStatus, ValidationIssue,
    ValidationReport, ValidationResult, ValidationSeverity,
};

/// Validation is instantaneous; items get a nominal duration
const VALIDATION_ITEM_DURATION_MS: i64 = 100;
const VALIDATION_SUITE_DURATION_MS: i64 = 1000;

const ALLURE_LABEL_KEYS: [&str; 5] = ["feature", "story", "epic", "severity", "tag"];

// =============================================================================
// Validation results
// =============================================================================

/// `passed` if valid, else `failed` only when an error-severity issue exists
pub fn validation_status(result: &ValidationResult) -> ReportStatus {
    if result.valid {
        ReportStatus::Passed
    } else if result.has_errors() {
        ReportStatus::Failed
    } else {
        ReportStatus::Skipped
    }
}

pub fn convert_validation_result(
    result: &ValidationResult,
    launch_uuid: &str,
    parent_uuid: Option<&str>,
    start_time: i64,
) -> ReportItem {
    let mut attributes = vec![
        Attribute::new("framework", result.framework.name()),
        Attribute::new("test-type", result.test_type.name()),
    ];
    if result.valid {
        attributes.push(Attribute::tag("validated"));
    }

    ReportItem {
        name: file_name(&result.file_path).to_string(),
        description: Some(validation_description(result)),
        item_type: ItemType::Test,
        start_time,
        end_time: start_time + VALIDATION_ITEM_DURATION_MS,
        status: validation_status(result),
        launch_uuid: launch_uuid.to_string(),
        parent_uuid: parent_uuid.map(str::to_string),
        attributes,
        code_ref: Some(result.file_path.clone()),
        parameters: Vec::new(),
        unique_id: None,
        has_stats: true,
    }
}

/// Suite item for a whole validation report; `passed` iff no invalid tests
pub fn convert_validation_report(report: &ValidationReport, launch_uuid: &str) -> ReportItem {
    let summary = &report.summary;
    let start_time = report.timestamp.timestamp_millis();

    let mut lines = vec![
        format!("**Total Tests:** {}", summary.total_tests),
        format!("**Valid Tests:** {}", summary.valid_tests),
        format!("**Invalid Tests:** {}", summary.invalid_tests),
        format!("**Total Issues:** {}", summary.total_issues),
    ];
    let mut attributes = vec![
        Attribute::new("type", "validation-report"),
        Attribute::new("total-tests", summary.total_tests.to_string()),
        Attribute::new("valid-tests", summary.valid_tests.to_string()),
        Attribute::new("invalid-tests", summary.invalid_tests.to_string()),
    ];
    if let Some(quality) = &report.quality {
        lines.push(String::new());
        lines.push("**Quality Assessment:**".to_string());
        lines.push(format!("- Score: {}/100", quality.score));
        lines.push(format!("- Grade: {}", quality.grade.name()));
        attributes.push(Attribute::new("quality-grade", quality.grade.name()));
    }

    ReportItem {
        name: "Validation Suite".to_string(),
        description: Some(lines.join("\n")),
        item_type: ItemType::Suite,
        start_time,
        end_time: start_time + VALIDATION_SUITE_DURATION_MS,
        status: if summary.invalid_tests == 0 {
            ReportStatus::Passed
        } else {
            ReportStatus::Failed
        },
        launch_uuid: launch_uuid.to_string(),
        parent_uuid: None,
        attributes,
        code_ref: None,
        parameters: Vec::new(),
        unique_id: None,
        has_stats: true,
    }
}

/// One log per issue; times are offset by index to keep issue order
pub fn convert_validation_issues(
    issues: &[ValidationIssue],
    item_uuid: &str,
    time: i64,
) -> Vec<ReportLog> {
    issues
        .iter()
        .zip(0i64..)
        .map(|(issue, index)| ReportLog {
            item_uuid: item_uuid.to_string(),
            time: time + index,
            message: format_issue_message(issue),
            level: severity_log_level(issue.severity),
        })
        .collect()
}

pub fn severity_log_level(severity: ValidationSeverity) -> LogLevel {
    match severity {
        ValidationSeverity::Error => LogLevel::Error,
        ValidationSeverity::Warning => LogLevel::Warn,
        ValidationSeverity::Info => LogLevel::Info,
        ValidationSeverity::Suggestion => LogLevel::Debug,
    }
}

/// Severity, rule, location, snippet, suggestion; always in that order
pub fn format_issue_message(issue: &ValidationIssue) -> String {
    let mut parts = vec![format!(
        "[{}] {}",
        issue.severity.name().to_uppercase(),
        issue.message
    )];

    if !issue.rule_id.is_empty() {
        parts.push(format!("Rule: {}", issue.rule_id));
    }

    if let Some(line) = issue.line {
        parts.push(match issue.column {
            Some(column) => format!("Line: {line}, Column: {column}"),
            None => format!("Line: {line}"),
        });
    }

    if let Some(snippet) = &issue.snippet {
        parts.push(format!("\nCode:\n{snippet}"));
    }

    if let Some(suggestion) = &issue.suggestion {
        parts.push(format!("\nSuggestion: {suggestion}"));
    }

    parts.join("\n")
}

fn validation_description(result: &ValidationResult) -> String {
    let metrics = &result.metrics;
    let mut lines = vec![
        format!("**File:** {}", result.file_path),
        format!("**Framework:** {}", result.framework.name()),
        format!("**Lines of Code:** {}", metrics.lines_of_code),
        format!("**Test Cases:** {}", metrics.test_case_count),
        format!("**Assertions:** {}", metrics.assertion_count),
    ];

    if !result.issues.is_empty() {
        lines.push(String::new());
        lines.push(format!("**Issues Found:** {}", result.issues.len()));
        lines.push(format!(
            "- Errors: {}",
            result.count_by_severity(ValidationSeverity::Error)
        ));
        lines.push(format!(
            "- Warnings: {}",
            result.count_by_severity(ValidationSeverity::Warning)
        ));
    }

    lines.join("\n")
}

/// Last path segment, for either separator
fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(path)
}

// =============================================================================
// Allure results
// =============================================================================

/// `broken` folds into `failed`
pub fn allure_status(status: AllureStatus) -> ReportStatus {
    match status {
        AllureStatus::Passed => ReportStatus::Passed,
        AllureStatus::Failed | AllureStatus::Broken => ReportStatus::Failed,
        AllureStatus::Skipped => ReportStatus::Skipped,
    }
}

pub fn convert_allure_result(
    result: &AllureResult,
    launch_uuid: &str,
    parent_uuid: Option<&str>,
) -> ReportItem {
    let attributes = result
        .labels
        .iter()
        .filter(|label| ALLURE_LABEL_KEYS.contains(&label.name.as_str()))
        .map(|label| Attribute::new(label.name.as_str(), label.value.as_str()))
        .collect();

    ReportItem {
        name: result.name.clone(),
        description: result.description.clone(),
        item_type: ItemType::Test,
        start_time: result.start,
        end_time: result.stop,
        status: allure_status(result.status),
        launch_uuid: launch_uuid.to_string(),
        parent_uuid: parent_uuid.map(str::to_string),
        attributes,
        code_ref: result.full_name.clone(),
        parameters: result.parameters.iter().map(allure_parameter).collect(),
        unique_id: None,
        has_stats: true,
    }
}

pub fn convert_allure_step(
    step: &AllureStep,
    launch_uuid: &str,
    parent_uuid: &str,
    index: usize,
) -> ReportItem {
    ReportItem {
        name: step.name.clone(),
        description: None,
        item_type: ItemType::Step,
        start_time: step.start,
        end_time: step.stop,
        status: allure_status(step.status),
        launch_uuid: launch_uuid.to_string(),
        parent_uuid: Some(parent_uuid.to_string()),
        attributes: Vec::new(),
        code_ref: None,
        parameters: Vec::new(),
        unique_id: Some(format!("{parent_uuid}-step-{index}")),
        has_stats: false,
    }
}

/// Message and stack trace as one log, if there is anything to say
pub fn convert_allure_status_details(
    status: AllureStatus,
    details: Option<&AllureStatusDetails>,
    time: i64,
    item_uuid: &str,
) -> Option<ReportLog> {
    let details = details?;
    let mut sections = Vec::new();
    if let Some(message) = details.message.as_deref().filter(|m| !m.is_empty()) {
        sections.push(message.to_string());
    }
    if let Some(trace) = details.trace.as_deref().filter(|t| !t.is_empty()) {
        sections.push(format!("Stack Trace:\n{trace}"));
    }
    if sections.is_empty() {
        return None;
    }

    let level = match status {
        AllureStatus::Failed | AllureStatus::Broken => LogLevel::Error,
        AllureStatus::Passed | AllureStatus::Skipped => LogLevel::Info,
    };

    Some(ReportLog {
        item_uuid: item_uuid.to_string(),
        time,
        message: sections.join("\n\n"),
        level,
    })
}

fn allure_parameter(parameter: &AllureParameter) -> Parameter {
    Parameter {
        key: parameter.name.clone(),
        value: parameter.value.clone(),
    }
}
