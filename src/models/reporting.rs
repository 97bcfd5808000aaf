//! Reporting backend protocol types
//!
//! Request and response shapes of the hierarchical reporting backend
//! (launches, nested test items, logs) plus the uniform item/log
//! representation the converters produce.

use serde::{Deserialize, Serialize};

/// Status of a report item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Passed,
    Failed,
    Skipped,
    Interrupted,
    Cancelled,
    InProgress,
}

impl ReportStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ReportStatus::Passed => "passed",
            ReportStatus::Failed => "failed",
            ReportStatus::Skipped => "skipped",
            ReportStatus::Interrupted => "interrupted",
            ReportStatus::Cancelled => "cancelled",
            ReportStatus::InProgress => "in_progress",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Suite,
    Story,
    Test,
    Scenario,
    Step,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LaunchMode {
    #[default]
    Default,
    Debug,
}

/// Key/value attribute; a missing key makes it a bare tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            system: None,
        }
    }

    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: value.into(),
            system: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunchRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Milliseconds since the Unix epoch
    pub start_time: i64,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<LaunchMode>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartLaunchResponse {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishLaunchRequest {
    pub end_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishLaunchResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTestItemRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub start_time: i64,
    pub launch_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_stats: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartTestItemResponse {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishTestItemRequest {
    pub end_time: i64,
    pub status: ReportStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinishTestItemResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveLogRequest {
    pub item_uuid: String,
    pub time: i64,
    pub message: String,
    pub level: LogLevel,
    pub launch_uuid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveLogResponse {
    #[serde(default)]
    pub id: String,
}

/// Uniform converter output for a suite, test or step
#[derive(Debug, Clone, PartialEq)]
pub struct ReportItem {
    pub name: String,
    pub description: Option<String>,
    pub item_type: ItemType,
    pub start_time: i64,
    pub end_time: i64,
    pub status: ReportStatus,
    pub launch_uuid: String,
    pub parent_uuid: Option<String>,
    pub attributes: Vec<Attribute>,
    pub code_ref: Option<String>,
    pub parameters: Vec<Parameter>,
    pub unique_id: Option<String>,
    pub has_stats: bool,
}

impl ReportItem {
    /// Request that creates this item on the backend
    pub fn start_request(&self) -> StartTestItemRequest {
        StartTestItemRequest {
            name: self.name.clone(),
            description: self.description.clone(),
            item_type: self.item_type,
            start_time: self.start_time,
            launch_uuid: self.launch_uuid.clone(),
            parent_uuid: self.parent_uuid.clone(),
            attributes: self.attributes.clone(),
            code_ref: self.code_ref.clone(),
            parameters: self.parameters.clone(),
            unique_id: self.unique_id.clone(),
            has_stats: Some(self.has_stats),
        }
    }

    /// Request that closes this item with its own end time and status
    pub fn finish_request(&self) -> FinishTestItemRequest {
        FinishTestItemRequest {
            end_time: self.end_time,
            status: self.status,
            description: None,
        }
    }
}

/// Uniform converter output for a log line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLog {
    pub item_uuid: String,
    pub time: i64,
    pub message: String,
    pub level: LogLevel,
}

impl ReportLog {
    pub fn save_request(&self, launch_uuid: &str) -> SaveLogRequest {
        SaveLogRequest {
            item_uuid: self.item_uuid.clone(),
            time: self.time,
            message: self.message.clone(),
            level: self.level,
            launch_uuid: launch_uuid.to_string(),
        }
    }
}

/// Per-upload counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadStats {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub suites: usize,
    pub steps: usize,
}

/// Structured outcome of an upload; failures are values, not errors
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub success: bool,
    pub launch_id: Option<String>,
    pub launch_number: Option<u64>,
    pub launch_url: Option<String>,
    pub items_uploaded: usize,
    pub logs_uploaded: usize,
    pub attachments_uploaded: usize,
    /// Wall-clock duration in milliseconds
    pub duration: u64,
    pub error: Option<String>,
    pub stats: UploadStats,
}

impl UploadResult {
    /// Failed upload with zeroed counters
    pub fn failure(duration: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            duration,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}
