//! Allure result files (the subset the converters read)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllureStatus {
    Passed,
    Failed,
    Broken,
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllureStatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllureLabel {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllureParameter {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllureAttachment {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub mime_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllureStep {
    pub name: String,
    pub status: AllureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<AllureStatusDetails>,
    pub start: i64,
    pub stop: i64,
    #[serde(default)]
    pub steps: Vec<AllureStep>,
    #[serde(default)]
    pub attachments: Vec<AllureAttachment>,
}

/// One `*-result.json` file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllureResult {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: AllureStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<AllureStatusDetails>,
    pub start: i64,
    pub stop: i64,
    #[serde(default)]
    pub labels: Vec<AllureLabel>,
    #[serde(default)]
    pub parameters: Vec<AllureParameter>,
    #[serde(default)]
    pub steps: Vec<AllureStep>,
    #[serde(default)]
    pub attachments: Vec<AllureAttachment>,
}
