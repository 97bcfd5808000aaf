//! Integration tests for the result uploader
//!
//! Drives `ResultUploader` against an in-memory reporting backend that
//! records every call, covering:
//! - story trees (epic/story/criterion/test) and their finish order
//! - validation reports with issue logs
//! - Allure results with nested steps
//! - failures surfacing as structured upload results

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use test_evidence::config::ReportingConfig;
use test_evidence::error::ExternalClientError;
use test_evidence::models::{
    AllureResult, FinishLaunchRequest, FinishLaunchResponse, FinishTestItemRequest,
    FinishTestItemResponse, ReportStatus, SaveLogRequest, SaveLogResponse, StartLaunchRequest,
    StartLaunchResponse, StartTestItemRequest, StartTestItemResponse, StoryTestResult,
    ValidationReport,
};
use test_evidence::reporting::{ClientResult, ReportingClient, ResultUploader};

#[derive(Default)]
struct Recorded {
    next_id: usize,
    names: HashMap<String, String>,
    parents: HashMap<String, Option<String>>,
    started: Vec<String>,
    finished: Vec<(String, ReportStatus)>,
    logs: Vec<SaveLogRequest>,
    launch: Option<StartLaunchRequest>,
    launch_finish: Option<FinishLaunchRequest>,
}

/// In-memory backend; optionally fails the n-th `start_test_item` call
#[derive(Default)]
struct RecordingClient {
    state: Mutex<Recorded>,
    fail_on_start: Option<usize>,
    unreachable: bool,
}

impl RecordingClient {
    fn failing_on_start(n: usize) -> Self {
        Self {
            fail_on_start: Some(n),
            ..Default::default()
        }
    }

    fn finished_names(&self) -> Vec<(String, ReportStatus)> {
        self.state.lock().unwrap().finished.clone()
    }

    fn parent_name(&self, name: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let id = state
            .names
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| id.clone())?;
        let parent = state.parents.get(&id)?.clone()?;
        state.names.get(&parent).cloned()
    }
}

#[async_trait]
impl ReportingClient for RecordingClient {
    async fn check_connection(&self) -> bool {
        !self.unreachable
    }

    async fn ensure_project(&self) -> ClientResult<()> {
        Ok(())
    }

    async fn start_launch(&self, request: &StartLaunchRequest) -> ClientResult<StartLaunchResponse> {
        let mut state = self.state.lock().unwrap();
        state.launch = Some(request.clone());
        Ok(StartLaunchResponse {
            id: "launch-1".to_string(),
            number: Some(7),
        })
    }

    async fn start_test_item(
        &self,
        request: &StartTestItemRequest,
    ) -> ClientResult<StartTestItemResponse> {
        let mut state = self.state.lock().unwrap();
        if self.fail_on_start == Some(state.started.len() + 1) {
            return Err(ExternalClientError::Api {
                status: 400,
                message: "Parent item not found".to_string(),
            });
        }

        state.next_id += 1;
        let id = format!("item-{}", state.next_id);
        state.names.insert(id.clone(), request.name.clone());
        state.parents.insert(id.clone(), request.parent_uuid.clone());
        state.started.push(request.name.clone());
        Ok(StartTestItemResponse { id })
    }

    async fn finish_test_item(
        &self,
        item_id: &str,
        request: &FinishTestItemRequest,
    ) -> ClientResult<FinishTestItemResponse> {
        let mut state = self.state.lock().unwrap();
        let name = state.names.get(item_id).cloned().unwrap_or_default();
        state.finished.push((name, request.status));
        Ok(FinishTestItemResponse {
            id: item_id.to_string(),
            message: None,
        })
    }

    async fn save_log(&self, request: &SaveLogRequest) -> ClientResult<SaveLogResponse> {
        let mut state = self.state.lock().unwrap();
        state.logs.push(request.clone());
        Ok(SaveLogResponse {
            id: format!("log-{}", state.logs.len()),
        })
    }

    async fn finish_launch(
        &self,
        launch_id: &str,
        request: &FinishLaunchRequest,
    ) -> ClientResult<FinishLaunchResponse> {
        let mut state = self.state.lock().unwrap();
        state.launch_finish = Some(request.clone());
        Ok(FinishLaunchResponse {
            id: launch_id.to_string(),
            number: Some(7),
            link: None,
        })
    }

    fn launch_url(&self, launch_id: &str) -> String {
        format!("http://rp.local/ui/#proj/launches/all/{launch_id}")
    }
}

fn uploader(client: &Arc<RecordingClient>) -> ResultUploader {
    let client: Arc<dyn ReportingClient> = client.clone();
    ResultUploader::new(client, &ReportingConfig::default())
}

fn story_results() -> StoryTestResult {
    serde_json::from_str(
        r#"{
            "id": "run-1",
            "title": "Epic 3 run",
            "timestamp": 1700000000000,
            "epic": { "id": "E-3", "name": "Trade Capture", "description": "capture trades" },
            "stories": [{
                "storyId": "S-1",
                "title": "Capture a trade",
                "epic": "E-3",
                "services": ["trade-service"],
                "acceptanceCriteria": [{
                    "id": "AC-1",
                    "description": "valid trade is stored",
                    "tests": [
                        { "name": "test1", "status": "passed", "duration": 12, "assertions": 3 },
                        { "name": "test2", "status": "failed", "duration": 8, "error": "expected 201, got 500" }
                    ]
                }]
            }]
        }"#,
    )
    .unwrap()
}

#[tokio::test]
async fn test_story_tree_finishes_children_before_parents() {
    let client = Arc::new(RecordingClient::default());
    let result = uploader(&client).upload_stories(&story_results()).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.launch_id.as_deref(), Some("launch-1"));
    assert_eq!(result.launch_number, Some(7));
    assert_eq!(
        result.launch_url.as_deref(),
        Some("http://rp.local/ui/#proj/launches/all/launch-1")
    );
    assert_eq!(result.items_uploaded, 2);
    assert_eq!(result.stats.total, 2);
    assert_eq!(result.stats.passed, 1);
    assert_eq!(result.stats.failed, 1);
    assert_eq!(result.stats.suites, 3);
    assert!(result.error.is_none());

    let finished = client.finished_names();
    assert_eq!(
        finished,
        vec![
            ("test1".to_string(), ReportStatus::Passed),
            ("test2".to_string(), ReportStatus::Failed),
            ("AC-1: valid trade is stored".to_string(), ReportStatus::Failed),
            ("S-1: Capture a trade".to_string(), ReportStatus::Failed),
            ("Trade Capture".to_string(), ReportStatus::Failed),
        ]
    );

    let state = client.state.lock().unwrap();
    let launch_finish = state.launch_finish.as_ref().unwrap();
    assert_eq!(launch_finish.status, Some(ReportStatus::Failed));
    assert_eq!(state.launch.as_ref().unwrap().name, "Epic 3 run");
    assert!(state
        .logs
        .iter()
        .any(|log| log.message.contains("expected 201, got 500")));
    drop(state);

    assert_eq!(client.parent_name("test1").as_deref(), Some("AC-1: valid trade is stored"));
    assert_eq!(
        client.parent_name("AC-1: valid trade is stored").as_deref(),
        Some("S-1: Capture a trade")
    );
    assert_eq!(client.parent_name("S-1: Capture a trade").as_deref(), Some("Trade Capture"));
    assert_eq!(client.parent_name("Trade Capture"), None);
}

#[tokio::test]
async fn test_failure_mid_upload_returns_structured_failure() {
    // epic, story, criterion start fine; the first test item is refused
    let client = Arc::new(RecordingClient::failing_on_start(4));
    let result = uploader(&client).upload_stories(&story_results()).await;

    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("Parent item not found"));
    assert_eq!(result.items_uploaded, 0);
    assert_eq!(result.logs_uploaded, 0);
    assert_eq!(result.stats.total, 0);
    assert!(result.launch_id.is_none());

    // nothing is finished after the failure
    assert!(client.finished_names().is_empty());
    assert!(client.state.lock().unwrap().launch_finish.is_none());
}

#[tokio::test]
async fn test_unreachable_backend_creates_nothing() {
    let client = Arc::new(RecordingClient {
        unreachable: true,
        ..Default::default()
    });
    let result = uploader(&client).upload_stories(&story_results()).await;

    assert!(!result.success);
    assert!(result.error.is_some());
    assert!(client.state.lock().unwrap().launch.is_none());
}

#[tokio::test]
async fn test_validation_warning_only_result_is_skipped() {
    let report: ValidationReport = serde_json::from_str(
        r#"{
            "id": "val-1",
            "title": "Nightly validation",
            "timestamp": "2026-03-01T10:00:00Z",
            "results": [
                {
                    "filePath": "tests/ok.spec.ts",
                    "framework": "jest",
                    "testType": "unit",
                    "valid": true,
                    "timestamp": "2026-03-01T10:00:00Z"
                },
                {
                    "filePath": "tests/weak.spec.ts",
                    "framework": "jest",
                    "testType": "unit",
                    "valid": false,
                    "issues": [{
                        "ruleId": "no-assertions",
                        "severity": "warning",
                        "message": "test has no assertions",
                        "filePath": "tests/weak.spec.ts",
                        "line": 4
                    }],
                    "timestamp": "2026-03-01T10:00:00Z"
                }
            ]
        }"#,
    )
    .unwrap();

    let client = Arc::new(RecordingClient::default());
    let result = uploader(&client).upload_validation_report(&report).await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.items_uploaded, 2);
    assert_eq!(result.logs_uploaded, 1);
    assert_eq!(result.stats.passed, 1);
    assert_eq!(result.stats.skipped, 1);
    assert_eq!(result.stats.failed, 0);

    let finished = client.finished_names();
    assert_eq!(finished[0], ("ok.spec.ts".to_string(), ReportStatus::Passed));
    assert_eq!(finished[1], ("weak.spec.ts".to_string(), ReportStatus::Skipped));
    assert_eq!(finished[2], ("Validation Suite".to_string(), ReportStatus::Passed));
}

#[tokio::test]
async fn test_allure_steps_nest_under_their_parent() {
    let results: Vec<AllureResult> = serde_json::from_str(
        r#"[{
            "uuid": "a1",
            "name": "login works",
            "status": "broken",
            "statusDetails": { "message": "timeout", "trace": "at login()" },
            "start": 1000,
            "stop": 2000,
            "labels": [{ "name": "feature", "value": "auth" }],
            "steps": [{
                "name": "open page",
                "status": "passed",
                "start": 1000,
                "stop": 1200,
                "steps": [{ "name": "wait for form", "status": "passed", "start": 1000, "stop": 1100 }]
            }, {
                "name": "submit",
                "status": "broken",
                "start": 1200,
                "stop": 2000
            }]
        }]"#,
    )
    .unwrap();

    let client = Arc::new(RecordingClient::default());
    let result = uploader(&client)
        .upload_allure_results("Allure nightly", &results)
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.items_uploaded, 1);
    assert_eq!(result.stats.steps, 3);
    assert_eq!(result.stats.failed, 1);

    assert_eq!(client.parent_name("wait for form").as_deref(), Some("open page"));
    assert_eq!(client.parent_name("open page").as_deref(), Some("login works"));
    assert_eq!(client.parent_name("submit").as_deref(), Some("login works"));
    assert_eq!(client.parent_name("login works"), None);

    let finished: Vec<String> = client.finished_names().into_iter().map(|(n, _)| n).collect();
    assert_eq!(finished, vec!["wait for form", "open page", "submit", "login works"]);

    let state = client.state.lock().unwrap();
    assert_eq!(state.launch.as_ref().unwrap().name, "Allure nightly");
    assert_eq!(
        state.launch_finish.as_ref().unwrap().status,
        Some(ReportStatus::Failed)
    );
    assert!(state.logs.iter().any(|log| log.message.contains("timeout")));
}
