//! ResultUploader - replays result trees onto a reporting backend
//!
//! Traversal is depth-first and strictly sequential: a child is started
//! only after its parent's id is known, and a parent is finished only after
//! all of its children. Any client failure aborts the upload and comes back
//! as `UploadResult { success: false, .. }`; items already created on the
//! backend are left as they are.

use super::client::{ClientResult, ReportingClient};
use super::converter::{
    convert_allure_result, convert_allure_status_details, convert_allure_step,
    convert_validation_issues, convert_validation_report, convert_validation_result,
    validation_status,
};
use super::story_converter::{
    calculate_suite_status, criterion_suite, epic_suite, launch_request, report_status,
    story_suite, test_item, test_logs,
};
use crate::config::ReportingConfig;
use crate::error::ExternalClientError;
use crate::models::{
    AllureResult, AllureStep, Attribute, FinishLaunchRequest, FinishLaunchResponse,
    FinishTestItemRequest, LaunchMode, ReportLog, ReportStatus, StartLaunchRequest,
    StartLaunchResponse, StartTestItemRequest, StoryTestResult, UploadResult, UploadStats,
    ValidationReport,
};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const DEFAULT_VALIDATION_LAUNCH: &str = "Validation Report";

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Counters accumulated while walking a tree
#[derive(Debug, Default)]
struct Progress {
    items: usize,
    logs: usize,
    suites: usize,
    steps: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl Progress {
    fn count_status(&mut self, status: ReportStatus) {
        match status {
            ReportStatus::Passed => self.passed += 1,
            ReportStatus::Failed => self.failed += 1,
            ReportStatus::Skipped => self.skipped += 1,
            // not a final verdict of a test
            ReportStatus::Interrupted | ReportStatus::Cancelled | ReportStatus::InProgress => {}
        }
    }
}

/// Launch-level settings taken from the reporting configuration
#[derive(Debug, Clone, Default)]
struct LaunchSettings {
    name: Option<String>,
    description: Option<String>,
    attributes: Vec<Attribute>,
    mode: LaunchMode,
}

pub struct ResultUploader {
    client: Arc<dyn ReportingClient>,
    launch: LaunchSettings,
}

impl ResultUploader {
    pub fn new(client: Arc<dyn ReportingClient>, config: &ReportingConfig) -> Self {
        Self {
            client,
            launch: LaunchSettings {
                name: config.launch_name.clone(),
                description: config.launch_description.clone(),
                attributes: config.launch_attributes.clone(),
                mode: config.mode,
            },
        }
    }

    /// Upload an epic/story/criterion/test tree
    pub async fn upload_stories(&self, result: &StoryTestResult) -> UploadResult {
        let started = Instant::now();
        info!(title = %result.title, stories = result.stories.len(), "uploading story results");
        let outcome = self.try_upload_stories(result).await;
        finalize(outcome, started)
    }

    /// Upload a validation report as one suite with an item per file
    pub async fn upload_validation_report(&self, report: &ValidationReport) -> UploadResult {
        let started = Instant::now();
        info!(report = %report.id, results = report.results.len(), "uploading validation report");
        let outcome = self.try_upload_validation(report).await;
        finalize(outcome, started)
    }

    /// Upload Allure results as root items with nested steps
    pub async fn upload_allure_results(&self, launch_name: &str, results: &[AllureResult]) -> UploadResult {
        let started = Instant::now();
        info!(launch = launch_name, results = results.len(), "uploading allure results");
        let outcome = self.try_upload_allure(launch_name, results).await;
        finalize(outcome, started)
    }

    // =========================================================================
    // Story results
    // =========================================================================

    async fn try_upload_stories(&self, result: &StoryTestResult) -> ClientResult<UploadResult> {
        self.prepare().await?;

        let launch = self.start_launch(&launch_request(result)).await?;
        let launch_id = launch.id.clone();
        let mut progress = Progress::default();

        let epic_id = self
            .start_suite(&epic_suite(result, &launch_id), &mut progress)
            .await?;
        let mut epic_end = result.timestamp;

        for story in &result.stories {
            debug!(story = %story.story_id, "uploading story");
            let story_start = now_ms();
            let story_id = self
                .start_suite(&story_suite(story, &launch_id, &epic_id, story_start), &mut progress)
                .await?;
            let mut story_end = story_start;

            for criterion in &story.acceptance_criteria {
                let criterion_start = now_ms();
                let criterion_id = self
                    .start_suite(
                        &criterion_suite(criterion, &launch_id, &story_id, criterion_start),
                        &mut progress,
                    )
                    .await?;
                let mut criterion_end = criterion_start;

                for test in &criterion.tests {
                    let test_start = now_ms();
                    let item_id = self
                        .client
                        .start_test_item(&test_item(test, &launch_id, &criterion_id, test_start))
                        .await?
                        .id;

                    self.save_logs(&test_logs(test, &item_id, test_start), &launch_id, &mut progress)
                        .await?;

                    let test_end = test_start.saturating_add(i64::try_from(test.duration).unwrap_or(i64::MAX));
                    self.finish_item(&item_id, test_end, report_status(test.status))
                        .await?;
                    progress.items += 1;
                    progress.steps += 1;
                    criterion_end = criterion_end.max(test_end);
                }

                let criterion_end = criterion_end.max(now_ms());
                let status = calculate_suite_status(&criterion.tests);
                self.finish_item(&criterion_id, criterion_end, report_status(status))
                    .await?;
                story_end = story_end.max(criterion_end);
            }

            let story_end = story_end.max(now_ms());
            let status = calculate_suite_status(story.tests());
            self.finish_item(&story_id, story_end, report_status(status))
                .await?;
            epic_end = epic_end.max(story_end);
        }

        let epic_end = epic_end.max(now_ms());
        let status = report_status(calculate_suite_status(result.all_tests()));
        self.finish_item(&epic_id, epic_end, status).await?;

        let finished = self.finish_launch(&launch_id, epic_end, status).await?;

        let tally = result.tally();
        let stats = UploadStats {
            total: tally.total,
            passed: tally.passed,
            failed: tally.failed,
            skipped: tally.skipped,
            suites: progress.suites,
            steps: progress.steps,
        };
        Ok(self.succeeded(&launch, finished, &progress, stats))
    }

    // =========================================================================
    // Validation reports
    // =========================================================================

    async fn try_upload_validation(&self, report: &ValidationReport) -> ClientResult<UploadResult> {
        self.prepare().await?;

        let mut attributes = self.launch.attributes.clone();
        attributes.push(Attribute::new("type", "validation"));
        let request = StartLaunchRequest {
            name: self
                .launch
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_VALIDATION_LAUNCH.to_string()),
            description: self.launch.description.clone(),
            start_time: report.timestamp.timestamp_millis(),
            attributes,
            mode: Some(self.launch.mode),
        };
        let launch = self.start_launch(&request).await?;
        let launch_id = launch.id.clone();
        let mut progress = Progress::default();

        let suite = convert_validation_report(report, &launch_id);
        let suite_id = self
            .start_suite(&suite.start_request(), &mut progress)
            .await?;
        let mut suite_end = suite.start_time;

        for result in &report.results {
            let item = convert_validation_result(result, &launch_id, Some(&suite_id), now_ms());
            let item_id = self.client.start_test_item(&item.start_request()).await?.id;

            let logs = convert_validation_issues(&result.issues, &item_id, item.start_time);
            self.save_logs(&logs, &launch_id, &mut progress).await?;

            self.client
                .finish_test_item(&item_id, &item.finish_request())
                .await?;
            progress.items += 1;
            progress.count_status(validation_status(result));
            suite_end = suite_end.max(item.end_time);
        }

        let status = if progress.failed > 0 {
            ReportStatus::Failed
        } else {
            ReportStatus::Passed
        };
        let suite_end = suite_end.max(now_ms());
        self.finish_item(&suite_id, suite_end, status).await?;
        let finished = self.finish_launch(&launch_id, suite_end, status).await?;

        let stats = UploadStats {
            total: report.results.len(),
            passed: progress.passed,
            failed: progress.failed,
            skipped: progress.skipped,
            suites: progress.suites,
            steps: 0,
        };
        Ok(self.succeeded(&launch, finished, &progress, stats))
    }

    // =========================================================================
    // Allure results
    // =========================================================================

    async fn try_upload_allure(&self, launch_name: &str, results: &[AllureResult]) -> ClientResult<UploadResult> {
        self.prepare().await?;

        let mut attributes = self.launch.attributes.clone();
        attributes.push(Attribute::new("type", "allure"));
        let request = StartLaunchRequest {
            name: launch_name.to_string(),
            description: self.launch.description.clone(),
            start_time: results.iter().map(|r| r.start).min().unwrap_or_else(now_ms),
            attributes,
            mode: Some(self.launch.mode),
        };
        let launch = self.start_launch(&request).await?;
        let launch_id = launch.id.clone();
        let mut progress = Progress::default();
        let mut launch_end = request.start_time;

        for result in results {
            let item = convert_allure_result(result, &launch_id, None);
            let item_id = self.client.start_test_item(&item.start_request()).await?.id;

            if let Some(log) = convert_allure_status_details(
                result.status,
                result.status_details.as_ref(),
                result.stop,
                &item_id,
            ) {
                self.save_logs(&[log], &launch_id, &mut progress).await?;
            }

            self.upload_steps(&result.steps, &launch_id, &item_id, &mut progress)
                .await?;

            self.client
                .finish_test_item(&item_id, &item.finish_request())
                .await?;
            progress.items += 1;
            progress.count_status(item.status);
            launch_end = launch_end.max(item.end_time);
        }

        let status = if progress.failed > 0 {
            ReportStatus::Failed
        } else if progress.passed == 0 {
            ReportStatus::Skipped
        } else {
            ReportStatus::Passed
        };
        let finished = self.finish_launch(&launch_id, launch_end, status).await?;

        let stats = UploadStats {
            total: results.len(),
            passed: progress.passed,
            failed: progress.failed,
            skipped: progress.skipped,
            suites: 0,
            steps: progress.steps,
        };
        Ok(self.succeeded(&launch, finished, &progress, stats))
    }

    fn upload_steps<'a>(
        &'a self,
        steps: &'a [AllureStep],
        launch_id: &'a str,
        parent_id: &'a str,
        progress: &'a mut Progress,
    ) -> BoxFuture<'a, ClientResult<()>> {
        Box::pin(async move {
            for (index, step) in steps.iter().enumerate() {
                let item = convert_allure_step(step, launch_id, parent_id, index);
                let step_id = self.client.start_test_item(&item.start_request()).await?.id;
                progress.steps += 1;

                if let Some(log) = convert_allure_status_details(
                    step.status,
                    step.status_details.as_ref(),
                    step.stop,
                    &step_id,
                ) {
                    self.save_logs(&[log], launch_id, progress).await?;
                }

                self.upload_steps(&step.steps, launch_id, &step_id, progress)
                    .await?;

                self.client
                    .finish_test_item(&step_id, &item.finish_request())
                    .await?;
            }
            Ok(())
        })
    }

    // =========================================================================
    // Shared steps
    // =========================================================================

    async fn prepare(&self) -> ClientResult<()> {
        debug!("checking connection to reporting backend");
        if !self.client.check_connection().await {
            return Err(ExternalClientError::Unreachable(
                "connection check failed".to_string(),
            ));
        }
        self.client.ensure_project().await
    }

    async fn start_launch(&self, request: &StartLaunchRequest) -> ClientResult<StartLaunchResponse> {
        let launch = self.client.start_launch(request).await?;
        info!(launch = %launch.id, name = %request.name, "launch started");
        Ok(launch)
    }

    async fn start_suite(
        &self,
        request: &StartTestItemRequest,
        progress: &mut Progress,
    ) -> ClientResult<String> {
        let response = self.client.start_test_item(request).await?;
        progress.suites += 1;
        debug!(suite = %request.name, id = %response.id, "suite started");
        Ok(response.id)
    }

    async fn finish_item(&self, item_id: &str, end_time: i64, status: ReportStatus) -> ClientResult<()> {
        let request = FinishTestItemRequest {
            end_time,
            status,
            description: None,
        };
        self.client.finish_test_item(item_id, &request).await?;
        Ok(())
    }

    async fn save_logs(&self, logs: &[ReportLog], launch_id: &str, progress: &mut Progress) -> ClientResult<()> {
        for log in logs {
            self.client.save_log(&log.save_request(launch_id)).await?;
            progress.logs += 1;
        }
        Ok(())
    }

    async fn finish_launch(
        &self,
        launch_id: &str,
        end_time: i64,
        status: ReportStatus,
    ) -> ClientResult<FinishLaunchResponse> {
        let request = FinishLaunchRequest {
            end_time: end_time.max(now_ms()),
            status: Some(status),
            description: None,
        };
        let finished = self.client.finish_launch(launch_id, &request).await?;
        info!(launch = launch_id, status = status.name(), "launch finished");
        Ok(finished)
    }

    fn succeeded(
        &self,
        launch: &StartLaunchResponse,
        finished: FinishLaunchResponse,
        progress: &Progress,
        stats: UploadStats,
    ) -> UploadResult {
        let launch_id = if finished.id.is_empty() {
            launch.id.clone()
        } else {
            finished.id
        };
        let launch_url = finished
            .link
            .unwrap_or_else(|| self.client.launch_url(&launch.id));

        UploadResult {
            success: true,
            launch_id: Some(launch_id),
            launch_number: finished.number.or(launch.number),
            launch_url: Some(launch_url),
            items_uploaded: progress.items,
            logs_uploaded: progress.logs,
            attachments_uploaded: 0,
            duration: 0,
            error: None,
            stats,
        }
    }
}

/// Stamp the duration, or turn an error into a failed result
fn finalize(outcome: ClientResult<UploadResult>, started: Instant) -> UploadResult {
    let duration = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match outcome {
        Ok(mut result) => {
            result.duration = duration;
            info!(
                items = result.items_uploaded,
                logs = result.logs_uploaded,
                duration_ms = duration,
                "upload finished"
            );
            result
        }
        Err(error) => {
            warn!(%error, duration_ms = duration, "upload failed");
            UploadResult::failure(duration, error.to_string())
        }
    }
}
