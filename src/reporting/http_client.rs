//! ReportPortal v1 REST client
//!
//! Bearer-token JSON API under `<endpoint>/api/v1/<project>`. Transport
//! failures, timeouts and 5xx/408/429 answers are retried with exponential
//! backoff (1s, 2s, 4s, ... capped at 60s) up to `max_retries` attempts.

use super::client::{ClientResult, ReportingClient};
use crate::config::ReportingConfig;
use crate::error::ExternalClientError;
use crate::models::{
    FinishLaunchRequest, FinishLaunchResponse, FinishTestItemRequest, FinishTestItemResponse,
    SaveLogRequest, SaveLogResponse, StartLaunchRequest, StartLaunchResponse,
    StartTestItemRequest, StartTestItemResponse,
};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_MAX_MS: u64 = 60_000;

/// Error body returned by the backend on non-2xx answers
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectRequest<'a> {
    project_name: &'a str,
    entry_type: &'a str,
}

pub struct HttpReportingClient {
    client: Client,
    config: ReportingConfig,
    api_url: String,
}

impl HttpReportingClient {
    pub fn new(config: &ReportingConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            api_url: format!("{}/api/v1/{}", config.base_url(), config.project),
            config: config.clone(),
        })
    }

    fn project_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn project_exists(&self) -> ClientResult<bool> {
        let url = self.project_url("/launch?page.size=1");
        match self.request::<serde_json::Value, ()>(Method::GET, &url, None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Send with retries; non-retryable answers return immediately
    async fn request<T, B>(&self, method: Method, url: &str, body: Option<&B>) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let attempts = self.config.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.execute(method.clone(), url, body).await {
                Ok(value) => return Ok(value),
                Err(e) if !is_retryable(&e) => return Err(e),
                Err(e) => {
                    warn!(%method, url, attempt, attempts, error = %e, "reporting request failed");
                    if attempt < attempts {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(ExternalClientError::RetriesExhausted {
            attempts,
            last: Box::new(
                last_error.unwrap_or_else(|| ExternalClientError::Client("no attempt made".into())),
            ),
        })
    }

    async fn execute<T, B>(&self, method: Method, url: &str, body: Option<&B>) -> ClientResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        if self.config.debug {
            debug!(%method, url, "reporting request");
        }

        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.config.token)
            .header(ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() {
                ExternalClientError::Unreachable(e.to_string())
            } else {
                ExternalClientError::Http(e)
            }
        })?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExternalClientError::Api {
                status: status.as_u16(),
                message: error_message(status, &text),
            });
        }

        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text)
            .map_err(|e| ExternalClientError::Client(format!("failed to parse response: {e}")))
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("unknown status")
        )
    };

    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            message: Some(message),
            details,
        }) => match details {
            Some(details) => format!("{message} - {details}"),
            None => message,
        },
        _ => fallback(),
    }
}

/// Wait before the attempt after `attempt`, doubling up to a minute
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(BACKOFF_BASE_MS.saturating_mul(factor).min(BACKOFF_MAX_MS))
}

fn is_retryable(error: &ExternalClientError) -> bool {
    match error {
        ExternalClientError::Api { status, .. } => {
            *status >= 500 || *status == 408 || *status == 429
        }
        ExternalClientError::Http(_) | ExternalClientError::Unreachable(_) => true,
        _ => false,
    }
}

#[async_trait]
impl ReportingClient for HttpReportingClient {
    async fn check_connection(&self) -> bool {
        match self.project_exists().await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, "connection check failed");
                false
            }
        }
    }

    async fn ensure_project(&self) -> ClientResult<()> {
        if self.project_exists().await? {
            return Ok(());
        }

        debug!(project = %self.config.project, "project missing, creating it");
        let url = format!("{}/api/v1/project", self.config.base_url());
        let body = CreateProjectRequest {
            project_name: &self.config.project,
            entry_type: "INTERNAL",
        };
        self.request::<serde_json::Value, _>(Method::POST, &url, Some(&body))
            .await?;
        Ok(())
    }

    async fn start_launch(&self, request: &StartLaunchRequest) -> ClientResult<StartLaunchResponse> {
        debug!(name = %request.name, "starting launch");
        self.request(Method::POST, &self.project_url("/launch"), Some(request))
            .await
    }

    async fn start_test_item(
        &self,
        request: &StartTestItemRequest,
    ) -> ClientResult<StartTestItemResponse> {
        let path = match &request.parent_uuid {
            Some(parent) => format!("/item/{parent}"),
            None => "/item".to_string(),
        };
        self.request(Method::POST, &self.project_url(&path), Some(request))
            .await
    }

    async fn finish_test_item(
        &self,
        item_id: &str,
        request: &FinishTestItemRequest,
    ) -> ClientResult<FinishTestItemResponse> {
        let url = self.project_url(&format!("/item/{item_id}"));
        self.request(Method::PUT, &url, Some(request)).await
    }

    async fn save_log(&self, request: &SaveLogRequest) -> ClientResult<SaveLogResponse> {
        self.request(Method::POST, &self.project_url("/log"), Some(request))
            .await
    }

    async fn finish_launch(
        &self,
        launch_id: &str,
        request: &FinishLaunchRequest,
    ) -> ClientResult<FinishLaunchResponse> {
        let url = self.project_url(&format!("/launch/{launch_id}/finish"));
        self.request(Method::PUT, &url, Some(request)).await
    }

    fn launch_url(&self, launch_id: &str) -> String {
        format!(
            "{}/ui/#{}/launches/all/{}",
            self.config.base_url(),
            self.config.project,
            launch_id
        )
    }
}
