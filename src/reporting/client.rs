use crate::error::ExternalClientError;
use crate::models::{
    FinishLaunchRequest, FinishLaunchResponse, FinishTestItemRequest, FinishTestItemResponse,
    SaveLogRequest, SaveLogResponse, StartLaunchRequest, StartLaunchResponse,
    StartTestItemRequest, StartTestItemResponse,
};
use async_trait::async_trait;

pub type ClientResult<T> = std::result::Result<T, ExternalClientError>;

/// Hierarchical reporting backend
///
/// Launches contain nested test items; items carry logs. A child item is
/// created under the id the backend returned for its parent, so callers
/// must await each start before starting children.
#[async_trait]
pub trait ReportingClient: Send + Sync {
    /// Whether the backend is reachable
    ///
    /// A missing project still counts as reachable.
    async fn check_connection(&self) -> bool;

    /// Create the configured project if it does not exist
    async fn ensure_project(&self) -> ClientResult<()>;

    async fn start_launch(&self, request: &StartLaunchRequest) -> ClientResult<StartLaunchResponse>;

    /// Start an item under `request.parent_uuid`, or at the launch root
    async fn start_test_item(
        &self,
        request: &StartTestItemRequest,
    ) -> ClientResult<StartTestItemResponse>;

    async fn finish_test_item(
        &self,
        item_id: &str,
        request: &FinishTestItemRequest,
    ) -> ClientResult<FinishTestItemResponse>;

    async fn save_log(&self, request: &SaveLogRequest) -> ClientResult<SaveLogResponse>;

    async fn finish_launch(
        &self,
        launch_id: &str,
        request: &FinishLaunchRequest,
    ) -> ClientResult<FinishLaunchResponse>;

    /// Browser URL of a launch
    fn launch_url(&self, launch_id: &str) -> String;
}
