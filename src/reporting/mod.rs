//! Uploading test evidence to a hierarchical reporting backend

pub mod client;
pub mod converter;
pub mod http_client;
pub mod loader;
pub mod story_converter;
pub mod uploader;

pub use client::{ClientResult, ReportingClient};
pub use http_client::HttpReportingClient;
pub use story_converter::calculate_suite_status;
pub use uploader::ResultUploader;
