// Test Evidence - crystallization and reporting for generated tests
// Tracks review-to-production state of generated test files and replays
// story, validation and Allure results onto a hierarchical reporting backend

pub mod cli;
pub mod config;
pub mod crystallization;
pub mod error;
pub mod logging;
pub mod models;
pub mod reporting;

pub use anyhow::{Context, Result};

// Re-export commonly used types
pub use config::{Config, ReportingConfig};
pub use crystallization::CrystallizationRegistry;
pub use error::{CrystallizationError, ExternalClientError};
pub use reporting::{HttpReportingClient, ReportingClient, ResultUploader};
