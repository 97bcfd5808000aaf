use crate::config::{Config, ReportingConfig};
use crate::models::UploadResult;
use crate::reporting::loader::{load_allure_results, load_story_results, load_validation_report};
use crate::reporting::{HttpReportingClient, ResultUploader};
use crate::Result;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Camel-case reporting settings picked up from the working directory
pub const REPORTING_JSON_FILE: &str = "reportportal.json";

/// Connection overrides shared by the upload commands
#[derive(Args, Debug, Clone, Default)]
pub struct ReportingArgs {
    /// Reporting backend URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// API token
    #[arg(long)]
    pub token: Option<String>,

    /// Project name
    #[arg(long)]
    pub project: Option<String>,

    /// Launch name
    #[arg(long)]
    pub launch_name: Option<String>,

    /// Launch description
    #[arg(long)]
    pub launch_description: Option<String>,

    /// JSON reporting config (defaults to ./reportportal.json when present)
    #[arg(long)]
    pub reporting_config: Option<PathBuf>,
}

/// Resolve file, then JSON, then environment, then flags
pub fn resolve_reporting_config(config: &Config, args: &ReportingArgs) -> Result<ReportingConfig> {
    let json_path = match &args.reporting_config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(REPORTING_JSON_FILE)).filter(|p| p.exists()),
    };

    let mut reporting = match json_path {
        Some(path) => ReportingConfig::from_json_file(&path)?,
        None => config.reporting.clone(),
    };
    reporting.apply_env();
    apply_args(&mut reporting, args);

    reporting.validate()?;
    Ok(reporting)
}

fn apply_args(reporting: &mut ReportingConfig, args: &ReportingArgs) {
    if let Some(endpoint) = &args.endpoint {
        reporting.endpoint = endpoint.clone();
    }
    if let Some(token) = &args.token {
        reporting.token = token.clone();
    }
    if let Some(project) = &args.project {
        reporting.project = project.clone();
    }
    if let Some(name) = &args.launch_name {
        reporting.launch_name = Some(name.clone());
    }
    if let Some(description) = &args.launch_description {
        reporting.launch_description = Some(description.clone());
    }
}

fn uploader(reporting: &ReportingConfig) -> Result<ResultUploader> {
    let client = HttpReportingClient::new(reporting)?;
    Ok(ResultUploader::new(Arc::new(client), reporting))
}

pub async fn upload_stories(config: &Config, file: &Path, args: &ReportingArgs) -> Result<()> {
    let reporting = resolve_reporting_config(config, args)?;
    let results = load_story_results(file)?;

    println!(
        "{} {} ({} stories)",
        "📤 Uploading".cyan(),
        results.title,
        results.stories.len()
    );
    let outcome = uploader(&reporting)?.upload_stories(&results).await;
    print_outcome(&outcome)
}

pub async fn upload_validation(config: &Config, file: &Path, args: &ReportingArgs) -> Result<()> {
    let reporting = resolve_reporting_config(config, args)?;
    let report = load_validation_report(file)?;

    println!(
        "{} validation report {} ({} files)",
        "📤 Uploading".cyan(),
        report.id,
        report.results.len()
    );
    let outcome = uploader(&reporting)?.upload_validation_report(&report).await;
    print_outcome(&outcome)
}

pub async fn upload_allure(config: &Config, dir: &Path, args: &ReportingArgs) -> Result<()> {
    let reporting = resolve_reporting_config(config, args)?;
    let results = load_allure_results(dir)?;
    if results.is_empty() {
        anyhow::bail!("No Allure results found in {}", dir.display());
    }

    let launch_name = reporting
        .launch_name
        .clone()
        .unwrap_or_else(|| "Allure Results".to_string());
    println!(
        "{} {} ({} results)",
        "📤 Uploading".cyan(),
        launch_name,
        results.len()
    );
    let outcome = uploader(&reporting)?
        .upload_allure_results(&launch_name, &results)
        .await;
    print_outcome(&outcome)
}

fn print_outcome(outcome: &UploadResult) -> Result<()> {
    if !outcome.success {
        println!("{} Upload failed after {}ms", "❌".red(), outcome.duration);
        anyhow::bail!(
            "{}",
            outcome.error.as_deref().unwrap_or("upload failed")
        );
    }

    let stats = &outcome.stats;
    println!("{} Upload complete in {}ms", "✅".green(), outcome.duration);
    println!(
        "   Items: {}  Logs: {}  Suites: {}  Steps: {}",
        outcome.items_uploaded, outcome.logs_uploaded, stats.suites, stats.steps
    );
    println!(
        "   Passed: {}  Failed: {}  Skipped: {}",
        stats.passed.to_string().green(),
        stats.failed.to_string().red(),
        stats.skipped.to_string().yellow()
    );
    if let Some(url) = &outcome.launch_url {
        println!("   🔗 {}", url.underline());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut reporting = ReportingConfig {
            endpoint: "http://from-file".into(),
            token: "file-token".into(),
            project: "file-project".into(),
            ..Default::default()
        };
        let args = ReportingArgs {
            project: Some("cli-project".into()),
            launch_name: Some("Nightly".into()),
            ..Default::default()
        };

        apply_args(&mut reporting, &args);
        assert_eq!(reporting.endpoint, "http://from-file");
        assert_eq!(reporting.project, "cli-project");
        assert_eq!(reporting.launch_name.as_deref(), Some("Nightly"));
    }

    #[test]
    fn test_incomplete_config_is_rejected() {
        let config = Config::default();
        let args = ReportingArgs {
            endpoint: Some("http://localhost:8080".into()),
            reporting_config: Some(PathBuf::from("/nonexistent/reportportal.json")),
            ..Default::default()
        };
        assert!(resolve_reporting_config(&config, &args).is_err());
    }
}
