use super::{open_registry, report_operation};
use crate::config::Config;
use crate::models::{
    BulkCrystallizationOptions, ReviewDecision, ValidationReport, ValidationResult,
};
use crate::{Context, Result};
use colored::Colorize;
use std::path::Path;

/// clap value parser for `--decision`
pub fn parse_decision(value: &str) -> std::result::Result<ReviewDecision, String> {
    ReviewDecision::parse(value)
        .ok_or_else(|| format!("unknown decision '{value}' (approve, request-changes, reject)"))
}

pub async fn register(config: &Config, file: &str, story: &str) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let test = registry.register_test(file, story).await?;

    println!("{} {}", "🧪 Registered".green().bold(), test.file_path);
    println!("   Story:   {}", test.story_id);
    println!("   Version: {}", test.version);
    println!("   Hash:    {}", test.content_hash.bright_black());
    Ok(())
}

pub async fn attach_validation(
    config: &Config,
    file: &str,
    report: &Path,
    score: Option<f64>,
    actor: &str,
) -> Result<()> {
    let result = load_validation(report, file)?;
    let score = score.unwrap_or_else(|| result.metrics.quality_score());

    let mut registry = open_registry(config).await?;
    let op = registry
        .attach_validation(file, result, score, actor)
        .await?;
    report_operation(&op)
}

pub async fn start_review(config: &Config, file: &str, actor: &str) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.start_review(file, actor).await?;
    report_operation(&op)
}

pub async fn review(
    config: &Config,
    file: &str,
    reviewer: &str,
    decision: ReviewDecision,
    comments: Option<&str>,
) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.review(file, reviewer, decision, comments).await?;
    report_operation(&op)?;

    // auto-crystallization appends its own operation
    if let Some(last) = registry.operations().last().filter(|last| last.id != op.id) {
        report_operation(last)?;
    }
    Ok(())
}

pub async fn crystallize(config: &Config, file: &str, actor: &str) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.crystallize(file, actor).await?;
    report_operation(&op)?;

    if let Some(test) = registry.get_test(file) {
        if test.locked {
            println!("   🔒 {}", test.lock_reason.as_deref().unwrap_or("locked"));
        }
    }
    Ok(())
}

pub async fn lock(config: &Config, file: &str, actor: &str, reason: Option<&str>) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.lock(file, actor, reason).await?;
    report_operation(&op)
}

pub async fn unlock(config: &Config, file: &str, actor: &str, reason: Option<&str>) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.unlock(file, actor, reason).await?;
    report_operation(&op)
}

pub async fn deprecate(config: &Config, file: &str, actor: &str, reason: Option<&str>) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.deprecate(file, actor, reason).await?;
    report_operation(&op)
}

pub async fn refresh(config: &Config, file: &str, actor: &str) -> Result<()> {
    let mut registry = open_registry(config).await?;
    let op = registry.refresh_content(file, actor).await?;
    report_operation(&op)
}

pub async fn bulk(config: &Config, options: BulkCrystallizationOptions) -> Result<()> {
    let mut registry = open_registry(config).await?;

    if options.dry_run {
        println!("{}", "🔎 Dry run: nothing will be written".yellow());
    }
    let result = registry.bulk_crystallize(&options).await;

    for (file, op) in &result.results {
        let marker = if op.success { "✓".green() } else { "✗".red() };
        println!("   {} {} ({})", marker, file, op.message);
    }
    for (file, error) in &result.errors {
        println!("   {} {} ({})", "✗".red(), file, error.red());
    }

    println!();
    println!(
        "   Total: {}  Succeeded: {}  Skipped: {}  Failed: {}",
        result.total,
        result.succeeded.to_string().green(),
        result.skipped.to_string().yellow(),
        result.failed.to_string().red()
    );

    if result.failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", result.failed, result.total);
    }
    Ok(())
}

/// Accepts a full validation report or a single result
fn load_validation(path: &Path, file: &str) -> Result<ValidationResult> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read validation output: {}", path.display()))?;

    if let Ok(report) = serde_json::from_str::<ValidationReport>(&content) {
        return report.result_for(file).cloned().with_context(|| {
            format!("No validation result for {} in {}", file, path.display())
        });
    }

    serde_json::from_str(&content)
        .with_context(|| format!("Invalid validation result: {}", path.display()))
}
