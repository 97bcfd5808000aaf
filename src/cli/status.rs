use super::open_registry;
use crate::config::Config;
use crate::models::{CrystallizationStatus, CrystallizedTest};
use crate::Result;
use colored::Colorize;

/// List registered tests grouped by status
pub async fn status(config: &Config, story: Option<&str>, json: bool) -> Result<()> {
    let registry = open_registry(config).await?;
    let tests: Vec<&CrystallizedTest> = match story {
        Some(story) => registry.tests_by_story(story),
        None => registry.tests().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&tests)?);
        return Ok(());
    }

    if tests.is_empty() {
        println!("{}", "No tests registered".yellow());
        println!(
            "   Registry: {}",
            registry.path().display().to_string().bright_black()
        );
        return Ok(());
    }

    println!("{}", "📋 Crystallization status".cyan().bold());
    println!("{}", "─".repeat(60).bright_black());

    for status in CrystallizationStatus::ALL {
        let group: Vec<_> = tests.iter().filter(|t| t.status == status).collect();
        if group.is_empty() {
            continue;
        }

        println!();
        println!(
            "{} {} ({})",
            status.emoji(),
            status.name().bold(),
            group.len()
        );
        for test in group {
            let lock = if test.locked { " 🔒" } else { "" };
            println!(
                "   {} {} v{} {:.1}{}",
                test.file_path,
                format!("[{}]", test.story_id).bright_black(),
                test.version,
                test.review.quality_score,
                lock
            );
        }
    }
    Ok(())
}

/// Detail view of one test with its operation history
pub async fn show_test(config: &Config, file: &str, json: bool) -> Result<()> {
    let registry = open_registry(config).await?;
    let test = registry
        .get_test(file)
        .ok_or_else(|| anyhow::anyhow!("Test not registered: {}", file))?;

    if json {
        println!("{}", serde_json::to_string_pretty(test)?);
        return Ok(());
    }

    println!("{} {}", test.status.emoji(), test.file_path.cyan().bold());
    println!("   Status:    {}", test.status.name());
    println!("   Story:     {}", test.story_id);
    println!(
        "   Framework: {} ({})",
        test.framework.name(),
        test.test_type.name()
    );
    println!("   Version:   {}", test.version);
    println!("   Quality:   {:.1}", test.review.quality_score);
    if test.locked {
        println!(
            "   Locked:    🔒 {}",
            test.lock_reason.as_deref().unwrap_or("yes")
        );
    }

    let reviewers = test.review.reviewers();
    if !reviewers.is_empty() {
        println!();
        println!("{}", "Reviews:".bold());
        for reviewer in reviewers {
            println!(
                "   {} {} {}",
                reviewer.timestamp.format("%Y-%m-%d %H:%M").to_string().bright_black(),
                reviewer.name,
                reviewer.decision.name()
            );
            if let Some(comments) = &reviewer.comments {
                println!("      {}", comments.bright_black());
            }
        }
    }

    let operations = registry.operations_for(file);
    if !operations.is_empty() {
        println!();
        println!("{}", "Operations:".bold());
        for op in operations {
            let marker = if op.success { "✓".green() } else { "✗".red() };
            println!("   {} {} {}", marker, op.op_type.name(), op.message.bright_black());
        }
    }
    Ok(())
}

pub async fn stats(config: &Config, json: bool) -> Result<()> {
    let registry = open_registry(config).await?;
    let stats = registry.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("{}", "📊 Crystallization statistics".cyan().bold());
    println!("{}", "─".repeat(60).bright_black());
    println!("   Total tests:          {}", stats.total);
    for status in CrystallizationStatus::ALL {
        println!(
            "   {} {:<20} {}",
            status.emoji(),
            status.name(),
            stats.count(status)
        );
    }
    println!();
    println!("   Average quality:      {:.1}", stats.average_quality_score);
    println!("   Crystallized today:   {}", stats.crystallized_today);
    println!("   Locked:               {}", stats.locked);
    println!(
        "   Crystallization rate: {}",
        format!("{:.1}%", stats.crystallization_rate).green()
    );
    Ok(())
}

pub async fn report(config: &Config, recent: usize, json: bool) -> Result<()> {
    let registry = open_registry(config).await?;
    let report = registry.report(recent);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "📝 Crystallization report".cyan().bold());
    println!(
        "   Generated: {}",
        report.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "   {} tests, {:.1}% crystallized",
        report.stats.total, report.stats.crystallization_rate
    );

    if !report.recent_operations.is_empty() {
        println!();
        println!("{}", "Recent operations:".bold());
        for op in &report.recent_operations {
            let marker = if op.success { "✓".green() } else { "✗".red() };
            println!(
                "   {} {} {} {} {}",
                marker,
                op.timestamp.format("%m-%d %H:%M").to_string().bright_black(),
                op.op_type.name(),
                op.file_path,
                format!("({})", op.operator).bright_black()
            );
        }
    }

    if !report.recommendations.is_empty() {
        println!();
        println!("{}", "Recommendations:".bold());
        for recommendation in &report.recommendations {
            println!("   💡 {}", recommendation);
        }
    }
    Ok(())
}
