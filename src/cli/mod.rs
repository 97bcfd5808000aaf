pub mod crystallize;
pub mod status;
pub mod upload;

use crate::config::Config;
use crate::crystallization::CrystallizationRegistry;
use crate::models::CrystallizationOperation;
use crate::{Context, Result};
use colored::Colorize;

/// Load the registry named by the configuration
pub async fn open_registry(config: &Config) -> Result<CrystallizationRegistry> {
    CrystallizationRegistry::open(config.crystallization.clone(), &config.registry_path)
        .await
        .with_context(|| {
            format!(
                "Failed to load registry: {}",
                config.registry_path.display()
            )
        })
}

/// Print an operation outcome; a rejected operation becomes an error
pub fn report_operation(op: &CrystallizationOperation) -> Result<()> {
    if !op.success {
        println!(
            "{} {} {}",
            "❌".red(),
            op.op_type.name().red().bold(),
            op.file_path
        );
        anyhow::bail!("{}", op.message);
    }

    let transition = if op.previous_status == op.new_status {
        format!("{} {}", op.new_status.emoji(), op.new_status)
    } else {
        format!(
            "{} {} → {} {}",
            op.previous_status.emoji(),
            op.previous_status,
            op.new_status.emoji(),
            op.new_status
        )
    };

    println!(
        "{} {} {}",
        "✅".green(),
        op.op_type.name().green().bold(),
        op.file_path
    );
    println!("   {}", transition);
    println!("   {}", op.message.bright_black());
    Ok(())
}
