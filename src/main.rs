use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::io;
use std::path::PathBuf;
use test_evidence::cli::crystallize::parse_decision;
use test_evidence::cli::upload::ReportingArgs;
use test_evidence::cli::{crystallize, status, upload};
use test_evidence::models::{BulkCrystallizationOptions, ReviewDecision};
use test_evidence::{Config, Result};

#[derive(Parser)]
#[command(name = "tef")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Crystallize generated tests and upload test evidence", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (defaults to ./tef.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Name recorded as the operator of registry changes
    #[arg(long, global = true, env = "TEF_ACTOR", default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a generated test file in the crystallization registry
    Register {
        /// Test file path
        file: String,

        /// Story the test was generated from
        #[arg(short, long)]
        story: String,
    },

    /// Attach validator output to a registered test
    #[command(name = "validate-attach")]
    ValidateAttach {
        /// Test file path
        file: String,

        /// Validation report or single result (JSON)
        #[arg(short, long)]
        report: PathBuf,

        /// Quality score override (0-100)
        #[arg(long)]
        score: Option<f64>,
    },

    /// Move a generated test into review
    #[command(name = "start-review")]
    StartReview {
        /// Test file path
        file: String,
    },

    /// Record a review decision
    Review {
        /// Test file path
        file: String,

        /// Reviewer name
        #[arg(short, long)]
        reviewer: String,

        /// approve, request-changes or reject
        #[arg(short, long, value_parser = parse_decision)]
        decision: ReviewDecision,

        /// Review comments
        #[arg(short = 'm', long)]
        comments: Option<String>,
    },

    /// Crystallize an approved test
    Crystallize {
        /// Test file path
        file: String,
    },

    /// Review and crystallize several files in one pass
    Bulk {
        /// Test file paths
        #[arg(required = true)]
        files: Vec<String>,

        /// Reviewer name
        #[arg(short, long)]
        reviewer: String,

        /// Decision applied to every file
        #[arg(short, long, value_parser = parse_decision, default_value = "approve")]
        decision: ReviewDecision,

        /// Review comments
        #[arg(short = 'm', long)]
        comments: Option<String>,

        /// Report what would happen without writing the registry
        #[arg(long)]
        dry_run: bool,
    },

    /// Lock a crystallized test against content changes
    Lock {
        /// Test file path
        file: String,

        /// Lock reason
        #[arg(long)]
        reason: Option<String>,
    },

    /// Unlock a test
    Unlock {
        /// Test file path
        file: String,

        /// Unlock reason
        #[arg(long)]
        reason: Option<String>,
    },

    /// Mark a test as no longer valid
    Deprecate {
        /// Test file path
        file: String,

        /// Deprecation reason
        #[arg(long)]
        reason: Option<String>,
    },

    /// Re-hash a test file after it was edited
    Refresh {
        /// Test file path
        file: String,
    },

    /// Show registered tests grouped by status, or one test in detail
    Status {
        /// Test file path
        file: Option<String>,

        /// Only tests generated from this story
        #[arg(short, long)]
        story: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show crystallization statistics
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a crystallization report with recommendations
    Report {
        /// Number of recent operations to include
        #[arg(long, default_value_t = 10)]
        recent: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload story test results (epic/story/criterion/test)
    #[command(name = "upload-stories")]
    UploadStories {
        /// Story results JSON
        #[arg(long = "results")]
        file: PathBuf,

        #[command(flatten)]
        reporting: ReportingArgs,
    },

    /// Upload a validation report
    #[command(name = "upload-validation")]
    UploadValidation {
        /// Validation report JSON
        #[arg(long = "report")]
        file: PathBuf,

        #[command(flatten)]
        reporting: ReportingArgs,
    },

    /// Upload an Allure results directory
    #[command(name = "upload-allure")]
    UploadAllure {
        /// Directory containing *-result.json files
        #[arg(long)]
        dir: PathBuf,

        #[command(flatten)]
        reporting: ReportingArgs,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    test_evidence::logging::init(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("{}", format!("Error: failed to create tokio runtime: {}", e).red());
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_async(cli)) {
        eprintln!("{}", format!("Error: {:#}", e).red());
        std::process::exit(1);
    }
}

async fn run_async(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        generate(shell, &mut Cli::command(), "tef", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    let actor = cli.actor.as_str();

    match cli.command {
        Commands::Register { file, story } => {
            crystallize::register(&config, &file, &story).await?;
        }
        Commands::ValidateAttach { file, report, score } => {
            crystallize::attach_validation(&config, &file, &report, score, actor).await?;
        }
        Commands::StartReview { file } => {
            crystallize::start_review(&config, &file, actor).await?;
        }
        Commands::Review {
            file,
            reviewer,
            decision,
            comments,
        } => {
            crystallize::review(&config, &file, &reviewer, decision, comments.as_deref()).await?;
        }
        Commands::Crystallize { file } => {
            crystallize::crystallize(&config, &file, actor).await?;
        }
        Commands::Bulk {
            files,
            reviewer,
            decision,
            comments,
            dry_run,
        } => {
            let options = BulkCrystallizationOptions {
                files,
                reviewer,
                decision,
                comments,
                dry_run,
            };
            crystallize::bulk(&config, options).await?;
        }
        Commands::Lock { file, reason } => {
            crystallize::lock(&config, &file, actor, reason.as_deref()).await?;
        }
        Commands::Unlock { file, reason } => {
            crystallize::unlock(&config, &file, actor, reason.as_deref()).await?;
        }
        Commands::Deprecate { file, reason } => {
            crystallize::deprecate(&config, &file, actor, reason.as_deref()).await?;
        }
        Commands::Refresh { file } => {
            crystallize::refresh(&config, &file, actor).await?;
        }
        Commands::Status { file: Some(file), json, .. } => {
            status::show_test(&config, &file, json).await?;
        }
        Commands::Status { file: None, story, json } => {
            status::status(&config, story.as_deref(), json).await?;
        }
        Commands::Stats { json } => {
            status::stats(&config, json).await?;
        }
        Commands::Report { recent, json } => {
            status::report(&config, recent, json).await?;
        }
        Commands::UploadStories { file, reporting } => {
            upload::upload_stories(&config, &file, &reporting).await?;
        }
        Commands::UploadValidation { file, reporting } => {
            upload::upload_validation(&config, &file, &reporting).await?;
        }
        Commands::UploadAllure { dir, reporting } => {
            upload::upload_allure(&config, &dir, &reporting).await?;
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
