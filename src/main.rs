use std::sync::Arc;

use async_trait::async_trait;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use issuecost::estimation::{EstimationOverrides, ProgressSink};
use issuecost::github::{parse_issue_link, parse_repo_link};
use issuecost::models::EstimationResult;
use issuecost::{Config, EstimationParams, EstimationPipeline, Storage};

#[derive(Parser, Debug)]
#[command(name = "issuecost")]
#[command(version = "0.1.0")]
#[command(about = "Estimate complexity and cost of open GitHub issues")]
struct Cli {
    /// Database path for storing results (overrides DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to bind (overrides BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Estimate every open issue of a repository
    Estimate {
        /// Repository link or owner/name
        repo: String,

        /// Write the CSV here instead of stdout
        #[arg(short, long)]
        output: Option<String>,

        /// Print the full JSON result instead of CSV
        #[arg(long)]
        json: bool,

        /// Issues estimated concurrently per group (overrides BATCH_SIZE)
        #[arg(long)]
        batch_size: Option<usize>,

        #[command(flatten)]
        budget: BudgetArgs,
    },

    /// Estimate a single issue
    Issue {
        /// Issue link, e.g. https://github.com/owner/repo/issues/12
        link: String,

        #[command(flatten)]
        budget: BudgetArgs,
    },

    /// List stored runs, or show the results of one
    History {
        #[arg(long)]
        run: Option<i64>,

        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Args, Debug, Default)]
struct BudgetArgs {
    /// Model name (overrides DEFAULT_MODEL)
    #[arg(long)]
    model: Option<String>,

    #[arg(long)]
    min_budget: Option<f64>,

    #[arg(long)]
    max_budget: Option<f64>,
}

impl From<BudgetArgs> for EstimationOverrides {
    fn from(args: BudgetArgs) -> Self {
        EstimationOverrides {
            model: args.model,
            min_budget: args.min_budget,
            max_budget: args.max_budget,
            ..Default::default()
        }
    }
}

/// Drives a terminal progress bar from batch checkpoints.
struct BarSink {
    bar: ProgressBar,
}

impl BarSink {
    fn new() -> anyhow::Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} issues {msg}")?
                .progress_chars("#>-"),
        );
        Ok(Self { bar })
    }
}

#[async_trait]
impl ProgressSink for BarSink {
    async fn log(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    async fn on_group_complete(&self, processed: usize, total: usize, _group: &[EstimationResult]) {
        self.bar.set_length(total as u64);
        self.bar.set_position(processed as u64);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("issuecost=info".parse()?)
                .add_directive("reqwest=warn".parse()?)
                .add_directive("tower_http=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::History { run, limit } => {
            let path = cli
                .database
                .or_else(|| std::env::var("DATABASE_PATH").ok())
                .unwrap_or_else(|| "estimates.db".to_string());
            show_history(&Storage::new(&path)?, run, limit)
        }
        Command::Serve { bind } => {
            let mut config = load_config(cli.database)?;
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            issuecost::server::serve(&config).await?;
            Ok(())
        }
        Command::Estimate {
            repo,
            output,
            json,
            batch_size,
            budget,
        } => {
            let mut config = load_config(cli.database)?;
            if let Some(size) = batch_size {
                config.batch_size = size.max(1);
            }

            let repo = parse_repo_link(&repo)?;
            let params = EstimationParams::resolve(&config.estimation_defaults(), &budget.into())?;
            let storage = Arc::new(Storage::new(&config.database_path)?);
            let pipeline = EstimationPipeline::from_config(&config, Some(storage))?;

            let sink = BarSink::new()?;
            let estimate = pipeline.estimate_repository(&repo, &params, &sink).await;
            sink.bar.finish_and_clear();
            let estimate = estimate?;

            tracing::info!(
                "Estimated {} issues, total ${:.2}, average ${:.2}",
                estimate.summary.issue_count,
                estimate.summary.total_cost,
                estimate.summary.average_cost
            );

            let rendered = if json {
                serde_json::to_string_pretty(&estimate)?
            } else {
                estimate.csv_content
            };
            write_output(&rendered, output.as_deref())
        }
        Command::Issue { link, budget } => {
            let config = load_config(cli.database)?;
            let (repo, number) = parse_issue_link(&link)?;
            let params = EstimationParams::resolve(&config.estimation_defaults(), &budget.into())?;
            let pipeline = EstimationPipeline::from_config(&config, None)?;

            let result = pipeline.estimate_issue(&repo, number, &params).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
    }
}

fn load_config(database: Option<String>) -> anyhow::Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(path) = database {
        config.database_path = path;
    }
    Ok(config)
}

fn write_output(output: &str, path: Option<&str>) -> anyhow::Result<()> {
    if let Some(path) = path {
        std::fs::write(path, output)?;
        tracing::info!("Output written to: {}", path);
    } else {
        print!("{}", output);
    }
    Ok(())
}

fn show_history(storage: &Storage, run: Option<i64>, limit: usize) -> anyhow::Result<()> {
    if let Some(run_id) = run {
        let results = storage.get_run_results(run_id)?;
        if results.is_empty() {
            anyhow::bail!("No results stored for run {}", run_id);
        }
        print!("{}", issuecost::export::to_csv(&results));
        return Ok(());
    }

    let runs = storage.list_runs(limit)?;
    if runs.is_empty() {
        println!("No stored runs");
        return Ok(());
    }

    for run in runs {
        let breakdown = &run.summary.complexity_breakdown;
        println!(
            "#{:<4} {}  {:<30} {:>4} issues  ${:>10.2}  (low {}, medium {}, high {}, critical {})  {}",
            run.id,
            run.created_at.format("%Y-%m-%d %H:%M"),
            run.repository,
            run.summary.issue_count,
            run.summary.total_cost,
            breakdown.low,
            breakdown.medium,
            breakdown.high,
            breakdown.critical,
            run.model
        );
    }
    Ok(())
}
