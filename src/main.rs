//! gpu-scores: entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI args
//!   3. Load config
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Run the selected command and print a summary

mod cli;

use clap::Parser;
use tracing::warn;

use gpu_scores::{bootstrap, config, error::AppError, logger, pipeline};
use gpu_scores::pipeline::{MergeJob, RunSummary, ScoreSource};
use gpu_scores::score_csv::ColumnLayout;

use cli::{BatchArgs, BootstrapArgs, Cli, Command, MergeArgs};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // Load .env if present: ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = Cli::parse();
    let config = config::load(args.config.as_deref())?;

    let cli_level = logger::level_for_verbosity(args.verbose);
    logger::init(cli_level.unwrap_or(config.log_level.as_str()), cli_level.is_some())?;

    match args.command {
        Command::Merge(merge) => run_merge(&config, merge),
        Command::Batch(batch) => run_batch(&config, batch),
        Command::Bootstrap(seed) => run_bootstrap(&config, seed),
    }
}

fn run_merge(config: &config::Config, args: MergeArgs) -> Result<(), AppError> {
    let layout = if args.fixed_columns {
        warn!(
            key_column = %args.key_column,
            score_column = %args.score_column,
            "--fixed-columns given; column names are ignored"
        );
        ColumnLayout::FixedIndex {
            key_index: config.csv.key_index,
            score_index: config.csv.score_index,
        }
    } else {
        ColumnLayout::by_header(args.key_column, args.score_column)
    };

    let job = MergeJob {
        input: args.json_file,
        output: args.output.unwrap_or_else(|| config.output.clone()),
        strategy: args.strategy.unwrap_or(config.strategy),
        sources: vec![ScoreSource {
            csv_path: args.csv_file,
            resolution: args.resolution,
            layout,
        }],
    };

    print_summary(&pipeline::run(&job)?);
    Ok(())
}

fn run_batch(config: &config::Config, args: BatchArgs) -> Result<(), AppError> {
    if config.sources.is_empty() {
        return Err(AppError::Config(
            "no [[sources]] configured; pass a config file with -f".into(),
        ));
    }

    let mut job = MergeJob::from_config(config, args.json_file, args.output);
    if let Some(strategy) = args.strategy {
        job.strategy = strategy;
    }

    print_summary(&pipeline::run(&job)?);
    Ok(())
}

fn run_bootstrap(config: &config::Config, args: BootstrapArgs) -> Result<(), AppError> {
    let mut seed = config.bootstrap.clone();
    if let Some(input) = args.input {
        seed.input = input;
    }
    if let Some(output) = args.output {
        seed.output = output;
    }

    let count = bootstrap::run(&seed)?;
    println!("✓ {count} GPUs converted into {}", seed.output.display());
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    for report in &summary.reports {
        println!(
            "✓ {}: {} of {} GPUs updated ({} matched, {} without score)",
            report.resolution, report.updated, report.total, report.matched, report.unmatched
        );
    }
    println!("JSON written to '{}'", summary.output.display());
}
