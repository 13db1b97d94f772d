use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use gpu_scores::matcher::MatchStrategy;

#[derive(Parser, Debug)]
#[command(version, about = "Merge GPU benchmark scores from CSV into a JSON dataset")]
pub struct Cli {
    /// Path to a TOML config file (default: config/default.toml if present).
    #[arg(long = "config", short = 'f', global = true, value_name = "PATH")]
    pub config: Option<String>,

    /// Increase logging verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge one CSV column into one resolution slot.
    Merge(MergeArgs),
    /// Merge every `[[sources]]` entry from the config file.
    Batch(BatchArgs),
    /// Convert an `id,name,value` CSV into a fresh dataset.
    Bootstrap(BootstrapArgs),
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Dataset JSON to read.
    pub json_file: PathBuf,
    /// CSV holding the scores.
    pub csv_file: PathBuf,
    /// CSV column containing the score.
    pub score_column: String,
    /// CSV column containing the GPU name.
    pub key_column: String,
    /// Resolution key in the dataset, e.g. 1080p, 1440p, 4k.
    pub resolution: String,

    /// Output file (default: updated_data.json).
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// How CSV names are matched against dataset names.
    #[arg(long, value_enum)]
    pub strategy: Option<MatchStrategy>,

    /// Read the legacy layout: name in column 0, score in column 4.
    #[arg(long = "fixed-columns", default_value_t = false)]
    pub fixed_columns: bool,
}

#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Dataset JSON to read.
    pub json_file: PathBuf,

    /// Output file (default: `[general].output`).
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// How CSV names are matched against dataset names.
    #[arg(long, value_enum)]
    pub strategy: Option<MatchStrategy>,
}

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Source CSV (default: gpus.csv).
    #[arg(long, short = 'i', value_name = "PATH")]
    pub input: Option<PathBuf>,

    /// Destination JSON (default: gpus.json).
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}
