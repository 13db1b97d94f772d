//! One merge run: load the dataset, fold in every score source, write once.
//!
//! Nothing touches the output path until every source has been applied, so a
//! fatal error anywhere leaves the previous output intact.

use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::dataset::Dataset;
use crate::error::AppError;
use crate::matcher::{MatchStrategy, MergeReport, merge_scores};
use crate::score_csv::{ColumnLayout, load_table};

/// A CSV feeding one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSource {
    pub csv_path: PathBuf,
    pub resolution: String,
    pub layout: ColumnLayout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub strategy: MatchStrategy,
    pub sources: Vec<ScoreSource>,
}

impl MergeJob {
    /// Job over every `[[sources]]` entry in `config`.
    pub fn from_config(config: &Config, input: PathBuf, output: Option<PathBuf>) -> Self {
        let sources = config
            .sources
            .iter()
            .map(|s| ScoreSource {
                csv_path: s.path.clone(),
                resolution: s.resolution.clone(),
                layout: config
                    .csv
                    .layout_for(s.key_column.as_deref(), s.score_column.as_deref()),
            })
            .collect();
        Self {
            input,
            output: output.unwrap_or_else(|| config.output.clone()),
            strategy: config.strategy,
            sources,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub reports: Vec<MergeReport>,
}

impl RunSummary {
    pub fn total_updated(&self) -> usize {
        self.reports.iter().map(|r| r.updated).sum()
    }
}

/// Apply `sources` in order. Later sources win when two target the same resolution.
pub fn apply_sources(
    dataset: &mut Dataset,
    sources: &[ScoreSource],
    strategy: MatchStrategy,
) -> Result<Vec<MergeReport>, AppError> {
    let mut reports = Vec::with_capacity(sources.len());
    for source in sources {
        let table = load_table(&source.csv_path, &source.layout, strategy)?;
        let report = merge_scores(dataset, &table, &source.resolution);
        info!(
            csv = %source.csv_path.display(),
            resolution = %report.resolution,
            matched = report.matched,
            updated = report.updated,
            unmatched = report.unmatched,
            "scores merged"
        );
        reports.push(report);
    }
    Ok(reports)
}

pub fn run(job: &MergeJob) -> Result<RunSummary, AppError> {
    let mut dataset = Dataset::load(&job.input)?;
    info!(
        input = %job.input.display(),
        gpus = dataset.gpus.len(),
        sources = job.sources.len(),
        strategy = %job.strategy,
        "merge started"
    );

    let reports = apply_sources(&mut dataset, &job.sources, job.strategy)?;
    dataset.save(&job.output)?;

    Ok(RunSummary {
        output: job.output.clone(),
        reports,
    })
}
