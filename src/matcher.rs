//! Name matching and score merging.
//!
//! A [`ScoreTable`] maps a matching key to an optional score. The key is
//! derived from a GPU name by the table's [`MatchStrategy`], and the same
//! derivation is applied to the dataset's names at lookup time, so the two
//! sides can never disagree on how a name is keyed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::dataset::Dataset;

/// How a GPU name is turned into a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    /// Raw name, verbatim.
    Exact,
    /// Alphanumeric characters only, lowercased (see [`normalize_name`]).
    #[default]
    Normalized,
}

impl MatchStrategy {
    /// Key for `name` under this strategy. `None` when the name cannot match anything.
    pub fn key_for(self, name: Option<&str>) -> Option<String> {
        let key = match self {
            Self::Exact => name.unwrap_or_default().to_string(),
            Self::Normalized => normalize_name(name),
        };
        (!key.is_empty()).then_some(key)
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Normalized => write!(f, "normalized"),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "normalized" | "normalised" => Ok(Self::Normalized),
            other => Err(format!("unknown match strategy '{other}' (expected exact|normalized)")),
        }
    }
}

/// Strip everything but alphanumerics and fold case.
///
/// `"RTX 3080 Ti"` and `"rtx-3080-ti"` both become `"rtx3080ti"`; `None` becomes `""`.
pub fn normalize_name(name: Option<&str>) -> String {
    name.map(|n| {
        n.chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect()
    })
    .unwrap_or_default()
}

/// Lookup table built from one CSV source.
#[derive(Debug, Clone)]
pub struct ScoreTable {
    strategy: MatchStrategy,
    entries: HashMap<String, Option<f64>>,
}

impl ScoreTable {
    pub fn new(strategy: MatchStrategy) -> Self {
        Self {
            strategy,
            entries: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Insert a score under the key derived from `name`. Later inserts for the
    /// same key replace earlier ones. Returns `false` if `name` yields no key.
    pub fn insert(&mut self, name: &str, score: Option<f64>) -> bool {
        match self.strategy.key_for(Some(name)) {
            Some(key) => {
                self.entries.insert(key, score.filter(|s| s.is_finite()));
                true
            }
            None => false,
        }
    }

    /// Score for `name`, or `None` when there is no entry or the entry is null.
    pub fn lookup(&self, name: Option<&str>) -> Option<f64> {
        let key = self.strategy.key_for(name)?;
        self.entries.get(&key).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of merging one table into a dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub resolution: String,
    /// Records visited.
    pub total: usize,
    /// Records that received a score.
    pub matched: usize,
    /// Records whose stored value changed.
    pub updated: usize,
    /// Records left (or reset) to null.
    pub unmatched: usize,
}

/// Write `table`'s score for every record into `scores[resolution]`.
///
/// Records without a match get `null`; nothing from a previous run survives.
pub fn merge_scores(dataset: &mut Dataset, table: &ScoreTable, resolution: &str) -> MergeReport {
    let mut report = MergeReport {
        resolution: resolution.to_string(),
        total: dataset.gpus.len(),
        ..MergeReport::default()
    };

    for (id, record) in dataset.gpus.iter_mut() {
        let score = table.lookup(record.name());
        if score.is_some() {
            report.matched += 1;
        } else {
            report.unmatched += 1;
            debug!(gpu = %id, gpu_name = record.name().unwrap_or(""), %resolution, "no score");
        }
        if record.set_score(resolution, score) {
            report.updated += 1;
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_GPU: &str = r#"{"gpus":{"g1":{"name":"RTX 3080","scores":{"1080p":null}}}}"#;

    fn dataset(json: &str) -> Dataset {
        Dataset::from_json_str(json).unwrap()
    }

    fn score_of(ds: &Dataset, id: &str, res: &str) -> Option<f64> {
        ds.gpus[id].score(res)
    }

    #[test]
    fn normalize_strips_and_folds() {
        assert_eq!(normalize_name(Some("RTX 3080 Ti")), "rtx3080ti");
        assert_eq!(normalize_name(Some("rtx-3080-ti")), "rtx3080ti");
        assert_eq!(normalize_name(Some("Radeon RX 7900 XTX (24GB)")), "radeonrx7900xtx24gb");
        assert_eq!(normalize_name(None), "");
        assert_eq!(normalize_name(Some(" - ")), "");
    }

    #[test]
    fn strategy_parses_from_str() {
        assert_eq!("exact".parse::<MatchStrategy>().unwrap(), MatchStrategy::Exact);
        assert_eq!(" Normalized ".parse::<MatchStrategy>().unwrap(), MatchStrategy::Normalized);
        assert!("fuzzy".parse::<MatchStrategy>().is_err());
        assert_eq!(MatchStrategy::default(), MatchStrategy::Normalized);
    }

    #[test]
    fn exact_table_is_verbatim() {
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("RTX 3080", Some(150.5));
        assert_eq!(table.lookup(Some("RTX 3080")), Some(150.5));
        assert_eq!(table.lookup(Some("rtx 3080")), None);
        assert_eq!(table.lookup(None), None);
    }

    #[test]
    fn normalized_table_collides_variants() {
        let mut table = ScoreTable::new(MatchStrategy::Normalized);
        table.insert("rtx-3080ti", Some(180.0));
        assert_eq!(table.lookup(Some("RTX 3080 Ti")), Some(180.0));
    }

    #[test]
    fn empty_keys_are_rejected() {
        let mut table = ScoreTable::new(MatchStrategy::Normalized);
        assert!(!table.insert("---", Some(1.0)));
        assert!(table.is_empty());
        assert_eq!(table.lookup(Some("")), None);
    }

    #[test]
    fn later_rows_win() {
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("A", Some(1.0));
        table.insert("A", Some(2.0));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(Some("A")), Some(2.0));
    }

    #[test]
    fn non_finite_scores_are_stored_as_null() {
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("A", Some(f64::NAN));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(Some("A")), None);
    }

    #[test]
    fn merge_sets_matched_score() {
        let mut ds = dataset(ONE_GPU);
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("RTX 3080", Some(150.5));

        let report = merge_scores(&mut ds, &table, "1080p");

        assert_eq!(score_of(&ds, "g1", "1080p"), Some(150.5));
        assert_eq!(report.matched, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.unmatched, 0);
    }

    #[test]
    fn merge_leaves_unmatched_null() {
        let mut ds = dataset(ONE_GPU);
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("RTX 3090", Some(200.0));

        let report = merge_scores(&mut ds, &table, "1080p");

        assert_eq!(score_of(&ds, "g1", "1080p"), None);
        assert_eq!(report.unmatched, 1);
        assert_eq!(report.updated, 0);
    }

    #[test]
    fn merge_clears_stale_value() {
        let mut ds = dataset(r#"{"gpus":{"g1":{"name":"RTX 3080","scores":{"4k":88}}}}"#);
        let table = ScoreTable::new(MatchStrategy::Normalized);

        let report = merge_scores(&mut ds, &table, "4k");

        assert_eq!(score_of(&ds, "g1", "4k"), None);
        assert!(ds.gpus["g1"].scores.contains_key("4k"));
        assert_eq!(report.updated, 1);
    }

    #[test]
    fn merge_creates_missing_resolution_slot() {
        let mut ds = dataset(ONE_GPU);
        let mut table = ScoreTable::new(MatchStrategy::Normalized);
        table.insert("rtx3080", Some(61.0));

        merge_scores(&mut ds, &table, "4k");

        assert_eq!(score_of(&ds, "g1", "4k"), Some(61.0));
        assert_eq!(score_of(&ds, "g1", "1080p"), None);
    }

    #[test]
    fn merge_counts_only_changes() {
        let mut ds = dataset(r#"{"gpus":{"g1":{"name":"RTX 3080","scores":{"1080p":150}}}}"#);
        let mut table = ScoreTable::new(MatchStrategy::Exact);
        table.insert("RTX 3080", Some(150.0));

        let report = merge_scores(&mut ds, &table, "1080p");

        assert_eq!(report.matched, 1);
        assert_eq!(report.updated, 0);
    }

    #[test]
    fn merge_is_idempotent() {
        let mut ds = dataset(ONE_GPU);
        let mut table = ScoreTable::new(MatchStrategy::Normalized);
        table.insert("RTX-3080", Some(150.5));

        merge_scores(&mut ds, &table, "1080p");
        let first = ds.to_pretty_json().unwrap();
        let second_report = merge_scores(&mut ds, &table, "1080p");
        let second = ds.to_pretty_json().unwrap();

        assert_eq!(first, second);
        assert_eq!(second_report.updated, 0);
    }

    #[test]
    fn record_without_name_gets_null() {
        let mut ds = dataset(r#"{"gpus":{"g1":{"scores":{}}}}"#);
        let mut table = ScoreTable::new(MatchStrategy::Normalized);
        table.insert("anything", Some(1.0));

        let report = merge_scores(&mut ds, &table, "1080p");

        assert_eq!(score_of(&ds, "g1", "1080p"), None);
        assert_eq!(report.unmatched, 1);
    }
}
