//! Building a [`ScoreTable`] from a CSV file.
//!
//! Columns are located by header name. The old fixed-position layout
//! (name in column 0, raw score in column 4) is still readable but has to be
//! asked for explicitly, and every use of it is logged.

use std::fs::File;
use std::io;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::matcher::{MatchStrategy, ScoreTable};

/// Where the name and score live in each CSV row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLayout {
    ByHeader {
        key_column: String,
        score_column: String,
    },
    /// Legacy positional layout; the header row is skipped but not inspected.
    FixedIndex { key_index: usize, score_index: usize },
}

impl ColumnLayout {
    pub const LEGACY_KEY_INDEX: usize = 0;
    pub const LEGACY_SCORE_INDEX: usize = 4;

    pub fn by_header(key_column: impl Into<String>, score_column: impl Into<String>) -> Self {
        Self::ByHeader {
            key_column: key_column.into(),
            score_column: score_column.into(),
        }
    }

    pub fn legacy() -> Self {
        Self::FixedIndex {
            key_index: Self::LEGACY_KEY_INDEX,
            score_index: Self::LEGACY_SCORE_INDEX,
        }
    }

    /// Column indices `(key, score)` for this layout against `headers`.
    fn resolve(&self, headers: &StringRecord, origin: &Path) -> Result<(usize, usize), AppError> {
        match self {
            Self::ByHeader {
                key_column,
                score_column,
            } => {
                let key = find_column(headers, key_column, origin)?;
                let score = find_column(headers, score_column, origin)?;
                Ok((key, score))
            }
            Self::FixedIndex {
                key_index,
                score_index,
            } => {
                warn!(
                    file = %origin.display(),
                    key_index,
                    score_index,
                    "reading scores by fixed column position (legacy layout); header names are ignored"
                );
                Ok((*key_index, *score_index))
            }
        }
    }
}

fn find_column(headers: &StringRecord, name: &str, origin: &Path) -> Result<usize, AppError> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| headers.iter().position(|h| h.trim() == name.trim()))
        .ok_or_else(|| {
            let available = headers.iter().collect::<Vec<_>>().join(", ");
            AppError::malformed(
                origin,
                format!("column '{name}' not found in header (available: {available})"),
            )
        })
}

/// Parse a score cell. Anything that is not a finite float is `None`.
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Build a table from CSV text. `origin` is only used in diagnostics.
///
/// A header that lacks a configured column is fatal. Bad score cells are
/// not: they are stored as null and reported with their line number.
pub fn read_table<R: io::Read>(
    reader: R,
    layout: &ColumnLayout,
    strategy: MatchStrategy,
    origin: &Path,
) -> Result<ScoreTable, AppError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut table = ScoreTable::new(strategy);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        warn!(file = %origin.display(), "csv is empty; no scores read");
        return Ok(table);
    }
    let (key_idx, score_idx) = layout.resolve(&headers, origin)?;

    let mut rows = 0usize;
    let mut nulls = 0usize;
    for result in rdr.records() {
        let record = result?;
        rows += 1;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let Some(name) = record.get(key_idx) else {
            debug!(file = %origin.display(), line, "row has no name column; skipped");
            continue;
        };

        let score = match record.get(score_idx) {
            Some(raw) => {
                let parsed = parse_score(raw);
                if parsed.is_none() {
                    warn!(file = %origin.display(), line, gpu = name, value = raw, "unparsable score; recorded as null");
                }
                parsed
            }
            None => {
                warn!(file = %origin.display(), line, gpu = name, "row has no score column; recorded as null");
                None
            }
        };

        if score.is_none() {
            nulls += 1;
        }
        if !table.insert(name, score) {
            debug!(file = %origin.display(), line, "row has an empty name; skipped");
        }
    }

    info!(
        file = %origin.display(),
        rows,
        keys = table.len(),
        nulls,
        %strategy,
        "score table built"
    );
    Ok(table)
}

/// Open `path` and build its table. A file that does not exist yields an
/// empty table and a warning; every other failure is an error.
pub fn load_table(path: &Path, layout: &ColumnLayout, strategy: MatchStrategy) -> Result<ScoreTable, AppError> {
    match File::open(path) {
        Ok(file) => read_table(file, layout, strategy, path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(file = %path.display(), "csv not found; treating as empty");
            Ok(ScoreTable::new(strategy))
        }
        Err(e) => Err(e.into()),
    }
}
