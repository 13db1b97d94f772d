//! Seed a fresh dataset from a flat `id,name,value` CSV.
//!
//! ```text
//! id,name,value
//! 1,GeForce RTX 3080,1000
//! ```
//! becomes
//! ```text
//! { "metadata": { "reference_gpu": "GeForce RTX 3080", "reference_score": 1000, "total_gpus": 1 },
//!   "gpus": { "1": { "name": "GeForce RTX 3080", "score": 1000 } } }
//! ```

use std::fs::File;
use std::io;
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::BootstrapConfig;
use crate::dataset::{Metadata, write_atomic};
use crate::error::AppError;

const ID_COLUMN: &str = "id";
const NAME_COLUMN: &str = "name";
const VALUE_COLUMN: &str = "value";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedRecord {
    pub name: String,
    pub score: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedDocument {
    pub metadata: Metadata,
    pub gpus: IndexMap<String, SeedRecord>,
}

impl SeedDocument {
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Convert CSV text into a seed document. `origin` is only used in errors.
///
/// Unlike score merging this is strict: a missing column or a value that is
/// not an integer aborts the conversion.
pub fn convert<R: io::Read>(reader: R, config: &BootstrapConfig, origin: &Path) -> Result<SeedDocument, AppError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| AppError::malformed(origin, format!("column '{name}' not found in header")))
    };
    let (id_idx, name_idx, value_idx) = (column(ID_COLUMN)?, column(NAME_COLUMN)?, column(VALUE_COLUMN)?);

    let mut gpus = IndexMap::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |idx: usize, name: &'static str| {
            record
                .get(idx)
                .map(str::trim)
                .ok_or_else(|| AppError::malformed(origin, format!("line {line}: missing '{name}'")))
        };

        let id = field(id_idx, ID_COLUMN)?;
        let name = field(name_idx, NAME_COLUMN)?;
        let raw_value = field(value_idx, VALUE_COLUMN)?;
        let score = raw_value.parse::<i64>().map_err(|e| {
            AppError::malformed(origin, format!("line {line}: value '{raw_value}' is not an integer: {e}"))
        })?;

        if gpus
            .insert(id.to_string(), SeedRecord { name: name.to_string(), score })
            .is_some()
        {
            debug!(id, line, "duplicate id; later row wins");
        }
    }

    Ok(SeedDocument {
        metadata: Metadata {
            reference_gpu: Some(config.reference_gpu.clone()),
            reference_score: Some(config.reference_score.into()),
            total_gpus: Some(gpus.len() as u64),
            extra: Default::default(),
        },
        gpus,
    })
}

/// Read `config.input`, write the seed document to `config.output`.
/// Returns the number of GPUs written.
pub fn run(config: &BootstrapConfig) -> Result<usize, AppError> {
    let file = match File::open(&config.input) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(AppError::MissingFile(config.input.clone()));
        }
        Err(e) => return Err(e.into()),
    };
    let document = convert(file, config, &config.input)?;
    write_atomic(&config.output, document.to_pretty_json()?.as_bytes())?;

    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        gpus = document.gpus.len(),
        "seed dataset written"
    );
    Ok(document.gpus.len())
}
