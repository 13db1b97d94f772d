//! The GPU dataset document and its on-disk form.
//!
//! Shape:
//! ```text
//! {
//!   "metadata": { "reference_gpu": ..., "reference_score": ..., "total_gpus": ... },   (optional)
//!   "gpus": {
//!     "<id>": { "name": "...", "scores": { "1080p": 150.5, "4k": null } }
//!   }
//! }
//! ```
//!
//! Key order is preserved and fields this crate does not know about are
//! carried through untouched. Scores are kept as [`serde_json::Number`] so an
//! untouched `95` is written back as `95`, not `95.0`.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::AppError;

/// Resolution label -> score, `None` serialising as `null`.
pub type Scores = IndexMap<String, Option<Number>>;

/// One GPU entry.
///
/// On save `name` and `scores` are written first and the remaining fields
/// follow in their original order, so an entry whose input put them later is
/// reordered. A missing `name` stays missing and `"name": null` stays null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpuRecord {
    /// Outer `None`: key absent. `Some(None)`: explicit `null`.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub name: Option<Option<String>>,
    #[serde(default)]
    pub scores: Scores,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl GpuRecord {
    pub fn name(&self) -> Option<&str> {
        self.name.as_ref().and_then(Option::as_deref)
    }

    pub fn score(&self, resolution: &str) -> Option<f64> {
        self.scores
            .get(resolution)
            .and_then(Option::as_ref)
            .and_then(Number::as_f64)
    }

    /// Store `score` under `resolution`, returning whether the stored value changed.
    ///
    /// Numerically equal values are left alone so an existing `150` is not
    /// rewritten as `150.0`. Non-finite scores are stored as `null`.
    pub fn set_score(&mut self, resolution: &str, score: Option<f64>) -> bool {
        let next = score.and_then(Number::from_f64);
        let next_value = next.as_ref().and_then(Number::as_f64);
        match self.scores.get(resolution) {
            Some(current) if current.as_ref().and_then(Number::as_f64) == next_value => false,
            _ => {
                self.scores.insert(resolution.to_string(), next);
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_gpu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_score: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_gpus: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    pub gpus: IndexMap<String, GpuRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Dataset {
    /// Read and parse the dataset at `path`.
    ///
    /// A missing file is [`AppError::MissingFile`]; anything that is not a
    /// well-formed dataset is [`AppError::MalformedInput`]. Both are fatal.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AppError::MissingFile(path.to_path_buf()));
            }
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                return Err(AppError::malformed(path, e.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let dataset = Self::from_json_str(&raw).map_err(|e| AppError::malformed(path, e.to_string()))?;
        debug!(path = %path.display(), gpus = dataset.gpus.len(), "dataset loaded");
        Ok(dataset)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Two-space indented JSON; non-ASCII is written as-is.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        write_atomic(path, self.to_pretty_json()?.as_bytes())?;
        debug!(path = %path.display(), "dataset written");
        Ok(())
    }
}

/// Mode for files that did not exist before the write.
#[cfg(unix)]
const NEW_FILE_MODE: u32 = 0o644;

/// Write via a temp file in the target directory, then rename over `path`.
///
/// The temp file starts out `0600`; on unix it is given the replaced file's
/// mode, or [`NEW_FILE_MODE`] when there is nothing to replace.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = match fs::metadata(path) {
            Ok(meta) => meta.permissions().mode() & 0o7777,
            Err(e) if e.kind() == io::ErrorKind::NotFound => NEW_FILE_MODE,
            Err(e) => return Err(e),
        };
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
