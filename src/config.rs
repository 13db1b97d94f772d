//! Configuration loading with env-var overrides.
//!
//! Reads an optional TOML file (`-f <path>`, else `config/default.toml` when it
//! exists, else built-in defaults), then applies `GPU_SCORES_LOG_LEVEL` and
//! `GPU_SCORES_STRATEGY` env overrides. CLI flags are applied on top by the
//! caller.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;
use crate::matcher::MatchStrategy;
use crate::score_csv::ColumnLayout;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const DEFAULT_OUTPUT: &str = "updated_data.json";
pub const DEFAULT_KEY_COLUMN: &str = "GPU_Name";
pub const DEFAULT_SCORE_COLUMN: &str = "Score";

/// Which CSV layout the `[csv]` section selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    #[default]
    Header,
    Fixed,
}

/// `[csv]`: how score columns are located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvConfig {
    pub layout: LayoutKind,
    pub key_column: String,
    pub score_column: String,
    pub key_index: usize,
    pub score_index: usize,
}

impl CsvConfig {
    /// Layout for a source, letting per-source column names win.
    pub fn layout_for(&self, key_column: Option<&str>, score_column: Option<&str>) -> ColumnLayout {
        match self.layout {
            LayoutKind::Header => ColumnLayout::by_header(
                key_column.unwrap_or(&self.key_column),
                score_column.unwrap_or(&self.score_column),
            ),
            LayoutKind::Fixed => ColumnLayout::FixedIndex {
                key_index: self.key_index,
                score_index: self.score_index,
            },
        }
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            layout: LayoutKind::Header,
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            score_column: DEFAULT_SCORE_COLUMN.to_string(),
            key_index: ColumnLayout::LEGACY_KEY_INDEX,
            score_index: ColumnLayout::LEGACY_SCORE_INDEX,
        }
    }
}

/// One `[[sources]]` entry: a CSV feeding one resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    /// Already resolved against the config file's directory.
    pub path: PathBuf,
    pub resolution: String,
    pub key_column: Option<String>,
    pub score_column: Option<String>,
}

/// `[bootstrap]`: seed conversion settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub reference_gpu: String,
    pub reference_score: i64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from(raw::default_bootstrap_input()),
            output: PathBuf::from(raw::default_bootstrap_output()),
            reference_gpu: raw::default_reference_gpu(),
            reference_score: raw::default_reference_score(),
        }
    }
}

/// Fully-resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: String,
    pub strategy: MatchStrategy,
    pub output: PathBuf,
    pub csv: CsvConfig,
    pub sources: Vec<SourceConfig>,
    pub bootstrap: BootstrapConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: raw::default_log_level(),
            strategy: MatchStrategy::default(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            csv: CsvConfig::default(),
            sources: Vec::new(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

/// Raw TOML shape: `serde` target before resolution.
mod raw {
    use serde::Deserialize;

    use super::LayoutKind;
    use crate::matcher::MatchStrategy;

    #[derive(Deserialize, Default)]
    #[serde(deny_unknown_fields)]
    pub(super) struct RawConfig {
        #[serde(default)]
        pub general: RawGeneral,
        #[serde(default)]
        pub csv: RawCsv,
        #[serde(default)]
        pub sources: Vec<RawSource>,
        #[serde(default)]
        pub bootstrap: RawBootstrap,
    }

    #[derive(Deserialize)]
    pub(super) struct RawGeneral {
        #[serde(default = "default_log_level")]
        pub log_level: String,
        #[serde(default)]
        pub strategy: MatchStrategy,
        #[serde(default = "default_output")]
        pub output: String,
    }

    impl Default for RawGeneral {
        fn default() -> Self {
            Self {
                log_level: default_log_level(),
                strategy: MatchStrategy::default(),
                output: default_output(),
            }
        }
    }

    #[derive(Deserialize)]
    pub(super) struct RawCsv {
        #[serde(default)]
        pub layout: LayoutKind,
        #[serde(default = "default_key_column")]
        pub key_column: String,
        #[serde(default = "default_score_column")]
        pub score_column: String,
        #[serde(default)]
        pub key_index: Option<usize>,
        #[serde(default)]
        pub score_index: Option<usize>,
    }

    impl Default for RawCsv {
        fn default() -> Self {
            Self {
                layout: LayoutKind::default(),
                key_column: default_key_column(),
                score_column: default_score_column(),
                key_index: None,
                score_index: None,
            }
        }
    }

    #[derive(Deserialize)]
    pub(super) struct RawSource {
        pub path: String,
        pub resolution: String,
        #[serde(default)]
        pub key_column: Option<String>,
        #[serde(default)]
        pub score_column: Option<String>,
    }

    #[derive(Deserialize)]
    pub(super) struct RawBootstrap {
        #[serde(default = "default_bootstrap_input")]
        pub input: String,
        #[serde(default = "default_bootstrap_output")]
        pub output: String,
        #[serde(default = "default_reference_gpu")]
        pub reference_gpu: String,
        #[serde(default = "default_reference_score")]
        pub reference_score: i64,
    }

    impl Default for RawBootstrap {
        fn default() -> Self {
            Self {
                input: default_bootstrap_input(),
                output: default_bootstrap_output(),
                reference_gpu: default_reference_gpu(),
                reference_score: default_reference_score(),
            }
        }
    }

    pub(super) fn default_log_level() -> String { "warn".to_string() }
    pub(super) fn default_output() -> String { super::DEFAULT_OUTPUT.to_string() }
    pub(super) fn default_key_column() -> String { super::DEFAULT_KEY_COLUMN.to_string() }
    pub(super) fn default_score_column() -> String { super::DEFAULT_SCORE_COLUMN.to_string() }
    pub(super) fn default_bootstrap_input() -> String { "gpus.csv".to_string() }
    pub(super) fn default_bootstrap_output() -> String { "gpus.json".to_string() }
    pub(super) fn default_reference_gpu() -> String { "GeForce RTX 3080".to_string() }
    pub(super) fn default_reference_score() -> i64 { 1000 }
}

/// Load config from the given path, or `config/default.toml`, then apply env-var overrides.
/// If no path is given and `config/default.toml` does not exist, returns built-in defaults.
pub fn load(config_path: Option<&str>) -> Result<Config, AppError> {
    let log_level_override = env::var("GPU_SCORES_LOG_LEVEL").ok();
    let strategy_override = env::var("GPU_SCORES_STRATEGY").ok();

    let path = match config_path {
        Some(p) => Some(PathBuf::from(p)),
        None => Some(PathBuf::from(DEFAULT_CONFIG_PATH)).filter(|p| p.exists()),
    };

    match path {
        Some(path) => load_from(&path, log_level_override.as_deref(), strategy_override.as_deref()),
        None => {
            let mut config = Config::default();
            apply_overrides(&mut config, log_level_override.as_deref(), strategy_override.as_deref())?;
            Ok(config)
        }
    }
}

/// Internal loader: accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    log_level_override: Option<&str>,
    strategy_override: Option<&str>,
) -> Result<Config, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: raw::RawConfig = toml::from_str(&text)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let base_dir = path.parent().unwrap_or(Path::new("."));

    let mut sources = Vec::with_capacity(parsed.sources.len());
    for (i, s) in parsed.sources.into_iter().enumerate() {
        if s.resolution.trim().is_empty() {
            return Err(AppError::Config(format!(
                "sources[{i}] in {}: resolution must not be empty",
                path.display()
            )));
        }
        sources.push(SourceConfig {
            path: resolve_path(base_dir, &s.path),
            resolution: s.resolution,
            key_column: s.key_column,
            score_column: s.score_column,
        });
    }

    let mut config = Config {
        log_level: parsed.general.log_level,
        strategy: parsed.general.strategy,
        output: expand_home(&parsed.general.output),
        csv: CsvConfig {
            layout: parsed.csv.layout,
            key_column: parsed.csv.key_column,
            score_column: parsed.csv.score_column,
            key_index: parsed.csv.key_index.unwrap_or(ColumnLayout::LEGACY_KEY_INDEX),
            score_index: parsed.csv.score_index.unwrap_or(ColumnLayout::LEGACY_SCORE_INDEX),
        },
        sources,
        bootstrap: BootstrapConfig {
            input: expand_home(&parsed.bootstrap.input),
            output: expand_home(&parsed.bootstrap.output),
            reference_gpu: parsed.bootstrap.reference_gpu,
            reference_score: parsed.bootstrap.reference_score,
        },
    };

    apply_overrides(&mut config, log_level_override, strategy_override)?;
    Ok(config)
}

fn apply_overrides(
    config: &mut Config,
    log_level_override: Option<&str>,
    strategy_override: Option<&str>,
) -> Result<(), AppError> {
    if let Some(level) = log_level_override {
        config.log_level = level.to_string();
    }
    if let Some(strategy) = strategy_override {
        config.strategy = strategy
            .parse()
            .map_err(|e| AppError::Config(format!("GPU_SCORES_STRATEGY: {e}")))?;
    }
    // An unknown word would become a target directive and silence every warning.
    crate::logger::parse_level(&config.log_level)
        .map_err(|e| AppError::Config(format!("log_level: {e}")))?;
    Ok(())
}

/// Source paths are relative to the config file, not the working directory.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base_dir.join(expanded)
    }
}

/// Expand a leading `~` to the user's home directory.
/// Absolute or relative paths without `~` are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn empty_file_gives_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parse_full_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scores.toml");
        fs::write(
            &path,
            r#"
[general]
log_level = "info"
strategy = "exact"
output = "out/merged.json"

[csv]
key_column = "Card"
score_column = "FPS"

[[sources]]
path = "1080p.csv"
resolution = "1080p"

[[sources]]
path = "/data/4k.csv"
resolution = "4k"
score_column = "Avg FPS"

[bootstrap]
reference_gpu = "Radeon RX 6800"
reference_score = 500
"#,
        )
        .unwrap();

        let cfg = load_from(&path, None, None).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.strategy, MatchStrategy::Exact);
        assert_eq!(cfg.output, PathBuf::from("out/merged.json"));
        assert_eq!(cfg.sources.len(), 2);
        assert_eq!(cfg.sources[0].path, dir.path().join("1080p.csv"));
        assert_eq!(cfg.sources[1].path, PathBuf::from("/data/4k.csv"));
        assert_eq!(
            cfg.csv.layout_for(cfg.sources[1].key_column.as_deref(), cfg.sources[1].score_column.as_deref()),
            ColumnLayout::by_header("Card", "Avg FPS")
        );
        assert_eq!(cfg.bootstrap.reference_gpu, "Radeon RX 6800");
        assert_eq!(cfg.bootstrap.reference_score, 500);
        assert_eq!(cfg.bootstrap.input, PathBuf::from("gpus.csv"));
    }

    #[test]
    fn fixed_layout_uses_legacy_indices() {
        let f = write_toml("[csv]\nlayout = \"fixed\"\n");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.csv.layout_for(Some("ignored"), None), ColumnLayout::legacy());
    }

    #[test]
    fn unknown_strategy_errors() {
        let f = write_toml("[general]\nstrategy = \"fuzzy\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("config error"));
    }

    #[test]
    fn empty_resolution_errors() {
        let f = write_toml("[[sources]]\npath = \"a.csv\"\nresolution = \" \"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("resolution"));
    }

    #[test]
    fn env_overrides_apply() {
        let f = write_toml("[general]\nlog_level = \"warn\"\nstrategy = \"exact\"\n");
        let cfg = load_from(f.path(), Some("debug"), Some("normalized")).unwrap();
        assert_eq!(cfg.log_level, "debug");
        assert_eq!(cfg.strategy, MatchStrategy::Normalized);
    }

    #[test]
    fn misspelled_log_level_errors() {
        let f = write_toml("[general]\nlog_level = \"warnn\"\n");
        let err = load_from(f.path(), None, None).unwrap_err();
        assert!(err.to_string().contains("config error"));
        assert!(err.to_string().contains("warnn"));
    }

    #[test]
    fn misspelled_log_level_override_errors() {
        let f = write_toml("");
        assert!(load_from(f.path(), Some("verbose"), None).is_err());
        assert_eq!(load_from(f.path(), Some("DEBUG"), None).unwrap().log_level, "DEBUG");
    }

    #[test]
    fn bad_strategy_override_errors() {
        let f = write_toml("");
        assert!(load_from(f.path(), None, Some("closest")).is_err());
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("config error"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().expect("home dir must exist in test env");
        let expanded = expand_home("~/scores/out.json");
        assert!(expanded.starts_with(&home));
        assert!(expanded.ends_with("out.json"));
    }

    #[test]
    fn relative_path_unchanged() {
        assert_eq!(expand_home("relative/path"), PathBuf::from("relative/path"));
    }
}
