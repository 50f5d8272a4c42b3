// Configuration loading and validation (pipeline.toml, scrape.toml).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::model::BoostParams;
use crate::tables::InjurySource;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

/// Everything a run needs, built once at start-up and passed by reference
/// to whatever opens the store or talks to the network.
#[derive(Debug, Clone)]
pub struct Config {
    pub base_dir: PathBuf,
    pub db_path: String,
    pub pipeline: PipelineConfig,
    pub injuries: InjuryConfig,
    pub model: ModelConfig,
    pub output_dir: String,
    pub scrape: ScrapeConfig,
}

impl Config {
    /// Store location. Relative paths are taken from the base directory;
    /// `:memory:` is passed through untouched.
    pub fn db_file(&self) -> PathBuf {
        if self.db_path == ":memory:" {
            return PathBuf::from(&self.db_path);
        }
        self.resolve(&self.db_path)
    }

    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.resolve(&self.output_dir).join(file_name)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_path(&self.model.artifact)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

// ---------------------------------------------------------------------------
// pipeline.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire pipeline.toml file.
#[derive(Debug, Clone, Deserialize)]
struct PipelineFile {
    database: DatabaseSection,
    #[serde(default)]
    pipeline: PipelineConfig,
    injuries: InjuryConfig,
    model: ModelConfig,
    output: OutputSection,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OutputSection {
    dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Days added to every source-table date before merging.
    #[serde(default = "default_shift_days")]
    pub shift_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shift_days: default_shift_days(),
        }
    }
}

fn default_shift_days() -> i64 {
    1
}

/// Which injury table feeds each stage.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct InjuryConfig {
    pub training_source: InjurySource,
    pub inference_source: InjurySource,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    pub lambda: f64,
    #[serde(default = "default_min_child_weight")]
    pub min_child_weight: f64,
    pub artifact: String,
    pub backtest_days: usize,
    /// Optional replacement for the default feature list.
    #[serde(default)]
    pub features: Option<Vec<String>>,
}

fn default_min_child_weight() -> f64 {
    1.0
}

impl ModelConfig {
    pub fn params(&self) -> BoostParams {
        BoostParams {
            n_estimators: self.n_estimators,
            max_depth: self.max_depth,
            learning_rate: self.learning_rate,
            lambda: self.lambda,
            min_child_weight: self.min_child_weight,
        }
    }
}

// ---------------------------------------------------------------------------
// scrape.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeConfig {
    /// First date of the stat-table back-fill.
    pub season_start: NaiveDate,
    /// Length of the trailing window each stats snapshot covers.
    pub window_days: i64,
    pub request_delay_ms: u64,
    pub boxscore_lookback_days: i64,
    pub timeout_secs: u64,
    pub stats_base_url: String,
    pub props_url: String,
    pub injuries_url: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/pipeline.toml` and
/// `config/scrape.toml`, both relative to `base_dir`.
///
/// Does not copy defaults; `load_config` does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- pipeline.toml (required) ---
    let pipeline_path = config_dir.join("pipeline.toml");
    let pipeline_text = read_file(&pipeline_path)?;
    let pipeline_file: PipelineFile =
        toml::from_str(&pipeline_text).map_err(|e| ConfigError::ParseError {
            path: pipeline_path.clone(),
            source: e,
        })?;

    // --- scrape.toml (required) ---
    let scrape_path = config_dir.join("scrape.toml");
    let scrape_text = read_file(&scrape_path)?;
    let scrape: ScrapeConfig =
        toml::from_str(&scrape_text).map_err(|e| ConfigError::ParseError {
            path: scrape_path.clone(),
            source: e,
        })?;

    let config = Config {
        base_dir: base_dir.to_path_buf(),
        db_path: pipeline_file.database.path,
        pipeline: pipeline_file.pipeline,
        injuries: pipeline_file.injuries,
        model: pipeline_file.model,
        output_dir: pipeline_file.output.dir,
        scrape,
    };

    validate(&config)?;

    Ok(config)
}

/// Copy every `defaults/*.toml` that `config/` lacks. Existing config files
/// are left alone. Returns the files written.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let copy_err = |what: String| ConfigError::DefaultsCopyError { message: what };

    if !defaults_dir.is_dir() {
        return if config_dir.is_dir() {
            Ok(Vec::new())
        } else {
            Err(copy_err(format!(
                "no defaults/ or config/ under {}; pass --base-dir",
                base_dir.display()
            )))
        };
    }
    fs::create_dir_all(&config_dir)
        .map_err(|e| copy_err(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut sources: Vec<PathBuf> = fs::read_dir(&defaults_dir)
        .map_err(|e| copy_err(format!("cannot list {}: {e}", defaults_dir.display())))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    sources.sort();

    let mut copied = Vec::new();
    for source in sources {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if target.exists() {
            continue;
        }
        fs::copy(&source, &target).map_err(|e| {
            copy_err(format!("cannot copy {} to {}: {e}", source.display(), target.display()))
        })?;
        copied.push(target);
    }
    Ok(copied)
}

/// Copy missing defaults, then load from `base_dir`.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    if config.pipeline.shift_days < 1 {
        return Err(invalid(
            "pipeline.shift_days",
            format!("must be >= 1, got {}", config.pipeline.shift_days),
        ));
    }

    let m = &config.model;
    let count_fields: &[(&str, usize)] = &[
        ("model.n_estimators", m.n_estimators),
        ("model.max_depth", m.max_depth),
        ("model.backtest_days", m.backtest_days),
    ];
    for (name, val) in count_fields {
        if *val == 0 {
            return Err(invalid(name, "must be > 0"));
        }
    }

    if !(m.learning_rate > 0.0 && m.learning_rate <= 1.0) {
        return Err(invalid(
            "model.learning_rate",
            format!("must be in (0, 1], got {}", m.learning_rate),
        ));
    }
    if m.lambda < 0.0 {
        return Err(invalid(
            "model.lambda",
            format!("must be >= 0, got {}", m.lambda),
        ));
    }
    if m.min_child_weight < 0.0 {
        return Err(invalid(
            "model.min_child_weight",
            format!("must be >= 0, got {}", m.min_child_weight),
        ));
    }
    if m.artifact.trim().is_empty() {
        return Err(invalid("model.artifact", "must not be empty"));
    }

    if let Some(features) = &m.features {
        if features.is_empty() {
            return Err(invalid("model.features", "override must list at least one feature"));
        }
        for (i, name) in features.iter().enumerate() {
            if features[..i].contains(name) {
                return Err(invalid("model.features", format!("duplicate feature `{name}`")));
            }
        }
    }

    let s = &config.scrape;
    if s.window_days <= 0 {
        return Err(invalid(
            "scrape.window_days",
            format!("must be > 0, got {}", s.window_days),
        ));
    }
    if s.boxscore_lookback_days < 0 {
        return Err(invalid(
            "scrape.boxscore_lookback_days",
            format!("must be >= 0, got {}", s.boxscore_lookback_days),
        ));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
