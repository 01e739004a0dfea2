//! Configuration module for Photolift.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DEFAULT_TITLE_SEPARATOR;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Photolift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub drive_space: DriveSpaceConfig,
    pub state: StateConfig,
    pub logging: LoggingConfig,
}

/// When uploaded items are attached to their album.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlbumStrategy {
    /// Create items directly inside the album.
    #[default]
    WhileCreating,
    /// Create items first, then add them sorted by capture time.
    AfterCreatingSorted,
}

/// Order in which files of a directory are uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    FileName,
    Path,
    ModifiedTime,
}

/// Upload engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Number of concurrent remote calls; 0 means twice the CPU count.
    pub worker_threads: usize,
    pub album_strategy: AlbumStrategy,
    pub sort_key: SortKey,
    /// Placed between directory names when deriving album titles.
    pub album_title_separator: String,
    /// Key under which upload progress is persisted.
    pub state_key: String,
}

/// Exponential backoff settings for one class of retryable failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackoffConfig {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    /// Give up once retries for a class have been running this long.
    pub max_elapsed_secs: u64,
    pub multiplier: f64,
}

/// Retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Used when the service reports its quota or rate limit is exhausted.
    pub resource_exhausted: BackoffConfig,
    /// Used for unavailable, deadline exceeded, aborted and internal errors.
    pub transient: BackoffConfig,
}

/// Remote storage usage policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSpaceConfig {
    /// Stop uploading when fewer than this many MiB remain free.
    pub min_free_mb: Option<u64>,
    /// Stop uploading when usage exceeds this percentage.
    pub max_used_percent: Option<u8>,
    /// MiB uploaded between two quota checks.
    pub check_interval_mb: u64,
}

/// Persistent state settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// SQLite database holding the key-value store.
    pub database: PathBuf,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    pub format: LogFormat,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/photolift/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("photolift")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            album_strategy: AlbumStrategy::default(),
            sort_key: SortKey::default(),
            album_title_separator: DEFAULT_TITLE_SEPARATOR.to_string(),
            state_key: "upload_state".to_string(),
        }
    }
}

impl UploadConfig {
    /// Effective number of concurrent remote calls.
    pub fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism()
            .map(|n| n.get() * 2)
            .unwrap_or(2)
    }
}

impl BackoffConfig {
    pub fn initial_interval(&self) -> Duration {
        Duration::from_millis(self.initial_interval_ms)
    }

    pub fn max_interval(&self) -> Duration {
        Duration::from_millis(self.max_interval_ms)
    }

    pub fn max_elapsed(&self) -> Duration {
        Duration::from_secs(self.max_elapsed_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            resource_exhausted: BackoffConfig {
                initial_interval_ms: 5_000,
                max_interval_ms: 300_000,
                max_elapsed_secs: 1_800,
                multiplier: 2.0,
            },
            transient: BackoffConfig {
                initial_interval_ms: 1_000,
                max_interval_ms: 60_000,
                max_elapsed_secs: 900,
                multiplier: 2.0,
            },
        }
    }
}

impl Default for DriveSpaceConfig {
    fn default() -> Self {
        Self {
            min_free_mb: None,
            max_used_percent: None,
            check_interval_mb: 10,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("photolift");
        Self {
            database: data_dir.join("state.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.transient.multiplier"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn validate_backoff(section: &str, backoff: &BackoffConfig, errors: &mut Vec<ValidationError>) {
    if backoff.initial_interval_ms == 0 {
        errors.push(ValidationError {
            field: format!("retry.{section}.initial_interval_ms"),
            message: "must be greater than 0".into(),
        });
    }
    if backoff.max_interval_ms < backoff.initial_interval_ms {
        errors.push(ValidationError {
            field: format!("retry.{section}.max_interval_ms"),
            message: format!(
                "max_interval_ms ({}) must not be below initial_interval_ms ({})",
                backoff.max_interval_ms, backoff.initial_interval_ms
            ),
        });
    }
    if !backoff.multiplier.is_finite() || backoff.multiplier < 1.0 {
        errors.push(ValidationError {
            field: format!("retry.{section}.multiplier"),
            message: "must be a finite number of at least 1.0".into(),
        });
    }
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- upload ---
        if self.upload.state_key.trim().is_empty() {
            errors.push(ValidationError {
                field: "upload.state_key".into(),
                message: "must not be empty".into(),
            });
        }
        if self.upload.album_title_separator.is_empty() {
            errors.push(ValidationError {
                field: "upload.album_title_separator".into(),
                message: "must not be empty".into(),
            });
        }

        // --- retry ---
        validate_backoff("resource_exhausted", &self.retry.resource_exhausted, &mut errors);
        validate_backoff("transient", &self.retry.transient, &mut errors);

        // --- drive_space ---
        if self.drive_space.min_free_mb.is_some() && self.drive_space.max_used_percent.is_some() {
            errors.push(ValidationError {
                field: "drive_space".into(),
                message: "set at most one of min_free_mb and max_used_percent".into(),
            });
        }
        if let Some(percent) = self.drive_space.max_used_percent {
            if percent == 0 || percent > 100 {
                errors.push(ValidationError {
                    field: "drive_space.max_used_percent".into(),
                    message: "must be in range 1..=100".into(),
                });
            }
        }
        if self.drive_space.check_interval_mb == 0 {
            errors.push(ValidationError {
                field: "drive_space.check_interval_mb".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use photolift_core::config::{AlbumStrategy, ConfigBuilder};
///
/// let config = ConfigBuilder::new()
///     .upload_worker_threads(4)
///     .upload_album_strategy(AlbumStrategy::AfterCreatingSorted)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- upload ---

    pub fn upload_worker_threads(mut self, n: usize) -> Self {
        self.config.upload.worker_threads = n;
        self
    }

    pub fn upload_album_strategy(mut self, strategy: AlbumStrategy) -> Self {
        self.config.upload.album_strategy = strategy;
        self
    }

    pub fn upload_sort_key(mut self, key: SortKey) -> Self {
        self.config.upload.sort_key = key;
        self
    }

    pub fn upload_album_title_separator(mut self, separator: impl Into<String>) -> Self {
        self.config.upload.album_title_separator = separator.into();
        self
    }

    pub fn upload_state_key(mut self, key: impl Into<String>) -> Self {
        self.config.upload.state_key = key.into();
        self
    }

    // --- retry ---

    pub fn retry_resource_exhausted(mut self, backoff: BackoffConfig) -> Self {
        self.config.retry.resource_exhausted = backoff;
        self
    }

    pub fn retry_transient(mut self, backoff: BackoffConfig) -> Self {
        self.config.retry.transient = backoff;
        self
    }

    // --- drive_space ---

    pub fn drive_space_min_free_mb(mut self, mb: u64) -> Self {
        self.config.drive_space.min_free_mb = Some(mb);
        self
    }

    pub fn drive_space_max_used_percent(mut self, percent: u8) -> Self {
        self.config.drive_space.max_used_percent = Some(percent);
        self
    }

    pub fn drive_space_check_interval_mb(mut self, mb: u64) -> Self {
        self.config.drive_space.check_interval_mb = mb;
        self
    }

    // --- state ---

    pub fn state_database(mut self, path: PathBuf) -> Self {
        self.config.state.database = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
