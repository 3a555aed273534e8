//! Configuration for Wolkenbase
//!
//! Sections for the store, the scheduler, the traversal and logging. Every
//! field has a default, so a TOML file only needs the values it changes.

use super::logging::LOG_LEVELS;
use crate::constants::{
    BLOCK_SIZE, DEFAULT_BUFFERS_PER_WORKER, DEFAULT_DEAD_SLEEP_MS, DEFAULT_MAX_BACKOFF_MS,
    MAX_WORKER_THREADS, MIN_BUFFERS_PER_WORKER, POINT_RECORD_SIZE, RECORDS_PER_BLOCK,
};
use crate::storage::StoreOptions;
use crate::types::{Error, Result};
use crate::{log_info, log_warn};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Block store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Worker scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Tile traversal configuration
    #[serde(default)]
    pub traversal: TraversalConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Block store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the block files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Number of block files, 0 for one more than the worker count
    #[serde(default)]
    pub file_count: usize,

    /// Buffer pool capacity, 0 for 16 per worker
    #[serde(default)]
    pub buffer_capacity: usize,

    /// Point records per block
    #[serde(default = "default_records_per_block")]
    pub records_per_block: usize,

    /// Low-RAM threshold in bytes; unset means a seventh of free RAM at open
    #[serde(default)]
    pub low_ram_bytes: Option<u64>,
}

/// Worker scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Worker threads, 0 for one per CPU
    #[serde(default)]
    pub worker_threads: usize,

    /// Fixed sleep after a failed cube lock, in milliseconds
    #[serde(default = "default_dead_sleep_ms")]
    pub dead_sleep_ms: u64,

    /// Additive ceiling of the idle back-off, in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: f64,
}

/// Tile traversal configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraversalConfig {
    /// Desired distance between tile centers, in metres
    #[serde(default = "default_spacing")]
    pub spacing: f64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            file_count: 0,
            buffer_capacity: 0,
            records_per_block: default_records_per_block(),
            low_ram_bytes: None,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            dead_sleep_ms: default_dead_sleep_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self { spacing: default_spacing() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

// Default value functions for serde
fn default_data_dir() -> PathBuf { PathBuf::from("./data") }
fn default_records_per_block() -> usize { RECORDS_PER_BLOCK }
fn default_dead_sleep_ms() -> u64 { DEFAULT_DEAD_SLEEP_MS }
fn default_max_backoff_ms() -> f64 { DEFAULT_MAX_BACKOFF_MS }
fn default_spacing() -> f64 { 1.0 }
fn default_log_level() -> String { "info".to_string() }

impl Config {
    /// Apply `WB_*` environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        use std::env;

        if let Ok(dir) = env::var("WB_DATA_DIR") {
            self.store.data_dir = PathBuf::from(dir);
        }

        if let Ok(workers) = env::var("WB_WORKER_THREADS") {
            self.scheduler.worker_threads = workers
                .parse()
                .map_err(|e| Error::config(format!("Invalid worker threads: {}", e)))?;
        }

        if let Ok(files) = env::var("WB_FILES") {
            self.store.file_count = files
                .parse()
                .map_err(|e| Error::config(format!("Invalid file count: {}", e)))?;
        }

        if let Ok(buffers) = env::var("WB_BUFFERS") {
            self.store.buffer_capacity = buffers
                .parse()
                .map_err(|e| Error::config(format!("Invalid buffer capacity: {}", e)))?;
        }

        if let Ok(records) = env::var("WB_RECORDS") {
            self.store.records_per_block = records
                .parse()
                .map_err(|e| Error::config(format!("Invalid records per block: {}", e)))?;
        }

        if let Ok(low) = env::var("WB_LOW_RAM") {
            self.store.low_ram_bytes = Some(
                low.parse()
                    .map_err(|e| Error::config(format!("Invalid low RAM threshold: {}", e)))?,
            );
        }

        if let Ok(level) = env::var("WB_LOG_LEVEL") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let records = self.store.records_per_block;
        if records == 0 {
            return Err(Error::config("records_per_block must be positive"));
        }
        if records * POINT_RECORD_SIZE > BLOCK_SIZE {
            return Err(Error::config(format!(
                "{} records of {} bytes exceed the {} byte block",
                records, POINT_RECORD_SIZE, BLOCK_SIZE
            )));
        }

        let workers = self.resolved_workers();
        if workers > MAX_WORKER_THREADS {
            return Err(Error::config(format!(
                "Too many worker threads (maximum {})",
                MAX_WORKER_THREADS
            )));
        }
        if self.resolved_buffer_capacity() < MIN_BUFFERS_PER_WORKER * workers {
            return Err(Error::config(format!(
                "Buffer capacity {} is below {} per worker",
                self.resolved_buffer_capacity(),
                MIN_BUFFERS_PER_WORKER
            )));
        }
        if self.resolved_files() == 0 {
            return Err(Error::config("At least one block file is required"));
        }

        if !(self.traversal.spacing > 0.0) {
            return Err(Error::config("Tile spacing must be positive"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(Error::config("Invalid log level"));
        }

        Ok(())
    }

    /// Worker count with 0 resolved to the CPU count
    pub fn resolved_workers(&self) -> usize {
        if self.scheduler.worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.scheduler.worker_threads
        }
    }

    /// File count with 0 resolved to one more than the worker count
    pub fn resolved_files(&self) -> usize {
        if self.store.file_count == 0 {
            self.resolved_workers() + 1
        } else {
            self.store.file_count
        }
    }

    /// Buffer capacity with 0 resolved to 16 per worker
    pub fn resolved_buffer_capacity(&self) -> usize {
        if self.store.buffer_capacity == 0 {
            DEFAULT_BUFFERS_PER_WORKER * self.resolved_workers()
        } else {
            self.store.buffer_capacity
        }
    }

    /// Parameters for opening the block store
    pub fn store_options(&self) -> StoreOptions {
        let mut options = StoreOptions::new(self.store.data_dir.clone(), self.resolved_workers());
        options.files = self.resolved_files();
        options.buffer_capacity = self.resolved_buffer_capacity();
        options.records_per_block = self.store.records_per_block;
        options.low_ram_bytes = self.store.low_ram_bytes;
        options.dead_sleep = Duration::from_millis(self.scheduler.dead_sleep_ms);
        options
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &str) -> Result<Config> {
    let config_str = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;
    toml::from_str(&config_str)
        .map_err(|e| Error::config(format!("Failed to parse config file: {}", e)))
}

/// Load configuration from file or use defaults
pub fn load_config_or_default(path: Option<&str>) -> Config {
    match path {
        Some(path) => match load_config(path) {
            Ok(config) => {
                log_info!("Loaded configuration from: {}", path);
                config
            }
            Err(e) => {
                log_warn!("Failed to load config from {}: {}. Using defaults.", path, e);
                Config::default()
            }
        },
        None => {
            log_info!("No config file specified, using defaults");
            Config::default()
        }
    }
}
