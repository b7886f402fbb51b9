//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration only: where the database lives, where the admin
//! API listens, when the daily jobs fire and how loudly to log. Scoring
//! weights are compiled in and not configurable.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`POPCORN_ROOT_FOLDER`, `POPCORN_CONFIG`)
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing or unparseable TOML file is never fatal: a warning is logged
//! and compiled defaults are used.

use crate::{Error, Result};
use chrono::NaiveTime;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "POPCORN_ROOT_FOLDER";

/// Environment variable pointing at an explicit TOML file
pub const CONFIG_PATH_ENV: &str = "POPCORN_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "popcorn.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    /// Folder holding `popcorn.db`
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Admin HTTP server
    #[serde(default)]
    pub server: ServerConfig,

    /// Daily job trigger times
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Admin HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Scheduler configuration
///
/// Trigger times are `HH:MM` in UTC. Both jobs run at least once per
/// calendar day; the exact minute is a deployment choice.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Disable both periodic jobs (admin endpoints keep working)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Run both jobs once immediately at startup
    #[serde(default)]
    pub run_on_startup: bool,

    /// Member daily experience job trigger
    #[serde(default = "default_member_job_time")]
    pub member_job_time: String,

    /// Movie popularity recompute job trigger
    #[serde(default = "default_movie_job_time")]
    pub movie_job_time: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            run_on_startup: false,
            member_job_time: default_member_job_time(),
            movie_job_time: default_movie_job_time(),
        }
    }
}

impl SchedulerConfig {
    /// Parsed trigger time of the member daily experience job
    pub fn member_trigger(&self) -> Result<NaiveTime> {
        parse_time_of_day(&self.member_job_time)
    }

    /// Parsed trigger time of the movie popularity job
    pub fn movie_trigger(&self) -> Result<NaiveTime> {
        parse_time_of_day(&self.movie_job_time)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5810
}

fn default_true() -> bool {
    true
}

fn default_member_job_time() -> String {
    "00:10".to_string()
}

fn default_movie_job_time() -> String {
    "01:00".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Parse `HH:MM` (or `HH:MM:SS`)
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| Error::Config(format!("Invalid time of day '{}': {}", s, e)))
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Load configuration from an explicit file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration with graceful degradation
    ///
    /// `explicit` (from CLI) wins, then `POPCORN_CONFIG`, then the platform
    /// config locations. Any failure yields compiled defaults. Nothing is
    /// logged here, so this can run before the subscriber is installed;
    /// call [`ConfigSource::log`] once it is.
    pub fn load(explicit: Option<&Path>) -> (Self, ConfigSource) {
        let path = match explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .or_else(|| find_config_file().ok())
        {
            Some(path) => path,
            None => return (Self::default(), ConfigSource::Defaults),
        };

        match Self::from_file(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Invalid {
                    path,
                    error: e.to_string(),
                },
            ),
        }
    }

    /// [`load`](Self::load) and log where the configuration came from
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let (config, source) = Self::load(explicit);
        source.log();
        config
    }
}

/// Where the loaded configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    /// No file found anywhere
    Defaults,
    /// A file was found but could not be read or parsed
    Invalid { path: PathBuf, error: String },
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => info!("No config file found, using compiled defaults"),
            ConfigSource::Invalid { path, error } => warn!(
                "Failed to load config file {}: {} (using compiled defaults)",
                path.display(),
                error
            ),
        }
    }
}

/// Root folder resolution in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_root_folder()
}

/// Database file inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

/// Get default configuration file path for the platform
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("popcorn").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/popcorn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("popcorn"))
        .unwrap_or_else(|| PathBuf::from("./popcorn_data"))
}
