//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration lives in `safereads.toml`. Every field has a
//! compiled default, so a missing or unreadable file only produces a warning.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (--root-folder, --port, --config)
//! 2. Environment variables (SAFEREADS_*)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! API keys additionally have a database tier above the environment
//! (see `safereads_api::config`).

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "safereads.db";

/// Config file name inside the user config directory
pub const CONFIG_FILE_NAME: &str = "safereads.toml";

/// Analysis caching strategy
///
/// The two strategies are mutually exclusive per deployment; a book never
/// mixes keyed and un-keyed analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStrategy {
    /// One objective analysis per book (no cache-key dimension)
    #[default]
    ProfileIndependent,
    /// One analysis per (book, sensitivity profile hash)
    ProfileKeyed,
}

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the SQLite database
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OpenAI API key (lowest priority tier)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,

    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,

    #[serde(default = "default_openai_model")]
    pub openai_model: String,

    /// Google Books API key (optional; requests work without one)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_books_api_key: Option<String>,

    #[serde(default = "default_google_books_base_url")]
    pub google_books_base_url: String,

    #[serde(default = "default_open_library_base_url")]
    pub open_library_base_url: String,

    #[serde(default = "default_open_library_covers_url")]
    pub open_library_covers_url: String,

    /// Lifetime fresh analyses granted to unsubscribed users
    #[serde(default = "default_free_analysis_limit")]
    pub free_analysis_limit: u32,

    /// Emails allowed to use admin endpoints
    #[serde(default)]
    pub admin_emails: Vec<String>,

    #[serde(default)]
    pub cache_strategy: CacheStrategy,

    /// Default result count for searches
    #[serde(default = "default_search_max_results")]
    pub search_max_results: u32,

    /// Rate-limit retry policy for the primary bibliographic provider
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            port: default_port(),
            logging: LoggingConfig::default(),
            openai_api_key: None,
            openai_base_url: default_openai_base_url(),
            openai_model: default_openai_model(),
            google_books_api_key: None,
            google_books_base_url: default_google_books_base_url(),
            open_library_base_url: default_open_library_base_url(),
            open_library_covers_url: default_open_library_covers_url(),
            free_analysis_limit: default_free_analysis_limit(),
            admin_emails: Vec::new(),
            cache_strategy: CacheStrategy::default(),
            search_max_results: default_search_max_results(),
            retry: RetryConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Exponential backoff policy for HTTP 429 responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first rate-limited attempt; doubles each time
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
        }
    }
}

fn default_port() -> u16 {
    5740
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_google_books_base_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_open_library_base_url() -> String {
    "https://openlibrary.org".to_string()
}

fn default_open_library_covers_url() -> String {
    "https://covers.openlibrary.org".to_string()
}

fn default_free_analysis_limit() -> u32 {
    3
}

fn default_search_max_results() -> u32 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

/// Default config file location: `<config dir>/safereads/safereads.toml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("safereads").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Load TOML config, falling back to defaults when the file is missing or broken
///
/// Missing configuration never terminates startup; it produces a warning.
pub fn load_toml_config(path: &Path) -> TomlConfig {
    match read_toml_config(path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!(
                "Using built-in configuration defaults ({}): {}",
                path.display(),
                e
            );
            TomlConfig::default()
        }
    }
}

/// Strictly read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Write TOML config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // Config may carry API keys
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Root folder resolution
///
/// 1. Command-line argument or `SAFEREADS_ROOT_FOLDER` (clap merges both)
/// 2. TOML `root_folder`
/// 3. OS-dependent compiled default
pub fn resolve_root_folder(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Some(path) = &config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("safereads"))
        .unwrap_or_else(|| PathBuf::from("./safereads_data"))
}

/// Database path inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}
