//! Application configuration for SitePress.
//!
//! User config lives at `~/.sitepress/sitepress.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SitePressError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sitepress.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sitepress";

// ---------------------------------------------------------------------------
// Config structs (matching sitepress.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Container names.
    #[serde(default)]
    pub containers: ContainersConfig,

    /// Ingestion and transfer limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// External generator settings.
    #[serde(default)]
    pub build: BuildConfig,
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend kind: "fs" (local directory) or "http" (REST gateway).
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Root directory for the "fs" backend.
    #[serde(default = "default_fs_root")]
    pub fs_root: String,

    /// Base endpoint URL for the "http" backend.
    #[serde(default)]
    pub endpoint: String,

    /// Name of the env var holding the gateway token (never the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Per-request timeout for storage calls, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            fs_root: default_fs_root(),
            endpoint: String::new(),
            token_env: default_token_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_backend() -> String {
    "fs".into()
}
fn default_fs_root() -> String {
    "~/.sitepress/containers".into()
}
fn default_token_env() -> String {
    "SITEPRESS_STORAGE_TOKEN".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// `[containers]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainersConfig {
    /// Container holding the source markdown blobs.
    #[serde(default = "default_source")]
    pub source: String,

    /// Container serving the live published site.
    #[serde(default = "default_hosting")]
    pub hosting: String,

    /// Container holding the pre-deploy snapshot.
    #[serde(default = "default_backup")]
    pub backup: String,
}

impl Default for ContainersConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            hosting: default_hosting(),
            backup: default_backup(),
        }
    }
}

fn default_source() -> String {
    "content".into()
}
fn default_hosting() -> String {
    "web".into()
}
fn default_backup() -> String {
    "web-backup".into()
}

/// `[limits]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Hard cap on the number of source blobs enumerated per run.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-blob size cap in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,

    /// Concurrent transfers during download and upload sweeps.
    #[serde(default = "default_transfer_concurrency")]
    pub transfer_concurrency: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size_bytes: default_max_file_size(),
            transfer_concurrency: default_transfer_concurrency(),
        }
    }
}

fn default_max_files() -> usize {
    500
}
fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}
fn default_transfer_concurrency() -> usize {
    4
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Generator binary to invoke (resolved via PATH or absolute).
    #[serde(default = "default_generator_bin")]
    pub generator_bin: String,

    /// Pinned generator version; logged as a warning on mismatch.
    #[serde(default)]
    pub generator_version: String,

    /// Wall-clock timeout for the generator subprocess, in seconds.
    #[serde(default = "default_build_timeout")]
    pub timeout_secs: u64,

    /// Working root for per-run staging/build directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            generator_bin: default_generator_bin(),
            generator_version: String::new(),
            timeout_secs: default_build_timeout(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_generator_bin() -> String {
    "hugo".into()
}
fn default_build_timeout() -> u64 {
    300
}
fn default_work_dir() -> String {
    "~/.sitepress/work".into()
}

// ---------------------------------------------------------------------------
// Publish config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime publish configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    /// Container holding source markdown.
    pub source_container: String,
    /// Container serving the live site.
    pub hosting_container: String,
    /// Container holding the pre-deploy snapshot.
    pub backup_container: String,
    /// Hard cap on blobs enumerated.
    pub max_files: usize,
    /// Per-blob size cap.
    pub max_file_size_bytes: u64,
    /// Concurrent transfers per sweep.
    pub transfer_concurrency: usize,
    /// Generator binary.
    pub generator_bin: String,
    /// Pinned generator version (empty = unchecked).
    pub generator_version: String,
    /// Generator timeout.
    pub build_timeout: std::time::Duration,
    /// Working root for per-run directories.
    pub work_dir: PathBuf,
}

impl From<&AppConfig> for PublishConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            source_container: config.containers.source.clone(),
            hosting_container: config.containers.hosting.clone(),
            backup_container: config.containers.backup.clone(),
            max_files: config.limits.max_files,
            max_file_size_bytes: config.limits.max_file_size_bytes,
            transfer_concurrency: config.limits.transfer_concurrency,
            generator_bin: config.build.generator_bin.clone(),
            generator_version: config.build.generator_version.clone(),
            build_timeout: std::time::Duration::from_secs(config.build.timeout_secs),
            work_dir: expand_home(&config.build.work_dir),
        }
    }
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sitepress/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SitePressError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sitepress/sitepress.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SitePressError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SitePressError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SitePressError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SitePressError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SitePressError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the storage gateway token env var is set when the http backend
/// is selected.
pub fn validate_storage_auth(config: &AppConfig) -> Result<()> {
    if config.storage.backend != "http" {
        return Ok(());
    }
    let var_name = &config.storage.token_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(SitePressError::config(format!(
            "storage gateway token not found. Set the {var_name} environment variable."
        ))),
    }
}
