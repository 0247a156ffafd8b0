//! Shared types, error model, and configuration for SitePress.
//!
//! This crate is the foundation depended on by all other SitePress crates.
//! It provides:
//! - [`SitePressError`] — the unified error type
//! - Domain types ([`PublishResult`], [`StagedFile`], [`StageError`], [`RunId`])
//! - Configuration ([`AppConfig`], [`PublishConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, ContainersConfig, LimitsConfig, PublishConfig, StorageConfig,
    config_dir, config_file_path, expand_home, init_config, load_config, load_config_from,
    validate_storage_auth,
};
pub use error::{Result, SitePressError};
pub use types::{
    BuildResult, DeploymentResult, DownloadResult, ErrorKind, PipelineState, PublishResult,
    RunId, StageError, StagedFile, ValidationResult,
};
