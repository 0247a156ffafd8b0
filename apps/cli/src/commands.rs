//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use sitepress_core::{ProgressReporter, publish_site};
use sitepress_publish::rollback_deployment;
use sitepress_shared::{
    AppConfig, PipelineState, PublishConfig, PublishResult, expand_home, init_config,
    load_config, validate_storage_auth,
};
use sitepress_storage::{FsStore, HttpStore, ObjectStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SitePress — publish markdown from object storage as a static site.
#[derive(Parser)]
#[command(
    name = "sitepress",
    version,
    about = "Build and deploy a static site from markdown in object storage.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the full build-and-deploy pipeline once.
    Publish {
        /// Source container holding markdown (overrides config).
        #[arg(long)]
        source: Option<String>,

        /// Hosting container receiving the site (overrides config).
        #[arg(long)]
        hosting: Option<String>,

        /// Backup container (overrides config).
        #[arg(long)]
        backup: Option<String>,

        /// Generator timeout in seconds (overrides config).
        #[arg(long)]
        timeout: Option<u64>,

        /// Print a machine-readable JSON summary instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Restore the hosting container from the most recent backup.
    Rollback {
        /// Hosting container to restore (overrides config).
        #[arg(long)]
        hosting: Option<String>,

        /// Backup container to restore from (overrides config).
        #[arg(long)]
        backup: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sitepress=info",
        1 => "sitepress=debug",
        _ => "sitepress=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Publish {
            source,
            hosting,
            backup,
            timeout,
            json,
        } => cmd_publish(source, hosting, backup, timeout, json).await,
        Command::Rollback { hosting, backup } => cmd_rollback(hosting, backup).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

/// Build the configured object-store backend.
fn make_store(config: &AppConfig) -> Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "fs" => {
            let root = expand_home(&config.storage.fs_root);
            Ok(Arc::new(FsStore::new(root)?))
        }
        "http" => {
            validate_storage_auth(config)?;
            let base = Url::parse(&config.storage.endpoint)
                .map_err(|e| eyre!("invalid storage endpoint: {e}"))?;
            let token = std::env::var(&config.storage.token_env).ok();
            let timeout = Duration::from_secs(config.storage.request_timeout_secs);
            Ok(Arc::new(HttpStore::new(base, token, timeout)?))
        }
        other => Err(eyre!("unknown storage backend: {other}")),
    }
}

async fn cmd_publish(
    source: Option<String>,
    hosting: Option<String>,
    backup: Option<String>,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let app_config = load_config()?;
    let store = make_store(&app_config)?;

    let mut config = PublishConfig::from(&app_config);
    if let Some(source) = source {
        config.source_container = source;
    }
    if let Some(hosting) = hosting {
        config.hosting_container = hosting;
    }
    if let Some(backup) = backup {
        config.backup_container = backup;
    }
    if let Some(timeout) = timeout {
        config.build_timeout = Duration::from_secs(timeout);
    }

    let progress = CliProgress::new();
    let result = publish_site(&config, store, &progress).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary_json(&result))?);
    } else {
        print_summary(&result);
    }

    match result.state {
        PipelineState::Done => Ok(()),
        _ => Err(eyre!(
            "publish failed with {} error(s); run with -v for details",
            result.errors.len()
        )),
    }
}

async fn cmd_rollback(hosting: Option<String>, backup: Option<String>) -> Result<()> {
    let app_config = load_config()?;
    let store = make_store(&app_config)?;

    let hosting = hosting.unwrap_or_else(|| app_config.containers.hosting.clone());
    let backup = backup.unwrap_or_else(|| app_config.containers.backup.clone());

    info!(%backup, %hosting, "restoring hosting container from backup");
    let result = rollback_deployment(store.as_ref(), &backup, &hosting).await;

    println!(
        "Restored {} object(s) from {backup} to {hosting} in {:.1}s",
        result.files_uploaded,
        result.duration.as_secs_f64()
    );
    for err in &result.errors {
        eprintln!("  warning: {err}");
    }

    if result.files_uploaded == 0 {
        return Err(eyre!("rollback restored zero objects"));
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Created {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Output helpers
// ---------------------------------------------------------------------------

fn print_summary(result: &PublishResult) {
    println!("Run {} — {}", result.run_id, result.state);
    println!("  downloaded: {}", result.files_downloaded);
    println!("  organized:  {}", result.files_organized);
    println!("  uploaded:   {}", result.files_uploaded);
    println!("  backed up:  {}", result.backup_files);
    if result.rolled_back {
        println!("  rolled back to previous site");
    }
    if !result.errors.is_empty() {
        println!("  errors ({}):", result.errors.len());
        for err in &result.errors {
            println!("    - {err}");
        }
    }
    println!("  elapsed:    {:.1}s", result.elapsed.as_secs_f64());
}

fn summary_json(result: &PublishResult) -> serde_json::Value {
    serde_json::json!({
        "run_id": result.run_id,
        "state": result.state,
        "succeeded": result.succeeded(),
        "files_downloaded": result.files_downloaded,
        "files_organized": result.files_organized,
        "files_uploaded": result.files_uploaded,
        "backup_files": result.backup_files,
        "rolled_back": result.rolled_back,
        "errors": result.errors,
        "elapsed_secs": result.elapsed.as_secs_f64(),
    })
}

// ---------------------------------------------------------------------------
// Progress bar
// ---------------------------------------------------------------------------

/// Spinner-based progress reporting for interactive runs.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .expect("valid progress template"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, state: PipelineState) {
        self.bar.set_message(state.to_string());
    }

    fn done(&self, result: &PublishResult) {
        self.bar
            .finish_with_message(format!("finished: {}", result.state));
    }
}
