//! SitePress CLI — markdown-to-static-site publish pipeline.
//!
//! Downloads markdown from object storage, renders it with the pinned
//! external generator, and publishes the output with backup and rollback.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
