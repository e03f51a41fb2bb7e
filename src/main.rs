//! Operator CLI for a hoard store.
//!
//! Every command acts on behalf of one user (`--user`, or `HOARD_USER`).

mod commands;
mod error;
mod logging;
mod output;

use crate::commands::{App, Command};
use crate::error::{ErrorKind, Result};
use crate::output::Output;
use clap::Parser;
use exn::ResultExt;
use hoard_catalog::{Database, Repository};
use hoard_config::Config;
use hoard_engine::{Context, Limits};
use hoard_storage::BlobStore;
use hoard_storage::backend::LocalBackend;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "hoard", version, about = "Encrypted, deduplicating file storage", long_about = None)]
struct Cli {
    /// Config file (TOML, YAML or JSON); defaults to the platform config
    /// directory
    #[arg(short, long, env = "HOARD_CONFIG")]
    config: Option<PathBuf>,
    /// User to act as
    #[arg(short, long, env = "HOARD_USER", default_value_t = 1)]
    user: u64,
    /// Print results as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:?}");
            ExitCode::from(err.exit_code())
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_file = cli.config.or_else(|| hoard_config::default_config_path().filter(|path| path.exists()));
    let config = Config::load(config_file.as_deref()).or_raise(|| ErrorKind::Config)?;
    logging::init(&config.log.filter);

    let app = open(&config, cli.user, Output { json: cli.json }).await?;
    app.run(cli.command).await
}

async fn open(config: &Config, user: u64, output: Output) -> Result<App> {
    let key = config.encryption_key().or_raise(|| ErrorKind::Config)?;
    let backend = LocalBackend::new("local", &config.storage.path).or_raise(|| ErrorKind::Storage)?;
    if let Some(parent) = config.catalog.database.parent() {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Local(parent.display().to_string()))?;
    }
    let db = Database::connect(&config.catalog.database).await.or_raise(|| ErrorKind::Catalog)?;
    let ctx = Context::new(Limits {
        storage_limit: config.storage.limit,
        max_upload_size: config.storage.max_upload_size,
    });
    tracing::debug!(user, storage = %config.storage.path.display(), "Opened store");
    Ok(App {
        blobs: BlobStore::new(Arc::new(backend), &key),
        catalog: Repository::from(&db),
        ctx,
        user,
        output,
    })
}
