use anyhow::{Context, Result};
use blursync::config::Config;
use blursync::newsblur::NewsBlurClient;
use blursync::report::ConsoleReporter;
use blursync::sources::{SnapshotMode, SnapshotSource};
use blursync::sync::{self, ImportOptions, Importer, RunOptions};
use chrono::TimeDelta;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Get the default config file path (~/.config/blursync/config.toml)
fn default_config_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("blursync")
        .join("config.toml"))
}

#[derive(Parser, Debug)]
#[command(
    name = "blursync",
    about = "Import the feeds from a local list that your NewsBlur account is missing"
)]
struct Args {
    /// Config file (defaults to ~/.config/blursync/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Desired feed list: .opml/.xml, .json array, or one URL per line
    #[arg(long, value_name = "FILE")]
    desired: Option<PathBuf>,

    /// Folder to file imported feeds under
    #[arg(long, value_name = "NAME")]
    folder: Option<String>,

    /// Maximum add-feed requests in flight
    #[arg(long, value_name = "N")]
    concurrency: Option<usize>,

    /// Always fetch a fresh subscription snapshot
    #[arg(long, conflicts_with = "offline")]
    refresh: bool,

    /// Use only the cached subscription snapshot
    #[arg(long)]
    offline: bool,

    /// Match and list importable feeds without importing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    // A missing .env is normal; the variables may come from the real environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            tracing::warn!(error = %e, "Failed to load .env file");
        }
    }

    let config_path = match args.config.clone() {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();

    if let Some(desired) = args.desired.clone() {
        config.desired_path = desired;
    }
    if let Some(folder) = args.folder.clone() {
        config.target_folder = Some(folder);
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency_limit = concurrency;
    }
    tracing::debug!(config = ?config, "Effective configuration");

    let session = config.session_token()?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("blursync/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let client = NewsBlurClient::new(
        http,
        &config.service_host,
        session,
        Duration::from_secs(config.request_timeout_secs),
    )
    .context("Invalid service host")?;

    let snapshots = SnapshotSource::new(
        client.clone(),
        &config.cache_path,
        TimeDelta::try_minutes(config.cache_max_age_minutes.max(0)).unwrap_or(TimeDelta::MAX),
    );
    let importer = Importer::new(
        client,
        ImportOptions {
            concurrency_limit: config.concurrency_limit,
            target_folder: config.target_folder.clone(),
        },
    );

    let snapshot_mode = if args.refresh {
        SnapshotMode::Refresh
    } else if args.offline {
        SnapshotMode::CacheOnly
    } else {
        SnapshotMode::Auto
    };
    let options = RunOptions {
        desired_path: config.desired_path.clone(),
        snapshot_mode,
        dry_run: args.dry_run,
    };

    let mut reporter = ConsoleReporter::stdout(args.dry_run);
    sync::run(&snapshots, &importer, &mut reporter, &options)
        .await
        .context("Sync aborted")?;

    Ok(())
}
