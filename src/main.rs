// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use zonesync::{
    backend,
    checkpoint::CheckpointStore,
    config::Config,
    engine::SyncEngine,
    metrics, trigger,
    snapshot::SnapshotClient,
};

/// Number of worker threads for the Tokio runtime
const TOKIO_WORKER_THREADS: usize = 4;

#[derive(Parser)]
#[command(name = "zonesyncd", version, about = "Authoritative DNS zone synchronization daemon")]
struct Cli {
    /// Path of the configuration file
    #[arg(short, long, default_value = "/etc/zonesync/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon: periodic timer, notification listener, metrics
    Run,

    /// Run one sync cycle and exit
    Sync {
        /// Apply the snapshot even if its version matches the checkpoint
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration file and exit
    CheckConfig,

    /// Generate shell completions on stdout
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn main() -> Result<()> {
    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("zonesync-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(
            shell,
            &mut Cli::command(),
            "zonesyncd",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    // Initialize logging.
    //
    // Respects RUST_LOG for the filter (defaults to INFO) and
    // RUST_LOG_FORMAT for the output format (text or json).
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;

    match cli.command {
        Command::CheckConfig => {
            println!("configuration OK: {}", cli.config.display());
            Ok(())
        }
        Command::Sync { force } => {
            let engine = build_engine(&config).await?;
            let result = engine.try_sync(force).await;
            println!("{}", trigger::format_outcome(&result));
            result.map(|_| ()).map_err(Into::into)
        }
        Command::Run => run_daemon(config).await,
        Command::Completions { .. } => unreachable!("handled above"),
    }
}

async fn build_engine(config: &Config) -> Result<Arc<SyncEngine>> {
    let endpoint = config.endpoint_url()?;
    let client = SnapshotClient::new(
        endpoint,
        Duration::from_secs(config.api.fetch_timeout_secs),
    )
    .context("building snapshot client")?;

    let backend = backend::from_config(config)
        .await
        .context("initializing backend")?;
    info!(backend = backend.kind(), "backend initialized");

    let checkpoint = CheckpointStore::new(&config.checkpoint_path);

    Ok(Arc::new(SyncEngine::new(client, backend, checkpoint, config)))
}

async fn run_daemon(config: Config) -> Result<()> {
    info!("starting zone synchronization daemon");

    let engine = build_engine(&config).await?;
    let interval = Duration::from_secs(config.sync_interval_secs);

    let periodic = {
        let engine = engine.clone();
        tokio::spawn(async move {
            trigger::run_periodic(engine, interval).await;
        })
    };

    let notify = match config.notify_socket.clone() {
        Some(path) => {
            let engine = engine.clone();
            let trigger_config = config.trigger.clone();
            tokio::spawn(async move {
                trigger::run_notify_listener(engine, &path, trigger_config).await
            })
        }
        None => tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok::<(), anyhow::Error>(())
        }),
    };

    let metrics_server = match config.metrics_listen {
        Some(addr) => tokio::spawn(metrics::run_metrics_server(addr)),
        None => tokio::spawn(async {
            std::future::pending::<()>().await;
            Ok::<(), anyhow::Error>(())
        }),
    };

    info!(
        interval_secs = config.sync_interval_secs,
        "daemon running, waiting for triggers"
    );

    // Supervise the long-running tasks; none of them is expected to exit.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, exiting");
            Ok(())
        }
        result = periodic => {
            error!("CRITICAL: periodic trigger task exited unexpectedly: {:?}", result);
            anyhow::bail!("periodic trigger task exited unexpectedly")
        }
        result = notify => {
            error!("CRITICAL: notification listener exited unexpectedly: {:?}", result);
            anyhow::bail!("notification listener exited unexpectedly")
        }
        result = metrics_server => {
            error!("CRITICAL: metrics server exited unexpectedly: {:?}", result);
            anyhow::bail!("metrics server exited unexpectedly")
        }
    }
}
