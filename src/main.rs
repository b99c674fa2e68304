use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};

use plugin_registry::commands;
use plugin_registry::config;
use plugin_registry::error::Result;
use plugin_registry::server::WorkerPool;
use plugin_registry::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "plugin-registry")]
#[command(about = "A read-mostly JSON API for a plugin registry", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (YAML/JSON/TOML)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Serve the registry API (default)
    Serve,
    /// Validate configuration and count documents per collection
    Check,
    /// Load a JSON seed file into the SQLite store
    Import {
        /// Seed file shaped as {"collection": [documents]}
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Empty each imported collection first
        #[arg(long)]
        replace: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.debug, args.json_logs);

    let config = match args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            config::load_from_path(&path).await.map_err(|e| {
                error!(
                    "Failed to load configuration from {}: {}",
                    path.display(),
                    e
                );
                e
            })?
        }
        None => {
            info!("Loading configuration from default locations");
            config::load_from_env_or_file().await.map_err(|e| {
                error!("Failed to load configuration: {}", e);
                e
            })?
        }
    };

    match args.command.unwrap_or(Command::Serve) {
        Command::Check => {
            commands::run_config_check(config).await?;
            Ok(())
        }
        Command::Import { file, replace } => {
            commands::run_import(config, &file, replace).await?;
            Ok(())
        }
        Command::Serve => serve(config).await,
    }
}

fn init_tracing(debug: bool, json: bool) {
    let log_level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
        .add_directive(
            format!("plugin_registry={log_level}")
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
        );

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn serve(config: config::Config) -> Result<()> {
    info!("Starting plugin registry");
    info!(
        "Listening on {} with {} workers",
        config.listen_addr(),
        config.server.workers
    );

    let (state, _shutdown_rx) = AppState::from_config(config).await?;
    let pool = WorkerPool::bind(state.clone()).await?;
    let pool_handle = tokio::spawn(pool.run());

    shutdown_signal().await;

    info!("Shutting down plugin registry");

    let shutdown_timeout = tokio::time::timeout(tokio::time::Duration::from_secs(30), async {
        state.shutdown();
        pool_handle.await
    })
    .await;

    match shutdown_timeout {
        Ok(Ok(result)) => {
            result?;
            info!("Graceful shutdown completed");
        }
        Ok(Err(e)) => error!("Worker pool task failed: {}", e),
        Err(_) => {
            error!("Shutdown timeout exceeded, forcing exit");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
