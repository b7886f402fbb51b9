//! popcorn-scorer - Main entry point
//!
//! Opens the platform database, starts the two daily scoring jobs and serves
//! the admin API until Ctrl+C / SIGTERM.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use popcorn_common::config::{database_path, resolve_root_folder, TomlConfig, CONFIG_PATH_ENV};
use popcorn_common::db::init_database;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use popcorn_scorer::{build_router, scheduler, AppState};

/// Command-line arguments for popcorn-scorer
#[derive(Parser, Debug)]
#[command(name = "popcorn-scorer")]
#[command(about = "Reputation and popularity scoring engine")]
#[command(version)]
struct Args {
    /// Folder holding popcorn.db (overrides POPCORN_ROOT_FOLDER and TOML)
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Explicit TOML configuration file
    #[arg(short, long, env = CONFIG_PATH_ENV)]
    config: Option<PathBuf>,

    /// Admin API port
    #[arg(short, long, env = "POPCORN_PORT")]
    port: Option<u16>,

    /// Admin API bind address
    #[arg(long, env = "POPCORN_HOST")]
    host: Option<String>,

    /// Skip the daily timers (admin API only)
    #[arg(long)]
    no_scheduler: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    // Logged below, once the subscriber honours `logging.level`
    let (config, config_source) = TomlConfig::load(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "popcorn_scorer={level},popcorn_common={level},tower_http=info",
                    level = config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting popcorn-scorer v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    config_source.log();

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), &config);
    std::fs::create_dir_all(&root_folder).with_context(|| {
        format!("Failed to create root folder {}", root_folder.display())
    })?;
    info!("Root folder: {}", root_folder.display());

    let db_path = database_path(&root_folder);
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database ready: {}", db_path.display());

    let state = AppState::new(pool);
    let shutdown = CancellationToken::new();

    let mut tasks = Vec::new();
    if config.scheduler.enabled && !args.no_scheduler {
        let member_at = config
            .scheduler
            .member_trigger()
            .context("Invalid scheduler.member_job_time")?;
        let movie_at = config
            .scheduler
            .movie_trigger()
            .context("Invalid scheduler.movie_job_time")?;
        info!(
            "Daily jobs scheduled: members at {} UTC, movies at {} UTC",
            member_at, movie_at
        );
        tasks = scheduler::spawn_jobs(
            state.members.clone(),
            state.movies.clone(),
            member_at,
            movie_at,
            config.scheduler.run_on_startup,
            shutdown.clone(),
        );
    } else {
        info!("Daily jobs disabled");
    }

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("popcorn-scorer listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    let app = build_router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    shutdown.cancel();
    for task in tasks {
        let _ = task.await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
