//! Tournament server.
//!
//! Runs the lifecycle scheduler against PostgreSQL and serves live bracket
//! websockets. Any number of replicas may run against the same database;
//! the advisory lock keeps their sweeps from overlapping.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Error;
use pico_args::Arguments;
use tokio::sync::watch;
use tourney_engine::broadcast::BroadcastHub;
use tourney_engine::db::{Database, PgTournamentStore};
use tourney_engine::lifecycle::{LifecycleScheduler, LockOutcome};
use tourney_engine::tournament::TournamentManager;
use tourney_server::{api, config::ServerConfig, logging, metrics};
use tracing::info;

const HELP: &str = "\
Run a tournament lifecycle and bracket server

USAGE:
  tourney_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env SERVER_BIND or 127.0.0.1:6969]
  --db-url     URL         Database connection string  [default: env DATABASE_URL or postgres://postgres@localhost/tourney_db]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  SERVER_BIND              Server bind address (e.g., 0.0.0.0:8080)
  DATABASE_URL             PostgreSQL connection string
  SWEEP_INTERVAL_SECS      Seconds between lifecycle sweeps
  LIFECYCLE_LOCK_KEY       Advisory lock key shared by all replicas
  HUB_INBOX_CAPACITY       Broadcast hub inbox size
  VIEWER_QUEUE_CAPACITY    Per-viewer outbound queue size
  METRICS_BIND             Prometheus listener address (metrics disabled if unset)
  DB_MAX_CONNECTIONS, DB_MIN_CONNECTIONS, DB_CONNECTION_TIMEOUT,
  DB_IDLE_TIMEOUT, DB_MAX_LIFETIME
                           Connection pool tuning
";

struct Args {
    bind: Option<SocketAddr>,
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let args = Args {
        bind: pargs.opt_value_from_str("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
    };

    let config = ServerConfig::from_env(args.bind, args.database_url)?;
    config.validate()?;

    logging::init();
    info!("Starting tournament server at {}", config.bind);

    if let Some(metrics_bind) = config.metrics_bind {
        metrics::init_metrics(metrics_bind).map_err(|e| anyhow::anyhow!(e))?;
        info!("Prometheus metrics on http://{}/metrics", metrics_bind);
    }

    let db = Database::new(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;
    info!("Database connected");

    let store = Arc::new(PgTournamentStore::new(Arc::new(db.pool().clone())));
    let hub = BroadcastHub::spawn(config.broadcast.inbox_capacity);
    let manager = TournamentManager::new(store, hub.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = LifecycleScheduler::new(
        manager.clone(),
        config.lifecycle.lock_key,
        config.lifecycle.sweep_interval,
    );
    let scheduler_task = tokio::spawn(scheduler.run_with(shutdown_rx, |outcome| {
        metrics::sweep_outcome(outcome);
        if let Ok(LockOutcome::Acquired(report)) = outcome {
            logging::log_sweep_report(report);
        }
    }));

    let app = api::create_router(api::AppState::new(
        manager,
        config.broadcast.viewer_queue_capacity,
    ));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", config.bind, e))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Shutting down server...");

    let _ = shutdown_tx.send(true);
    if let Err(e) = scheduler_task.await {
        tracing::error!("Lifecycle scheduler task failed: {}", e);
    }
    hub.shutdown().await;
    db.close().await;

    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}
