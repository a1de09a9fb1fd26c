//! Structured logging configuration.
//!
//! The engine crate logs through the `log` facade; the subscriber installed
//! here picks those records up alongside the server's own `tracing` events.

use tourney_engine::broadcast::ViewerExit;
use tourney_engine::lifecycle::SweepReport;
use tourney_engine::tournament::TournamentId;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use tourney_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log which tournaments a lifecycle sweep touched
///
/// The scheduler already logs the per-sweep counts at info; this adds the
/// tournament ids at debug and repeats failures at warn.
pub fn log_sweep_report(report: &SweepReport) {
    if report.is_empty() {
        tracing::debug!("Lifecycle sweep found nothing due");
        return;
    }

    tracing::debug!(
        opened = ?report.opened,
        activated = ?report.activated,
        expired = ?report.expired,
        "Lifecycle sweep advanced tournaments"
    );

    if !report.failed.is_empty() {
        tracing::warn!(
            failed = ?report.failed,
            "Lifecycle sweep left tournaments for the next tick"
        );
    }
}

/// Log a viewer connecting (`exit` is `None`) or leaving
pub fn log_viewer_event(tournament_id: TournamentId, exit: Option<ViewerExit>) {
    match exit {
        None => tracing::info!(tournament_id = tournament_id, "Viewer connected"),
        Some(ViewerExit::WriteFailed) | Some(ViewerExit::HubUnavailable) => tracing::warn!(
            tournament_id = tournament_id,
            reason = exit.map(ViewerExit::as_str),
            "Viewer disconnected abnormally"
        ),
        Some(exit) => tracing::info!(
            tournament_id = tournament_id,
            reason = exit.as_str(),
            "Viewer disconnected"
        ),
    }
}
