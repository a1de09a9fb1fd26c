//! Prometheus metrics for monitoring the tournament server.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener.
//!
//! # Metrics Categories
//!
//! - **Viewer Metrics**: connections opened, currently active, disconnect reasons
//! - **Lifecycle Metrics**: sweep outcomes and tournaments advanced per transition
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tourney_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::viewer_connected();
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tourney_engine::EngineResult;
use tourney_engine::broadcast::ViewerExit;
use tourney_engine::lifecycle::{LockOutcome, SweepReport};

static ACTIVE_VIEWERS: AtomicU64 = AtomicU64::new(0);

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Errors
///
/// Returns an error message if the exporter cannot be installed (for
/// example when the address is already in use).
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Viewer Metrics
// ============================================================================

/// Record a viewer websocket being accepted.
pub fn viewer_connected() {
    metrics::counter!("viewer_connections_total").increment(1);
    let active = ACTIVE_VIEWERS.fetch_add(1, Ordering::Relaxed) + 1;
    metrics::gauge!("viewer_connections_active").set(active as f64);
}

/// Record a viewer session ending.
pub fn viewer_disconnected(exit: ViewerExit) {
    metrics::counter!("viewer_disconnects_total",
        "reason" => exit.as_str()
    )
    .increment(1);
    let active = ACTIVE_VIEWERS
        .fetch_sub(1, Ordering::Relaxed)
        .saturating_sub(1);
    metrics::gauge!("viewer_connections_active").set(active as f64);
}

// ============================================================================
// Lifecycle Metrics
// ============================================================================

/// Record the outcome of one scheduler tick.
pub fn sweep_outcome(outcome: &EngineResult<LockOutcome<SweepReport>>) {
    let label = match outcome {
        Ok(LockOutcome::Acquired(_)) => "acquired",
        Ok(LockOutcome::NotAcquired) => "not_acquired",
        Err(_) => "error",
    };
    metrics::counter!("lifecycle_sweeps_total", "outcome" => label).increment(1);

    if let Ok(LockOutcome::Acquired(report)) = outcome {
        tournaments_transitioned("opened", report.opened.len());
        tournaments_transitioned("activated", report.activated.len());
        tournaments_transitioned("expired", report.expired.len());
        tournaments_transitioned("failed", report.failed.len());
    }
}

fn tournaments_transitioned(transition: &'static str, count: usize) {
    if count > 0 {
        metrics::counter!("lifecycle_tournaments_total",
            "transition" => transition
        )
        .increment(count as u64);
    }
}
