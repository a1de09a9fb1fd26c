use super::lock::{LockCoordinator, LockOutcome};
use crate::db::{DueSelection, StoreTx, TournamentStore};
use crate::tournament::models::TournamentId;
use crate::tournament::{EngineResult, TournamentManager};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{MissedTickBehavior, interval};

/// Default time between sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Moved Soon → Registration
    pub opened: Vec<TournamentId>,
    /// Bracket generated, moved Registration → Active
    pub activated: Vec<TournamentId>,
    /// Moved Active → Completed without a champion
    pub expired: Vec<TournamentId>,
    /// Processing failed; retried next tick
    pub failed: Vec<TournamentId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.opened.is_empty()
            && self.activated.is_empty()
            && self.expired.is_empty()
            && self.failed.is_empty()
    }

    fn record(&mut self, selection: DueSelection, tournament_id: TournamentId) {
        match selection {
            DueSelection::RegistrationOpening => self.opened.push(tournament_id),
            DueSelection::RegistrationClosing => self.activated.push(tournament_id),
            DueSelection::ActiveExpired => self.expired.push(tournament_id),
        }
    }
}

/// Timer-driven lifecycle sweeps, run under the cluster-wide lock
pub struct LifecycleScheduler<S: TournamentStore> {
    manager: TournamentManager<S>,
    lock: LockCoordinator<S>,
    interval: Duration,
}

impl<S: TournamentStore> LifecycleScheduler<S> {
    pub fn new(manager: TournamentManager<S>, lock_key: i64, interval: Duration) -> Self {
        let lock = LockCoordinator::new(std::sync::Arc::clone(manager.store()), lock_key);
        Self {
            manager,
            lock,
            interval,
        }
    }

    /// Run one tick: sweep if this replica wins the lifecycle lock.
    pub async fn tick(&self, now: DateTime<Utc>) -> EngineResult<LockOutcome<SweepReport>> {
        self.lock
            .with_exclusive_lifecycle_lock(|| self.sweep(now))
            .await
    }

    /// Advance every due tournament. One tournament failing never stops the rest.
    pub async fn sweep(&self, now: DateTime<Utc>) -> EngineResult<SweepReport> {
        let mut report = SweepReport::default();

        for selection in DueSelection::ALL {
            let due = {
                let mut tx = self.manager.store().begin().await?;
                let due = tx.select_due(selection, now).await?;
                tx.commit().await?;
                due
            };

            for tournament_id in due {
                match self.manager.advance_due(selection, tournament_id, now).await {
                    Ok(true) => report.record(selection, tournament_id),
                    Ok(false) => {
                        log::debug!(
                            "Tournament {} no longer due for {:?}",
                            tournament_id,
                            selection
                        );
                    }
                    Err(e) => {
                        log::warn!(
                            "Lifecycle sweep skipped tournament {} ({:?}): {}",
                            tournament_id,
                            selection,
                            e
                        );
                        report.failed.push(tournament_id);
                    }
                }
            }
        }

        Ok(report)
    }

    /// Run ticks until `shutdown` flips to true
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        self.run_with(shutdown, |_| {}).await;
    }

    /// Like [`run`](Self::run), handing every tick outcome to `observe`
    pub async fn run_with<F>(self, mut shutdown: watch::Receiver<bool>, mut observe: F)
    where
        F: FnMut(&EngineResult<LockOutcome<SweepReport>>),
    {
        log::info!("Lifecycle scheduler starting, sweeping every {:?}", self.interval);

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = self.tick(Utc::now()).await;
                    match &outcome {
                        Ok(LockOutcome::Acquired(report)) if !report.is_empty() => {
                            log::info!(
                                "Lifecycle sweep: {} opened, {} activated, {} expired, {} failed",
                                report.opened.len(),
                                report.activated.len(),
                                report.expired.len(),
                                report.failed.len()
                            );
                        }
                        Ok(LockOutcome::Acquired(_)) => {}
                        Ok(LockOutcome::NotAcquired) => {
                            log::debug!("Lifecycle lock held by another replica");
                        }
                        Err(e) => log::error!("Lifecycle sweep failed: {}", e),
                    }
                    observe(&outcome);
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("Lifecycle scheduler stopped");
    }
}
