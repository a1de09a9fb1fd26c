//! Tournament manager: transactional facade over the bracket engine.
//!
//! Every operation runs in one unit of work: lock the tournament row, apply
//! the pure bracket change, persist the touched rows, commit, and only then
//! publish the new snapshot to the tournament's hub room.

use super::errors::{EngineError, EngineResult};
use super::models::{
    BracketType, ParticipantId, Tournament, TournamentId, TournamentStatus, UserId,
};
use crate::bracket::{
    Bracket, BracketView, MatchId, ResultOutcome, Score, SeedingStrategy, StandingRow,
    generate_bracket,
};
use crate::broadcast::{HubHandle, snapshot};
use crate::db::{DueSelection, StoreTx, TournamentStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Tournament manager
pub struct TournamentManager<S: TournamentStore> {
    store: Arc<S>,
    hub: HubHandle,
}

impl<S: TournamentStore> Clone for TournamentManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            hub: self.hub.clone(),
        }
    }
}

/// Move `tournament` to `next`, enforcing the lifecycle ordering
async fn transition<T: StoreTx>(
    tx: &mut T,
    tournament: &mut Tournament,
    next: TournamentStatus,
    champion_id: Option<ParticipantId>,
) -> EngineResult<()> {
    if !tournament.status.can_transition_to(next) {
        return Err(EngineError::InvalidState(format!(
            "tournament {} cannot move from {} to {}",
            tournament.id, tournament.status, next
        )));
    }

    tx.update_status(tournament.id, next, champion_id).await?;
    tournament.status = next;
    if champion_id.is_some() {
        tournament.champion_id = champion_id;
    }
    Ok(())
}

impl<S: TournamentStore> TournamentManager<S> {
    /// Create a new tournament manager
    pub fn new(store: Arc<S>, hub: HubHandle) -> Self {
        Self { store, hub }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    async fn lock_as_organizer(
        tx: &mut S::Tx,
        tournament_id: TournamentId,
        acting_user: UserId,
    ) -> EngineResult<Tournament> {
        let tournament = tx
            .lock_tournament(tournament_id)
            .await?
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;

        if !tx.is_organizer(tournament_id, acting_user).await? {
            return Err(EngineError::Forbidden {
                tournament_id,
                user_id: acting_user,
            });
        }

        Ok(tournament)
    }

    /// Generate and store the bracket, then move the tournament to Active
    async fn activate(
        tx: &mut S::Tx,
        tournament: &mut Tournament,
        confirmed: &[ParticipantId],
        seeding: SeedingStrategy,
    ) -> EngineResult<Bracket> {
        if tournament.status != TournamentStatus::Registration {
            return Err(EngineError::InvalidState(format!(
                "tournament {} is {}, brackets are generated when registration closes",
                tournament.id, tournament.status
            )));
        }

        let bracket = generate_bracket(tournament.id, &tournament.format, confirmed, seeding)?;
        let bracket = tx.insert_bracket(bracket).await?;
        transition(tx, tournament, TournamentStatus::Active, None).await?;

        log::info!(
            "Tournament {} active: {} bracket with {} participants, {} matches",
            tournament.id,
            tournament.format.bracket_type.as_str(),
            confirmed.len(),
            bracket.matches().len()
        );
        Ok(bracket)
    }

    /// Publish the committed state of a tournament. Never fails the caller.
    async fn publish(&self, tournament: &Tournament, bracket: Option<&Bracket>) {
        let view = match bracket {
            Some(bracket) => BracketView::new(tournament, bracket),
            None => BracketView::empty(tournament),
        };

        match snapshot(&view) {
            Ok(payload) => self.hub.publish(tournament.id, payload).await,
            Err(e) => log::error!(
                "Failed to serialize snapshot for tournament {}: {}",
                tournament.id,
                e
            ),
        }
    }

    /// Apply one lifecycle step if `tournament_id` is still due for it.
    ///
    /// Returns `Ok(false)` when the tournament no longer qualifies (already
    /// moved by another sweep or an organizer), which makes sweeps idempotent.
    pub async fn advance_due(
        &self,
        selection: DueSelection,
        tournament_id: TournamentId,
        now: DateTime<Utc>,
    ) -> EngineResult<bool> {
        let mut tx = self.store.begin().await?;
        let Some(mut tournament) = tx.lock_tournament(tournament_id).await? else {
            return Ok(false);
        };
        let confirmed = tx.confirmed_participants(tournament_id).await?;
        if !selection.is_due(&tournament, now, confirmed.len()) {
            return Ok(false);
        }

        let bracket = match selection {
            DueSelection::RegistrationOpening => {
                transition(&mut tx, &mut tournament, TournamentStatus::Registration, None).await?;
                None
            }
            DueSelection::RegistrationClosing => Some(
                Self::activate(&mut tx, &mut tournament, &confirmed, SeedingStrategy::default())
                    .await?,
            ),
            DueSelection::ActiveExpired => {
                transition(&mut tx, &mut tournament, TournamentStatus::Completed, None).await?;
                log::info!("Tournament {} timed out without a champion", tournament_id);
                Some(tx.load_bracket(&tournament).await?)
            }
        };

        tx.commit().await?;
        self.publish(&tournament, bracket.as_ref()).await;
        Ok(true)
    }

    /// Organizer-triggered start: close registration now and generate the bracket
    pub async fn start_tournament(
        &self,
        tournament_id: TournamentId,
        acting_user: UserId,
        seeding: SeedingStrategy,
    ) -> EngineResult<BracketView> {
        let mut tx = self.store.begin().await?;
        let mut tournament = Self::lock_as_organizer(&mut tx, tournament_id, acting_user).await?;
        let confirmed = tx.confirmed_participants(tournament_id).await?;

        let bracket = Self::activate(&mut tx, &mut tournament, &confirmed, seeding).await?;
        tx.commit().await?;

        self.publish(&tournament, Some(&bracket)).await;
        Ok(BracketView::new(&tournament, &bracket))
    }

    /// Record a match result submitted by the organizer.
    ///
    /// `winner` of `None` records a draw and is only valid in round robin.
    /// When the result completes the tournament, the champion is stored and
    /// the tournament moves to Completed in the same unit of work.
    ///
    /// # Errors
    ///
    /// * `EngineError::MatchNotFound` - unknown match
    /// * `EngineError::Forbidden` - `acting_user` does not organize the tournament
    /// * `EngineError::InvalidState` - tournament not active, or match completed / not ready
    /// * `EngineError::InvalidWinner` - winner is not in the match
    pub async fn apply_result(
        &self,
        match_id: MatchId,
        winner: Option<ParticipantId>,
        score: Score,
        acting_user: UserId,
    ) -> EngineResult<ResultOutcome> {
        let mut tx = self.store.begin().await?;
        let tournament_id = tx
            .match_tournament(match_id)
            .await?
            .ok_or(EngineError::MatchNotFound(match_id))?;
        let mut tournament = Self::lock_as_organizer(&mut tx, tournament_id, acting_user).await?;

        if tournament.status != TournamentStatus::Active {
            return Err(EngineError::InvalidState(format!(
                "tournament {} is {}, results are only accepted while active",
                tournament_id, tournament.status
            )));
        }

        let mut bracket = tx.load_bracket(&tournament).await?;
        let outcome = bracket.apply_result(match_id, winner, score)?;
        tx.save_matches(&outcome.changed_matches()).await?;

        if let Some(champion) = outcome.champion {
            transition(
                &mut tx,
                &mut tournament,
                TournamentStatus::Completed,
                Some(champion),
            )
            .await?;
        }

        tx.commit().await?;

        match outcome.champion {
            Some(champion) => log::info!(
                "Tournament {} completed, champion participant {}",
                tournament_id,
                champion
            ),
            None => log::debug!("Tournament {} match {} completed", tournament_id, match_id),
        }

        self.publish(&tournament, Some(&bracket)).await;
        Ok(outcome)
    }

    /// Current round-robin table of a tournament
    pub async fn compute_standings(
        &self,
        tournament_id: TournamentId,
    ) -> EngineResult<Vec<StandingRow>> {
        let mut tx = self.store.begin().await?;
        let tournament = tx
            .find_tournament(tournament_id)
            .await?
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;

        if tournament.format.bracket_type != BracketType::RoundRobin {
            return Err(EngineError::InvalidState(format!(
                "tournament {tournament_id} is not a round robin"
            )));
        }

        let bracket = tx.load_bracket(&tournament).await?;
        tx.commit().await?;
        Ok(bracket.standings())
    }

    /// Read-only projection of a tournament's bracket
    pub async fn bracket_view(&self, tournament_id: TournamentId) -> EngineResult<BracketView> {
        let mut tx = self.store.begin().await?;
        let tournament = tx
            .find_tournament(tournament_id)
            .await?
            .ok_or(EngineError::TournamentNotFound(tournament_id))?;
        let bracket = tx.load_bracket(&tournament).await?;
        tx.commit().await?;
        Ok(BracketView::new(&tournament, &bracket))
    }

    /// Cancel a tournament that has not finished yet
    pub async fn cancel_tournament(
        &self,
        tournament_id: TournamentId,
        acting_user: UserId,
    ) -> EngineResult<()> {
        let mut tx = self.store.begin().await?;
        let mut tournament = Self::lock_as_organizer(&mut tx, tournament_id, acting_user).await?;

        transition(&mut tx, &mut tournament, TournamentStatus::Canceled, None).await?;
        let bracket = tx.load_bracket(&tournament).await?;
        tx.commit().await?;

        log::info!("Tournament {} canceled by user {}", tournament_id, acting_user);
        self.publish(&tournament, Some(&bracket)).await;
        Ok(())
    }
}
