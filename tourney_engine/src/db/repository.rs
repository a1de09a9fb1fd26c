//! Persistence gateway traits.
//!
//! Every engine operation runs inside one [`StoreTx`]: a unit of work that is
//! either committed as a whole or rolled back when dropped. The Postgres
//! implementation maps it onto a database transaction; the in-memory
//! implementation stages a copy of the state and swaps it in on commit.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::errors::StoreResult;
use crate::bracket::{Bracket, Match, MatchId};
use crate::tournament::models::{
    ParticipantId, Tournament, TournamentId, TournamentStatus, UserId,
};

/// Which tournaments a lifecycle sweep is looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueSelection {
    /// `Soon` with `registration_start <= now`
    RegistrationOpening,
    /// `Registration` with `registration_end <= now`, or confirmed count at capacity
    RegistrationClosing,
    /// `Active` with `end_date <= now` and no champion recorded
    ActiveExpired,
}

impl DueSelection {
    pub const ALL: [DueSelection; 3] = [
        DueSelection::RegistrationOpening,
        DueSelection::RegistrationClosing,
        DueSelection::ActiveExpired,
    ];

    /// Status a selected tournament is expected to have
    pub fn status(self) -> TournamentStatus {
        match self {
            DueSelection::RegistrationOpening => TournamentStatus::Soon,
            DueSelection::RegistrationClosing => TournamentStatus::Registration,
            DueSelection::ActiveExpired => TournamentStatus::Active,
        }
    }

    /// Whether `tournament` still qualifies, given its confirmed participant count.
    ///
    /// Sweeps re-check this after locking the row, so a tournament moved by
    /// someone else between selection and lock is skipped.
    pub fn is_due(self, tournament: &Tournament, now: DateTime<Utc>, confirmed: usize) -> bool {
        if tournament.status != self.status() {
            return false;
        }
        match self {
            DueSelection::RegistrationOpening => tournament.registration_start <= now,
            DueSelection::RegistrationClosing => {
                tournament.registration_end <= now || confirmed >= tournament.capacity as usize
            }
            DueSelection::ActiveExpired => {
                tournament.end_date <= now && tournament.champion_id.is_none()
            }
        }
    }
}

/// Factory for units of work
#[async_trait]
pub trait TournamentStore: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Start a unit of work
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// Check the backing store is reachable
    async fn health_check(&self) -> StoreResult<()>;
}

/// One unit of work against the store.
///
/// Dropping a transaction without calling [`StoreTx::commit`] discards every
/// change made through it and releases any advisory lock it holds.
#[async_trait]
pub trait StoreTx: Send {
    /// Try to take a transaction-scoped advisory lock without waiting
    async fn try_advisory_lock(&mut self, key: i64) -> StoreResult<bool>;

    /// Ids of tournaments matching `selection` at `now`, ascending
    async fn select_due(
        &mut self,
        selection: DueSelection,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TournamentId>>;

    /// Read a tournament without locking it
    async fn find_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>>;

    /// Read a tournament and hold its row lock until the unit of work ends
    async fn lock_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>>;

    /// Persist a status change (and champion, when one is decided)
    async fn update_status(
        &mut self,
        id: TournamentId,
        status: TournamentStatus,
        champion_id: Option<ParticipantId>,
    ) -> StoreResult<()>;

    /// Confirmed participants in registration order
    async fn confirmed_participants(
        &mut self,
        id: TournamentId,
    ) -> StoreResult<Vec<ParticipantId>>;

    /// Whether `user_id` organizes tournament `id`
    async fn is_organizer(&mut self, id: TournamentId, user_id: UserId) -> StoreResult<bool>;

    /// Tournament a match belongs to
    async fn match_tournament(&mut self, match_id: MatchId) -> StoreResult<Option<TournamentId>>;

    /// Insert a freshly generated bracket, returning it with store-assigned ids
    async fn insert_bracket(&mut self, bracket: Bracket) -> StoreResult<Bracket>;

    /// Load the bracket of `tournament` (empty if none was generated)
    async fn load_bracket(&mut self, tournament: &Tournament) -> StoreResult<Bracket>;

    /// Write back changed matches
    async fn save_matches(&mut self, matches: &[Match]) -> StoreResult<()>;

    /// Make every change of this unit of work durable
    async fn commit(self) -> StoreResult<()>;
}
