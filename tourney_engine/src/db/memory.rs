//! In-memory implementation of the persistence gateway.
//!
//! A unit of work takes the state mutex on its first data access and keeps it
//! until commit or drop, so transactions are fully serialized. Changes are
//! made on a staged copy that replaces the shared state only on commit.
//! Advisory locks live in a separate table so that lock attempts never wait
//! on the state mutex, mirroring `pg_try_advisory_xact_lock`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::errors::{StoreError, StoreResult};
use super::repository::{DueSelection, StoreTx, TournamentStore};
use crate::bracket::{Bracket, Match, MatchId};
use crate::tournament::models::{
    Entrant, Participant, ParticipantId, ParticipantStatus, Tournament, TournamentId,
    TournamentStatus, UserId,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    tournaments: BTreeMap<TournamentId, Tournament>,
    participants: BTreeMap<ParticipantId, Participant>,
    matches: BTreeMap<MatchId, Match>,
    last_tournament_id: TournamentId,
    last_participant_id: ParticipantId,
    last_match_id: MatchId,
}

impl MemoryState {
    fn confirmed(&self, tournament_id: TournamentId) -> Vec<ParticipantId> {
        self.participants
            .values()
            .filter(|p| p.tournament_id == tournament_id && p.status.is_confirmed())
            .map(|p| p.id)
            .collect()
    }
}

/// Tournament store held entirely in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<AsyncMutex<MemoryState>>,
    advisory: Arc<Mutex<HashSet<i64>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tournament, assigning it the next id
    pub async fn create_tournament(&self, mut tournament: Tournament) -> TournamentId {
        let mut state = self.state.lock().await;
        state.last_tournament_id += 1;
        tournament.id = state.last_tournament_id;
        state.tournaments.insert(tournament.id, tournament);
        state.last_tournament_id
    }

    /// Register an entrant, assigning the next participant id
    pub async fn register(
        &self,
        tournament_id: TournamentId,
        entrant: Entrant,
        status: ParticipantStatus,
    ) -> ParticipantId {
        let mut state = self.state.lock().await;
        state.last_participant_id += 1;
        let id = state.last_participant_id;
        state.participants.insert(
            id,
            Participant {
                id,
                tournament_id,
                entrant,
                status,
                registered_at: Utc::now(),
            },
        );
        id
    }

    /// Change a registration's status; returns false if it does not exist
    pub async fn set_participant_status(
        &self,
        participant_id: ParticipantId,
        status: ParticipantStatus,
    ) -> bool {
        let mut state = self.state.lock().await;
        match state.participants.get_mut(&participant_id) {
            Some(participant) => {
                participant.status = status;
                true
            }
            None => false,
        }
    }

    /// Committed snapshot of a tournament
    pub async fn tournament(&self, id: TournamentId) -> Option<Tournament> {
        self.state.lock().await.tournaments.get(&id).cloned()
    }

    /// Committed matches of a tournament, ordered by round and slot
    pub async fn matches(&self, tournament_id: TournamentId) -> Vec<Match> {
        let state = self.state.lock().await;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();
        matches.sort_by_key(|m| (m.round, m.slot_in_round));
        matches
    }

    /// Whether an advisory key is currently held by some unit of work
    pub fn is_advisory_locked(&self, key: i64) -> bool {
        self.advisory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }
}

#[async_trait]
impl TournamentStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        Ok(MemoryTx {
            store: self.clone(),
            guard: None,
            staged: None,
            held: Vec::new(),
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Unit of work over a [`MemoryStore`]
pub struct MemoryTx {
    store: MemoryStore,
    guard: Option<OwnedMutexGuard<MemoryState>>,
    staged: Option<MemoryState>,
    held: Vec<i64>,
}

impl MemoryTx {
    async fn state(&mut self) -> &mut MemoryState {
        if self.guard.is_none() {
            self.guard = Some(self.store.state.clone().lock_owned().await);
        }
        let Self { guard, staged, .. } = self;
        staged.get_or_insert_with(|| guard.as_deref().cloned().unwrap_or_default())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        let mut advisory = self
            .store
            .advisory
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for key in &self.held {
            advisory.remove(key);
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn try_advisory_lock(&mut self, key: i64) -> StoreResult<bool> {
        if self.held.contains(&key) {
            return Ok(true);
        }
        let acquired = self
            .store
            .advisory
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
        if acquired {
            self.held.push(key);
        }
        Ok(acquired)
    }

    async fn select_due(
        &mut self,
        selection: DueSelection,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TournamentId>> {
        let state = self.state().await;
        Ok(state
            .tournaments
            .values()
            .filter(|t| selection.is_due(t, now, state.confirmed(t.id).len()))
            .map(|t| t.id)
            .collect())
    }

    async fn find_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        Ok(self.state().await.tournaments.get(&id).cloned())
    }

    async fn lock_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        // the state guard already serializes every unit of work
        self.find_tournament(id).await
    }

    async fn update_status(
        &mut self,
        id: TournamentId,
        status: TournamentStatus,
        champion_id: Option<ParticipantId>,
    ) -> StoreResult<()> {
        let tournament = self
            .state()
            .await
            .tournaments
            .get_mut(&id)
            .ok_or_else(|| StoreError::Corrupt(format!("tournament {id} vanished")))?;
        tournament.status = status;
        if champion_id.is_some() {
            tournament.champion_id = champion_id;
        }
        Ok(())
    }

    async fn confirmed_participants(
        &mut self,
        id: TournamentId,
    ) -> StoreResult<Vec<ParticipantId>> {
        Ok(self.state().await.confirmed(id))
    }

    async fn is_organizer(&mut self, id: TournamentId, user_id: UserId) -> StoreResult<bool> {
        Ok(self
            .state()
            .await
            .tournaments
            .get(&id)
            .is_some_and(|t| t.organizer_id == user_id))
    }

    async fn match_tournament(&mut self, match_id: MatchId) -> StoreResult<Option<TournamentId>> {
        Ok(self
            .state()
            .await
            .matches
            .get(&match_id)
            .map(|m| m.tournament_id))
    }

    async fn insert_bracket(&mut self, mut bracket: Bracket) -> StoreResult<Bracket> {
        let state = self.state().await;
        let mut mapping = HashMap::with_capacity(bracket.matches().len());
        for m in bracket.matches() {
            state.last_match_id += 1;
            mapping.insert(m.id, state.last_match_id);
        }

        bracket.remap_ids(&mapping);
        for m in bracket.matches() {
            state.matches.insert(m.id, m.clone());
        }
        Ok(bracket)
    }

    async fn load_bracket(&mut self, tournament: &Tournament) -> StoreResult<Bracket> {
        let matches = self
            .state()
            .await
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament.id)
            .cloned()
            .collect();
        Ok(Bracket::new(
            tournament.id,
            tournament.format.bracket_type,
            tournament.format.settings.clone(),
            matches,
        ))
    }

    async fn save_matches(&mut self, matches: &[Match]) -> StoreResult<()> {
        let state = self.state().await;
        for m in matches {
            match state.matches.get_mut(&m.id) {
                Some(stored) => *stored = m.clone(),
                None => return Err(StoreError::Corrupt(format!("match {} vanished", m.id))),
            }
        }
        Ok(())
    }

    async fn commit(mut self) -> StoreResult<()> {
        if let (Some(mut guard), Some(staged)) = (self.guard.take(), self.staged.take()) {
            *guard = staged;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tournament::models::Format;
    use chrono::Duration;

    fn tournament() -> Tournament {
        let now = Utc::now();
        Tournament {
            id: 0,
            name: "Memory Cup".to_string(),
            organizer_id: 9,
            status: TournamentStatus::Soon,
            format: Format::single_elimination(1),
            registration_start: now - Duration::minutes(1),
            registration_end: now + Duration::hours(1),
            start_date: now + Duration::hours(2),
            end_date: now + Duration::days(1),
            capacity: 8,
            champion_id: None,
        }
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = MemoryStore::new();
        let id = store.create_tournament(tournament()).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.update_status(id, TournamentStatus::Registration, None)
                .await
                .unwrap();
        }

        assert_eq!(store.tournament(id).await.unwrap().status, TournamentStatus::Soon);
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        let store = MemoryStore::new();
        let id = store.create_tournament(tournament()).await;

        let mut tx = store.begin().await.unwrap();
        tx.update_status(id, TournamentStatus::Registration, None)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(
            store.tournament(id).await.unwrap().status,
            TournamentStatus::Registration
        );
    }

    #[tokio::test]
    async fn test_advisory_lock_is_exclusive_until_drop() {
        let store = MemoryStore::new();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        assert!(first.try_advisory_lock(7).await.unwrap());
        assert!(first.try_advisory_lock(7).await.unwrap());
        assert!(!second.try_advisory_lock(7).await.unwrap());
        assert!(second.try_advisory_lock(8).await.unwrap());

        drop(first);
        assert!(!store.is_advisory_locked(7));
        assert!(second.try_advisory_lock(7).await.unwrap());

        second.commit().await.unwrap();
        assert!(!store.is_advisory_locked(7));
        assert!(!store.is_advisory_locked(8));
    }

    #[tokio::test]
    async fn test_confirmed_participants_in_registration_order() {
        let store = MemoryStore::new();
        let id = store.create_tournament(tournament()).await;
        let a = store.register(id, Entrant::User(1), ParticipantStatus::Participant).await;
        let _pending = store
            .register(id, Entrant::User(2), ParticipantStatus::ApplicationSubmitted)
            .await;
        let c = store.register(id, Entrant::Team(5), ParticipantStatus::Participant).await;

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.confirmed_participants(id).await.unwrap(), vec![a, c]);
        assert!(tx.is_organizer(id, 9).await.unwrap());
        assert!(!tx.is_organizer(id, 1).await.unwrap());
    }
}
