//! PostgreSQL implementation of the persistence gateway.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use std::sync::Arc;

use super::errors::{StoreError, StoreResult};
use super::repository::{DueSelection, StoreTx, TournamentStore};
use super::timeouts::{LOCK_ATTEMPT_TIMEOUT, with_default_timeout, with_long_timeout, with_timeout};
use crate::bracket::{Bracket, Match, MatchId, Score};
use crate::tournament::models::{
    Format, FormatSettings, ParticipantId, Tournament, TournamentId, TournamentStatus, UserId,
};

const TOURNAMENT_COLUMNS: &str = "
    SELECT t.id, t.name, t.organizer_id, t.status, t.registration_start, t.registration_end,
           t.start_date, t.end_date, t.capacity, t.champion_id,
           f.id AS format_id, f.bracket_type, f.participant_type, f.settings
    FROM tournaments t
    JOIN formats f ON f.id = t.format_id
    WHERE t.id = $1";

const MATCH_COLUMNS: &str = "
    SELECT id, tournament_id, round, slot_in_round, participant_a_id, participant_b_id,
           winner_participant_id, score, status, next_match_id, next_match_slot
    FROM matches";

/// Postgres-backed tournament store
#[derive(Clone)]
pub struct PgTournamentStore {
    pool: Arc<PgPool>,
}

impl PgTournamentStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TournamentStore for PgTournamentStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> StoreResult<PgStoreTx> {
        let tx = with_default_timeout(self.pool.begin()).await?;
        Ok(PgStoreTx { tx })
    }

    async fn health_check(&self) -> StoreResult<()> {
        with_default_timeout(sqlx::query("SELECT 1").execute(self.pool.as_ref())).await?;
        Ok(())
    }
}

/// One database transaction; rolled back by sqlx when dropped uncommitted
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

fn parse_column<T>(row: &PgRow, column: &str) -> StoreResult<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(StoreError::Corrupt)
}

fn tournament_from_row(row: &PgRow) -> StoreResult<Tournament> {
    let settings: serde_json::Value = row.try_get("settings")?;
    let settings: FormatSettings = serde_json::from_value(settings)?;
    let capacity: i32 = row.try_get("capacity")?;

    Ok(Tournament {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        organizer_id: row.try_get("organizer_id")?,
        status: parse_column(row, "status")?,
        format: Format {
            id: row.try_get("format_id")?,
            bracket_type: parse_column(row, "bracket_type")?,
            participant_type: parse_column(row, "participant_type")?,
            settings,
        },
        registration_start: row.try_get("registration_start")?,
        registration_end: row.try_get("registration_end")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        capacity: capacity.max(0) as u32,
        champion_id: row.try_get("champion_id")?,
    })
}

fn match_from_row(row: &PgRow) -> StoreResult<Match> {
    let score: Option<serde_json::Value> = row.try_get("score")?;
    let score: Option<Score> = score.map(serde_json::from_value).transpose()?;
    let next_match_slot: Option<String> = row.try_get("next_match_slot")?;
    let round: i32 = row.try_get("round")?;
    let slot_in_round: i32 = row.try_get("slot_in_round")?;

    Ok(Match {
        id: row.try_get("id")?,
        tournament_id: row.try_get("tournament_id")?,
        round: round as u32,
        slot_in_round: slot_in_round as u32,
        participant_a: row.try_get("participant_a_id")?,
        participant_b: row.try_get("participant_b_id")?,
        winner: row.try_get("winner_participant_id")?,
        score,
        status: parse_column(row, "status")?,
        next_match_id: row.try_get("next_match_id")?,
        next_match_slot: next_match_slot
            .map(|slot| slot.parse())
            .transpose()
            .map_err(StoreError::Corrupt)?,
    })
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn try_advisory_lock(&mut self, key: i64) -> StoreResult<bool> {
        let row = with_timeout(
            LOCK_ATTEMPT_TIMEOUT,
            sqlx::query("SELECT pg_try_advisory_xact_lock($1) AS acquired")
                .bind(key)
                .fetch_one(&mut *self.tx),
        )
        .await?;
        Ok(row.try_get("acquired")?)
    }

    async fn select_due(
        &mut self,
        selection: DueSelection,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<TournamentId>> {
        let sql = match selection {
            DueSelection::RegistrationOpening => {
                "SELECT id FROM tournaments
                 WHERE status = 'soon' AND registration_start <= $1
                 ORDER BY id"
            }
            DueSelection::RegistrationClosing => {
                "SELECT t.id FROM tournaments t
                 WHERE t.status = 'registration'
                   AND (t.registration_end <= $1
                        OR (SELECT COUNT(*) FROM participants p
                            WHERE p.tournament_id = t.id AND p.status = 'participant') >= t.capacity)
                 ORDER BY t.id"
            }
            DueSelection::ActiveExpired => {
                "SELECT id FROM tournaments
                 WHERE status = 'active' AND end_date <= $1 AND champion_id IS NULL
                 ORDER BY id"
            }
        };

        let rows = with_default_timeout(sqlx::query(sql).bind(now).fetch_all(&mut *self.tx)).await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(StoreError::from))
            .collect()
    }

    async fn find_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        let row = with_default_timeout(
            sqlx::query(TOURNAMENT_COLUMNS)
                .bind(id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn lock_tournament(&mut self, id: TournamentId) -> StoreResult<Option<Tournament>> {
        let sql = format!("{TOURNAMENT_COLUMNS} FOR UPDATE OF t");
        let row = with_default_timeout(
            sqlx::query(&sql).bind(id).fetch_optional(&mut *self.tx),
        )
        .await?;
        row.as_ref().map(tournament_from_row).transpose()
    }

    async fn update_status(
        &mut self,
        id: TournamentId,
        status: TournamentStatus,
        champion_id: Option<ParticipantId>,
    ) -> StoreResult<()> {
        with_default_timeout(
            sqlx::query(
                "UPDATE tournaments
                 SET status = $1, champion_id = COALESCE($2, champion_id), updated_at = NOW()
                 WHERE id = $3",
            )
            .bind(status.as_str())
            .bind(champion_id)
            .bind(id)
            .execute(&mut *self.tx),
        )
        .await?;
        Ok(())
    }

    async fn confirmed_participants(
        &mut self,
        id: TournamentId,
    ) -> StoreResult<Vec<ParticipantId>> {
        let rows = with_default_timeout(
            sqlx::query(
                "SELECT id FROM participants
                 WHERE tournament_id = $1 AND status = 'participant'
                 ORDER BY id",
            )
            .bind(id)
            .fetch_all(&mut *self.tx),
        )
        .await?;
        rows.iter()
            .map(|row| row.try_get("id").map_err(StoreError::from))
            .collect()
    }

    async fn is_organizer(&mut self, id: TournamentId, user_id: UserId) -> StoreResult<bool> {
        let row = with_default_timeout(
            sqlx::query("SELECT 1 AS found FROM tournaments WHERE id = $1 AND organizer_id = $2")
                .bind(id)
                .bind(user_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        Ok(row.is_some())
    }

    async fn match_tournament(&mut self, match_id: MatchId) -> StoreResult<Option<TournamentId>> {
        let row = with_default_timeout(
            sqlx::query("SELECT tournament_id FROM matches WHERE id = $1")
                .bind(match_id)
                .fetch_optional(&mut *self.tx),
        )
        .await?;
        Ok(row.map(|row| row.try_get("tournament_id")).transpose()?)
    }

    async fn insert_bracket(&mut self, mut bracket: Bracket) -> StoreResult<Bracket> {
        // Later rounds first, so every next_match_id already has a real id
        let mut pending: Vec<&Match> = bracket.matches().iter().collect();
        pending.sort_by_key(|m| std::cmp::Reverse((m.round, m.slot_in_round)));

        let mut mapping: HashMap<MatchId, MatchId> = HashMap::with_capacity(pending.len());
        for m in pending {
            let next_match_id = m.next_match_id.and_then(|next| mapping.get(&next).copied());
            let score = m.score.as_ref().map(serde_json::to_value).transpose()?;

            let row = with_default_timeout(
                sqlx::query(
                    "INSERT INTO matches
                        (tournament_id, round, slot_in_round, participant_a_id, participant_b_id,
                         winner_participant_id, score, status, next_match_id, next_match_slot)
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                     RETURNING id",
                )
                .bind(m.tournament_id)
                .bind(m.round as i32)
                .bind(m.slot_in_round as i32)
                .bind(m.participant_a)
                .bind(m.participant_b)
                .bind(m.winner)
                .bind(score)
                .bind(m.status.as_str())
                .bind(next_match_id)
                .bind(m.next_match_slot.map(|slot| slot.as_str()))
                .fetch_one(&mut *self.tx),
            )
            .await?;

            mapping.insert(m.id, row.try_get("id")?);
        }

        bracket.remap_ids(&mapping);
        Ok(bracket)
    }

    async fn load_bracket(&mut self, tournament: &Tournament) -> StoreResult<Bracket> {
        let sql = format!("{MATCH_COLUMNS} WHERE tournament_id = $1 ORDER BY round, slot_in_round");
        let rows = with_long_timeout(
            sqlx::query(&sql)
                .bind(tournament.id)
                .fetch_all(&mut *self.tx),
        )
        .await?;

        let matches = rows
            .iter()
            .map(match_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Bracket::new(
            tournament.id,
            tournament.format.bracket_type,
            tournament.format.settings.clone(),
            matches,
        ))
    }

    async fn save_matches(&mut self, matches: &[Match]) -> StoreResult<()> {
        for m in matches {
            let score = m.score.as_ref().map(serde_json::to_value).transpose()?;
            let result = with_default_timeout(
                sqlx::query(
                    "UPDATE matches
                     SET participant_a_id = $1, participant_b_id = $2,
                         winner_participant_id = $3, score = $4, status = $5
                     WHERE id = $6",
                )
                .bind(m.participant_a)
                .bind(m.participant_b)
                .bind(m.winner)
                .bind(score)
                .bind(m.status.as_str())
                .bind(m.id)
                .execute(&mut *self.tx),
            )
            .await?;

            if result.rows_affected() == 0 {
                return Err(StoreError::Corrupt(format!("match {} vanished", m.id)));
            }
        }
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        with_default_timeout(self.tx.commit()).await?;
        Ok(())
    }
}
