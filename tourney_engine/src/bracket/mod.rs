//! Bracket engine: pure match-graph construction and result propagation.
//!
//! A bracket is stored as an arena of [`Match`] values plus an index from
//! [`MatchId`] to arena position. Links between matches (`next_match_id`) are
//! plain ids, so the graph can be loaded from and written back to the store
//! without any ownership between match objects.
//!
//! Two bracket types are supported:
//!
//! - **Single elimination**: a binary tree converging on one final match.
//!   Winners are propagated into the next match as results arrive.
//! - **Round robin**: a flat fixture list generated with the circle method.
//!   Standings are derived from completed fixtures on demand.
//!
//! Nothing in this module touches the database; the tournament manager loads
//! a [`Bracket`], applies a change, and persists the returned matches.

pub mod errors;
pub mod round_robin;
pub mod single_elimination;
pub mod standings;
pub mod view;

pub use errors::{BracketError, BracketResult};
pub use standings::{StandingRow, compute_standings};
pub use view::{BracketView, RoundView};

use crate::tournament::models::{
    BracketType, Format, FormatSettings, ParticipantId, TournamentId,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Match ID type
pub type MatchId = i64;

/// Match status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Waiting for at least one participant
    Pending,
    /// Both participants known, result can be submitted
    Ready,
    /// Result recorded
    Completed,
}

impl MatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchStatus::Pending => "pending",
            MatchStatus::Ready => "ready",
            MatchStatus::Completed => "completed",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MatchStatus::Pending),
            "ready" => Ok(MatchStatus::Ready),
            "completed" => Ok(MatchStatus::Completed),
            other => Err(format!("unknown match status: {other}")),
        }
    }
}

/// Side of a match a participant occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    pub fn as_str(self) -> &'static str {
        match self {
            Slot::A => "a",
            Slot::B => "b",
        }
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "a" | "A" => Ok(Slot::A),
            "b" | "B" => Ok(Slot::B),
            other => Err(format!("unknown match slot: {other}")),
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured match result
///
/// `a` and `b` are the scores of participant A and B. `details` carries any
/// sport-specific breakdown (sets, legs, overtime) verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub a: u32,
    pub b: u32,
    /// Set on matches resolved automatically because one side was empty
    #[serde(default)]
    pub bye: bool,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl Score {
    pub fn new(a: u32, b: u32) -> Self {
        Self {
            a,
            b,
            bye: false,
            details: serde_json::Value::Null,
        }
    }

    /// Score recorded on an auto-completed bye match
    pub fn bye() -> Self {
        Self {
            bye: true,
            ..Self::new(0, 0)
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// One match (or round-robin fixture)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    /// 1-based round number
    pub round: u32,
    /// 0-based position within the round
    pub slot_in_round: u32,
    pub participant_a: Option<ParticipantId>,
    pub participant_b: Option<ParticipantId>,
    pub winner: Option<ParticipantId>,
    pub score: Option<Score>,
    pub status: MatchStatus,
    /// `None` marks the final in single elimination, and every round-robin fixture
    pub next_match_id: Option<MatchId>,
    pub next_match_slot: Option<Slot>,
}

impl Match {
    /// Empty match slot in the tree, waiting for earlier results
    pub fn pending(id: MatchId, tournament_id: TournamentId, round: u32, slot_in_round: u32) -> Self {
        Self {
            id,
            tournament_id,
            round,
            slot_in_round,
            participant_a: None,
            participant_b: None,
            winner: None,
            score: None,
            status: MatchStatus::Pending,
            next_match_id: None,
            next_match_slot: None,
        }
    }

    pub fn participant(&self, slot: Slot) -> Option<ParticipantId> {
        match slot {
            Slot::A => self.participant_a,
            Slot::B => self.participant_b,
        }
    }

    pub fn has_participant(&self, participant: ParticipantId) -> bool {
        self.participant_a == Some(participant) || self.participant_b == Some(participant)
    }

    /// The other side of the match, if known
    pub fn opponent_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        if self.participant_a == Some(participant) {
            self.participant_b
        } else if self.participant_b == Some(participant) {
            self.participant_a
        } else {
            None
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }

    /// Auto-completed because one side was empty
    pub fn is_bye(&self) -> bool {
        self.score.as_ref().is_some_and(|s| s.bye)
    }

    fn place(&mut self, slot: Slot, participant: ParticipantId) {
        match slot {
            Slot::A => self.participant_a = Some(participant),
            Slot::B => self.participant_b = Some(participant),
        }
        if self.participant_a.is_some() && self.participant_b.is_some() {
            self.status = MatchStatus::Ready;
        }
    }
}

/// Seeding strategy for bracket generation
///
/// Only the registration-order default is provided: confirmed participants
/// keep the order the store returns them in (ascending registration id).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SeedingStrategy {
    #[default]
    RegistrationOrder,
}

impl SeedingStrategy {
    /// Seed list, best seed first, with duplicates removed
    pub fn seed(&self, participants: &[ParticipantId]) -> Vec<ParticipantId> {
        let mut seen = std::collections::HashSet::new();
        match self {
            SeedingStrategy::RegistrationOrder => participants
                .iter()
                .copied()
                .filter(|p| seen.insert(*p))
                .collect(),
        }
    }
}

/// Outcome of a successfully applied result
#[derive(Debug, Clone, PartialEq)]
pub struct ResultOutcome {
    /// The match the result was applied to
    pub updated: Match,
    /// The next match, after the winner was placed into it
    pub advanced: Option<Match>,
    /// Set exactly when this result completed the tournament
    pub champion: Option<ParticipantId>,
}

impl ResultOutcome {
    pub fn tournament_complete(&self) -> bool {
        self.champion.is_some()
    }

    /// Every match row changed by the result
    pub fn changed_matches(&self) -> Vec<Match> {
        std::iter::once(self.updated.clone())
            .chain(self.advanced.clone())
            .collect()
    }
}

/// Match graph of one tournament
#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    tournament_id: TournamentId,
    bracket_type: BracketType,
    settings: FormatSettings,
    matches: Vec<Match>,
    index: HashMap<MatchId, usize>,
}

/// Build the initial bracket for a confirmed participant list.
///
/// Match ids in the returned bracket are provisional (1-based, in round
/// order); the store assigns real ids on insert via [`Bracket::remap_ids`].
pub fn generate_bracket(
    tournament_id: TournamentId,
    format: &Format,
    participants: &[ParticipantId],
    seeding: SeedingStrategy,
) -> BracketResult<Bracket> {
    let seeds = seeding.seed(participants);
    if seeds.len() < 2 {
        return Err(BracketError::InsufficientParticipants {
            needed: 2,
            current: seeds.len(),
        });
    }

    match format.bracket_type {
        BracketType::SingleElimination => {
            single_elimination::generate(tournament_id, &seeds, format.settings.clone())
        }
        BracketType::RoundRobin => {
            round_robin::generate(tournament_id, &seeds, format.settings.clone())
        }
    }
}

impl Bracket {
    /// Assemble a bracket from stored matches
    pub fn new(
        tournament_id: TournamentId,
        bracket_type: BracketType,
        settings: FormatSettings,
        mut matches: Vec<Match>,
    ) -> Self {
        matches.sort_by_key(|m| (m.round, m.slot_in_round));
        let index = matches
            .iter()
            .enumerate()
            .map(|(position, m)| (m.id, position))
            .collect();

        Self {
            tournament_id,
            bracket_type,
            settings,
            matches,
            index,
        }
    }

    pub fn tournament_id(&self) -> TournamentId {
        self.tournament_id
    }

    pub fn bracket_type(&self) -> BracketType {
        self.bracket_type
    }

    pub fn settings(&self) -> &FormatSettings {
        &self.settings
    }

    /// Matches ordered by round, then slot
    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn get(&self, id: MatchId) -> Option<&Match> {
        self.index.get(&id).map(|&position| &self.matches[position])
    }

    fn position(&self, id: MatchId) -> BracketResult<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or(BracketError::MatchNotFound(id))
    }

    /// Matches grouped by round
    pub fn rounds(&self) -> BTreeMap<u32, Vec<&Match>> {
        let mut rounds: BTreeMap<u32, Vec<&Match>> = BTreeMap::new();
        for m in &self.matches {
            rounds.entry(m.round).or_default().push(m);
        }
        rounds
    }

    /// The unique sink of a single-elimination tree
    pub fn final_match(&self) -> Option<&Match> {
        match self.bracket_type {
            BracketType::SingleElimination => {
                self.matches.iter().find(|m| m.next_match_id.is_none())
            }
            BracketType::RoundRobin => None,
        }
    }

    /// Participants appearing anywhere in the bracket, ascending
    pub fn participants(&self) -> Vec<ParticipantId> {
        let mut participants: Vec<ParticipantId> = self
            .matches
            .iter()
            .flat_map(|m| [m.participant_a, m.participant_b])
            .flatten()
            .collect();
        participants.sort_unstable();
        participants.dedup();
        participants
    }

    /// Winner of the final, or the standings leader once every fixture is played
    pub fn champion(&self) -> Option<ParticipantId> {
        match self.bracket_type {
            BracketType::SingleElimination => self.final_match().and_then(|m| m.winner),
            BracketType::RoundRobin => {
                if self.matches.is_empty() || !self.matches.iter().all(Match::is_completed) {
                    return None;
                }
                self.standings().first().map(|row| row.participant_id)
            }
        }
    }

    /// Round-robin standings (empty for single elimination)
    pub fn standings(&self) -> Vec<StandingRow> {
        match self.bracket_type {
            BracketType::RoundRobin => compute_standings(&self.matches, &self.settings),
            BracketType::SingleElimination => Vec::new(),
        }
    }

    /// Replace provisional ids with store-assigned ones.
    ///
    /// Ids missing from `mapping` are left untouched.
    pub fn remap_ids(&mut self, mapping: &HashMap<MatchId, MatchId>) {
        for m in &mut self.matches {
            if let Some(&id) = mapping.get(&m.id) {
                m.id = id;
            }
            if let Some(next) = m.next_match_id
                && let Some(&id) = mapping.get(&next)
            {
                m.next_match_id = Some(id);
            }
        }
        self.index = self
            .matches
            .iter()
            .enumerate()
            .map(|(position, m)| (m.id, position))
            .collect();
    }

    /// Record a result and propagate the winner.
    ///
    /// `winner` may only be `None` in round robin, where it records a draw.
    ///
    /// # Errors
    ///
    /// * `BracketError::MatchNotFound` - no such match in this bracket
    /// * `BracketError::InvalidState` - match already completed or not ready
    /// * `BracketError::InvalidWinner` - winner is not one of the two participants
    pub fn apply_result(
        &mut self,
        match_id: MatchId,
        winner: Option<ParticipantId>,
        score: Score,
    ) -> BracketResult<ResultOutcome> {
        let position = self.position(match_id)?;
        let target = &self.matches[position];

        match target.status {
            MatchStatus::Completed => {
                return Err(BracketError::InvalidState(format!(
                    "match {match_id} is already completed"
                )));
            }
            MatchStatus::Pending => {
                return Err(BracketError::InvalidState(format!(
                    "match {match_id} is still waiting for participants"
                )));
            }
            MatchStatus::Ready => {}
        }

        match (self.bracket_type, winner) {
            (BracketType::SingleElimination, None) => {
                return Err(BracketError::InvalidWinner {
                    match_id,
                    participant_id: None,
                });
            }
            (_, Some(participant)) if !target.has_participant(participant) => {
                return Err(BracketError::InvalidWinner {
                    match_id,
                    participant_id: Some(participant),
                });
            }
            _ => {}
        }

        let next = match target.next_match_id.zip(target.next_match_slot) {
            Some((next_id, slot)) => {
                let next_position = self.position(next_id)?;
                if self.matches[next_position].participant(slot).is_some() {
                    return Err(BracketError::InvalidState(format!(
                        "slot {slot} of match {next_id} is already filled"
                    )));
                }
                Some((next_position, slot))
            }
            None => None,
        };

        let completed = &mut self.matches[position];
        completed.status = MatchStatus::Completed;
        completed.winner = winner;
        completed.score = Some(score);
        let updated = completed.clone();

        let advanced = match (next, winner) {
            (Some((next_position, slot)), Some(winner)) => {
                let next_match = &mut self.matches[next_position];
                next_match.place(slot, winner);
                Some(next_match.clone())
            }
            _ => None,
        };

        let champion = match self.bracket_type {
            BracketType::SingleElimination if updated.next_match_id.is_none() => winner,
            BracketType::SingleElimination => None,
            BracketType::RoundRobin => self.champion(),
        };

        Ok(ResultOutcome {
            updated,
            advanced,
            champion,
        })
    }

    /// Auto-complete a match whose only occupant advances on a bye.
    fn resolve_bye(&mut self, position: usize) {
        let m = &mut self.matches[position];
        let Some(winner) = m.participant_a.or(m.participant_b) else {
            return;
        };
        m.winner = Some(winner);
        m.score = Some(Score::bye());
        m.status = MatchStatus::Completed;

        if let (Some(next_id), Some(slot)) = (m.next_match_id, m.next_match_slot)
            && let Some(&next_position) = self.index.get(&next_id)
        {
            self.matches[next_position].place(slot, winner);
        }
    }
}
