//! Serializable bracket snapshot pushed to viewers.

use super::{Bracket, Match, MatchStatus, StandingRow};
use crate::tournament::models::{BracketType, ParticipantId, Tournament, TournamentId, TournamentStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundView {
    pub round: u32,
    pub matches: Vec<Match>,
}

/// Orders committed states of one tournament.
///
/// Every committed change either moves the status forward or completes at
/// least one more match, and neither ever goes back, so the pair
/// (status position, completed matches) strictly increases per commit.
pub fn revision(status: TournamentStatus, completed_matches: usize) -> u64 {
    (u64::from(status.ordinal()) << 32) | (completed_matches as u64 & u64::from(u32::MAX))
}

/// Full bracket state of a tournament at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BracketView {
    pub tournament_id: TournamentId,
    /// Increases with every committed change to the tournament
    pub revision: u64,
    pub name: String,
    pub status: TournamentStatus,
    pub bracket_type: BracketType,
    pub champion_id: Option<ParticipantId>,
    pub rounds: Vec<RoundView>,
    /// Present for round robin only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standings: Option<Vec<StandingRow>>,
}

impl BracketView {
    /// View of a tournament that has no bracket yet
    pub fn empty(tournament: &Tournament) -> Self {
        Self {
            tournament_id: tournament.id,
            revision: revision(tournament.status, 0),
            name: tournament.name.clone(),
            status: tournament.status,
            bracket_type: tournament.format.bracket_type,
            champion_id: tournament.champion_id,
            rounds: Vec::new(),
            standings: None,
        }
    }

    pub fn new(tournament: &Tournament, bracket: &Bracket) -> Self {
        let rounds = bracket
            .rounds()
            .into_iter()
            .map(|(round, matches)| RoundView {
                round,
                matches: matches.into_iter().cloned().collect(),
            })
            .collect();

        let standings = match bracket.bracket_type() {
            BracketType::RoundRobin if !bracket.is_empty() => Some(bracket.standings()),
            _ => None,
        };

        let completed = bracket
            .matches()
            .iter()
            .filter(|m| m.status == MatchStatus::Completed)
            .count();

        Self {
            revision: revision(tournament.status, completed),
            rounds,
            standings,
            ..Self::empty(tournament)
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
