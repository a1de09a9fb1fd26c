//! Tournament data models: lifecycle status, formats, and registrations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tournament ID type
pub type TournamentId = i64;

/// Participant (registration) ID type
pub type ParticipantId = i64;

/// User ID type
pub type UserId = i64;

/// Tournament lifecycle status
///
/// Statuses advance monotonically `Soon → Registration → Active → Completed`.
/// `Canceled` can be reached from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TournamentStatus {
    /// Announced, registration not yet open
    Soon,
    /// Accepting registrations
    Registration,
    /// Bracket generated, matches being played
    Active,
    /// Finished, with or without a champion
    Completed,
    /// Canceled by the organizer
    Canceled,
}

impl TournamentStatus {
    /// Position in the forward lifecycle sequence
    pub(crate) fn ordinal(self) -> u8 {
        match self {
            TournamentStatus::Soon => 0,
            TournamentStatus::Registration => 1,
            TournamentStatus::Active => 2,
            TournamentStatus::Completed => 3,
            TournamentStatus::Canceled => 4,
        }
    }

    /// Completed and Canceled tournaments are archived and never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TournamentStatus::Completed | TournamentStatus::Canceled)
    }

    /// Whether moving from `self` to `next` respects the lifecycle ordering.
    pub fn can_transition_to(self, next: TournamentStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            TournamentStatus::Canceled => true,
            _ => next.ordinal() == self.ordinal() + 1,
        }
    }

    /// Database representation
    pub fn as_str(self) -> &'static str {
        match self {
            TournamentStatus::Soon => "soon",
            TournamentStatus::Registration => "registration",
            TournamentStatus::Active => "active",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for TournamentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TournamentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "soon" => Ok(TournamentStatus::Soon),
            "registration" => Ok(TournamentStatus::Registration),
            "active" => Ok(TournamentStatus::Active),
            "completed" => Ok(TournamentStatus::Completed),
            "canceled" => Ok(TournamentStatus::Canceled),
            other => Err(format!("unknown tournament status: {other}")),
        }
    }
}

/// Bracket type of a format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BracketType {
    SingleElimination,
    RoundRobin,
}

impl BracketType {
    pub fn as_str(self) -> &'static str {
        match self {
            BracketType::SingleElimination => "single_elimination",
            BracketType::RoundRobin => "round_robin",
        }
    }
}

impl FromStr for BracketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single_elimination" => Ok(BracketType::SingleElimination),
            "round_robin" => Ok(BracketType::RoundRobin),
            other => Err(format!("unknown bracket type: {other}")),
        }
    }
}

/// Who registers for a tournament
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantType {
    Solo,
    Team,
}

impl ParticipantType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantType::Solo => "solo",
            ParticipantType::Team => "team",
        }
    }
}

impl FromStr for ParticipantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "solo" => Ok(ParticipantType::Solo),
            "team" => Ok(ParticipantType::Team),
            other => Err(format!("unknown participant type: {other}")),
        }
    }
}

/// Format settings stored as JSON on the format row
///
/// Missing keys fall back to the defaults: 3 points for a win, 1 for a draw,
/// 0 for a loss, a single leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatSettings {
    /// Points awarded for a round-robin win
    pub win_points: u32,
    /// Points awarded for a round-robin draw
    pub draw_points: u32,
    /// Points awarded for a round-robin loss
    pub loss_points: u32,
    /// Number of round-robin cycles (2 = home and return fixtures)
    pub legs: u32,
}

impl Default for FormatSettings {
    fn default() -> Self {
        Self {
            win_points: 3,
            draw_points: 1,
            loss_points: 0,
            legs: 1,
        }
    }
}

impl FormatSettings {
    /// Return-fixture configuration (two legs, default scoring)
    pub fn double_round_robin() -> Self {
        Self {
            legs: 2,
            ..Self::default()
        }
    }
}

/// Tournament format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Format {
    /// Format ID
    pub id: i64,
    /// Bracket type
    pub bracket_type: BracketType,
    /// Solo or team registrations
    pub participant_type: ParticipantType,
    /// Scoring and leg settings
    pub settings: FormatSettings,
}

impl Format {
    /// Single-elimination format for solo participants
    pub fn single_elimination(id: i64) -> Self {
        Self {
            id,
            bracket_type: BracketType::SingleElimination,
            participant_type: ParticipantType::Solo,
            settings: FormatSettings::default(),
        }
    }

    /// Round-robin format for solo participants
    pub fn round_robin(id: i64, settings: FormatSettings) -> Self {
        Self {
            id,
            bracket_type: BracketType::RoundRobin,
            participant_type: ParticipantType::Solo,
            settings,
        }
    }
}

/// Tournament record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    /// Tournament ID
    pub id: TournamentId,
    /// Display name
    pub name: String,
    /// Organizer user ID
    pub organizer_id: UserId,
    /// Lifecycle status
    pub status: TournamentStatus,
    /// Format (bracket type, participant type, settings)
    pub format: Format,
    /// Registration opens
    pub registration_start: DateTime<Utc>,
    /// Registration closes
    pub registration_end: DateTime<Utc>,
    /// Play starts
    pub start_date: DateTime<Utc>,
    /// Play must be over by this time
    pub end_date: DateTime<Utc>,
    /// Maximum confirmed participants
    pub capacity: u32,
    /// Champion, recorded on organizer-triggered finalization
    pub champion_id: Option<ParticipantId>,
}

/// Registration status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    ApplicationSubmitted,
    Participant,
    ApplicationRejected,
    Withdrawn,
}

impl ParticipantStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ParticipantStatus::ApplicationSubmitted => "application_submitted",
            ParticipantStatus::Participant => "participant",
            ParticipantStatus::ApplicationRejected => "application_rejected",
            ParticipantStatus::Withdrawn => "withdrawn",
        }
    }

    /// Only confirmed entries are placed into a bracket.
    pub fn is_confirmed(self) -> bool {
        self == ParticipantStatus::Participant
    }
}

impl FromStr for ParticipantStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application_submitted" => Ok(ParticipantStatus::ApplicationSubmitted),
            "participant" => Ok(ParticipantStatus::Participant),
            "application_rejected" => Ok(ParticipantStatus::ApplicationRejected),
            "withdrawn" => Ok(ParticipantStatus::Withdrawn),
            other => Err(format!("unknown participant status: {other}")),
        }
    }
}

/// What a registration refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Entrant {
    User(UserId),
    Team(i64),
}

/// Tournament registration entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    /// Registration ID, used as the participant ID inside brackets
    pub id: ParticipantId,
    /// Tournament ID
    pub tournament_id: TournamentId,
    /// User or team behind this registration
    pub entrant: Entrant,
    /// Registration status
    pub status: ParticipantStatus,
    /// Registration timestamp
    pub registered_at: DateTime<Utc>,
}
