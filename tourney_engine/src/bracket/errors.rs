use super::MatchId;
use crate::tournament::models::ParticipantId;
use thiserror::Error;

/// Errors raised by pure bracket operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BracketError {
    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    #[error("Invalid match state: {0}")]
    InvalidState(String),

    #[error("Participant {participant_id:?} cannot win match {match_id}")]
    InvalidWinner {
        match_id: MatchId,
        participant_id: Option<ParticipantId>,
    },

    #[error("Not enough participants: need {needed}, have {current}")]
    InsufficientParticipants { needed: usize, current: usize },
}

pub type BracketResult<T> = Result<T, BracketError>;
