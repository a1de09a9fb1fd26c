//! Engine error types.

use crate::bracket::{BracketError, MatchId};
use crate::db::StoreError;
use crate::tournament::models::{ParticipantId, TournamentId, UserId};
use thiserror::Error;

/// Errors surfaced by tournament operations
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Tournament {0} not found")]
    TournamentNotFound(TournamentId),

    #[error("Match {0} not found")]
    MatchNotFound(MatchId),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Participant {participant_id:?} cannot win match {match_id}")]
    InvalidWinner {
        match_id: MatchId,
        participant_id: Option<ParticipantId>,
    },

    #[error("User {user_id} is not the organizer of tournament {tournament_id}")]
    Forbidden {
        tournament_id: TournamentId,
        user_id: UserId,
    },

    #[error("Insufficient participants: need {needed}, have {current}")]
    InsufficientParticipants { needed: usize, current: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<BracketError> for EngineError {
    fn from(err: BracketError) -> Self {
        match err {
            BracketError::MatchNotFound(id) => EngineError::MatchNotFound(id),
            BracketError::InvalidState(reason) => EngineError::InvalidState(reason),
            BracketError::InvalidWinner {
                match_id,
                participant_id,
            } => EngineError::InvalidWinner {
                match_id,
                participant_id,
            },
            BracketError::InsufficientParticipants { needed, current } => {
                EngineError::InsufficientParticipants { needed, current }
            }
        }
    }
}

impl EngineError {
    /// Get a client-safe error message that doesn't leak internals
    ///
    /// Store and serialization failures are collapsed to a generic message;
    /// user ids are not echoed back.
    pub fn client_message(&self) -> String {
        match self {
            EngineError::Store(_) | EngineError::Serialization(_) => {
                "Internal server error".to_string()
            }
            EngineError::Forbidden { .. } => {
                "Only the organizer can do that".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Whether this is a caller mistake rather than an infrastructure fault
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EngineError::Store(_) | EngineError::Serialization(_))
    }
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bracket_errors_map_one_to_one() {
        let err: EngineError = BracketError::MatchNotFound(4).into();
        assert!(matches!(err, EngineError::MatchNotFound(4)));

        let err: EngineError = BracketError::InsufficientParticipants {
            needed: 2,
            current: 1,
        }
        .into();
        assert!(matches!(
            err,
            EngineError::InsufficientParticipants {
                needed: 2,
                current: 1
            }
        ));
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = EngineError::Store(StoreError::Corrupt("bad status 'x' in row 12".to_string()));
        assert_eq!(err.client_message(), "Internal server error");
        assert!(!err.is_client_error());

        let err = EngineError::Forbidden {
            tournament_id: 1,
            user_id: 42,
        };
        assert!(!err.client_message().contains("42"));
        assert!(err.is_client_error());

        let err = EngineError::InvalidState("match 3 is already completed".to_string());
        assert!(err.client_message().contains("already completed"));
    }
}
