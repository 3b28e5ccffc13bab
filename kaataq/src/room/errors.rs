//! Room operation errors.

use super::models::{PlayerId, RoomCode, RoundPhase};
use crate::store::StoreError;
use thiserror::Error;

/// Result type for room operations
pub type RoomResult<T> = Result<T, RoomError>;

/// Room errors
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found: {0}")]
    RoomNotFound(RoomCode),

    #[error("Player not in room: {0}")]
    PlayerNotFound(PlayerId),

    #[error("Only the host can do that")]
    NotHost,

    #[error("Only the current holder can hide the stick")]
    NotHolder,

    #[error("The holder cannot vote")]
    HolderCannotVote,

    #[error("Player is not a bot: {0}")]
    NotABot(PlayerId),

    #[error("Bots cannot do that")]
    BotNotAllowed,

    #[error("Room is full ({max} players)")]
    RoomFull { max: usize },

    #[error("Need at least {min} players to start")]
    NotEnoughPlayers { min: usize },

    #[error("At most {max} players can play")]
    TooManyPlayers { max: usize },

    #[error("Game already in progress")]
    GameAlreadyInProgress,

    #[error("Game has not started")]
    GameNotStarted,

    #[error("Expected phase {expected}, room is in {actual}")]
    InvalidPhase {
        expected: RoundPhase,
        actual: RoundPhase,
    },

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: RoundPhase, to: RoundPhase },

    /// The room already moved past the step this request was aimed at
    #[error("Room already moved past this step")]
    Superseded,

    #[error("Stick already hidden this round")]
    AlreadyChosen,

    #[error("Already voted this round")]
    AlreadyVoted,

    #[error("Still waiting for votes")]
    VotingStillOpen,

    #[error("Cannot remove yourself, leave the room instead")]
    CannotRemoveSelf,

    #[error("Name cannot be blank")]
    InvalidName,

    #[error("No free room code after {attempts} attempts")]
    CodeSpaceExhausted { attempts: usize },

    /// Guarded writes kept losing to concurrent writers
    #[error("Room is busy, try again")]
    Contended,

    #[error("Room document is inconsistent: {0}")]
    Inconsistent(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed room document: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl RoomError {
    /// Illegal action for the current phase or role; nothing was written
    pub fn is_validation(&self) -> bool {
        !matches!(
            self,
            RoomError::Store(_)
                | RoomError::Malformed(_)
                | RoomError::Inconsistent(_)
                | RoomError::Contended
        )
    }
}

/// Result of a guarded write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The write landed
    Applied,
    /// Another client got there first, or the precondition no longer holds
    Stale,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        self == WriteOutcome::Applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(RoomError::NotHost.is_validation());
        assert!(RoomError::RoomFull { max: 8 }.is_validation());
        assert!(!RoomError::Store(StoreError::Disconnected).is_validation());
        assert!(!RoomError::Inconsistent("no holder".into()).is_validation());
    }

    #[test]
    fn test_error_messages() {
        let err = RoomError::InvalidPhase {
            expected: RoundPhase::Voting,
            actual: RoundPhase::Results,
        };
        assert_eq!(err.to_string(), "Expected phase voting, room is in results");
        assert_eq!(
            RoomError::NotEnoughPlayers { min: 2 }.to_string(),
            "Need at least 2 players to start"
        );
    }
}
