//! Error types for the ledger
//!
//! Failures come in three tiers:
//!
//! - **Not found**: the caller referenced a match, participant or achievement
//!   that does not exist. Always propagated.
//! - **Persistence**: the storage collaborator could not be read or written.
//!   Always propagated.
//! - **Best effort**: secondary bookkeeping (mirror cleanup, opponent names,
//!   achievement evaluation) went wrong. Never propagated; surfaced as a
//!   [`Warning`] next to the successful result.

use crate::types::{MatchId, ParticipantId};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Match record not found
    #[error("Match record not found: {0}")]
    MatchNotFound(MatchId),

    /// Participant not found
    #[error("Participant not found: {0}")]
    ParticipantNotFound(ParticipantId),

    /// Achievement id not present in the participant's set
    #[error("Achievement not found: {0}")]
    AchievementNotFound(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for errors caused by referencing an absent id
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::MatchNotFound(_) | Error::ParticipantNotFound(_) | Error::AchievementNotFound(_)
        )
    }

    /// True for errors raised by the persistence collaborator
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Serialization(_) | Error::Io(_)
        )
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

/// Failure of a secondary side effect that did not block the primary write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Opponent display name could not be resolved; the sentinel name was stored
    #[error("Could not resolve display name of participant {participant}: {reason}")]
    NameUnresolved {
        /// Participant whose name was looked up
        participant: ParticipantId,
        /// Why the lookup failed
        reason: String,
    },

    /// No mirrored counter-record was found for a match
    #[error("Mirror of match {match_id} not found")]
    MirrorMissing {
        /// Self-side record whose mirror was searched for
        match_id: MatchId,
    },

    /// Structural matching found several mirror candidates; the first was used
    #[error("Mirror of match {match_id} is ambiguous ({candidates} candidates)")]
    MirrorAmbiguous {
        /// Self-side record whose mirror was searched for
        match_id: MatchId,
        /// Number of structurally equal candidates
        candidates: usize,
    },

    /// Achievement evaluation failed after the ledger write
    #[error("Achievement evaluation failed for participant {participant}: {reason}")]
    AchievementEvaluation {
        /// Participant whose achievements were evaluated
        participant: ParticipantId,
        /// Underlying error text
        reason: String,
    },
}
