//! Error types for BALLOTBOX

use crate::types::{OptionId, VoterId};
use thiserror::Error;

/// Main error type for BALLOTBOX
#[derive(Error, Debug)]
pub enum BallotError {
    // ============ Request Errors ============
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Ballot option not found: {0}")]
    OptionNotFound(OptionId),

    #[error("Voter not found: {0}")]
    VoterNotFound(VoterId),

    #[error("Voter {voter} has already voted for {voted_for}")]
    AlreadyVoted { voter: VoterId, voted_for: OptionId },

    // ============ Commit Errors ============
    #[error("Vote by {voter} for {option} recorded but tally not incremented: {reason}")]
    PartialCommitFailure {
        voter: VoterId,
        option: OptionId,
        reason: String,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Serialization failed: {0}")]
    SerializationError(String),

    // ============ Access Errors ============
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Too many observers: limit is {0}")]
    TooManyObservers(usize),

    // ============ Configuration Errors ============
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============ General Errors ============
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BallotError {
    /// Stable machine-readable code for the error kind
    pub fn code(&self) -> &'static str {
        match self {
            BallotError::InvalidInput(_) => "INVALID_INPUT",
            BallotError::OptionNotFound(_) | BallotError::VoterNotFound(_) => "NOT_FOUND",
            BallotError::AlreadyVoted { .. } => "ALREADY_VOTED",
            BallotError::PartialCommitFailure { .. } => "PARTIAL_COMMIT_FAILURE",
            BallotError::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            BallotError::SerializationError(_) => "SERIALIZATION_ERROR",
            BallotError::Unauthorized(_) => "UNAUTHORIZED",
            BallotError::Forbidden(_) => "FORBIDDEN",
            BallotError::TooManyObservers(_) => "TOO_MANY_OBSERVERS",
            BallotError::ConfigError(_) => "CONFIG_ERROR",
            BallotError::Internal(_) | BallotError::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the whole vote operation may be retried as-is
    pub fn is_retryable(&self) -> bool {
        matches!(self, BallotError::StorageUnavailable(_))
    }

    /// Errors whose detail must not reach end users
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            BallotError::PartialCommitFailure { .. }
                | BallotError::StorageUnavailable(_)
                | BallotError::SerializationError(_)
                | BallotError::ConfigError(_)
                | BallotError::Internal(_)
                | BallotError::Other(_)
        )
    }
}

impl From<std::io::Error> for BallotError {
    fn from(err: std::io::Error) -> Self {
        BallotError::StorageUnavailable(err.to_string())
    }
}

impl From<bincode::Error> for BallotError {
    fn from(err: bincode::Error) -> Self {
        BallotError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for BallotError {
    fn from(err: serde_json::Error) -> Self {
        BallotError::SerializationError(err.to_string())
    }
}
