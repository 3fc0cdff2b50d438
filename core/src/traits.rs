//! Core traits defining BALLOTBOX interfaces
//!
//! Storage implementations live in `ballotbox-state`, the broadcaster in
//! `ballotbox-broadcast`. Everything above them only sees these traits.

use crate::types::*;
use async_trait::async_trait;

/// Result type for BALLOTBOX operations
pub type BallotResult<T> = Result<T, crate::error::BallotError>;

/// Durable record of ballot options and their tallies.
///
/// Every operation is atomic at the single-record level.
#[async_trait]
pub trait BallotStore: Send + Sync {
    /// Insert a new option with tally 0
    async fn create(&self, draft: OptionDraft) -> BallotResult<BallotOption>;

    /// Fetch one option
    async fn get(&self, id: &OptionId) -> BallotResult<BallotOption>;

    /// All options in creation order
    async fn list_all(&self) -> BallotResult<Vec<BallotOption>>;

    /// Atomic add-and-fetch on the tally. Never a read-modify-write pair.
    async fn increment_tally(&self, id: &OptionId) -> BallotResult<BallotOption>;

    /// Remove an option
    async fn delete(&self, id: &OptionId) -> BallotResult<()>;
}

/// Durable record of which voter committed to which option
#[async_trait]
pub trait VoterRegistry: Send + Sync {
    /// Register a voter. Registering an existing id returns the stored record
    /// unchanged.
    async fn register(&self, voter: Voter) -> BallotResult<Voter>;

    /// Fetch one voter
    async fn get_voter(&self, id: &VoterId) -> BallotResult<Voter>;

    /// Conditional update: set `voted_for` only if it is currently empty,
    /// in one indivisible step. Otherwise fail with `AlreadyVoted` and leave
    /// the record untouched.
    async fn commit_vote(&self, voter_id: &VoterId, option_id: &OptionId) -> BallotResult<Voter>;

    /// All registered voters
    async fn list_voters(&self) -> BallotResult<Vec<Voter>>;
}

/// Publish side of the change broadcaster
pub trait ChangePublisher: Send + Sync {
    /// Hand a committed mutation to every connected observer. Returns the
    /// sequence number stamped on the event. Never blocks on observers.
    fn publish(&self, event: ChangeEvent) -> u64;
}

/// Verifies bearer credentials issued by the external identity collaborator
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, bearer: &str) -> BallotResult<Identity>;
}
