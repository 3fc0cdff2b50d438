//! Vote transaction coordinator

use ballotbox_core::{
    BallotError, BallotOption, BallotResult, ChangeEvent, ChangePublisher, OptionId, Voter,
    VoterId,
};
use ballotbox_state::{SharedBallotStore, SharedVoterRegistry};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::lanes::SharedCommitLanes;

/// Result of a fully committed vote
#[derive(Debug, Clone, Serialize)]
pub struct VoteReceipt {
    #[serde(rename = "vote")]
    pub option: BallotOption,
    #[serde(rename = "user")]
    pub voter: Voter,
    #[serde(skip)]
    pub sequence: u64,
}

/// Checks and commits votes across the voter registry and the ballot store.
///
/// The two stores share no transaction. The registry write goes first and is
/// the uniqueness guard: if it fails the tally is never touched. If it
/// succeeds and the tally increment then fails, the caller gets
/// `PartialCommitFailure` and the mismatch is left for the tally audit.
pub struct VoteCoordinator {
    ballots: SharedBallotStore,
    voters: SharedVoterRegistry,
    publisher: Arc<dyn ChangePublisher>,
    lanes: SharedCommitLanes,
}

impl VoteCoordinator {
    pub fn new(
        ballots: SharedBallotStore,
        voters: SharedVoterRegistry,
        publisher: Arc<dyn ChangePublisher>,
        lanes: SharedCommitLanes,
    ) -> Self {
        Self {
            ballots,
            voters,
            publisher,
            lanes,
        }
    }

    /// Cast `voter_id`'s single vote for `option_id`
    pub async fn cast_vote(
        &self,
        voter_id: &VoterId,
        option_id: &OptionId,
    ) -> BallotResult<VoteReceipt> {
        let voter = self.voters.get_voter(voter_id).await?;
        if let Some(voted_for) = voter.voted_for {
            info!("Voter {} already voted for {}", voter_id, voted_for);
            return Err(BallotError::AlreadyVoted {
                voter: voter_id.clone(),
                voted_for,
            });
        }

        // Held from the existence check to the publish, so an admin delete
        // lands either before the vote or after it.
        let _lane = self.lanes.acquire(option_id).await;
        self.ballots.get(option_id).await?;

        let voter = match self.voters.commit_vote(voter_id, option_id).await {
            Ok(voter) => voter,
            Err(BallotError::AlreadyVoted { voter, voted_for }) => {
                info!("Voter {} lost a concurrent vote race to {}", voter, voted_for);
                return Err(BallotError::AlreadyVoted { voter, voted_for });
            }
            Err(e) => return Err(e),
        };

        let option = match self.ballots.increment_tally(option_id).await {
            Ok(option) => option,
            Err(e) => {
                error!(
                    voter = %voter_id,
                    option = %option_id,
                    "Vote recorded without tally increment, reconciliation required: {}",
                    e
                );
                return Err(BallotError::PartialCommitFailure {
                    voter: voter_id.clone(),
                    option: *option_id,
                    reason: e.to_string(),
                });
            }
        };

        let sequence = self
            .publisher
            .publish(ChangeEvent::OptionUpdated(option.clone()));

        debug!(
            "Vote committed: {} -> {} tally={} event=#{}",
            voter_id, option_id, option.tally, sequence
        );

        Ok(VoteReceipt {
            option,
            voter,
            sequence,
        })
    }
}
