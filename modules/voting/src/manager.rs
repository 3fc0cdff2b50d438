//! Ballot administration

use ballotbox_core::{
    BallotError, BallotOption, BallotResult, ChangeEvent, ChangePublisher, OptionDraft, OptionId,
    Role, VoterId,
};
use ballotbox_state::{SharedBallotStore, SharedVoterRegistry};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::lanes::SharedCommitLanes;

/// Public view of an option's creator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatorSummary {
    pub id: VoterId,
    pub role: Role,
}

/// Option joined with its creator, as listed to clients
#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    #[serde(flatten)]
    pub option: BallotOption,
    /// None when the creator is no longer registered
    pub creator: Option<CreatorSummary>,
}

/// Creates and removes ballot options. Callers check the admin role.
pub struct BallotManager {
    ballots: SharedBallotStore,
    voters: SharedVoterRegistry,
    publisher: Arc<dyn ChangePublisher>,
    lanes: SharedCommitLanes,
}

impl BallotManager {
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

    /// Add an option with tally 0 and announce it
    pub async fn add_option(&self, label: &str, creator: &VoterId) -> BallotResult<BallotOption> {
        let label = label.trim();
        if label.is_empty() {
            return Err(BallotError::InvalidInput("option label is empty".into()));
        }

        let draft = OptionDraft::new(label, creator.clone());
        let _lane = self.lanes.acquire(&draft.id).await;

        let option = self.ballots.create(draft).await?;
        let sequence = self
            .publisher
            .publish(ChangeEvent::OptionCreated(option.clone()));

        info!(
            "Option '{}' ({}) added by {} event=#{}",
            option.label, option.id, creator, sequence
        );
        Ok(option)
    }

    /// Remove an option and announce it. Votes already cast for it stay on
    /// their voters.
    pub async fn remove_option(&self, id: &OptionId) -> BallotResult<()> {
        let lane = self.lanes.acquire(id).await;

        self.ballots.delete(id).await?;
        let sequence = self.publisher.publish(ChangeEvent::OptionDeleted(*id));

        drop(lane);
        self.lanes.retire(id);

        info!("Option {} removed event=#{}", id, sequence);
        Ok(())
    }

    /// All options in creation order
    pub async fn list_options(&self) -> BallotResult<Vec<BallotOption>> {
        self.ballots.list_all().await
    }

    /// All options in creation order, each with its creator
    pub async fn list_with_creators(&self) -> BallotResult<Vec<OptionView>> {
        let options = self.ballots.list_all().await?;
        let creators: HashMap<VoterId, Role> = self
            .voters
            .list_voters()
            .await?
            .into_iter()
            .map(|voter| (voter.id, voter.role))
            .collect();

        debug!(
            "Listing {} options against {} voters",
            options.len(),
            creators.len()
        );

        Ok(options
            .into_iter()
            .map(|option| {
                let creator = creators.get(&option.created_by).map(|role| CreatorSummary {
                    id: option.created_by.clone(),
                    role: *role,
                });
                OptionView { option, creator }
            })
            .collect())
    }
}
