//! In-memory stores for tests and single-process deployments

use async_trait::async_trait;
use ballotbox_core::{
    BallotError, BallotOption, BallotResult, BallotStore, OptionDraft, OptionId, Voter,
    VoterId, VoterRegistry,
};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::sort_by_creation;

/// In-memory ballot store.
///
/// Each record sits behind its DashMap shard lock, so an increment is a
/// single locked add-and-fetch.
pub struct MemoryBallotStore {
    options: DashMap<OptionId, BallotOption>,
    next_sequence: AtomicU64,
}

impl MemoryBallotStore {
    pub fn new() -> Self {
        Self {
            options: DashMap::new(),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

impl Default for MemoryBallotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BallotStore for MemoryBallotStore {
    async fn create(&self, draft: OptionDraft) -> BallotResult<BallotOption> {
        match self.options.entry(draft.id) {
            Entry::Occupied(_) => Err(BallotError::InvalidInput(format!(
                "option id {} already exists",
                draft.id
            ))),
            Entry::Vacant(slot) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                let option = BallotOption::from_draft(draft, sequence);
                slot.insert(option.clone());
                Ok(option)
            }
        }
    }

    async fn get(&self, id: &OptionId) -> BallotResult<BallotOption> {
        self.options
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(BallotError::OptionNotFound(*id))
    }

    async fn list_all(&self) -> BallotResult<Vec<BallotOption>> {
        let mut options: Vec<BallotOption> = self
            .options
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        sort_by_creation(&mut options);
        Ok(options)
    }

    async fn increment_tally(&self, id: &OptionId) -> BallotResult<BallotOption> {
        let mut entry = self
            .options
            .get_mut(id)
            .ok_or(BallotError::OptionNotFound(*id))?;
        entry.tally += 1;
        Ok(entry.value().clone())
    }

    async fn delete(&self, id: &OptionId) -> BallotResult<()> {
        self.options
            .remove(id)
            .map(|_| ())
            .ok_or(BallotError::OptionNotFound(*id))
    }
}

/// In-memory voter registry
pub struct MemoryVoterRegistry {
    voters: DashMap<VoterId, Voter>,
}

impl MemoryVoterRegistry {
    pub fn new() -> Self {
        Self {
            voters: DashMap::new(),
        }
    }

    pub fn with_voters(voters: Vec<Voter>) -> Self {
        let registry = Self::new();
        for voter in voters {
            registry.voters.insert(voter.id.clone(), voter);
        }
        registry
    }
}

impl Default for MemoryVoterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoterRegistry for MemoryVoterRegistry {
    async fn register(&self, voter: Voter) -> BallotResult<Voter> {
        let stored = self
            .voters
            .entry(voter.id.clone())
            .or_insert(voter)
            .value()
            .clone();
        Ok(stored)
    }

    async fn get_voter(&self, id: &VoterId) -> BallotResult<Voter> {
        self.voters
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BallotError::VoterNotFound(id.clone()))
    }

    async fn commit_vote(&self, voter_id: &VoterId, option_id: &OptionId) -> BallotResult<Voter> {
        // The write guard makes check-and-set one step.
        let mut entry = self
            .voters
            .get_mut(voter_id)
            .ok_or_else(|| BallotError::VoterNotFound(voter_id.clone()))?;

        if let Some(voted_for) = entry.voted_for {
            return Err(BallotError::AlreadyVoted {
                voter: voter_id.clone(),
                voted_for,
            });
        }

        entry.voted_for = Some(*option_id);
        Ok(entry.value().clone())
    }

    async fn list_voters(&self) -> BallotResult<Vec<Voter>> {
        let mut voters: Vec<Voter> = self
            .voters
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        voters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(voters)
    }
}
