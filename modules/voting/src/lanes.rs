//! Per-option commit lanes
//!
//! A lane serializes "mutate option, publish event" for one option so its
//! events leave in the order the store applied them. Lanes of different
//! options never contend.

use ballotbox_core::OptionId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held while an option is mutated and its event published
pub type LaneGuard = OwnedMutexGuard<()>;

#[derive(Default)]
pub struct CommitLanes {
    lanes: DashMap<OptionId, Arc<Mutex<()>>>,
}

impl CommitLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of the option's lane
    pub async fn acquire(&self, id: &OptionId) -> LaneGuard {
        // Clone the Arc out first; the map guard must not live across await.
        let lane = self.lanes.entry(*id).or_default().clone();
        lane.lock_owned().await
    }

    /// Forget the lane of a deleted option
    pub fn retire(&self, id: &OptionId) {
        self.lanes.remove(id);
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

/// Shared lanes
pub type SharedCommitLanes = Arc<CommitLanes>;
