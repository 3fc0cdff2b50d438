//! Shared store plumbing: handles, constructors and ordering helpers

use ballotbox_core::{
    BallotOption, BallotResult, BallotStore, NodeConfig, StorageBackend, VoterRegistry,
};
use std::sync::Arc;
use tracing::info;

use crate::memory::{MemoryBallotStore, MemoryVoterRegistry};
use crate::persistent::{open_database, SledBallotStore, SledVoterRegistry};

/// Shared ballot store handle
pub type SharedBallotStore = Arc<dyn BallotStore>;

/// Shared voter registry handle
pub type SharedVoterRegistry = Arc<dyn VoterRegistry>;

/// The pair of stores a node runs on
#[derive(Clone)]
pub struct Stores {
    pub ballots: SharedBallotStore,
    pub voters: SharedVoterRegistry,
}

impl Stores {
    pub fn new(ballots: SharedBallotStore, voters: SharedVoterRegistry) -> Self {
        Self { ballots, voters }
    }

    /// Fresh in-memory stores
    pub fn memory() -> Self {
        Self {
            ballots: Arc::new(MemoryBallotStore::new()),
            voters: Arc::new(MemoryVoterRegistry::new()),
        }
    }

    /// Open the stores selected by the node configuration
    pub fn open(config: &NodeConfig) -> BallotResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("Using in-memory ballot storage");
                Ok(Self::memory())
            }
            StorageBackend::Sled => {
                let path = config.storage_path();
                let db = open_database(&path)?;
                info!("Opened ballot database at {}", path.display());

                let sync = config.storage.sync_writes;
                Ok(Self {
                    ballots: Arc::new(SledBallotStore::open(&db, sync)?),
                    voters: Arc::new(SledVoterRegistry::open(&db, sync)?),
                })
            }
        }
    }
}

/// Sort options into creation order
pub fn sort_by_creation(options: &mut [BallotOption]) {
    options.sort_by_key(|option| option.sequence);
}
