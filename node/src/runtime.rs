//! Node runtime wiring the stores, the broadcaster and the voting services

use ballotbox_broadcast::{create_broadcaster, SharedBroadcaster, Subscription};
use ballotbox_core::{
    BallotError, BallotOption, BallotResult, Identity, IdentityProvider, NodeConfig, OptionId,
    Voter,
};
use ballotbox_state::Stores;
use ballotbox_voting::{
    AuditReport, BallotManager, CommitLanes, OptionView, SeedConfig, SeedInitializer,
    SeedOutcome, SharedCommitLanes, TallyAuditor, VoteCoordinator, VoteReceipt,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use crate::auth::JwtIdentityProvider;

/// Node status snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    pub name: String,
    pub version: String,
    pub uptime_secs: u64,
    pub options: usize,
    pub voters: usize,
    pub observers: usize,
    pub last_sequence: u64,
}

/// Node runtime managing all components
pub struct NodeRuntime {
    config: NodeConfig,
    stores: Stores,
    broadcaster: SharedBroadcaster,
    coordinator: VoteCoordinator,
    manager: BallotManager,
    auditor: TallyAuditor,
    identity: Arc<dyn IdentityProvider>,
    started_at: Instant,
}

impl NodeRuntime {
    /// Open the configured stores and build the runtime on them
    pub fn new(config: NodeConfig) -> BallotResult<Self> {
        let stores = Stores::open(&config)?;
        let identity = Arc::new(JwtIdentityProvider::new(&config.auth));
        Ok(Self::with_parts(config, stores, identity))
    }

    /// Build the runtime on existing stores and identity provider
    pub fn with_parts(
        config: NodeConfig,
        stores: Stores,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let broadcaster = create_broadcaster(&config.broadcast);
        let lanes: SharedCommitLanes = Arc::new(CommitLanes::new());

        let coordinator = VoteCoordinator::new(
            stores.ballots.clone(),
            stores.voters.clone(),
            broadcaster.clone(),
            lanes.clone(),
        );
        let manager = BallotManager::new(
            stores.ballots.clone(),
            stores.voters.clone(),
            broadcaster.clone(),
            lanes,
        );
        let auditor = TallyAuditor::new(stores.ballots.clone(), stores.voters.clone());

        Self {
            config,
            stores,
            broadcaster,
            coordinator,
            manager,
            auditor,
            identity,
            started_at: Instant::now(),
        }
    }

    /// Register seed voters and, on an empty ballot, seed options
    pub async fn apply_seed(&self, seed: SeedConfig) -> BallotResult<SeedOutcome> {
        SeedInitializer::new(
            self.stores.ballots.clone(),
            self.stores.voters.clone(),
            &self.manager,
            seed,
        )
        .initialize()
        .await
    }

    /// Verify a bearer token
    pub fn identify(&self, bearer: &str) -> BallotResult<Identity> {
        self.identity.identify(bearer)
    }

    /// Voter record for a verified identity, registering it on first sight
    pub async fn resolve_voter(&self, identity: &Identity) -> BallotResult<Voter> {
        match self.stores.voters.get_voter(&identity.voter_id).await {
            Ok(voter) => Ok(voter),
            Err(BallotError::VoterNotFound(_)) => {
                let voter = self
                    .stores
                    .voters
                    .register(Voter::new(identity.voter_id.clone(), identity.role))
                    .await?;
                info!("Registered voter {} as {}", voter.id, voter.role);
                Ok(voter)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn cast_vote(&self, voter: &Voter, option: &OptionId) -> BallotResult<VoteReceipt> {
        self.coordinator.cast_vote(&voter.id, option).await
    }

    pub async fn add_option(&self, label: &str, creator: &Identity) -> BallotResult<BallotOption> {
        self.manager.add_option(label, &creator.voter_id).await
    }

    pub async fn remove_option(&self, id: &OptionId) -> BallotResult<()> {
        self.manager.remove_option(id).await
    }

    pub async fn list_options(&self) -> BallotResult<Vec<OptionView>> {
        self.manager.list_with_creators().await
    }

    pub async fn audit(&self) -> BallotResult<AuditReport> {
        self.auditor.audit().await
    }

    /// Open an observer session on the change stream
    pub fn subscribe(&self, remote: Option<String>) -> BallotResult<Subscription> {
        self.broadcaster.subscribe(remote)
    }

    pub async fn status(&self) -> BallotResult<NodeStatus> {
        Ok(NodeStatus {
            name: self.config.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            options: self.stores.ballots.list_all().await?.len(),
            voters: self.stores.voters.list_voters().await?.len(),
            observers: self.broadcaster.observer_count(),
            last_sequence: self.broadcaster.last_sequence(),
        })
    }

    /// Get config reference
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }
}
