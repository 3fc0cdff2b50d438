//! Full node implementation

use crate::api::start_api_server;
use crate::runtime::NodeRuntime;
use ballotbox_core::{NodeConfig, StorageBackend};
use ballotbox_voting::SeedConfig;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Full BALLOTBOX node
pub struct BallotNode {
    runtime: Arc<NodeRuntime>,
    seed: Option<SeedConfig>,
}

impl BallotNode {
    /// Create a new node
    pub fn new(config: NodeConfig, seed: Option<SeedConfig>) -> anyhow::Result<Self> {
        config.validate()?;
        if config.auth.uses_dev_secret() {
            warn!("Using the development JWT secret; set auth.jwt_secret or BALLOTBOX_JWT_SECRET");
        }

        let runtime = Arc::new(NodeRuntime::new(config)?);
        Ok(Self { runtime, seed })
    }

    /// Start the node
    pub async fn start(&self) -> anyhow::Result<()> {
        info!("Starting BALLOTBOX node '{}'...", self.runtime.config().name);

        if let Some(seed) = &self.seed {
            let outcome = self.runtime.apply_seed(seed.clone()).await?;
            info!(
                "Seed: {} voters registered, {} options created",
                outcome.voters_registered, outcome.options_created
            );
        }

        // Start API server
        let api_runtime = self.runtime.clone();
        let api_addr = self.runtime.config().api.listen_addr.clone();

        let api_handle = tokio::spawn(async move {
            if let Err(e) = start_api_server(api_runtime, &api_addr).await {
                error!("API server error: {}", e);
            }
        });

        let status = self.runtime.status().await?;
        info!("Node started successfully");
        info!(
            "Ballot has {} options and {} registered voters",
            status.options, status.voters
        );

        // Wait for shutdown signal
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received, stopping node...");
            }
            Err(e) => {
                error!("Error waiting for shutdown signal: {}", e);
            }
        }

        api_handle.abort();

        info!("Node stopped");

        Ok(())
    }

    /// Get runtime reference
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }
}

/// Node builder for easier configuration
pub struct NodeBuilder {
    config: NodeConfig,
    seed: Option<SeedConfig>,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self {
            config: NodeConfig::default(),
            seed: None,
        }
    }

    pub fn config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(mut self, seed: SeedConfig) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn api_addr(mut self, addr: &str) -> Self {
        self.config.api.listen_addr = addr.to_string();
        self
    }

    pub fn data_dir(mut self, dir: PathBuf) -> Self {
        self.config.data_dir = dir;
        self
    }

    /// Keep everything in memory; nothing survives a restart
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    pub fn build(mut self) -> anyhow::Result<BallotNode> {
        self.config.apply_env();
        BallotNode::new(self.config, self.seed)
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
