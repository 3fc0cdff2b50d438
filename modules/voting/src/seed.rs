//! Seed data for a fresh ballot

use ballotbox_core::{BallotError, BallotResult, Role, Voter, VoterId};
use ballotbox_state::{SharedBallotStore, SharedVoterRegistry};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::manager::BallotManager;

/// Seed voter entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedVoter {
    pub id: String,
    #[serde(default)]
    pub role: Role,
}

/// Seed option entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedOption {
    pub label: String,
    pub created_by: String,
}

/// Seed configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub voters: Vec<SeedVoter>,
    pub options: Vec<SeedOption>,
}

impl SeedConfig {
    /// Starter file written by `ballotbox-node seed`
    pub fn template() -> Self {
        Self::default()
            .add_voter("admin", Role::Admin)
            .add_voter("alice", Role::Voter)
            .add_voter("bob", Role::Voter)
            .add_option("Pizza", "admin")
            .add_option("Sushi", "admin")
    }

    pub fn add_voter(mut self, id: &str, role: Role) -> Self {
        self.voters.push(SeedVoter {
            id: id.to_string(),
            role,
        });
        self
    }

    pub fn add_option(mut self, label: &str, created_by: &str) -> Self {
        self.options.push(SeedOption {
            label: label.to_string(),
            created_by: created_by.to_string(),
        });
        self
    }

    pub fn validate(&self) -> BallotResult<()> {
        if let Some(voter) = self.voters.iter().find(|v| v.id.trim().is_empty()) {
            return Err(BallotError::ConfigError(format!(
                "seed voter with empty id (role {})",
                voter.role
            )));
        }
        if self.options.iter().any(|o| o.label.trim().is_empty()) {
            return Err(BallotError::ConfigError("seed option with empty label".into()));
        }
        Ok(())
    }

    pub fn to_json(&self) -> BallotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> BallotResult<Self> {
        serde_json::from_str(json).map_err(|e| BallotError::ConfigError(e.to_string()))
    }

    pub fn load(path: &Path) -> BallotResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            BallotError::ConfigError(format!("cannot read seed {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}

/// What a seed run changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedOutcome {
    pub voters_registered: usize,
    pub options_created: usize,
}

/// Applies a seed to the stores
pub struct SeedInitializer<'a> {
    ballots: SharedBallotStore,
    voters: SharedVoterRegistry,
    manager: &'a BallotManager,
    config: SeedConfig,
}

impl<'a> SeedInitializer<'a> {
    pub fn new(
        ballots: SharedBallotStore,
        voters: SharedVoterRegistry,
        manager: &'a BallotManager,
        config: SeedConfig,
    ) -> Self {
        Self {
            ballots,
            voters,
            manager,
            config,
        }
    }

    /// Register seed voters (existing records are kept) and create seed
    /// options when the ballot is still empty
    pub async fn initialize(&self) -> BallotResult<SeedOutcome> {
        self.config.validate()?;
        let mut outcome = SeedOutcome::default();

        for seed in &self.config.voters {
            let stored = self
                .voters
                .register(Voter::new(VoterId::new(seed.id.trim()), seed.role))
                .await?;
            if stored.role != seed.role {
                info!(
                    "Seed voter {} already registered as {}, keeping it",
                    stored.id, stored.role
                );
            }
            outcome.voters_registered += 1;
        }

        if !self.ballots.list_all().await?.is_empty() {
            info!("Ballot already has options, skipping seed options");
            return Ok(outcome);
        }

        for seed in &self.config.options {
            self.manager
                .add_option(&seed.label, &VoterId::new(seed.created_by.trim()))
                .await?;
            outcome.options_created += 1;
        }

        info!(
            "Seed applied: {} voters, {} options",
            outcome.voters_registered, outcome.options_created
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lanes::CommitLanes;
    use ballotbox_broadcast::ChangeBroadcaster;
    use ballotbox_core::BroadcastConfig;
    use ballotbox_state::{MemoryBallotStore, MemoryVoterRegistry};
    use std::sync::Arc;

    fn manager(ballots: SharedBallotStore, voters: SharedVoterRegistry) -> BallotManager {
        BallotManager::new(
            ballots,
            voters,
            Arc::new(ChangeBroadcaster::new(&BroadcastConfig::default())),
            Arc::new(CommitLanes::new()),
        )
    }

    #[test]
    fn test_seed_json() {
        let json = r#"{
            "voters": [{"id": "admin", "role": "admin"}, {"id": "alice"}],
            "options": [{"label": "Pizza", "createdBy": "admin"}]
        }"#;

        let config = SeedConfig::from_json(json).unwrap();
        assert_eq!(config.voters[1].role, Role::Voter);
        assert_eq!(config.options[0].created_by, "admin");

        let restored = SeedConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_seed_validation() {
        assert!(SeedConfig::template().validate().is_ok());
        assert!(SeedConfig::default()
            .add_option(" ", "admin")
            .validate()
            .is_err());
        assert!(SeedConfig::default()
            .add_voter("", Role::Voter)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_seed_applies_once() {
        let ballots: SharedBallotStore = Arc::new(MemoryBallotStore::new());
        let voters: SharedVoterRegistry = Arc::new(MemoryVoterRegistry::new());
        let manager = manager(ballots.clone(), voters.clone());

        let seed = SeedInitializer::new(
            ballots.clone(),
            voters.clone(),
            &manager,
            SeedConfig::template(),
        );

        let first = seed.initialize().await.unwrap();
        assert_eq!(first.voters_registered, 3);
        assert_eq!(first.options_created, 2);

        let second = seed.initialize().await.unwrap();
        assert_eq!(second.options_created, 0);

        let options = ballots.list_all().await.unwrap();
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].label, "Pizza");

        let admin = voters.get_voter(&VoterId::new("admin")).await.unwrap();
        assert!(admin.role.is_admin());
    }

    #[tokio::test]
    async fn test_seed_keeps_existing_votes() {
        let ballots: SharedBallotStore = Arc::new(MemoryBallotStore::new());
        let voters: SharedVoterRegistry = Arc::new(MemoryVoterRegistry::new());
        let manager = manager(ballots.clone(), voters.clone());

        let option = manager
            .add_option("Ramen", &VoterId::new("admin"))
            .await
            .unwrap();
        let alice = VoterId::new("alice");
        voters
            .register(Voter::new(alice.clone(), Role::Voter))
            .await
            .unwrap();
        voters.commit_vote(&alice, &option.id).await.unwrap();

        SeedInitializer::new(ballots, voters.clone(), &manager, SeedConfig::template())
            .initialize()
            .await
            .unwrap();

        let stored = voters.get_voter(&alice).await.unwrap();
        assert_eq!(stored.voted_for, Some(option.id));
    }
}
