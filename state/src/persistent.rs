//! Persistent stores backed by sled database

use async_trait::async_trait;
use ballotbox_core::{
    BallotError, BallotOption, BallotResult, BallotStore, OptionDraft, OptionId, Voter,
    VoterId, VoterRegistry,
};
use sled::{Db, Tree};
use std::path::Path;
use tracing::debug;

use crate::store::sort_by_creation;

const OPTIONS_TREE: &str = "options";
const VOTERS_TREE: &str = "voters";

/// Open (or create) the database shared by both stores
pub fn open_database<P: AsRef<Path>>(path: P) -> BallotResult<Db> {
    sled::open(path).map_err(storage_error)
}

fn storage_error(err: sled::Error) -> BallotError {
    BallotError::StorageUnavailable(err.to_string())
}

async fn flush_if(tree: &Tree, sync_writes: bool) -> BallotResult<()> {
    if sync_writes {
        tree.flush_async().await.map_err(storage_error)?;
    }
    Ok(())
}

/// Ballot store persisted in the `options` tree, keyed by option id bytes
pub struct SledBallotStore {
    db: Db,
    options: Tree,
    sync_writes: bool,
}

impl SledBallotStore {
    pub fn open(db: &Db, sync_writes: bool) -> BallotResult<Self> {
        let options = db.open_tree(OPTIONS_TREE).map_err(storage_error)?;
        Ok(Self {
            db: db.clone(),
            options,
            sync_writes,
        })
    }

    /// Number of stored options
    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[async_trait]
impl BallotStore for SledBallotStore {
    async fn create(&self, draft: OptionDraft) -> BallotResult<BallotOption> {
        // Monotonic across restarts, which keeps creation order stable.
        let sequence = self.db.generate_id().map_err(storage_error)?;
        let id = draft.id;
        let option = BallotOption::from_draft(draft, sequence);

        let swapped = self
            .options
            .compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(option.to_bytes()))
            .map_err(storage_error)?;
        if swapped.is_err() {
            return Err(BallotError::InvalidInput(format!(
                "option id {} already exists",
                id
            )));
        }

        flush_if(&self.options, self.sync_writes).await?;
        Ok(option)
    }

    async fn get(&self, id: &OptionId) -> BallotResult<BallotOption> {
        match self.options.get(id.as_bytes()).map_err(storage_error)? {
            Some(bytes) => BallotOption::from_bytes(&bytes),
            None => Err(BallotError::OptionNotFound(*id)),
        }
    }

    async fn list_all(&self) -> BallotResult<Vec<BallotOption>> {
        let mut options = Vec::with_capacity(self.options.len());
        for entry in self.options.iter() {
            let (_, bytes) = entry.map_err(storage_error)?;
            options.push(BallotOption::from_bytes(&bytes)?);
        }
        sort_by_creation(&mut options);
        Ok(options)
    }

    async fn increment_tally(&self, id: &OptionId) -> BallotResult<BallotOption> {
        let mut decode_error = None;

        // update_and_fetch retries the closure on contention, so the add is
        // applied exactly once per call.
        let updated = self
            .options
            .update_and_fetch(id.as_bytes(), |current| {
                let bytes = current?;
                match BallotOption::from_bytes(bytes) {
                    Ok(mut option) => {
                        option.tally += 1;
                        Some(option.to_bytes())
                    }
                    Err(e) => {
                        decode_error = Some(e.to_string());
                        Some(bytes.to_vec())
                    }
                }
            })
            .map_err(storage_error)?;

        if let Some(reason) = decode_error {
            return Err(BallotError::SerializationError(reason));
        }

        let bytes = updated.ok_or(BallotError::OptionNotFound(*id))?;
        flush_if(&self.options, self.sync_writes).await?;
        BallotOption::from_bytes(&bytes)
    }

    async fn delete(&self, id: &OptionId) -> BallotResult<()> {
        match self.options.remove(id.as_bytes()).map_err(storage_error)? {
            Some(_) => flush_if(&self.options, self.sync_writes).await,
            None => Err(BallotError::OptionNotFound(*id)),
        }
    }
}

/// Voter registry persisted in the `voters` tree, keyed by voter id
pub struct SledVoterRegistry {
    voters: Tree,
    sync_writes: bool,
}

impl SledVoterRegistry {
    pub fn open(db: &Db, sync_writes: bool) -> BallotResult<Self> {
        let voters = db.open_tree(VOTERS_TREE).map_err(storage_error)?;
        Ok(Self {
            voters,
            sync_writes,
        })
    }
}

#[async_trait]
impl VoterRegistry for SledVoterRegistry {
    async fn register(&self, voter: Voter) -> BallotResult<Voter> {
        let key = voter.id.as_str().as_bytes().to_vec();
        let swapped = self
            .voters
            .compare_and_swap(&key, None::<&[u8]>, Some(voter.to_bytes()))
            .map_err(storage_error)?;

        match swapped {
            Ok(()) => {
                flush_if(&self.voters, self.sync_writes).await?;
                Ok(voter)
            }
            Err(existing) => match existing.current {
                Some(bytes) => Voter::from_bytes(&bytes),
                None => Err(BallotError::Internal(format!(
                    "voter {} vanished during registration",
                    voter.id
                ))),
            },
        }
    }

    async fn get_voter(&self, id: &VoterId) -> BallotResult<Voter> {
        match self.voters.get(id.as_str().as_bytes()).map_err(storage_error)? {
            Some(bytes) => Voter::from_bytes(&bytes),
            None => Err(BallotError::VoterNotFound(id.clone())),
        }
    }

    async fn commit_vote(&self, voter_id: &VoterId, option_id: &OptionId) -> BallotResult<Voter> {
        let key = voter_id.as_str().as_bytes();

        loop {
            let current = self
                .voters
                .get(key)
                .map_err(storage_error)?
                .ok_or_else(|| BallotError::VoterNotFound(voter_id.clone()))?;

            let mut voter = Voter::from_bytes(&current)?;
            if let Some(voted_for) = voter.voted_for {
                return Err(BallotError::AlreadyVoted {
                    voter: voter_id.clone(),
                    voted_for,
                });
            }
            voter.voted_for = Some(*option_id);

            // Only succeeds if nobody touched the record since we read it.
            let swapped = self
                .voters
                .compare_and_swap(key, Some(&current), Some(voter.to_bytes()))
                .map_err(storage_error)?;

            match swapped {
                Ok(()) => {
                    flush_if(&self.voters, self.sync_writes).await?;
                    return Ok(voter);
                }
                Err(_) => {
                    debug!("Voter {} changed concurrently, re-checking", voter_id);
                }
            }
        }
    }

    async fn list_voters(&self) -> BallotResult<Vec<Voter>> {
        let mut voters = Vec::with_capacity(self.voters.len());
        for entry in self.voters.iter() {
            let (_, bytes) = entry.map_err(storage_error)?;
            voters.push(Voter::from_bytes(&bytes)?);
        }
        voters.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(voters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotbox_core::Role;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn admin() -> VoterId {
        VoterId::new("admin-1")
    }

    #[tokio::test]
    async fn test_sled_ballot_store_basic() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let store = SledBallotStore::open(&db, true).unwrap();

        let option = store.create(OptionDraft::new("Pizza", admin())).await.unwrap();
        assert_eq!(store.get(&option.id).await.unwrap().tally, 0);

        let updated = store.increment_tally(&option.id).await.unwrap();
        assert_eq!(updated.tally, 1);

        store.delete(&option.id).await.unwrap();
        assert!(matches!(
            store.increment_tally(&option.id).await,
            Err(BallotError::OptionNotFound(_))
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_sled_list_in_creation_order() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let store = SledBallotStore::open(&db, false).unwrap();

        // Random v4 ids make key order differ from creation order.
        let labels = ["a", "b", "c", "d", "e", "f"];
        for label in labels {
            store.create(OptionDraft::new(label, admin())).await.unwrap();
        }

        let listed: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(listed, labels);
    }

    #[tokio::test]
    async fn test_sled_reopen() {
        let tmp = TempDir::new().unwrap();
        let option_id;

        {
            let db = open_database(tmp.path()).unwrap();
            let store = SledBallotStore::open(&db, true).unwrap();
            let registry = SledVoterRegistry::open(&db, true).unwrap();

            let option = store.create(OptionDraft::new("Pizza", admin())).await.unwrap();
            option_id = option.id;

            registry
                .register(Voter::new(VoterId::new("v1"), Role::Voter))
                .await
                .unwrap();
            registry.commit_vote(&VoterId::new("v1"), &option_id).await.unwrap();
            store.increment_tally(&option_id).await.unwrap();
        }

        {
            let db = open_database(tmp.path()).unwrap();
            let store = SledBallotStore::open(&db, true).unwrap();
            let registry = SledVoterRegistry::open(&db, true).unwrap();

            assert_eq!(store.get(&option_id).await.unwrap().tally, 1);
            let voter = registry.get_voter(&VoterId::new("v1")).await.unwrap();
            assert_eq!(voter.voted_for, Some(option_id));
        }
    }

    #[tokio::test]
    async fn test_sled_commit_vote_once() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let registry = SledVoterRegistry::open(&db, false).unwrap();
        let voter = VoterId::new("v1");

        registry.register(Voter::new(voter.clone(), Role::Voter)).await.unwrap();

        let first = OptionId::generate();
        registry.commit_vote(&voter, &first).await.unwrap();

        let result = registry.commit_vote(&voter, &OptionId::generate()).await;
        assert!(matches!(result, Err(BallotError::AlreadyVoted { .. })));
        assert_eq!(registry.get_voter(&voter).await.unwrap().voted_for, Some(first));

        let missing = registry.commit_vote(&VoterId::new("ghost"), &first).await;
        assert!(matches!(missing, Err(BallotError::VoterNotFound(_))));
    }

    #[tokio::test]
    async fn test_sled_register_keeps_existing() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let registry = SledVoterRegistry::open(&db, false).unwrap();

        registry
            .register(Voter::new(VoterId::new("v1"), Role::Admin))
            .await
            .unwrap();
        let stored = registry
            .register(Voter::new(VoterId::new("v1"), Role::Voter))
            .await
            .unwrap();

        assert_eq!(stored.role, Role::Admin);
        assert_eq!(registry.list_voters().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sled_list_voters_matches_memory_order() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let sled = SledVoterRegistry::open(&db, false).unwrap();
        let memory = crate::memory::MemoryVoterRegistry::new();

        for id in ["carol", "Bob", "alice", "dave-2", "dave-10"] {
            let voter = Voter::new(VoterId::new(id), Role::Voter);
            sled.register(voter.clone()).await.unwrap();
            memory.register(voter).await.unwrap();
        }

        let ids = |voters: Vec<Voter>| -> Vec<String> {
            voters.into_iter().map(|v| v.id.to_string()).collect()
        };
        let listed = ids(sled.list_voters().await.unwrap());
        assert_eq!(listed, ids(memory.list_voters().await.unwrap()));
        assert_eq!(listed, vec!["Bob", "alice", "carol", "dave-10", "dave-2"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sled_concurrent_votes() {
        let tmp = TempDir::new().unwrap();
        let db = open_database(tmp.path()).unwrap();
        let store = Arc::new(SledBallotStore::open(&db, false).unwrap());
        let registry = Arc::new(SledVoterRegistry::open(&db, false).unwrap());

        let option = store.create(OptionDraft::new("Pizza", admin())).await.unwrap();
        registry
            .register(Voter::new(VoterId::new("v1"), Role::Voter))
            .await
            .unwrap();

        let mut increments = Vec::new();
        for _ in 0..100 {
            let store = store.clone();
            let id = option.id;
            increments.push(tokio::spawn(async move { store.increment_tally(&id).await }));
        }

        let mut commits = Vec::new();
        for _ in 0..20 {
            let registry = registry.clone();
            commits.push(tokio::spawn(async move {
                registry
                    .commit_vote(&VoterId::new("v1"), &OptionId::generate())
                    .await
            }));
        }

        for handle in increments {
            handle.await.unwrap().unwrap();
        }
        let wins = count_wins(commits).await;

        assert_eq!(store.get(&option.id).await.unwrap().tally, 100);
        assert_eq!(wins, 1);
    }

    async fn count_wins(
        handles: Vec<tokio::task::JoinHandle<BallotResult<Voter>>>,
    ) -> usize {
        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                wins += 1;
            }
        }
        wins
    }
}
