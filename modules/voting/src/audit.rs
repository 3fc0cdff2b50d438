//! Tally audit
//!
//! Recounts committed votes from the voter registry and compares them with
//! the stored tallies. Meant for quiescent stores: a vote in flight between
//! the registry commit and the tally increment shows up as drift.

use ballotbox_core::{BallotResult, OptionId, VoterId};
use ballotbox_state::{SharedBallotStore, SharedVoterRegistry};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{info, warn};

/// One option's stored tally against its recount
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub option_id: OptionId,
    pub label: String,
    pub tally: u64,
    pub committed_votes: u64,
    /// `committed_votes - tally`; positive after a partial commit
    pub drift: i64,
}

impl AuditEntry {
    pub fn is_consistent(&self) -> bool {
        self.drift == 0
    }
}

/// A voter whose committed choice no longer exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingVote {
    pub voter: VoterId,
    pub voted_for: OptionId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub entries: Vec<AuditEntry>,
    pub dangling: Vec<DanglingVote>,
    pub total_votes: u64,
    /// True when no option drifts. Dangling votes alone do not break it.
    pub consistent: bool,
}

impl AuditReport {
    pub fn drifting(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|entry| !entry.is_consistent())
    }
}

pub struct TallyAuditor {
    ballots: SharedBallotStore,
    voters: SharedVoterRegistry,
}

impl TallyAuditor {
    pub fn new(ballots: SharedBallotStore, voters: SharedVoterRegistry) -> Self {
        Self { ballots, voters }
    }

    pub async fn audit(&self) -> BallotResult<AuditReport> {
        let options = self.ballots.list_all().await?;
        let voters = self.voters.list_voters().await?;

        let mut counts: HashMap<OptionId, u64> = HashMap::new();
        let mut total_votes = 0;
        for voter in &voters {
            if let Some(option) = voter.voted_for {
                *counts.entry(option).or_default() += 1;
                total_votes += 1;
            }
        }

        let entries: Vec<AuditEntry> = options
            .iter()
            .map(|option| {
                let committed = counts.remove(&option.id).unwrap_or(0);
                AuditEntry {
                    option_id: option.id,
                    label: option.label.clone(),
                    tally: option.tally,
                    committed_votes: committed,
                    drift: committed as i64 - option.tally as i64,
                }
            })
            .collect();

        // Whatever is left in `counts` points at deleted options.
        let mut dangling: Vec<DanglingVote> = voters
            .into_iter()
            .filter_map(|voter| match voter.voted_for {
                Some(option) if counts.contains_key(&option) => Some(DanglingVote {
                    voter: voter.id,
                    voted_for: option,
                }),
                _ => None,
            })
            .collect();
        dangling.sort_by(|a, b| a.voter.cmp(&b.voter));

        let report = AuditReport {
            consistent: entries.iter().all(AuditEntry::is_consistent),
            entries,
            dangling,
            total_votes,
        };

        for entry in report.drifting() {
            warn!(
                "Tally drift on {} '{}': stored {} committed {}",
                entry.option_id, entry.label, entry.tally, entry.committed_votes
            );
        }
        info!(
            "Audit complete: {} options, {} votes, {} dangling, consistent={}",
            report.entries.len(),
            report.total_votes,
            report.dangling.len(),
            report.consistent
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballotbox_core::{BallotStore, OptionDraft, Role, Voter, VoterRegistry};
    use ballotbox_state::{MemoryBallotStore, MemoryVoterRegistry};
    use std::sync::Arc;

    async fn voter(registry: &MemoryVoterRegistry, id: &str) -> VoterId {
        let id = VoterId::new(id);
        registry
            .register(Voter::new(id.clone(), Role::Voter))
            .await
            .unwrap();
        id
    }

    #[tokio::test]
    async fn test_consistent_ballot() {
        let ballots = Arc::new(MemoryBallotStore::new());
        let voters = Arc::new(MemoryVoterRegistry::new());
        let pizza = ballots
            .create(OptionDraft::new("Pizza", VoterId::new("admin")))
            .await
            .unwrap();
        let sushi = ballots
            .create(OptionDraft::new("Sushi", VoterId::new("admin")))
            .await
            .unwrap();

        for name in ["a", "b"] {
            let id = voter(&voters, name).await;
            voters.commit_vote(&id, &pizza.id).await.unwrap();
            ballots.increment_tally(&pizza.id).await.unwrap();
        }
        voter(&voters, "c").await;

        let report = TallyAuditor::new(ballots, voters).audit().await.unwrap();

        assert!(report.consistent);
        assert_eq!(report.total_votes, 2);
        assert!(report.dangling.is_empty());
        assert_eq!(report.entries[0].committed_votes, 2);
        assert_eq!(report.entries[1].option_id, sushi.id);
        assert_eq!(report.entries[1].tally, 0);
    }

    #[tokio::test]
    async fn test_drift_after_partial_commit() {
        let ballots = Arc::new(MemoryBallotStore::new());
        let voters = Arc::new(MemoryVoterRegistry::new());
        let pizza = ballots
            .create(OptionDraft::new("Pizza", VoterId::new("admin")))
            .await
            .unwrap();

        // Registry committed, tally never incremented.
        let id = voter(&voters, "a").await;
        voters.commit_vote(&id, &pizza.id).await.unwrap();

        let report = TallyAuditor::new(ballots, voters).audit().await.unwrap();

        assert!(!report.consistent);
        let drifting: Vec<_> = report.drifting().collect();
        assert_eq!(drifting.len(), 1);
        assert_eq!(drifting[0].drift, 1);
    }

    #[tokio::test]
    async fn test_dangling_votes_after_delete() {
        let ballots = Arc::new(MemoryBallotStore::new());
        let voters = Arc::new(MemoryVoterRegistry::new());
        let tacos = ballots
            .create(OptionDraft::new("Tacos", VoterId::new("admin")))
            .await
            .unwrap();

        let id = voter(&voters, "a").await;
        voters.commit_vote(&id, &tacos.id).await.unwrap();
        ballots.increment_tally(&tacos.id).await.unwrap();
        ballots.delete(&tacos.id).await.unwrap();

        let report = TallyAuditor::new(ballots, voters).audit().await.unwrap();

        assert!(report.consistent);
        assert!(report.entries.is_empty());
        assert_eq!(
            report.dangling,
            vec![DanglingVote {
                voter: id,
                voted_for: tacos.id
            }]
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["dangling"][0]["votedFor"], tacos.id.to_string());
    }
}
