//! Core types for BALLOTBOX
//!
//! Defines the ballot options, voters and change events shared by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque ballot option identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(pub Uuid);

impl OptionId {
    /// Fresh random id. v4 ids are never reused.
    pub fn generate() -> Self {
        OptionId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(OptionId)
    }
}

impl FromStr for OptionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(OptionId)
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionId({})", self.0)
    }
}

/// Opaque voter identifier, as issued by the identity provider
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(pub String);

impl VoterId {
    pub fn new(id: impl Into<String>) -> Self {
        VoterId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VoterId({})", self.0)
    }
}

/// Timestamp in milliseconds since Unix epoch
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Self {
        Timestamp(chrono::Utc::now().timestamp_millis() as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Voter role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Voter,
    Admin,
}

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Voter => write!(f, "voter"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "voter" | "user" => Ok(Role::Voter),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// A candidate a voter can choose, with its running tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallotOption {
    pub id: OptionId,
    pub label: String,
    pub tally: u64,
    pub created_by: VoterId,
    pub created_at: Timestamp,
    /// Creation-order key; `list_all` sorts on it
    pub sequence: u64,
}

impl BallotOption {
    pub fn from_draft(draft: OptionDraft, sequence: u64) -> Self {
        Self {
            id: draft.id,
            label: draft.label,
            tally: 0,
            created_by: draft.created_by,
            created_at: Timestamp::now(),
            sequence,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::BallotResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Input for `BallotStore::create`. The id is assigned up front so the caller
/// can order the creation against other mutations of the same option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionDraft {
    pub id: OptionId,
    pub label: String,
    pub created_by: VoterId,
}

impl OptionDraft {
    pub fn new(label: impl Into<String>, created_by: VoterId) -> Self {
        Self {
            id: OptionId::generate(),
            label: label.into(),
            created_by,
        }
    }
}

/// A registered voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub id: VoterId,
    pub role: Role,
    /// Set at most once, never reset
    pub voted_for: Option<OptionId>,
    pub registered_at: Timestamp,
}

impl Voter {
    pub fn new(id: VoterId, role: Role) -> Self {
        Self {
            id,
            role,
            voted_for: None,
            registered_at: Timestamp::now(),
        }
    }

    pub fn has_voted(&self) -> bool {
        self.voted_for.is_some()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).unwrap_or_default()
    }

    pub fn from_bytes(bytes: &[u8]) -> crate::BallotResult<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Verified caller, as supplied by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub voter_id: VoterId,
    pub role: Role,
}

impl Identity {
    pub fn new(voter_id: VoterId, role: Role) -> Self {
        Self { voter_id, role }
    }
}

/// A committed mutation of the ballot, as observers see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChangeEvent {
    #[serde(rename = "voteCreated")]
    OptionCreated(BallotOption),
    #[serde(rename = "voteUpdated")]
    OptionUpdated(BallotOption),
    #[serde(rename = "voteDeleted")]
    OptionDeleted(OptionId),
}

impl ChangeEvent {
    pub fn option_id(&self) -> OptionId {
        match self {
            ChangeEvent::OptionCreated(option) | ChangeEvent::OptionUpdated(option) => option.id,
            ChangeEvent::OptionDeleted(id) => *id,
        }
    }

    /// Wire name of the event
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeEvent::OptionCreated(_) => "voteCreated",
            ChangeEvent::OptionUpdated(_) => "voteUpdated",
            ChangeEvent::OptionDeleted(_) => "voteDeleted",
        }
    }
}
