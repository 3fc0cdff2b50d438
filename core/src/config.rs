//! Configuration types for BALLOTBOX

use crate::error::BallotError;
use crate::traits::BallotResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable that overrides `auth.jwt_secret`
pub const JWT_SECRET_ENV: &str = "BALLOTBOX_JWT_SECRET";

/// Secret used when nothing else is configured. Development only.
pub const DEV_JWT_SECRET: &str = "ballotbox-dev-secret";

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node name for logging
    pub name: String,

    /// Data directory
    pub data_dir: PathBuf,

    /// Storage configuration
    pub storage: StorageConfig,

    /// API configuration
    pub api: ApiConfig,

    /// Broadcast configuration
    pub broadcast: BroadcastConfig,

    /// Bearer token verification
    pub auth: AuthConfig,

    /// Logging level, used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "ballotbox-node".to_string(),
            data_dir: PathBuf::from("./data"),
            storage: StorageConfig::default(),
            api: ApiConfig::default(),
            broadcast: BroadcastConfig::default(),
            auth: AuthConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load from JSON
    pub fn from_json(json: &str) -> BallotResult<Self> {
        serde_json::from_str(json).map_err(|e| BallotError::ConfigError(e.to_string()))
    }

    /// Save to JSON
    pub fn to_json(&self) -> BallotResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Apply overrides taken from the process environment
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.is_empty() {
                self.auth.jwt_secret = secret;
            }
        }
    }

    /// Directory the sled database lives in
    pub fn storage_path(&self) -> PathBuf {
        match &self.storage.path {
            Some(path) => path.clone(),
            None => self.data_dir.join("ballots.db"),
        }
    }

    pub fn validate(&self) -> BallotResult<()> {
        if self.broadcast.channel_capacity == 0 {
            return Err(BallotError::ConfigError(
                "broadcast.channel_capacity must be greater than zero".into(),
            ));
        }
        if self.broadcast.max_sessions == 0 {
            return Err(BallotError::ConfigError(
                "broadcast.max_sessions must be greater than zero".into(),
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(BallotError::ConfigError("auth.jwt_secret is empty".into()));
        }
        if self.api.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(BallotError::ConfigError(format!(
                "invalid api.listen_addr '{}'",
                self.api.listen_addr
            )));
        }
        Ok(())
    }
}

/// Which store implementation backs the ballot and the voter registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sled,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Database directory; defaults to `<data_dir>/ballots.db`
    pub path: Option<PathBuf>,

    /// Flush to disk after every mutation
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sled,
            path: None,
            sync_writes: true,
        }
    }
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API listen address
    pub listen_addr: String,

    /// Enable CORS
    pub enable_cors: bool,

    /// CORS allowed origins; `*` allows any
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3001".to_string(),
            enable_cors: true,
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Change broadcaster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Events buffered per observer before it is considered lagging
    pub channel_capacity: usize,

    /// Maximum concurrently connected observer sessions
    pub max_sessions: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            max_sessions: 10_000,
        }
    }
}

/// Bearer token verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 shared secret with the identity provider
    pub jwt_secret: String,

    /// Clock skew tolerated on `exp`, in seconds
    pub leeway_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            leeway_secs: 30,
        }
    }
}

impl AuthConfig {
    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.auth.uses_dev_secret());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = NodeConfig::from_json(
            r#"{"name": "test", "storage": {"backend": "memory"}}"#,
        )
        .unwrap();

        assert_eq!(config.name, "test");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert!(config.storage.sync_writes);
        assert_eq!(config.broadcast.channel_capacity, 1024);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = NodeConfig::default();
        config.broadcast.channel_capacity = 0;
        assert!(matches!(config.validate(), Err(BallotError::ConfigError(_))));
    }

    #[test]
    fn test_storage_path_default() {
        let config = NodeConfig::default();
        assert_eq!(config.storage_path(), PathBuf::from("./data/ballots.db"));
    }
}
