//! CLI Commands

use ballotbox_core::{BallotOption, Role, Voter};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// API Client for interacting with a BALLOTBOX node
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ApiError::MissingToken),
        }
    }

    async fn read<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ErrorBody>(&body) {
            Ok(error) => ApiError::Server {
                status,
                code: error.error,
                message: error.message,
            },
            Err(_) => ApiError::Server {
                status,
                code: "HTTP_ERROR".to_string(),
                message: body,
            },
        })
    }

    /// Get node status
    pub async fn status(&self) -> Result<NodeStatus, ApiError> {
        Self::read(self.client.get(self.url("/status"))).await
    }

    /// List options with tallies
    pub async fn list_options(&self) -> Result<Vec<OptionListing>, ApiError> {
        Self::read(self.client.get(self.url("/api/votes"))).await
    }

    /// Add an option (admin)
    pub async fn add_option(&self, label: &str) -> Result<BallotOption, ApiError> {
        let request = self
            .client
            .post(self.url("/api/votes"))
            .json(&CreateOptionRequest { option: label });
        Self::read(self.authorized(request)?).await
    }

    /// Remove an option (admin)
    pub async fn remove_option(&self, id: &str) -> Result<DeleteResponse, ApiError> {
        let request = self.client.delete(self.url(&format!("/api/vote/{}", id)));
        Self::read(self.authorized(request)?).await
    }

    /// Cast the token holder's vote
    pub async fn vote(&self, id: &str) -> Result<VoteReceipt, ApiError> {
        let request = self.client.post(self.url(&format!("/api/vote/{}", id)));
        Self::read(self.authorized(request)?).await
    }

    /// The token holder's voter record
    pub async fn me(&self) -> Result<Voter, ApiError> {
        let request = self.client.get(self.url("/api/me"));
        Self::read(self.authorized(request)?).await
    }

    /// Tally audit (admin)
    pub async fn audit(&self) -> Result<AuditReport, ApiError> {
        let request = self.client.get(self.url("/api/audit"));
        Self::read(self.authorized(request)?).await
    }
}

#[derive(Serialize)]
struct CreateOptionRequest<'a> {
    option: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

/// Node status
#[derive(Debug, Deserialize)]
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

/// Creator as listed by the node
#[derive(Debug, Clone, Deserialize)]
pub struct CreatorInfo {
    pub id: String,
    pub role: Role,
}

/// One row of `GET /api/votes`
#[derive(Debug, Clone, Deserialize)]
pub struct OptionListing {
    #[serde(flatten)]
    pub option: BallotOption,
    pub creator: Option<CreatorInfo>,
}

/// Delete response
#[derive(Debug, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
    pub id: String,
}

/// Vote response
#[derive(Debug, Deserialize)]
pub struct VoteReceipt {
    pub vote: BallotOption,
    pub user: Voter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub option_id: String,
    pub label: String,
    pub tally: u64,
    pub committed_votes: u64,
    pub drift: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingVote {
    pub voter: String,
    pub voted_for: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub entries: Vec<AuditEntry>,
    pub dangling: Vec<DanglingVote>,
    pub total_votes: u64,
    pub consistent: bool,
}

/// API Error
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({code}, HTTP {status})")]
    Server {
        status: StatusCode,
        code: String,
        message: String,
    },

    #[error("this command needs --token or BALLOT_TOKEN")]
    MissingToken,
}

/// Render options as a tally table
pub fn render_table(options: &[OptionListing]) -> String {
    let total: u64 = options.iter().map(|o| o.option.tally).sum();
    let width = options
        .iter()
        .map(|o| o.option.label.chars().count())
        .max()
        .unwrap_or(0)
        .max(6);

    let mut out = String::new();
    out.push_str(&format!(
        "{:<36}  {:<width$}  {:>6}  {:>6}\n",
        "ID",
        "Option",
        "Votes",
        "Share",
        width = width
    ));
    for listing in options {
        let option = &listing.option;
        out.push_str(&format!(
            "{:<36}  {:<width$}  {:>6}  {:>5.1}%\n",
            option.id.to_string(),
            option.label,
            option.tally,
            share(option.tally, total),
            width = width
        ));
    }
    out.push_str(&format!("{} votes across {} options", total, options.len()));
    out
}

fn share(tally: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        tally as f64 * 100.0 / total as f64
    }
}

pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len).collect();
        format!("{}...", head)
    }
}
