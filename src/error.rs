use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::rate_limit::{Denial, WindowKind};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Rate limit exceeded ({window} window), retry after {retry_after} seconds")]
    RateLimited {
        retry_after: u64,
        window: WindowKind,
        limit: u32,
        reset_at: DateTime<Utc>,
    },

    #[error("GitHub API error: {0}")]
    GitHubApi(String),

    #[error("Repository not found: {0}")]
    RepoNotFound(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("LLM API error: {0}")]
    LLMApi(String),

    #[error("Failed to estimate issue #{issue}: {reason}")]
    EstimationFailure { issue: u64, reason: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Failures coming from the issue tracker rather than from the caller or the model.
    pub fn is_upstream_fetch(&self) -> bool {
        matches!(
            self,
            Error::GitHubApi(_) | Error::RepoNotFound(_) | Error::IssueNotFound(_)
        )
    }

    pub fn estimation(issue: u64, reason: impl Into<String>) -> Self {
        Error::EstimationFailure {
            issue,
            reason: reason.into(),
        }
    }
}

impl From<Denial> for Error {
    fn from(denial: Denial) -> Self {
        Error::RateLimited {
            retry_after: denial.retry_after,
            window: denial.window,
            limit: denial.limit,
            reset_at: denial.reset_at,
        }
    }
}
