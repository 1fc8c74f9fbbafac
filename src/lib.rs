pub mod config;
pub mod error;
pub mod models;
pub mod rate_limit;
pub mod github;
pub mod llm;
pub mod estimation;
pub mod export;
pub mod stream;
pub mod storage;
pub mod server;

pub use config::Config;
pub use error::{Error, Result};
pub use estimation::{EstimationParams, EstimationPipeline, Estimator, RepoEstimate};
pub use github::{GitHubClient, IssueSource};
pub use llm::{LLMProvider, OpenAIProvider};
pub use rate_limit::RateLimiter;
pub use storage::Storage;
