pub mod client;
pub mod links;
pub mod paginator;
pub mod source;
pub mod tracker;

pub use client::GitHubClient;
pub use links::{parse_issue_link, parse_repo_link};
pub use paginator::Paginator;
pub use source::IssueSource;
pub use tracker::IssueTracker;
