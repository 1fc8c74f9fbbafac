use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IssueComment, RawIssue, RepoId, Repository};

/// Page-at-a-time access to an issue tracker. Pages are 1-based.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn get_repository(&self, repo: &RepoId) -> Result<Repository>;

    async fn list_open_issues_page(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RawIssue>>;

    async fn list_issue_comments_page(
        &self,
        repo: &RepoId,
        issue_number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<IssueComment>>;

    async fn get_issue(&self, repo: &RepoId, issue_number: u64) -> Result<RawIssue>;
}
