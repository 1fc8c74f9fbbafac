use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{Error, Result};
use crate::github::paginator::collect_pages;
use crate::github::tracker::IssueTracker;
use crate::models::{Comment, EnrichedIssue, RawIssue, RepoContext, RepoId};

pub const DEFAULT_PER_PAGE: u32 = 100;

/// Produces the ordered, comment-enriched issue list for one repository.
#[derive(Clone)]
pub struct IssueSource {
    tracker: Arc<dyn IssueTracker>,
    per_page: u32,
}

impl IssueSource {
    pub fn new(tracker: Arc<dyn IssueTracker>) -> Self {
        Self {
            tracker,
            per_page: DEFAULT_PER_PAGE,
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub async fn repository_context(&self, repo: &RepoId) -> Result<RepoContext> {
        let repository = self.tracker.get_repository(repo).await?;
        Ok(RepoContext::from(&repository))
    }

    /// Every open issue in page order, pull requests excluded.
    pub async fn fetch_open_issues(&self, repo: &RepoId) -> Result<Vec<RawIssue>> {
        let per_page = self.per_page;
        let items = collect_pages(per_page, |page| {
            self.tracker.list_open_issues_page(repo, page, per_page)
        })
        .await?;

        let fetched = items.len();
        let issues: Vec<RawIssue> = items
            .into_iter()
            .filter(|issue| !issue.is_pull_request())
            .collect();

        tracing::info!(
            "Fetched {} open issues for {} ({} pull requests skipped)",
            issues.len(),
            repo,
            fetched - issues.len()
        );
        Ok(issues)
    }

    pub async fn enrich(&self, repo: &RepoId, issue: RawIssue) -> Result<EnrichedIssue> {
        let per_page = self.per_page;
        let number = issue.number;
        let comments = collect_pages(per_page, |page| {
            self.tracker
                .list_issue_comments_page(repo, number, page, per_page)
        })
        .await?;

        tracing::debug!("Issue #{} has {} comments", number, comments.len());
        Ok(EnrichedIssue::from_raw(
            issue,
            comments.into_iter().map(Comment::from).collect(),
        ))
    }

    /// Enriches with up to `concurrency` comment fetches in flight; output keeps input order.
    pub async fn enrich_all(
        &self,
        repo: &RepoId,
        issues: Vec<RawIssue>,
        concurrency: usize,
    ) -> Result<Vec<EnrichedIssue>> {
        stream::iter(issues)
            .map(|issue| self.enrich(repo, issue))
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }

    pub async fn fetch_issue(&self, repo: &RepoId, issue_number: u64) -> Result<EnrichedIssue> {
        let issue = self.tracker.get_issue(repo, issue_number).await?;
        if issue.is_pull_request() {
            return Err(Error::InvalidInput(format!(
                "{}#{} is a pull request, not an issue",
                repo, issue_number
            )));
        }
        self.enrich(repo, issue).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    use crate::models::{IssueComment, Label, Repository, UserRef};

    pub(crate) fn raw_issue(number: u64) -> RawIssue {
        let created = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        RawIssue {
            number,
            title: format!("Issue {}", number),
            body: Some(format!("Body of issue {}", number)),
            labels: vec![Label {
                name: "bug".to_string(),
            }],
            user: Some(UserRef {
                login: "octocat".to_string(),
            }),
            state: "open".to_string(),
            comments: 0,
            created_at: created,
            updated_at: created,
            html_url: format!("https://github.com/acme/widgets/issues/{}", number),
            pull_request: None,
        }
    }

    pub(crate) fn comment(id: u64, offset_secs: i64) -> IssueComment {
        IssueComment {
            id,
            body: Some(format!("comment {}", id)),
            user: Some(UserRef {
                login: "reviewer".to_string(),
            }),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    /// In-memory tracker serving fixed pages.
    #[derive(Default)]
    pub(crate) struct MockTracker {
        pub(crate) issue_pages: Vec<Vec<RawIssue>>,
        pub(crate) comment_pages: HashMap<u64, Vec<Vec<IssueComment>>>,
        pub(crate) fail_issue_page: Option<u32>,
        pub(crate) requested_pages: Mutex<Vec<u32>>,
    }

    impl MockTracker {
        pub(crate) fn with_issues(count: u64, per_page: usize) -> Self {
            let issues: Vec<_> = (1..=count).map(raw_issue).collect();
            Self {
                issue_pages: issues.chunks(per_page).map(|c| c.to_vec()).collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl IssueTracker for MockTracker {
        async fn get_repository(&self, repo: &RepoId) -> Result<Repository> {
            Ok(Repository {
                id: 1,
                name: repo.name.clone(),
                full_name: repo.full_name(),
                description: Some("Widgets for everyone".to_string()),
                language: Some("Rust".to_string()),
                topics: vec!["widgets".to_string()],
                stargazers_count: 42,
                open_issues_count: 0,
                html_url: format!("https://github.com/{}", repo),
            })
        }

        async fn list_open_issues_page(
            &self,
            _repo: &RepoId,
            page: u32,
            _per_page: u32,
        ) -> Result<Vec<RawIssue>> {
            self.requested_pages.lock().unwrap().push(page);
            if self.fail_issue_page == Some(page) {
                return Err(Error::GitHubApi(format!("page {} unavailable", page)));
            }
            Ok(self
                .issue_pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default())
        }

        async fn list_issue_comments_page(
            &self,
            _repo: &RepoId,
            issue_number: u64,
            page: u32,
            _per_page: u32,
        ) -> Result<Vec<IssueComment>> {
            Ok(self
                .comment_pages
                .get(&issue_number)
                .and_then(|pages| pages.get(page as usize - 1))
                .cloned()
                .unwrap_or_default())
        }

        async fn get_issue(&self, _repo: &RepoId, issue_number: u64) -> Result<RawIssue> {
            self.issue_pages
                .iter()
                .flatten()
                .find(|i| i.number == issue_number)
                .cloned()
                .ok_or_else(|| Error::IssueNotFound(issue_number.to_string()))
        }
    }

    fn repo() -> RepoId {
        RepoId::new("acme", "widgets")
    }

    #[tokio::test]
    async fn test_fetch_open_issues_concatenates_pages() {
        let tracker = Arc::new(MockTracker::with_issues(7, 3));
        let source = IssueSource::new(tracker.clone()).with_per_page(3);

        let issues = source.fetch_open_issues(&repo()).await.unwrap();
        let numbers: Vec<_> = issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(*tracker.requested_pages.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_fetch_open_issues_skips_pull_requests() {
        let mut tracker = MockTracker::with_issues(3, 100);
        tracker.issue_pages[0][1].pull_request = Some(serde_json::json!({"url": "x"}));
        let source = IssueSource::new(Arc::new(tracker));

        let issues = source.fetch_open_issues(&repo()).await.unwrap();
        let numbers: Vec<_> = issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_page_failure_aborts_fetch() {
        let mut tracker = MockTracker::with_issues(10, 2);
        tracker.fail_issue_page = Some(3);
        let source = IssueSource::new(Arc::new(tracker)).with_per_page(2);

        let result = source.fetch_open_issues(&repo()).await;
        assert!(matches!(result, Err(Error::GitHubApi(_))));
    }

    #[tokio::test]
    async fn test_enrich_collects_all_comment_pages_in_order() {
        let mut tracker = MockTracker::with_issues(1, 100);
        tracker.comment_pages.insert(
            1,
            vec![vec![comment(1, 1), comment(2, 2)], vec![comment(3, 3)]],
        );
        let source = IssueSource::new(Arc::new(tracker)).with_per_page(2);

        let enriched = source.enrich(&repo(), raw_issue(1)).await.unwrap();
        let bodies: Vec<_> = enriched.comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["comment 1", "comment 2", "comment 3"]);
        assert_eq!(enriched.labels, vec!["bug".to_string()]);
        assert_eq!(enriched.author, "octocat");
    }

    #[tokio::test]
    async fn test_enrich_all_preserves_order() {
        let tracker = Arc::new(MockTracker::with_issues(12, 100));
        let source = IssueSource::new(tracker);

        let raw = source.fetch_open_issues(&repo()).await.unwrap();
        let enriched = source.enrich_all(&repo(), raw, 4).await.unwrap();
        let numbers: Vec<_> = enriched.iter().map(|i| i.number).collect();
        assert_eq!(numbers, (1..=12).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_fetch_issue_rejects_pull_request() {
        let mut tracker = MockTracker::with_issues(2, 100);
        tracker.issue_pages[0][0].pull_request = Some(serde_json::json!({}));
        let source = IssueSource::new(Arc::new(tracker));

        assert!(matches!(
            source.fetch_issue(&repo(), 1).await,
            Err(Error::InvalidInput(_))
        ));
        assert_eq!(source.fetch_issue(&repo(), 2).await.unwrap().number, 2);
    }
}
