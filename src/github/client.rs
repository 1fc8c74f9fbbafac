use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};

use crate::error::{Error, Result};
use crate::github::paginator::Paginator;
use crate::github::tracker::IssueTracker;
use crate::models::{IssueComment, RawIssue, RepoId, Repository};

pub struct GitHubClient {
    client: Client,
    base_url: String,
}

impl GitHubClient {
    /// Unauthenticated access works but is subject to GitHub's lower anonymous quota.
    pub fn new(token: Option<&str>) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static("issuecost/0.1"),
        );

        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: "https://api.github.com".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn repo_url(&self, repo: &RepoId) -> String {
        format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name)
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn get_repository(&self, repo: &RepoId) -> Result<Repository> {
        let url = self.repo_url(repo);
        tracing::info!("Fetching repository: {}", repo);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::RepoNotFound(repo.full_name()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch repository {}: {} - {}",
                repo, status, body
            )));
        }

        Ok(response.json().await?)
    }

    async fn list_open_issues_page(
        &self,
        repo: &RepoId,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RawIssue>> {
        let url = format!("{}/issues?state=open", self.repo_url(repo));
        Paginator::new(&self.client)
            .fetch_page(&url, per_page, page)
            .await
    }

    async fn list_issue_comments_page(
        &self,
        repo: &RepoId,
        issue_number: u64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<IssueComment>> {
        let url = format!("{}/issues/{}/comments", self.repo_url(repo), issue_number);
        Paginator::new(&self.client)
            .fetch_page(&url, per_page, page)
            .await
    }

    async fn get_issue(&self, repo: &RepoId, issue_number: u64) -> Result<RawIssue> {
        let url = format!("{}/issues/{}", self.repo_url(repo), issue_number);
        tracing::info!("Fetching issue: {}#{}", repo, issue_number);

        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::IssueNotFound(format!("{}#{}", repo, issue_number)));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::GitHubApi(format!(
                "Failed to fetch issue {}#{}: {} - {}",
                repo, issue_number, status, body
            )));
        }

        Ok(response.json().await?)
    }
}
