use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Result;
use crate::estimation::batch::{BatchCoordinator, ProgressSink};
use crate::estimation::estimator::Estimator;
use crate::estimation::params::EstimationParams;
use crate::export::to_csv;
use crate::github::{GitHubClient, IssueSource};
use crate::llm::OpenAIProvider;
use crate::models::{EstimationResult, EstimationSummary, RepoId};
use crate::storage::Storage;

/// Everything a finished repository run hands back to its caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoEstimate {
    #[serde(skip)]
    pub repository: String,
    #[serde(rename = "estimations")]
    pub results: Vec<EstimationResult>,
    pub csv_content: String,
    pub summary: EstimationSummary,
}

pub struct EstimationPipeline {
    source: IssueSource,
    estimator: Estimator,
    coordinator: BatchCoordinator,
    storage: Option<Arc<Storage>>,
    enrich_concurrency: usize,
}

impl EstimationPipeline {
    pub fn new(source: IssueSource, estimator: Estimator, group_size: usize) -> Self {
        Self {
            source,
            coordinator: BatchCoordinator::new(estimator.clone(), group_size),
            estimator,
            storage: None,
            enrich_concurrency: group_size.max(1),
        }
    }

    /// Wires the GitHub and OpenAI clients described by `config`.
    pub fn from_config(config: &Config, storage: Option<Arc<Storage>>) -> Result<Self> {
        let github = GitHubClient::new(config.github_token.as_deref())?;
        let llm = OpenAIProvider::new(
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        )?;

        let mut pipeline = Self::new(
            IssueSource::new(Arc::new(github)),
            Estimator::new(Arc::new(llm)),
            config.batch_size,
        )
        .with_enrich_concurrency(config.enrich_concurrency);
        pipeline.storage = storage;
        Ok(pipeline)
    }

    pub fn with_storage(mut self, storage: Arc<Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_enrich_concurrency(mut self, concurrency: usize) -> Self {
        self.enrich_concurrency = concurrency.max(1);
        self
    }

    pub fn group_size(&self) -> usize {
        self.coordinator.group_size()
    }

    /// Fetch, enrich, estimate and export every open issue of `repo`.
    pub async fn estimate_repository(
        &self,
        repo: &RepoId,
        params: &EstimationParams,
        sink: &dyn ProgressSink,
    ) -> Result<RepoEstimate> {
        tracing::info!("Estimating open issues for {} with {}", repo, params.model);

        sink.log(&format!("Fetching repository details for {}", repo))
            .await;
        let context = self.source.repository_context(repo).await?;

        sink.log("Fetching open issues").await;
        let raw = self.source.fetch_open_issues(repo).await?;
        sink.log(&format!("Found {} open issues", raw.len())).await;

        if !raw.is_empty() {
            sink.log("Fetching issue comments").await;
        }
        let issues = self
            .source
            .enrich_all(repo, raw, self.enrich_concurrency)
            .await?;

        sink.log(&format!(
            "Estimating {} issues in groups of {}",
            issues.len(),
            self.coordinator.group_size()
        ))
        .await;
        let outcome = self.coordinator.run(&context, &issues, params, sink).await?;

        let estimate = RepoEstimate {
            repository: repo.full_name(),
            csv_content: to_csv(&outcome.results),
            results: outcome.results,
            summary: outcome.summary,
        };

        self.persist(&estimate, &params.model).await;
        Ok(estimate)
    }

    pub async fn estimate_issue(
        &self,
        repo: &RepoId,
        issue_number: u64,
        params: &EstimationParams,
    ) -> Result<EstimationResult> {
        tracing::info!("Estimating {}#{} with {}", repo, issue_number, params.model);

        let context = self.source.repository_context(repo).await?;
        let issue = self.source.fetch_issue(repo, issue_number).await?;
        self.estimator.estimate(&context, &issue, params).await
    }

    /// Failures here are logged and otherwise ignored.
    async fn persist(&self, estimate: &RepoEstimate, model: &str) {
        let Some(storage) = self.storage.clone() else {
            return;
        };

        let repository = estimate.repository.clone();
        let model = model.to_string();
        let summary = estimate.summary.clone();
        let results = estimate.results.clone();

        let saved = tokio::task::spawn_blocking(move || {
            storage.save_run(&repository, &model, &summary, &results)
        })
        .await;

        match saved {
            Ok(Ok(run_id)) => tracing::info!("Saved run {} for {}", run_id, estimate.repository),
            Ok(Err(e)) => tracing::warn!("Failed to save run for {}: {}", estimate.repository, e),
            Err(e) => tracing::warn!("Storage task for {} panicked: {}", estimate.repository, e),
        }
    }
}
