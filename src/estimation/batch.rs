use std::collections::VecDeque;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::estimation::estimator::Estimator;
use crate::estimation::params::EstimationParams;
use crate::models::{EnrichedIssue, EstimationResult, EstimationSummary, RepoContext};

pub const DEFAULT_GROUP_SIZE: usize = 5;

/// Receives one checkpoint per finished group, plus free-form status lines.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn log(&self, _message: &str) {}

    async fn on_group_complete(&self, processed: usize, total: usize, group: &[EstimationResult]);
}

/// Sink for callers that only want the final outcome.
pub struct NoopSink;

#[async_trait]
impl ProgressSink for NoopSink {
    async fn on_group_complete(&self, _processed: usize, _total: usize, _group: &[EstimationResult]) {}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<EstimationResult>,
    pub summary: EstimationSummary,
}

/// Bookkeeping for a single `run` call.
struct BatchRun {
    pending: VecDeque<u64>,
    completed: Vec<EstimationResult>,
    total: usize,
    cost_sum: f64,
}

impl BatchRun {
    fn new(issues: &[EnrichedIssue]) -> Self {
        Self {
            pending: issues.iter().map(|i| i.number).collect(),
            completed: Vec::with_capacity(issues.len()),
            total: issues.len(),
            cost_sum: 0.0,
        }
    }

    fn record_group(&mut self, group: Vec<EstimationResult>) {
        for result in group {
            if self.pending.front() == Some(&result.issue_number) {
                self.pending.pop_front();
            }
            self.cost_sum += result.estimated_cost;
            self.completed.push(result);
        }
    }

    fn processed(&self) -> usize {
        self.completed.len()
    }

    /// Consumes the run; a finished run cannot record further groups.
    fn finish(self) -> BatchOutcome {
        debug_assert!(self.pending.is_empty());
        let summary = EstimationSummary::from_results(&self.completed);
        tracing::info!(
            "Batch finished: {} issues, total ${:.2}",
            summary.issue_count,
            self.cost_sum
        );
        BatchOutcome {
            results: self.completed,
            summary,
        }
    }
}

/// Estimates issues in fixed-size groups: concurrently inside a group,
/// strictly one group after another.
#[derive(Clone)]
pub struct BatchCoordinator {
    estimator: Estimator,
    group_size: usize,
}

impl BatchCoordinator {
    pub fn new(estimator: Estimator, group_size: usize) -> Self {
        Self {
            estimator,
            group_size: group_size.max(1),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    /// Fails as a whole if any single estimate fails; later groups are not started.
    pub async fn run(
        &self,
        context: &RepoContext,
        issues: &[EnrichedIssue],
        params: &EstimationParams,
        sink: &dyn ProgressSink,
    ) -> Result<BatchOutcome> {
        let mut run = BatchRun::new(issues);
        let group_count = issues.len().div_ceil(self.group_size);

        for (index, group) in issues.chunks(self.group_size).enumerate() {
            tracing::info!(
                "Estimating group {}/{} ({} issues)",
                index + 1,
                group_count,
                group.len()
            );

            let estimates = join_all(
                group
                    .iter()
                    .map(|issue| self.estimator.estimate(context, issue, params)),
            )
            .await;

            // join_all keeps input order, so the first error reported is the earliest issue.
            let results = estimates.into_iter().collect::<Result<Vec<_>>>()?;

            run.record_group(results);
            let start = run.processed() - group.len();
            sink.on_group_complete(run.processed(), run.total, &run.completed[start..])
                .await;
        }

        Ok(run.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Mutex};

    use crate::error::Error;
    use crate::estimation::estimator::tests::{default_params, enriched, ScriptedLLM};

    #[derive(Default)]
    struct RecordingSink {
        checkpoints: Mutex<Vec<(usize, usize, Vec<u64>)>>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn on_group_complete(&self, processed: usize, total: usize, group: &[EstimationResult]) {
            self.checkpoints.lock().unwrap().push((
                processed,
                total,
                group.iter().map(|r| r.issue_number).collect(),
            ));
        }
    }

    fn issues(count: u64) -> Vec<EnrichedIssue> {
        (1..=count).map(enriched).collect()
    }

    #[tokio::test]
    async fn test_twenty_three_issues_in_groups_of_five() {
        let coordinator = BatchCoordinator::new(Estimator::new(Arc::new(ScriptedLLM::default())), 5);
        let sink = RecordingSink::default();

        let outcome = coordinator
            .run(&RepoContext::default(), &issues(23), &default_params(), &sink)
            .await
            .unwrap();

        let checkpoints = sink.checkpoints.lock().unwrap();
        let processed: Vec<_> = checkpoints.iter().map(|c| c.0).collect();
        assert_eq!(processed, vec![5, 10, 15, 20, 23]);
        assert!(checkpoints.iter().all(|c| c.1 == 23));
        assert_eq!(checkpoints[4].2, vec![21, 22, 23]);
        assert_eq!(outcome.results.len(), 23);
    }

    #[tokio::test]
    async fn test_results_keep_input_order_for_any_group_size() {
        for group_size in 1..=8 {
            // Earlier issues answer slower so completion order is reversed inside each group.
            let llm = ScriptedLLM {
                delays: (1..=13).map(|n| (n, 30 - n)).collect(),
                ..Default::default()
            };
            let coordinator = BatchCoordinator::new(Estimator::new(Arc::new(llm)), group_size);

            let outcome = coordinator
                .run(&RepoContext::default(), &issues(13), &default_params(), &NoopSink)
                .await
                .unwrap();

            let numbers: Vec<_> = outcome.results.iter().map(|r| r.issue_number).collect();
            assert_eq!(numbers, (1..=13).collect::<Vec<_>>(), "group size {}", group_size);
        }
    }

    #[tokio::test]
    async fn test_in_flight_calls_bounded_by_group_size() {
        let llm = Arc::new(ScriptedLLM {
            delays: (1..=20).map(|n| (n, 5)).collect(),
            ..Default::default()
        });
        let coordinator = BatchCoordinator::new(Estimator::new(llm.clone()), 4);

        coordinator
            .run(&RepoContext::default(), &issues(20), &default_params(), &NoopSink)
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 20);
        assert!(llm.max_in_flight.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_summary_matches_results() {
        let coordinator = BatchCoordinator::new(Estimator::new(Arc::new(ScriptedLLM::default())), 3);
        let params = default_params();

        let outcome = coordinator
            .run(&RepoContext::default(), &issues(7), &params, &NoopSink)
            .await
            .unwrap();

        let sum: f64 = outcome.results.iter().map(|r| r.estimated_cost).sum();
        assert_eq!(outcome.summary.total_cost, sum);
        assert_eq!(outcome.summary.average_cost, sum / 7.0);
        assert_eq!(outcome.summary.complexity_breakdown.medium, 7);
        for result in &outcome.results {
            assert!(params.ranges.get(result.complexity).contains(result.estimated_cost));
        }
    }

    #[tokio::test]
    async fn test_failure_in_group_aborts_run() {
        let llm = Arc::new(ScriptedLLM {
            replies: [(7, "not json".to_string())].into_iter().collect(),
            ..Default::default()
        });
        let coordinator = BatchCoordinator::new(Estimator::new(llm.clone()), 5);
        let sink = RecordingSink::default();

        let err = coordinator
            .run(&RepoContext::default(), &issues(15), &default_params(), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EstimationFailure { issue: 7, .. }));
        // First group reported, second group failed, third never started.
        assert_eq!(sink.checkpoints.lock().unwrap().len(), 1);
        assert_eq!(llm.calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_empty_issue_list() {
        let coordinator = BatchCoordinator::new(Estimator::new(Arc::new(ScriptedLLM::default())), 5);
        let sink = RecordingSink::default();

        let outcome = coordinator
            .run(&RepoContext::default(), &[], &default_params(), &sink)
            .await
            .unwrap();

        assert!(outcome.results.is_empty());
        assert_eq!(outcome.summary.average_cost, 0.0);
        assert!(sink.checkpoints.lock().unwrap().is_empty());
    }
}
