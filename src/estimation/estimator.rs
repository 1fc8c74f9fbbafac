use std::sync::Arc;

use crate::error::{Error, Result};
use crate::estimation::params::EstimationParams;
use crate::llm::prompts::{system_prompt, EstimationRequest};
use crate::llm::{parse_estimate_response, CompletionRequest, LLMProvider};
use crate::models::{ComplexityTier, EnrichedIssue, EstimationResult, RepoContext};

/// Turns one enriched issue into a validated [`EstimationResult`].
#[derive(Clone)]
pub struct Estimator {
    llm: Arc<dyn LLMProvider>,
}

impl Estimator {
    pub fn new(llm: Arc<dyn LLMProvider>) -> Self {
        Self { llm }
    }

    pub async fn estimate(
        &self,
        context: &RepoContext,
        issue: &EnrichedIssue,
        params: &EstimationParams,
    ) -> Result<EstimationResult> {
        let request = CompletionRequest {
            model: params.model.clone(),
            system: system_prompt(&params.ranges),
            user: EstimationRequest::new(context, issue).to_prompt(),
        };

        let text = self.llm.complete(request).await.map_err(|e| match e {
            Error::LLMApi(reason) => Error::estimation(issue.number, reason),
            other => other,
        })?;

        let raw = parse_estimate_response(&text)
            .map_err(|e| Error::estimation(issue.number, e.to_string()))?;

        let complexity = ComplexityTier::parse(&raw.complexity).ok_or_else(|| {
            Error::estimation(
                issue.number,
                format!("unrecognized complexity tier '{}'", raw.complexity),
            )
        })?;

        let range = params.ranges.get(complexity);
        let estimated_cost = if range.contains(raw.estimated_cost) {
            raw.estimated_cost
        } else {
            let clamped = range.clamp(raw.estimated_cost);
            tracing::warn!(
                "Issue #{}: cost {} outside {} range {}, clamped to {}",
                issue.number,
                raw.estimated_cost,
                complexity,
                range,
                clamped
            );
            clamped
        };

        tracing::debug!(
            "Issue #{} estimated as {} at ${}",
            issue.number,
            complexity,
            estimated_cost
        );

        Ok(EstimationResult {
            issue_number: issue.number,
            title: issue.title.clone(),
            complexity,
            estimated_cost,
            reasoning: raw.reasoning,
            labels: issue.labels.clone(),
            url: issue.url.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::estimation::params::{EstimationDefaults, EstimationOverrides};

    pub(crate) fn enriched(number: u64) -> EnrichedIssue {
        EnrichedIssue {
            number,
            title: format!("Issue {}", number),
            body: String::new(),
            labels: vec!["enhancement".to_string()],
            comments: vec![],
            author: "octocat".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            url: format!("https://github.com/acme/widgets/issues/{}", number),
        }
    }

    pub(crate) fn default_params() -> EstimationParams {
        EstimationParams::resolve(&EstimationDefaults::default(), &EstimationOverrides::default())
            .unwrap()
    }

    /// Answers each issue with a canned payload. Issues not listed get a medium estimate;
    /// `delays` lets tests make early issues finish last.
    #[derive(Default)]
    pub(crate) struct ScriptedLLM {
        pub(crate) replies: HashMap<u64, String>,
        pub(crate) delays: HashMap<u64, u64>,
        pub(crate) in_flight: AtomicUsize,
        pub(crate) max_in_flight: AtomicUsize,
        pub(crate) calls: AtomicUsize,
    }

    impl ScriptedLLM {
        fn issue_number(prompt: &str) -> u64 {
            prompt
                .split("## Issue #")
                .nth(1)
                .and_then(|rest| rest.split(':').next())
                .and_then(|n| n.parse().ok())
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedLLM {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            let number = Self::issue_number(&request.user);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(ms) = self.delays.get(&number) {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
            } else {
                tokio::task::yield_now().await;
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(self.replies.get(&number).cloned().unwrap_or_else(|| {
                format!(
                    r#"{{"complexity": "medium", "estimatedCost": {}, "reasoning": "issue {}"}}"#,
                    400 + number,
                    number
                )
            }))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn estimator_with(replies: Vec<(u64, &str)>) -> Estimator {
        let llm = ScriptedLLM {
            replies: replies
                .into_iter()
                .map(|(n, r)| (n, r.to_string()))
                .collect(),
            ..Default::default()
        };
        Estimator::new(Arc::new(llm))
    }

    #[tokio::test]
    async fn test_estimate_builds_result_from_model_output() {
        let estimator = estimator_with(vec![(
            3,
            r#"```json
{"complexity": "High", "estimatedCost": 700, "reasoning": "New subsystem."}
```"#,
        )]);

        let result = estimator
            .estimate(&RepoContext::default(), &enriched(3), &default_params())
            .await
            .unwrap();

        assert_eq!(result.issue_number, 3);
        assert_eq!(result.complexity, ComplexityTier::High);
        assert_eq!(result.estimated_cost, 700.0);
        assert_eq!(result.reasoning, "New subsystem.");
        assert_eq!(result.labels, vec!["enhancement".to_string()]);
    }

    #[tokio::test]
    async fn test_estimate_clamps_cost_into_tier_range() {
        let estimator = estimator_with(vec![
            (1, r#"{"complexity": "low", "estimatedCost": 5000, "reasoning": ""}"#),
            (2, r#"{"complexity": "critical", "estimatedCost": 10, "reasoning": ""}"#),
        ]);
        let params = default_params();

        let low = estimator
            .estimate(&RepoContext::default(), &enriched(1), &params)
            .await
            .unwrap();
        assert_eq!(low.estimated_cost, 325.0);

        let critical = estimator
            .estimate(&RepoContext::default(), &enriched(2), &params)
            .await
            .unwrap();
        assert_eq!(critical.estimated_cost, 865.0);
        assert!(params.ranges.get(critical.complexity).contains(critical.estimated_cost));
    }

    #[tokio::test]
    async fn test_unknown_tier_is_an_estimation_failure() {
        let estimator = estimator_with(vec![(
            8,
            r#"{"complexity": "trivial", "estimatedCost": 50, "reasoning": ""}"#,
        )]);

        let err = estimator
            .estimate(&RepoContext::default(), &enriched(8), &default_params())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EstimationFailure { issue: 8, .. }));
    }

    #[tokio::test]
    async fn test_unparseable_output_names_the_issue() {
        let estimator = estimator_with(vec![(11, "Sorry, I cannot help with that.")]);

        let err = estimator
            .estimate(&RepoContext::default(), &enriched(11), &default_params())
            .await
            .unwrap_err();
        match err {
            Error::EstimationFailure { issue, reason } => {
                assert_eq!(issue, 11);
                assert!(reason.contains("No valid JSON"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
