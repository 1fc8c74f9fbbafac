use crate::estimation::params::TierRanges;
use crate::models::{EnrichedIssue, RepoContext};

const MAX_BODY_CHARS: usize = 4_000;
const MAX_COMMENT_CHARS: usize = 1_000;
const MAX_COMMENTS: usize = 30;

pub fn system_prompt(ranges: &TierRanges) -> String {
    format!(
        r#"You are a senior software engineer estimating the effort and cost of resolving GitHub issues.
Classify the issue into exactly one complexity tier and give a dollar cost estimate.

Complexity tiers:
- low: typo fixes, small copy or config changes, isolated one-file bug fixes. Budget: ${low_min} to ${low_max}
- medium: a contained feature or bug fix touching a few files, modest testing. Budget: ${medium_min} to ${medium_max}
- high: cross-cutting changes, new subsystems, non-trivial design or migration work. Budget: ${high_min} to ${high_max}
- critical: architectural rework, security-sensitive or data-integrity problems, large unknowns. Budget: ${critical_min} to ${critical_max}

The estimatedCost MUST lie within the budget of the tier you choose.

You must respond with valid JSON matching this exact schema and nothing else:
{{
    "complexity": "low|medium|high|critical",
    "estimatedCost": number,
    "reasoning": "string, two or three sentences explaining the estimate"
}}"#,
        low_min = ranges.low.min,
        low_max = ranges.low.max,
        medium_min = ranges.medium.min,
        medium_max = ranges.medium.max,
        high_min = ranges.high.min,
        high_max = ranges.high.max,
        critical_min = ranges.critical.min,
        critical_max = ranges.critical.max,
    )
}

#[derive(Debug, Clone, Copy)]
pub struct EstimationRequest<'a> {
    pub context: &'a RepoContext,
    pub issue: &'a EnrichedIssue,
}

impl<'a> EstimationRequest<'a> {
    pub fn new(context: &'a RepoContext, issue: &'a EnrichedIssue) -> Self {
        Self { context, issue }
    }

    pub fn to_prompt(&self) -> String {
        let context = self.context;
        let issue = self.issue;

        let mut prompt = format!("## Repository: {}\n", context.full_name);
        if let Some(desc) = &context.description {
            if !desc.is_empty() {
                prompt.push_str(&format!("Description: {}\n", desc));
            }
        }
        if let Some(lang) = &context.primary_language {
            prompt.push_str(&format!("Primary language: {}\n", lang));
        }
        if !context.topics.is_empty() {
            prompt.push_str(&format!("Topics: {}\n", context.topics.join(", ")));
        }
        prompt.push_str(&format!("Stars: {}\n\n", context.stars));

        prompt.push_str(&format!("## Issue #{}: {}\n", issue.number, issue.title));
        prompt.push_str(&format!("Author: {}\n", issue.author));
        if issue.labels.is_empty() {
            prompt.push_str("Labels: none\n");
        } else {
            prompt.push_str(&format!("Labels: {}\n", issue.labels.join(", ")));
        }
        prompt.push_str(&format!("Opened: {}\n\n", issue.created_at.format("%Y-%m-%d")));

        prompt.push_str("### Description\n");
        if issue.body.trim().is_empty() {
            prompt.push_str("(no description)\n");
        } else {
            prompt.push_str(&truncate(&issue.body, MAX_BODY_CHARS));
            prompt.push('\n');
        }

        if !issue.comments.is_empty() {
            prompt.push_str(&format!("\n### Comments ({})\n", issue.comments.len()));
            for comment in issue.comments.iter().take(MAX_COMMENTS) {
                prompt.push_str(&format!(
                    "- {} ({}): {}\n",
                    comment.author,
                    comment.created_at.format("%Y-%m-%d"),
                    truncate(&comment.body, MAX_COMMENT_CHARS)
                ));
            }
            if issue.comments.len() > MAX_COMMENTS {
                prompt.push_str(&format!(
                    "... [{} more comments omitted]\n",
                    issue.comments.len() - MAX_COMMENTS
                ));
            }
        }

        prompt.push_str("\nProvide your estimate as JSON:\n");
        prompt
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_chars).collect();
    truncated.push_str("...\n[truncated]");
    truncated
}
