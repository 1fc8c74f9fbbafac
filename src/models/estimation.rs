use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl ComplexityTier {
    /// All tiers in increasing severity.
    pub const ALL: [ComplexityTier; 4] = [
        ComplexityTier::Low,
        ComplexityTier::Medium,
        ComplexityTier::High,
        ComplexityTier::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplexityTier::Low => "low",
            ComplexityTier::Medium => "medium",
            ComplexityTier::High => "high",
            ComplexityTier::Critical => "critical",
        }
    }

    /// Strict parse; anything outside the four names is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(ComplexityTier::Low),
            "medium" => Some(ComplexityTier::Medium),
            "high" => Some(ComplexityTier::High),
            "critical" => Some(ComplexityTier::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationResult {
    pub issue_number: u64,
    pub title: String,
    pub complexity: ComplexityTier,
    pub estimated_cost: f64,
    pub reasoning: String,
    pub labels: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl TierCounts {
    pub fn record(&mut self, tier: ComplexityTier) {
        match tier {
            ComplexityTier::Low => self.low += 1,
            ComplexityTier::Medium => self.medium += 1,
            ComplexityTier::High => self.high += 1,
            ComplexityTier::Critical => self.critical += 1,
        }
    }

    pub fn get(&self, tier: ComplexityTier) -> usize {
        match tier {
            ComplexityTier::Low => self.low,
            ComplexityTier::Medium => self.medium,
            ComplexityTier::High => self.high,
            ComplexityTier::Critical => self.critical,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationSummary {
    pub issue_count: usize,
    pub total_cost: f64,
    pub average_cost: f64,
    pub complexity_breakdown: TierCounts,
}

impl EstimationSummary {
    pub fn from_results(results: &[EstimationResult]) -> Self {
        let mut complexity_breakdown = TierCounts::default();
        let mut total_cost = 0.0;
        for result in results {
            total_cost += result.estimated_cost;
            complexity_breakdown.record(result.complexity);
        }

        let average_cost = if results.is_empty() {
            0.0
        } else {
            total_cost / results.len() as f64
        };

        Self {
            issue_count: results.len(),
            total_cost,
            average_cost,
            complexity_breakdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(number: u64, tier: ComplexityTier, cost: f64) -> EstimationResult {
        EstimationResult {
            issue_number: number,
            title: format!("Issue {}", number),
            complexity: tier,
            estimated_cost: cost,
            reasoning: String::new(),
            labels: vec![],
            url: String::new(),
        }
    }

    #[test]
    fn test_tier_parse_is_strict() {
        assert_eq!(ComplexityTier::parse(" High "), Some(ComplexityTier::High));
        assert_eq!(ComplexityTier::parse("CRITICAL"), Some(ComplexityTier::Critical));
        assert_eq!(ComplexityTier::parse("trivial"), None);
        assert_eq!(ComplexityTier::parse(""), None);
    }

    #[test]
    fn test_summary_totals_and_breakdown() {
        let results = vec![
            result(1, ComplexityTier::Low, 150.5),
            result(2, ComplexityTier::High, 700.25),
            result(3, ComplexityTier::Low, 200.0),
        ];
        let summary = EstimationSummary::from_results(&results);

        let expected_total = 150.5 + 700.25 + 200.0;
        assert_eq!(summary.total_cost, expected_total);
        assert_eq!(summary.average_cost, expected_total / 3.0);
        assert_eq!(summary.issue_count, 3);
        assert_eq!(summary.complexity_breakdown.low, 2);
        assert_eq!(summary.complexity_breakdown.get(ComplexityTier::High), 1);
        assert_eq!(summary.complexity_breakdown.critical, 0);
    }

    #[test]
    fn test_empty_summary_has_zero_average() {
        let summary = EstimationSummary::from_results(&[]);
        assert_eq!(summary.average_cost, 0.0);
        assert_eq!(summary.total_cost, 0.0);
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let json = serde_json::to_value(result(9, ComplexityTier::Medium, 400.0)).unwrap();
        assert_eq!(json["issueNumber"], 9);
        assert_eq!(json["complexity"], "medium");
        assert_eq!(json["estimatedCost"], 400.0);
    }
}
