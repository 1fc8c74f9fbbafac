use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::ComplexityTier;

/// Cumulative share of the overall budget at each tier boundary.
const TIER_BREAKPOINTS: [f64; 5] = [0.0, 0.25, 0.60, 0.85, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: f64,
    pub max: f64,
}

impl BudgetRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, cost: f64) -> bool {
        cost >= self.min && cost <= self.max
    }

    pub fn clamp(&self, cost: f64) -> f64 {
        cost.clamp(self.min, self.max)
    }
}

impl std::fmt::Display for BudgetRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}-${}", self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierRanges {
    pub low: BudgetRange,
    pub medium: BudgetRange,
    pub high: BudgetRange,
    pub critical: BudgetRange,
}

impl TierRanges {
    /// Splits `overall` into four contiguous sub-ranges, boundaries rounded to whole dollars.
    pub fn derive(overall: BudgetRange) -> Self {
        let span = overall.max - overall.min;
        let bounds: Vec<f64> = TIER_BREAKPOINTS
            .iter()
            .map(|share| (overall.min + span * share).round())
            .collect();

        Self {
            low: BudgetRange::new(bounds[0], bounds[1]),
            medium: BudgetRange::new(bounds[1], bounds[2]),
            high: BudgetRange::new(bounds[2], bounds[3]),
            critical: BudgetRange::new(bounds[3], bounds[4]),
        }
    }

    pub fn get(&self, tier: ComplexityTier) -> BudgetRange {
        match tier {
            ComplexityTier::Low => self.low,
            ComplexityTier::Medium => self.medium,
            ComplexityTier::High => self.high,
            ComplexityTier::Critical => self.critical,
        }
    }

    fn get_mut(&mut self, tier: ComplexityTier) -> &mut BudgetRange {
        match tier {
            ComplexityTier::Low => &mut self.low,
            ComplexityTier::Medium => &mut self.medium,
            ComplexityTier::High => &mut self.high,
            ComplexityTier::Critical => &mut self.critical,
        }
    }
}

/// Server-wide defaults, loaded from configuration.
#[derive(Debug, Clone)]
pub struct EstimationDefaults {
    pub model: String,
    pub min_budget: f64,
    pub max_budget: f64,
}

impl Default for EstimationDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            min_budget: 100.0,
            max_budget: 1000.0,
        }
    }
}

/// Caller-supplied values; any field left out falls back to the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimationOverrides {
    pub model: Option<String>,
    pub min_budget: Option<f64>,
    pub max_budget: Option<f64>,
    pub low_min: Option<f64>,
    pub low_max: Option<f64>,
    pub medium_min: Option<f64>,
    pub medium_max: Option<f64>,
    pub high_min: Option<f64>,
    pub high_max: Option<f64>,
    pub critical_min: Option<f64>,
    pub critical_max: Option<f64>,
}

impl EstimationOverrides {
    fn tier_bounds(&self, tier: ComplexityTier) -> (Option<f64>, Option<f64>) {
        match tier {
            ComplexityTier::Low => (self.low_min, self.low_max),
            ComplexityTier::Medium => (self.medium_min, self.medium_max),
            ComplexityTier::High => (self.high_min, self.high_max),
            ComplexityTier::Critical => (self.critical_min, self.critical_max),
        }
    }
}

/// Fully-resolved parameters; nothing downstream consults defaults again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationParams {
    pub model: String,
    pub budget: BudgetRange,
    pub ranges: TierRanges,
}

impl EstimationParams {
    pub fn resolve(defaults: &EstimationDefaults, overrides: &EstimationOverrides) -> Result<Self> {
        let model = overrides
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&defaults.model)
            .to_string();

        let budget = BudgetRange::new(
            overrides.min_budget.unwrap_or(defaults.min_budget),
            overrides.max_budget.unwrap_or(defaults.max_budget),
        );
        validate_range("budget", budget)?;

        let mut ranges = TierRanges::derive(budget);
        for tier in ComplexityTier::ALL {
            let (min, max) = overrides.tier_bounds(tier);
            let range = ranges.get_mut(tier);
            if let Some(min) = min {
                range.min = min;
            }
            if let Some(max) = max {
                range.max = max;
            }
            validate_range(tier.as_str(), *range)?;
        }

        Ok(Self {
            model,
            budget,
            ranges,
        })
    }
}

fn validate_range(name: &str, range: BudgetRange) -> Result<()> {
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(Error::InvalidInput(format!("{} range must be finite", name)));
    }
    if range.min < 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} minimum must not be negative (got {})",
            name, range.min
        )));
    }
    if range.min > range.max {
        return Err(Error::InvalidInput(format!(
            "{} minimum ({}) exceeds maximum ({})",
            name, range.min, range.max
        )));
    }
    Ok(())
}
