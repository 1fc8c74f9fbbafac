use crate::error::{Error, Result};
use crate::estimation::{EstimationDefaults, DEFAULT_GROUP_SIZE};
use crate::rate_limit::{RateLimitConfig, WindowPolicy};
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub openai_api_key: String,
    pub openai_base_url: Option<String>,
    pub github_token: Option<String>,
    pub default_model: String,
    pub default_min_budget: f64,
    pub default_max_budget: f64,
    pub batch_size: usize,
    pub enrich_concurrency: usize,
    pub daily_limit: u32,
    pub short_limit: u32,
    pub short_window_secs: i64,
    pub bind_addr: String,
    pub database_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| Error::Config("OPENAI_API_KEY environment variable not set".to_string()))?;

        let openai_base_url = non_empty_var("OPENAI_BASE_URL");
        let github_token = non_empty_var("GITHUB_TOKEN");
        if github_token.is_none() {
            tracing::warn!("GITHUB_TOKEN not set; GitHub requests are unauthenticated");
        }

        let default_model = non_empty_var("DEFAULT_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let database_path = env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "estimates.db".to_string());

        let config = Self {
            openai_api_key,
            openai_base_url,
            github_token,
            default_model,
            default_min_budget: parse_var("DEFAULT_MIN_BUDGET", 100.0)?,
            default_max_budget: parse_var("DEFAULT_MAX_BUDGET", 1000.0)?,
            batch_size: parse_var("BATCH_SIZE", DEFAULT_GROUP_SIZE)?,
            enrich_concurrency: parse_var("ENRICH_CONCURRENCY", 5)?,
            daily_limit: parse_var("DAILY_LIMIT", 100)?,
            short_limit: parse_var("SHORT_LIMIT", 10)?,
            short_window_secs: parse_var("SHORT_WINDOW_SECS", 300)?,
            bind_addr,
            database_path,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("BATCH_SIZE must be at least 1".to_string()));
        }
        if self.short_window_secs <= 0 {
            return Err(Error::Config("SHORT_WINDOW_SECS must be positive".to_string()));
        }
        if self.default_min_budget < 0.0 || self.default_min_budget > self.default_max_budget {
            return Err(Error::Config(format!(
                "Invalid default budget range {}-{}",
                self.default_min_budget, self.default_max_budget
            )));
        }
        Ok(())
    }

    pub fn estimation_defaults(&self) -> EstimationDefaults {
        EstimationDefaults {
            model: self.default_model.clone(),
            min_budget: self.default_min_budget,
            max_budget: self.default_max_budget,
        }
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        let defaults = RateLimitConfig::default();
        RateLimitConfig {
            daily: WindowPolicy::new(self.daily_limit, defaults.daily.horizon),
            short_term: WindowPolicy::new(
                self.short_limit,
                chrono::Duration::seconds(self.short_window_secs),
            ),
            sweep_interval: defaults.sweep_interval,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Unset falls back to `default`; set but unparseable is an error.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} has an invalid value: {}", name, raw))),
    }
}
