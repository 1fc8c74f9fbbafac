use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::rate_limit::window::{Window, WindowKind, WindowPolicy};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub daily: WindowPolicy,
    pub short_term: WindowPolicy,
    pub sweep_interval: std::time::Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            daily: WindowPolicy::new(100, Duration::hours(24)),
            short_term: WindowPolicy::new(10, Duration::minutes(5)),
            sweep_interval: std::time::Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Allow(Quota),
    Deny(Denial),
}

/// Remaining allowance after an admitted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub daily_remaining: u32,
    pub short_term_remaining: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denial {
    pub retry_after: u64,
    pub window: WindowKind,
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindows {
    daily: Window,
    short_term: Window,
}

/// Per-client admission control over a long and a short window.
///
/// Each client key owns one map entry; `admit` mutates it while holding
/// that entry's shard lock, so calls for the same key are serialized and
/// calls for unrelated keys proceed independently.
#[derive(Clone)]
pub struct RateLimiter {
    clients: Arc<DashMap<String, ClientWindows>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            clients: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn admit(&self, client_key: &str, now: DateTime<Utc>) -> Admission {
        let daily = self.config.daily;
        let short_term = self.config.short_term;

        let mut entry = self
            .clients
            .entry(client_key.to_string())
            .or_insert_with(|| ClientWindows {
                daily: Window::open(now, daily.horizon),
                short_term: Window::open(now, short_term.horizon),
            });
        let windows = entry.value_mut();

        windows.daily.refresh(now, daily.horizon);
        windows.short_term.refresh(now, short_term.horizon);

        if windows.daily.is_exhausted(daily.ceiling) {
            return Admission::Deny(Denial {
                retry_after: windows.daily.retry_after(now),
                window: WindowKind::Daily,
                limit: daily.ceiling,
                reset_at: windows.daily.reset_at,
            });
        }

        if windows.short_term.is_exhausted(short_term.ceiling) {
            return Admission::Deny(Denial {
                retry_after: windows.short_term.retry_after(now),
                window: WindowKind::ShortTerm,
                limit: short_term.ceiling,
                reset_at: windows.short_term.reset_at,
            });
        }

        windows.daily.count += 1;
        windows.short_term.count += 1;

        Admission::Allow(Quota {
            daily_remaining: windows.daily.remaining(daily.ceiling),
            short_term_remaining: windows.short_term.remaining(short_term.ceiling),
        })
    }

    /// Remaining allowance for a key at `now` without counting a call.
    /// Expired windows report their full ceiling; unknown keys report both ceilings.
    pub fn snapshot(&self, client_key: &str, now: DateTime<Utc>) -> Quota {
        let daily = self.config.daily;
        let short_term = self.config.short_term;

        let Some(mut windows) = self.clients.get(client_key).map(|entry| *entry.value()) else {
            return Quota {
                daily_remaining: daily.ceiling,
                short_term_remaining: short_term.ceiling,
            };
        };
        windows.daily.refresh(now, daily.horizon);
        windows.short_term.refresh(now, short_term.horizon);

        Quota {
            daily_remaining: windows.daily.remaining(daily.ceiling),
            short_term_remaining: windows.short_term.remaining(short_term.ceiling),
        }
    }

    #[cfg(test)]
    fn windows(&self, client_key: &str) -> Option<(Window, Window)> {
        self.clients
            .get(client_key)
            .map(|entry| (entry.daily, entry.short_term))
    }

    /// Drops clients whose windows have both expired. Returns how many were removed.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, windows| !(windows.daily.is_expired(now) && windows.short_term.is_expired(now)));
        let removed = before.saturating_sub(self.clients.len());
        if removed > 0 {
            tracing::debug!("Rate limiter sweep removed {} idle clients", removed);
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    /// Spawns the periodic memory-reclamation sweep.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let limiter = self.clone();
        let period = self.config.sweep_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep(Utc::now());
            }
        })
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
