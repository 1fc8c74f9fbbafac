use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Which of a client's two windows made the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WindowKind {
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "short-term")]
    ShortTerm,
}

impl WindowKind {
    /// Value used in the `X-RateLimit-Window` response header.
    pub fn header_value(&self) -> &'static str {
        match self {
            WindowKind::Daily => "daily",
            WindowKind::ShortTerm => "short",
        }
    }
}

impl std::fmt::Display for WindowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowKind::Daily => write!(f, "daily"),
            WindowKind::ShortTerm => write!(f, "short-term"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WindowPolicy {
    pub ceiling: u32,
    pub horizon: Duration,
}

impl WindowPolicy {
    pub fn new(ceiling: u32, horizon: Duration) -> Self {
        Self { ceiling, horizon }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub count: u32,
    pub reset_at: DateTime<Utc>,
}

impl Window {
    pub fn open(now: DateTime<Utc>, horizon: Duration) -> Self {
        Self {
            count: 0,
            reset_at: now + horizon,
        }
    }

    /// Lazily restarts the window once `reset_at` has passed.
    pub fn refresh(&mut self, now: DateTime<Utc>, horizon: Duration) {
        if self.reset_at < now {
            *self = Self::open(now, horizon);
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.reset_at < now
    }

    pub fn is_exhausted(&self, ceiling: u32) -> bool {
        self.count >= ceiling
    }

    pub fn remaining(&self, ceiling: u32) -> u32 {
        ceiling.saturating_sub(self.count)
    }

    /// Whole seconds until reset, rounded up.
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let millis = (self.reset_at - now).num_milliseconds().max(0) as u64;
        millis.div_ceil(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_refresh_only_after_reset_passes() {
        let horizon = Duration::minutes(5);
        let mut window = Window::open(t0(), horizon);
        window.count = 7;

        window.refresh(t0() + Duration::minutes(5), horizon);
        assert_eq!(window.count, 7);

        window.refresh(t0() + Duration::seconds(301), horizon);
        assert_eq!(window.count, 0);
        assert_eq!(window.reset_at, t0() + Duration::seconds(301) + horizon);
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let window = Window::open(t0(), Duration::minutes(5));
        assert_eq!(window.retry_after(t0()), 300);
        assert_eq!(window.retry_after(t0() + Duration::milliseconds(500)), 300);
        assert_eq!(window.retry_after(t0() + Duration::seconds(299)), 1);
        assert_eq!(window.retry_after(t0() + Duration::seconds(400)), 0);
    }

    #[test]
    fn test_kind_serializes_with_wire_names() {
        assert_eq!(serde_json::to_string(&WindowKind::ShortTerm).unwrap(), "\"short-term\"");
        assert_eq!(WindowKind::ShortTerm.header_value(), "short");
        assert_eq!(WindowKind::Daily.to_string(), "daily");
    }
}
