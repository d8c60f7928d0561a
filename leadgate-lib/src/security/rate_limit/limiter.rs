//! Sliding-window admission decisions.
//!
//! The limiter resolves one question per request: has this client used up
//! its ceiling for this endpoint inside the trailing window. Every request
//! carries its endpoint's own rule, so one limiter instance serves all
//! endpoint classes.

use std::sync::Arc;
use std::time::Duration;

use super::window::RateWindowStore;
use crate::clock::Clock;
use crate::config::RateRule;

/// Result of a rate admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateDecision {
    /// Request is admitted and its timestamp recorded.
    Admitted {
        /// Ceiling for this endpoint's window
        limit: u32,
        /// Admissions left in the current window, this one included
        remaining: u32,
        /// Time until the oldest counted admission leaves the window
        reset_after: Duration,
    },
    /// Request is refused; nothing was recorded.
    Limited {
        /// Ceiling for this endpoint's window
        limit: u32,
        /// Whole seconds until a retry can succeed, at least one
        retry_after: Duration,
        /// Time until the oldest counted admission leaves the window
        reset_after: Duration,
    },
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admitted { .. })
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, RateDecision::Limited { .. })
    }

    pub fn limit(&self) -> u32 {
        match self {
            RateDecision::Admitted { limit, .. } => *limit,
            RateDecision::Limited { limit, .. } => *limit,
        }
    }

    /// Admissions left in the window; zero when limited.
    pub fn remaining(&self) -> u32 {
        match self {
            RateDecision::Admitted { remaining, .. } => *remaining,
            RateDecision::Limited { .. } => 0,
        }
    }

    pub fn reset_after(&self) -> Duration {
        match self {
            RateDecision::Admitted { reset_after, .. } => *reset_after,
            RateDecision::Limited { reset_after, .. } => *reset_after,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RateDecision::Limited { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }
}

/// Per-client, per-endpoint sliding-window limiter.
///
/// Counts live in the injected [`RateWindowStore`]. With the in-memory
/// store each process enforces its own ceiling, so behind N replicas a
/// client can reach up to N times the configured limit; a deployment that
/// needs one global ceiling must inject a store backed by shared state.
pub struct SlidingWindowLimiter {
    store: Arc<dyn RateWindowStore>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    pub fn new(store: Arc<dyn RateWindowStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Decide admission for `client` on the endpoint scope `scope`.
    ///
    /// Scope and client combine into the bucket key, so one client's usage
    /// of different endpoints never shares a window even when the endpoints
    /// share a rule.
    pub fn admit(&self, scope: &str, client: &str, rule: RateRule) -> RateDecision {
        let key = format!("{scope}:{client}");
        self.store.admit(&key, rule, self.clock.now())
    }

    /// Number of live buckets in the backing store.
    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::security::rate_limit::InMemoryRateStore;

    fn limiter() -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter =
            SlidingWindowLimiter::new(Arc::new(InMemoryRateStore::new()), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn scopes_do_not_share_windows() {
        let (limiter, _clock) = limiter();
        let rule = RateRule { max_requests: 1, window_secs: 60 };

        assert!(limiter.admit("newsletter", "1.2.3.4", rule).is_admitted());
        assert!(limiter.admit("newsletter", "1.2.3.4", rule).is_limited());
        // same client, different endpoint: fresh window
        assert!(limiter.admit("contact", "1.2.3.4", rule).is_admitted());
    }

    #[test]
    fn window_slides_with_the_clock() {
        let (limiter, clock) = limiter();
        let rule = RateRule { max_requests: 2, window_secs: 10 };

        assert!(limiter.admit("contact", "c", rule).is_admitted());
        clock.advance(Duration::from_secs(6));
        assert!(limiter.admit("contact", "c", rule).is_admitted());
        assert!(limiter.admit("contact", "c", rule).is_limited());

        // first stamp expires at +10s; the second still counts
        clock.advance(Duration::from_secs(4));
        assert!(limiter.admit("contact", "c", rule).is_admitted());
        assert!(limiter.admit("contact", "c", rule).is_limited());
    }

    #[test]
    fn tracked_keys_reports_bucket_count() {
        let (limiter, _clock) = limiter();
        let rule = RateRule { max_requests: 5, window_secs: 60 };

        limiter.admit("newsletter", "a", rule);
        limiter.admit("newsletter", "b", rule);
        assert_eq!(limiter.tracked_keys(), 2);
    }
}
