//! Per-caller sliding-window rate limiting
//!
//! Each caller identity keeps the timestamps of its admitted requests within
//! the trailing window. Stale timestamps are dropped lazily on access and
//! by [`RateLimiter::prune`].

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Sliding-window request counter keyed by caller identity
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    windows: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter admitting `limit` requests per `window`
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject a request from `identity`.
    /// A rejected request leaves the caller's window unchanged.
    pub fn admit(&self, identity: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(window) = windows.get_mut(identity) {
            evict_expired(window, now, self.window);
            if window.len() >= self.limit {
                return false;
            }
            window.push_back(now);
            return true;
        }

        if self.limit == 0 {
            return false;
        }
        windows.insert(identity.to_string(), VecDeque::from([now]));
        true
    }

    /// Time until `identity` gets a free slot, zero if it has one now
    pub fn retry_after(&self, identity: &str) -> Duration {
        let now = Instant::now();
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(window) = windows.get(identity) else {
            return Duration::ZERO;
        };

        let live = window
            .iter()
            .filter(|at| now.duration_since(**at) < self.window)
            .count();
        if live < self.limit {
            return Duration::ZERO;
        }

        window
            .iter()
            .find(|at| now.duration_since(**at) < self.window)
            .map(|oldest| (*oldest + self.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Drop callers whose windows no longer hold any live request
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, window| {
            evict_expired(window, now, self.window);
            !window.is_empty()
        });
        before - windows.len()
    }

    /// Number of callers currently tracked
    pub fn len(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no callers are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn evict_expired(window: &mut VecDeque<Instant>, now: Instant, span: Duration) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= span {
            window.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn test_sixth_request_in_window_is_rejected() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(limiter.admit("10.0.0.1"));
            advance(Duration::from_secs(1)).await;
        }
        assert!(!limiter.admit("10.0.0.1"));

        // Other callers are independent
        assert!(limiter.admit("10.0.0.2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_resumes_after_window() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));

        assert!(limiter.admit("caller"));
        advance(Duration::from_secs(10)).await;
        for _ in 0..4 {
            assert!(limiter.admit("caller"));
        }
        assert!(!limiter.admit("caller"));
        assert_eq!(limiter.retry_after("caller"), Duration::from_secs(50));

        // 60s after the first request its slot frees up, and only that one
        advance(Duration::from_secs(50)).await;
        assert!(limiter.admit("caller"));
        assert!(!limiter.admit("caller"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejection_does_not_extend_window() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));

        assert!(limiter.admit("caller"));
        advance(Duration::from_secs(30)).await;
        assert!(!limiter.admit("caller"));
        advance(Duration::from_secs(30)).await;
        assert!(limiter.admit("caller"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_prune_drops_idle_callers() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.admit("a");
        advance(Duration::from_secs(30)).await;
        limiter.admit("b");
        assert_eq!(limiter.len(), 2);

        advance(Duration::from_secs(31)).await;
        assert_eq!(limiter.prune(), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.retry_after("b"), Duration::ZERO);
    }
}
