#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Sliding-window rate limiting keyed by an arbitrary string (usually a
//! client IP).
//!
//! Each key owns a queue of accepted attempt instants behind its own mutex,
//! so callers on different keys never contend and the check-then-record
//! step for one key is atomic. Rejected attempts are not recorded.
//!
//! Memory is bounded by [`RateLimiter::cleanup`], which the host calls on a
//! schedule. Cleanup may run concurrently with checks: an entry it removes
//! is marked retired under its own lock, and a check that finds a retired
//! entry looks the key up again.

pub mod clock;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

/// Default number of attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Errors returned by [`RateLimiter::check_and_record`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// The key used up its attempts for the current window.
    #[error("Too many attempts, retry in {}s", retry_after.as_secs())]
    Limited {
        /// Time until the oldest counted attempt leaves the window.
        retry_after: Duration,
    },
}

/// How many attempts a key gets, and over how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Attempts allowed within one window.
    pub max_attempts: usize,
    /// Length of the trailing window.
    pub window: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window: DEFAULT_WINDOW,
        }
    }
}

#[derive(Default)]
struct Entry {
    attempts: VecDeque<Instant>,
    retired: bool,
}

impl Entry {
    /// Drops attempts older than `window`. Returns whether any remain.
    fn prune(&mut self, now: Instant, window: Duration) -> bool {
        while self
            .attempts
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > window)
        {
            self.attempts.pop_front();
        }
        !self.attempts.is_empty()
    }
}

/// Per-key sliding-window attempt counter.
pub struct RateLimiter {
    policy: RateLimitPolicy,
    clock: Arc<dyn Clock>,
    entries: RwLock<BTreeMap<String, Arc<Mutex<Entry>>>>,
}

impl RateLimiter {
    /// A limiter on the system clock.
    #[must_use]
    pub fn new(policy: RateLimitPolicy) -> Self {
        Self::with_clock(policy, Arc::new(SystemClock))
    }

    /// A limiter reading time from `clock`.
    #[must_use]
    pub fn with_clock(policy: RateLimitPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            policy,
            clock,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// The policy this limiter enforces.
    #[must_use]
    pub const fn policy(&self) -> RateLimitPolicy {
        self.policy
    }

    fn entry(&self, key: &str) -> Arc<Mutex<Entry>> {
        if let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return entry.clone();
        }
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_default()
            .clone()
    }

    /// Counts an attempt for `key` if the window still has room.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Limited`] if `key` already has
    /// `max_attempts` attempts in the window. The rejected attempt is not
    /// recorded.
    pub fn check_and_record(&self, key: &str) -> Result<(), RateLimitError> {
        loop {
            let entry = self.entry(key);
            let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
            if entry.retired {
                continue;
            }

            let now = self.clock.now();
            entry.prune(now, self.policy.window);

            if entry.attempts.len() >= self.policy.max_attempts {
                let retry_after = entry.attempts.front().map_or(self.policy.window, |oldest| {
                    (*oldest + self.policy.window).saturating_duration_since(now)
                });
                log::warn!(
                    "Rate limit exceeded for '{key}' ({} attempts), retry in {}s",
                    entry.attempts.len(),
                    retry_after.as_secs()
                );
                return Err(RateLimitError::Limited { retry_after });
            }

            entry.attempts.push_back(now);
            log::debug!(
                "Rate limit attempt {}/{} for '{key}'",
                entry.attempts.len(),
                self.policy.max_attempts
            );
            return Ok(());
        }
    }

    /// Attempts currently counted against `key`.
    #[must_use]
    pub fn attempts(&self, key: &str) -> usize {
        let Some(entry) = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
        else {
            return 0;
        };
        let now = self.clock.now();
        let entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
        entry
            .attempts
            .iter()
            .filter(|t| now.saturating_duration_since(**t) <= self.policy.window)
            .count()
    }

    /// Forgets every attempt recorded for `key`. Returns whether the key
    /// was tracked.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        let Some(entry) = removed else {
            return false;
        };
        entry.lock().unwrap_or_else(PoisonError::into_inner).retired = true;
        log::info!("Rate limit reset for '{key}'");
        true
    }

    /// Prunes expired attempts and drops keys left with none. Returns the
    /// number of keys dropped.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let window = self.policy.window;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();

        entries.retain(|_, entry| {
            let mut entry = entry.lock().unwrap_or_else(PoisonError::into_inner);
            let keep = entry.prune(now, window);
            if !keep {
                entry.retired = true;
            }
            keep
        });

        let removed = before - entries.len();
        if removed > 0 {
            log::info!(
                "Rate limit cleanup removed {removed} idle key(s), {} remaining",
                entries.len()
            );
        }
        removed
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::clock::ManualClock;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(RateLimitPolicy::default(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn allows_five_then_rejects_the_sixth() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.check_and_record("10.0.0.1").unwrap();
        }
        assert_eq!(
            limiter.check_and_record("10.0.0.1"),
            Err(RateLimitError::Limited {
                retry_after: DEFAULT_WINDOW
            })
        );
        assert_eq!(limiter.attempts("10.0.0.1"), 5);
    }

    #[test]
    fn keys_are_counted_independently() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.check_and_record("a").unwrap();
        }
        assert!(limiter.check_and_record("a").is_err());
        assert!(limiter.check_and_record("b").is_ok());
    }

    #[test]
    fn window_expiry_frees_the_key() {
        let (limiter, clock) = limiter();
        for _ in 0..5 {
            limiter.check_and_record("k").unwrap();
        }

        clock.advance(DEFAULT_WINDOW);
        assert!(limiter.check_and_record("k").is_err());

        clock.advance(Duration::from_secs(1));
        assert!(limiter.check_and_record("k").is_ok());
        assert_eq!(limiter.attempts("k"), 1);
    }

    #[test]
    fn retry_after_tracks_the_oldest_attempt() {
        let (limiter, clock) = limiter();
        limiter.check_and_record("k").unwrap();
        clock.advance(Duration::from_secs(600));
        for _ in 0..4 {
            limiter.check_and_record("k").unwrap();
        }
        assert_eq!(
            limiter.check_and_record("k"),
            Err(RateLimitError::Limited {
                retry_after: DEFAULT_WINDOW - Duration::from_secs(600)
            })
        );
    }

    #[test]
    fn cleanup_drops_only_idle_keys() {
        let (limiter, clock) = limiter();
        limiter.check_and_record("old").unwrap();
        clock.advance(Duration::from_secs(45 * 60));
        limiter.check_and_record("recent").unwrap();
        clock.advance(Duration::from_secs(20 * 60));

        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
        assert_eq!(limiter.attempts("old"), 0);
        assert_eq!(limiter.attempts("recent"), 1);
    }

    #[test]
    fn reset_clears_a_blocked_key() {
        let (limiter, _) = limiter();
        for _ in 0..5 {
            limiter.check_and_record("k").unwrap();
        }
        assert!(limiter.reset("k"));
        assert!(!limiter.reset("k"));
        assert!(limiter.check_and_record("k").is_ok());
    }

    #[test]
    fn concurrent_callers_never_exceed_the_maximum() {
        let limiter = RateLimiter::default();
        let allowed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..32 {
                scope.spawn(|| {
                    if limiter.check_and_record("shared").is_ok() {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(allowed.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn cleanup_racing_with_checks_keeps_counts_consistent() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            RateLimitPolicy {
                max_attempts: 1000,
                window: Duration::from_secs(60),
            },
            clock,
        );
        let allowed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        if limiter.check_and_record("shared").is_ok() {
                            allowed.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                });
            }
            scope.spawn(|| {
                for _ in 0..50 {
                    limiter.cleanup();
                }
            });
        });

        assert_eq!(allowed.load(Ordering::SeqCst), 400);
        assert_eq!(limiter.attempts("shared"), 400);
    }
}
