//! Core fixed-window rate limiter implementation.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use tracing::{trace, warn};

use crate::config::LimitConfig;

use super::store::{LimiterStore, StoreKey, WindowRecord};

/// The outcome of a single rate limit check.
///
/// Every check produces a decision; quota exhaustion is a result, not an
/// error, so callers branch on [`Decision::allowed`] rather than catching
/// anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// The admission ceiling for the window
    pub limit: u32,
    /// Admissions left in the window, never negative
    pub remaining: u32,
    /// Epoch milliseconds at which the window resets
    pub reset_at_ms: i64,
}

impl Decision {
    /// The window reset instant as a wall-clock timestamp.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.reset_at_ms).single()
    }

    /// Render the reset instant as an RFC 3339 timestamp for quota headers.
    pub fn reset_rfc3339(&self) -> String {
        self.reset_at()
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| self.reset_at_ms.to_string())
    }
}

/// A fixed-window rate limiter bound to one scope and one quota.
///
/// The limiter shares a process-wide [`LimiterStore`] with its siblings; the
/// scope namespaces its keys so limiters never interfere. Checks are
/// synchronous and never fail: a throttled caller gets a rejecting decision,
/// and a malformed or stale record is replaced with a fresh window.
pub struct RateLimiter {
    /// Key namespace for this limiter's records
    scope: String,
    /// Immutable quota for this limiter
    config: LimitConfig,
    /// Shared window record store
    store: Arc<LimiterStore>,
}

impl RateLimiter {
    /// Create a limiter over a shared store.
    pub fn new(scope: impl Into<String>, config: LimitConfig, store: Arc<LimiterStore>) -> Self {
        Self {
            scope: scope.into(),
            config,
            store,
        }
    }

    /// Check the quota for a caller at the current wall-clock time.
    pub fn check(&self, identifier: &str) -> Decision {
        self.check_at(identifier, Utc::now().timestamp_millis())
    }

    /// Check the quota for a caller at an explicit time.
    ///
    /// The first request from a caller, or the first after the previous
    /// window has passed, opens a fresh window with a count of one. Within a
    /// live window requests are counted up to the ceiling and rejected past
    /// it without further mutation, so rejected traffic never extends the
    /// window.
    pub fn check_at(&self, identifier: &str, now_ms: i64) -> Decision {
        let key = StoreKey::new(&self.scope, identifier);
        let max_requests = self.config.max_requests;

        let decision = self.store.with_record(&key, |slot| {
            match slot {
                Some(record) if !record.is_expired(now_ms) => {
                    if record.count >= max_requests {
                        if record.count > max_requests {
                            // Only reachable if the quota was lowered while
                            // records were live; treat as at-limit.
                            warn!(
                                key = %key,
                                count = record.count,
                                limit = max_requests,
                                "Window count exceeds configured ceiling"
                            );
                        }
                        Decision {
                            allowed: false,
                            limit: max_requests,
                            remaining: 0,
                            reset_at_ms: record.window_end_ms,
                        }
                    } else {
                        record.count += 1;
                        Decision {
                            allowed: true,
                            limit: max_requests,
                            remaining: max_requests.saturating_sub(record.count),
                            reset_at_ms: record.window_end_ms,
                        }
                    }
                }
                _ => {
                    let window_end_ms = now_ms + self.config.window_ms;
                    *slot = Some(WindowRecord {
                        count: 1,
                        window_end_ms,
                    });
                    Decision {
                        allowed: true,
                        limit: max_requests,
                        remaining: max_requests.saturating_sub(1),
                        reset_at_ms: window_end_ms,
                    }
                }
            }
        });

        trace!(
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit checked"
        );

        decision
    }

    /// The key namespace for this limiter.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The quota this limiter enforces.
    pub fn config(&self) -> LimitConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    const WINDOW_MS: i64 = 900_000;
    const T0: i64 = 1_700_000_000_000;

    fn limiter(max_requests: u32) -> RateLimiter {
        RateLimiter::new(
            "api",
            LimitConfig {
                window_ms: WINDOW_MS,
                max_requests,
            },
            Arc::new(LimiterStore::new()),
        )
    }

    #[test]
    fn test_first_check_opens_window() {
        let limiter = limiter(10);
        let decision = limiter.check_at("203.0.113.5", T0);

        assert!(decision.allowed);
        assert_eq!(decision.limit, 10);
        assert_eq!(decision.remaining, 9);
        assert_eq!(decision.reset_at_ms, T0 + WINDOW_MS);
    }

    #[test]
    fn test_ceiling_rejects_excess() {
        let limiter = limiter(10);

        for i in 0..10 {
            let decision = limiter.check_at("203.0.113.5", T0);
            assert!(decision.allowed);
            assert_eq!(decision.remaining, 10 - (i + 1));
        }

        // The 11th check within the window is rejected.
        let decision = limiter.check_at("203.0.113.5", T0 + 1_000);
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert_eq!(decision.reset_at_ms, T0 + WINDOW_MS);
    }

    #[test]
    fn test_reset_time_stable_within_window() {
        let limiter = limiter(10);
        let first = limiter.check_at("203.0.113.5", T0);
        let later = limiter.check_at("203.0.113.5", T0 + 60_000);

        assert_eq!(first.reset_at_ms, later.reset_at_ms);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let limiter = limiter(2);
        limiter.check_at("203.0.113.5", T0);
        limiter.check_at("203.0.113.5", T0);

        // Exactly at the window end the old window still applies.
        let at_end = limiter.check_at("203.0.113.5", T0 + WINDOW_MS);
        assert!(!at_end.allowed);

        // One millisecond past it a fresh window opens.
        let past_end = limiter.check_at("203.0.113.5", T0 + WINDOW_MS + 1);
        assert!(past_end.allowed);
        assert_eq!(past_end.remaining, 1);
        assert_eq!(past_end.reset_at_ms, T0 + WINDOW_MS + 1 + WINDOW_MS);
    }

    #[test]
    fn test_rejections_do_not_extend_window() {
        let limiter = limiter(1);
        limiter.check_at("203.0.113.5", T0);

        // Hammer the limiter with rejected requests for the whole window.
        for i in 1..10 {
            let decision = limiter.check_at("203.0.113.5", T0 + i * 60_000);
            assert!(!decision.allowed);
        }

        let fresh = limiter.check_at("203.0.113.5", T0 + WINDOW_MS + 1);
        assert!(fresh.allowed);
    }

    #[test]
    fn test_identifiers_have_independent_quota() {
        let limiter = limiter(10);

        for _ in 0..10 {
            limiter.check_at("203.0.113.5", T0);
        }
        assert!(!limiter.check_at("203.0.113.5", T0).allowed);

        let other = limiter.check_at("198.51.100.7", T0);
        assert!(other.allowed);
        assert_eq!(other.remaining, 9);
    }

    #[test]
    fn test_scopes_share_store_without_interference() {
        let store = Arc::new(LimiterStore::new());
        let config = LimitConfig {
            window_ms: WINDOW_MS,
            max_requests: 1,
        };
        let api = RateLimiter::new("api", config, Arc::clone(&store));
        let auth = RateLimiter::new("auth", config, Arc::clone(&store));

        assert!(api.check_at("203.0.113.5", T0).allowed);
        assert!(!api.check_at("203.0.113.5", T0).allowed);

        // The same caller under another scope has untouched quota.
        assert!(auth.check_at("203.0.113.5", T0).allowed);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remaining_never_negative() {
        let limiter = limiter(3);
        for i in 0..20 {
            let decision = limiter.check_at("203.0.113.5", T0 + i);
            assert!(decision.remaining <= 3);
        }
    }

    #[test]
    fn test_concurrent_checks_never_over_admit() {
        let limiter = Arc::new(limiter(50));
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        if limiter.check_at("203.0.113.5", T0).allowed {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // 200 attempts, exactly the ceiling admitted.
        assert_eq!(admitted.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn test_reset_rfc3339_rendering() {
        let decision = Decision {
            allowed: true,
            limit: 10,
            remaining: 9,
            reset_at_ms: 0,
        };
        assert_eq!(decision.reset_rfc3339(), "1970-01-01T00:00:00.000Z");
    }
}
