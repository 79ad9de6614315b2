//! Fixed-window rate limit admission.

use std::sync::Arc;
use tracing::debug;

use super::identity::ClientId;
use super::store::CounterStore;
use super::Rejection;
use crate::config::RateLimitPolicy;

/// Successful pre-check outcome: the observed count and window bounds.
///
/// Threaded through the pipeline to settlement so header values reflect the
/// state at admission time.
#[derive(Debug, Clone, Copy)]
pub struct Allowance {
    pub count: u64,
    pub limit: u64,
    pub reset_at_ms: i64,
}

/// Quota metadata attached to every response as headers.
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub limit: u64,
    pub remaining: u64,
    pub reset_epoch_secs: i64,
}

/// Pre-execution rate gate and post-execution settlement.
pub struct RateLimiter {
    store: Arc<CounterStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<CounterStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Check the client's window, counting this request.
    ///
    /// The counter is incremented before the threshold comparison, so the
    /// request that first exceeds the limit is itself counted and rejected.
    /// Two concurrent requests can therefore never both claim the last slot.
    pub fn check(&self, identity: &ClientId) -> Result<Allowance, Rejection> {
        let record = self.store.observe(identity, self.policy.window_ms);

        if record.count > self.policy.max_requests {
            let now = self.store.now_ms();
            let retry_after_secs = ceil_secs(record.reset_at_ms - now);
            debug!(
                client = %identity,
                count = record.count,
                limit = self.policy.max_requests,
                "Rate limit exceeded"
            );
            return Err(Rejection::RateLimit {
                limit: self.policy.max_requests,
                reset_at_ms: record.reset_at_ms,
                retry_after_secs,
            });
        }

        Ok(Allowance {
            count: record.count,
            limit: self.policy.max_requests,
            reset_at_ms: record.reset_at_ms,
        })
    }

    /// Settle an admitted request once its outcome is known.
    ///
    /// Applies the skip-policy refund and returns the quota triple. Header
    /// values are computed from the admission-time count; the refund only
    /// affects later windows.
    pub fn settle(&self, identity: &ClientId, allowance: &Allowance, had_errors: bool) -> Quota {
        let quota = Quota {
            limit: allowance.limit,
            remaining: allowance.limit.saturating_sub(allowance.count),
            reset_epoch_secs: ceil_secs(allowance.reset_at_ms),
        };

        let refund = (self.policy.skip_successful && !had_errors)
            || (self.policy.skip_failed && had_errors);
        if refund {
            self.store.adjust(identity, -1);
            debug!(client = %identity, had_errors, "Refunded window counter");
        }

        quota
    }

    /// Quota headers for a request that never reached the rate gate.
    ///
    /// Non-mutating. A client with no live record reports a full window.
    pub fn quota_snapshot(&self, identity: &ClientId) -> Quota {
        match self.store.peek(identity) {
            Some(record) => Quota {
                limit: self.policy.max_requests,
                remaining: self.policy.max_requests.saturating_sub(record.count),
                reset_epoch_secs: ceil_secs(record.reset_at_ms),
            },
            None => Quota {
                limit: self.policy.max_requests,
                remaining: self.policy.max_requests,
                reset_epoch_secs: ceil_secs(self.store.now_ms()),
            },
        }
    }
}

/// Millisecond timestamp or interval to whole seconds, rounding up.
fn ceil_secs(ms: i64) -> i64 {
    if ms <= 0 {
        0
    } else {
        (ms + 999) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::clock::ManualClock;
    use axum::http::{HeaderMap, HeaderValue};

    fn limiter(window_ms: u64, max_requests: u64) -> (RateLimiter, Arc<ManualClock>) {
        limiter_with(RateLimitPolicy {
            window_ms,
            max_requests,
            skip_successful: false,
            skip_failed: false,
        })
    }

    fn limiter_with(policy: RateLimitPolicy) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(0));
        let store = Arc::new(CounterStore::new(clock.clone()));
        (RateLimiter::new(store, policy), clock)
    }

    fn client(ip: &str) -> ClientId {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
        ClientId::derive(None, &headers)
    }

    #[test]
    fn test_three_allowed_then_fourth_rejected() {
        let (limiter, _) = limiter(60_000, 3);
        let id = client("1.2.3.4");

        for expected_remaining in [2, 1, 0] {
            let allowance = limiter.check(&id).expect("within limit");
            let quota = limiter.settle(&id, &allowance, false);
            assert_eq!(quota.limit, 3);
            assert_eq!(quota.remaining, expected_remaining);
        }

        let rejection = limiter.check(&id).unwrap_err();
        match rejection {
            Rejection::RateLimit {
                limit,
                retry_after_secs,
                ..
            } => {
                assert_eq!(limit, 3);
                assert!(retry_after_secs > 0 && retry_after_secs <= 60);
            }
            other => panic!("expected rate limit rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_window_elapse_resets_to_one() {
        let (limiter, clock) = limiter(1_000, 2);
        let id = client("1.2.3.4");

        limiter.check(&id).unwrap();
        limiter.check(&id).unwrap();
        assert!(limiter.check(&id).is_err());

        clock.advance(1_000);
        let allowance = limiter.check(&id).expect("fresh window");
        assert_eq!(allowance.count, 1);
    }

    #[test]
    fn test_skip_successful_refunds_counter() {
        let (limiter, _) = limiter_with(RateLimitPolicy {
            window_ms: 60_000,
            max_requests: 10,
            skip_successful: true,
            skip_failed: false,
        });
        let id = client("1.2.3.4");

        let allowance = limiter.check(&id).unwrap();
        limiter.settle(&id, &allowance, false);
        // Increment and refund cancel out.
        assert_eq!(limiter.quota_snapshot(&id).remaining, 10);

        // A failed request under the same policy keeps its increment.
        let allowance = limiter.check(&id).unwrap();
        limiter.settle(&id, &allowance, true);
        assert_eq!(limiter.quota_snapshot(&id).remaining, 9);
    }

    #[test]
    fn test_skip_failed_refunds_only_failures() {
        let (limiter, _) = limiter_with(RateLimitPolicy {
            window_ms: 60_000,
            max_requests: 10,
            skip_successful: false,
            skip_failed: true,
        });
        let id = client("1.2.3.4");

        let allowance = limiter.check(&id).unwrap();
        limiter.settle(&id, &allowance, true);
        assert_eq!(limiter.quota_snapshot(&id).remaining, 10);

        let allowance = limiter.check(&id).unwrap();
        limiter.settle(&id, &allowance, false);
        assert_eq!(limiter.quota_snapshot(&id).remaining, 9);
    }

    #[test]
    fn test_counter_strictly_increases_without_skips() {
        let (limiter, _) = limiter(60_000, 10);
        let id = client("1.2.3.4");

        for expected in 1..=3 {
            let allowance = limiter.check(&id).unwrap();
            limiter.settle(&id, &allowance, false);
            assert_eq!(allowance.count, expected);
        }
    }

    #[test]
    fn test_settle_headers_reflect_admission_count() {
        let (limiter, _) = limiter_with(RateLimitPolicy {
            window_ms: 60_000,
            max_requests: 5,
            skip_successful: true,
            skip_failed: false,
        });
        let id = client("1.2.3.4");

        let allowance = limiter.check(&id).unwrap();
        let quota = limiter.settle(&id, &allowance, false);
        // Remaining is computed before the refund lands.
        assert_eq!(quota.remaining, 4);
        assert_eq!(limiter.quota_snapshot(&id).remaining, 5);
    }

    #[test]
    fn test_snapshot_for_unseen_client_reports_full_window() {
        let (limiter, _) = limiter(60_000, 7);
        let quota = limiter.quota_snapshot(&client("9.9.9.9"));
        assert_eq!(quota.limit, 7);
        assert_eq!(quota.remaining, 7);
    }

    #[test]
    fn test_reset_seconds_round_up() {
        assert_eq!(ceil_secs(0), 0);
        assert_eq!(ceil_secs(1), 1);
        assert_eq!(ceil_secs(1_000), 1);
        assert_eq!(ceil_secs(59_001), 60);
        assert_eq!(ceil_secs(-5), 0);
    }
}
