//! Request admission control.
//!
//! Every operation passes three gates before any resolver runs: depth limit,
//! cost limit, then rate limit. A rejection at any gate skips the rest and
//! skips execution entirely. Only the rate gate has a post-execution step
//! (settlement), which applies skip-policy refunds and produces the quota
//! headers attached to every response.

mod clock;
mod cost;
mod depth;
mod identity;
mod limiter;
mod pipeline;
pub mod selection;
mod store;

pub use clock::{Clock, SystemClock};
#[cfg(test)]
pub use clock::ManualClock;
pub use cost::CostEstimator;
pub use depth::DepthGuard;
pub use identity::ClientId;
pub use limiter::{Allowance, Quota, RateLimiter};
pub use pipeline::{Admission, AdmissionPipeline};
pub use selection::{FieldCatalog, OperationSelection, SelectionNode};
pub use store::{CounterRecord, CounterStore, SweeperTask};

use serde_json::{json, Map, Value};
use thiserror::Error;

/// A typed admission rejection.
///
/// The first three variants are expected client-facing outcomes and carry
/// their numeric context verbatim. `Analysis` indicates an internal failure
/// while examining the operation; its detail is logged, never surfaced.
#[derive(Debug, Clone, Error)]
pub enum Rejection {
    #[error("Rate limit exceeded. Try again in {retry_after_secs} seconds.")]
    RateLimit {
        limit: u64,
        reset_at_ms: i64,
        retry_after_secs: i64,
    },

    #[error("Query depth limit of {limit} exceeded, actual depth is {actual}")]
    Depth { limit: u32, actual: u32 },

    #[error("Query complexity limit of {limit} exceeded, actual complexity is {actual}")]
    Complexity { limit: u64, actual: u64 },

    #[error("Query analysis failed")]
    Analysis { detail: String },
}

impl Rejection {
    /// Machine-readable code surfaced in the GraphQL error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::RateLimit { .. } => "RATE_LIMIT_EXCEEDED",
            Rejection::Depth { .. } => "QUERY_DEPTH_LIMIT_EXCEEDED",
            Rejection::Complexity { .. } => "QUERY_COMPLEXITY_LIMIT_EXCEEDED",
            Rejection::Analysis { .. } => "QUERY_ANALYSIS_ERROR",
        }
    }

    /// Extension payload for the GraphQL error response.
    pub fn extensions(&self) -> Map<String, Value> {
        let mut ext = Map::new();
        ext.insert("code".to_string(), json!(self.code()));

        match self {
            Rejection::RateLimit {
                limit,
                reset_at_ms,
                retry_after_secs,
            } => {
                ext.insert("rateLimitTotal".to_string(), json!(limit));
                ext.insert("rateLimitRemaining".to_string(), json!(0));
                ext.insert("rateLimitReset".to_string(), json!(reset_at_ms));
                ext.insert("retryAfterSeconds".to_string(), json!(retry_after_secs));
            }
            Rejection::Depth { limit, actual } => {
                ext.insert("maxDepth".to_string(), json!(limit));
                ext.insert("actualDepth".to_string(), json!(actual));
            }
            Rejection::Complexity { limit, actual } => {
                ext.insert("maxComplexity".to_string(), json!(limit));
                ext.insert("actualComplexity".to_string(), json!(actual));
            }
            // Internal detail stays out of the response.
            Rejection::Analysis { .. } => {}
        }

        ext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let r = Rejection::RateLimit {
            limit: 3,
            reset_at_ms: 60_000,
            retry_after_secs: 42,
        };
        assert_eq!(r.code(), "RATE_LIMIT_EXCEEDED");
        assert_eq!(
            Rejection::Depth { limit: 5, actual: 6 }.code(),
            "QUERY_DEPTH_LIMIT_EXCEEDED"
        );
        assert_eq!(
            Rejection::Complexity { limit: 50, actual: 60 }.code(),
            "QUERY_COMPLEXITY_LIMIT_EXCEEDED"
        );
    }

    #[test]
    fn test_analysis_detail_never_surfaces() {
        let r = Rejection::Analysis {
            detail: "fragment cycle via F".to_string(),
        };
        assert_eq!(r.to_string(), "Query analysis failed");
        let ext = r.extensions();
        assert_eq!(ext.len(), 1);
        assert_eq!(ext["code"], "QUERY_ANALYSIS_ERROR");
    }

    #[test]
    fn test_rate_limit_extensions_carry_context() {
        let r = Rejection::RateLimit {
            limit: 3,
            reset_at_ms: 61_000,
            retry_after_secs: 42,
        };
        let ext = r.extensions();
        assert_eq!(ext["rateLimitTotal"], 3);
        assert_eq!(ext["rateLimitRemaining"], 0);
        assert_eq!(ext["rateLimitReset"], 61_000);
        assert_eq!(ext["retryAfterSeconds"], 42);
    }
}
