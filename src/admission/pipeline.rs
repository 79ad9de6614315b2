//! The ordered admission pipeline.

use tracing::debug;

use super::cost::CostEstimator;
use super::depth::DepthGuard;
use super::identity::ClientId;
use super::limiter::{Allowance, Quota, RateLimiter};
use super::selection::OperationSelection;
use super::Rejection;
use crate::config::AnalysisConfig;

/// The admission record for one operation.
///
/// Carries what each gate computed, threaded explicitly from pre-check to
/// settlement rather than stashed on a request context.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    pub depth: u32,
    pub cost: u64,
    pub allowance: Allowance,
}

/// Runs the three gates in order: depth, cost, rate.
///
/// Stages are sequential and short-circuiting; a rejection at any stage
/// skips the rest and skips resolver execution entirely. Only the rate
/// stage participates in the response path, via [`settle`].
///
/// [`settle`]: AdmissionPipeline::settle
pub struct AdmissionPipeline {
    guard: DepthGuard,
    estimator: CostEstimator,
    limiter: RateLimiter,
}

impl AdmissionPipeline {
    pub fn new(analysis: AnalysisConfig, limiter: RateLimiter) -> Self {
        Self {
            guard: DepthGuard::new(analysis.max_depth),
            estimator: CostEstimator::new(analysis.budget),
            limiter,
        }
    }

    /// Run all gates against a parsed operation.
    pub fn pre_check(
        &self,
        operations: &[OperationSelection],
        identity: &ClientId,
    ) -> Result<Admission, Rejection> {
        let depth = self.guard.check(operations)?;
        let cost = self.estimator.estimate(operations)?;
        let allowance = self.limiter.check(identity)?;

        debug!(
            client = %identity,
            depth,
            cost,
            count = allowance.count,
            "Operation admitted"
        );

        Ok(Admission {
            depth,
            cost,
            allowance,
        })
    }

    /// Settle an admitted operation once execution finished.
    pub fn settle(&self, identity: &ClientId, admission: &Admission, had_errors: bool) -> Quota {
        self.limiter.settle(identity, &admission.allowance, had_errors)
    }

    /// Quota headers for operations that never reached the rate gate.
    pub fn quota_snapshot(&self, identity: &ClientId) -> Quota {
        self.limiter.quota_snapshot(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admission::clock::ManualClock;
    use crate::admission::selection::SelectionNode;
    use crate::admission::store::CounterStore;
    use crate::config::{CostBudget, RateLimitPolicy};
    use axum::http::{HeaderMap, HeaderValue};
    use std::sync::Arc;

    fn pipeline(max_depth: u32, max_complexity: u64, max_requests: u64) -> AdmissionPipeline {
        let store = Arc::new(CounterStore::new(Arc::new(ManualClock::new(0))));
        let limiter = RateLimiter::new(
            store,
            RateLimitPolicy {
                window_ms: 60_000,
                max_requests,
                skip_successful: false,
                skip_failed: false,
            },
        );
        let analysis = AnalysisConfig {
            max_depth,
            budget: CostBudget {
                scalar_cost: 1,
                object_cost: 1,
                list_factor: 10,
                introspection_cost: 1000,
                max_complexity,
            },
        };
        AdmissionPipeline::new(analysis, limiter)
    }

    fn client() -> ClientId {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("1.2.3.4"));
        ClientId::derive(None, &headers)
    }

    fn shallow_op() -> Vec<OperationSelection> {
        vec![OperationSelection {
            name: None,
            roots: vec![SelectionNode::new("me")
                .with_children(vec![SelectionNode::new("id")])],
        }]
    }

    fn deep_expensive_op(levels: u32) -> Vec<OperationSelection> {
        let mut node = SelectionNode::new("leaf").with_weight(10_000);
        for _ in 1..levels {
            node = SelectionNode::new("nest").with_children(vec![node]);
        }
        vec![OperationSelection {
            name: None,
            roots: vec![node],
        }]
    }

    #[test]
    fn test_admitted_operation_carries_all_stage_results() {
        let pipeline = pipeline(5, 100, 10);
        let admission = pipeline.pre_check(&shallow_op(), &client()).unwrap();

        assert_eq!(admission.depth, 2);
        assert_eq!(admission.cost, 2);
        assert_eq!(admission.allowance.count, 1);

        let quota = pipeline.settle(&client(), &admission, false);
        assert_eq!(quota.remaining, 9);
    }

    #[test]
    fn test_depth_rejection_precedes_cost_and_skips_rate() {
        let pipeline = pipeline(3, 10, 10);
        // Violates both the depth and the cost limit; depth gate runs first.
        let err = pipeline
            .pre_check(&deep_expensive_op(6), &client())
            .unwrap_err();
        assert!(matches!(err, Rejection::Depth { .. }));

        // The rate gate never observed the client.
        assert_eq!(pipeline.quota_snapshot(&client()).remaining, 10);
    }

    #[test]
    fn test_cost_rejection_skips_rate() {
        let pipeline = pipeline(10, 10, 10);
        let err = pipeline
            .pre_check(&deep_expensive_op(2), &client())
            .unwrap_err();
        assert!(matches!(err, Rejection::Complexity { .. }));
        assert_eq!(pipeline.quota_snapshot(&client()).remaining, 10);
    }

    #[test]
    fn test_rate_rejection_after_clean_analysis() {
        let pipeline = pipeline(5, 100, 1);
        let id = client();

        pipeline.pre_check(&shallow_op(), &id).unwrap();
        let err = pipeline.pre_check(&shallow_op(), &id).unwrap_err();
        assert!(matches!(err, Rejection::RateLimit { .. }));
    }
}
