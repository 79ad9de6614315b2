//! Query cost estimation.

use tracing::debug;

use super::selection::{OperationSelection, SelectionNode};
use super::Rejection;
use crate::config::CostBudget;

/// Estimates a numeric cost for an operation and rejects it over budget.
#[derive(Debug, Clone, Copy)]
pub struct CostEstimator {
    budget: CostBudget,
}

impl CostEstimator {
    pub fn new(budget: CostBudget) -> Self {
        Self { budget }
    }

    /// Estimate the cost of the operations and enforce the ceiling.
    ///
    /// Multi-operation documents are judged by their most expensive
    /// operation, since only one of them will execute.
    pub fn estimate(&self, operations: &[OperationSelection]) -> Result<u64, Rejection> {
        let cost = operations
            .iter()
            .map(|operation| self.tree_cost(&operation.roots))
            .max()
            .unwrap_or(0);

        if cost > self.budget.max_complexity {
            return Err(Rejection::Complexity {
                limit: self.budget.max_complexity,
                actual: cost,
            });
        }

        debug!(cost, limit = self.budget.max_complexity, "Estimated query cost");
        Ok(cost)
    }

    fn tree_cost(&self, nodes: &[SelectionNode]) -> u64 {
        nodes
            .iter()
            .fold(0u64, |total, node| total.saturating_add(self.node_cost(node)))
    }

    /// Cost of one field and its subtree.
    ///
    /// Introspection fields carry a flat weight without descending; their
    /// cost models schema scraping, not selection shape. A list field's
    /// subtree is multiplied by the statically-known size when a sizing
    /// argument provides one, else by the configured fan-out factor; the
    /// multiplier stands in for the field's own object cost. Arithmetic
    /// saturates so adversarial weights cannot overflow.
    fn node_cost(&self, node: &SelectionNode) -> u64 {
        if node.name.starts_with("__") {
            return node.weight.unwrap_or(self.budget.introspection_cost);
        }

        if node.is_leaf() {
            return node.weight.unwrap_or(self.budget.scalar_cost);
        }

        let children = self.tree_cost(&node.children);
        if node.list {
            let factor = node.list_size.unwrap_or(self.budget.list_factor);
            node.weight
                .unwrap_or(0)
                .saturating_add(children.saturating_mul(factor))
        } else {
            node.weight
                .unwrap_or(self.budget.object_cost)
                .saturating_add(children)
        }
    }
}
