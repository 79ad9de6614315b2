//! Query depth limiting.

use super::selection::{OperationSelection, SelectionNode};
use super::Rejection;

/// Rejects operations whose field nesting exceeds a configured maximum.
#[derive(Debug, Clone, Copy)]
pub struct DepthGuard {
    max_depth: u32,
}

impl DepthGuard {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }

    /// Walk the selection trees tracking nesting depth.
    ///
    /// Aborts at the first field that lands beyond the limit rather than
    /// finishing the traversal, so pathological nesting costs no more than
    /// `max_depth` levels of work per path. Returns the maximum depth
    /// reached when within bounds.
    pub fn check(&self, operations: &[OperationSelection]) -> Result<u32, Rejection> {
        let mut deepest = 0;
        for operation in operations {
            deepest = deepest.max(self.walk(&operation.roots, 0)?);
        }
        Ok(deepest)
    }

    fn walk(&self, nodes: &[SelectionNode], depth: u32) -> Result<u32, Rejection> {
        let mut deepest = depth;
        for node in nodes {
            let here = depth + 1;
            if here > self.max_depth {
                return Err(Rejection::Depth {
                    limit: self.max_depth,
                    actual: here,
                });
            }
            deepest = deepest.max(self.walk(&node.children, here)?);
        }
        Ok(deepest)
    }
}
