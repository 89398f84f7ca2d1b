//! Size and shape statistics.

use std::collections::HashMap;

use log::debug;
use num_bigint::BigUint;

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::leaf::Leaf;
use crate::node::Node;
use crate::reference::NodeId;

/// Value already computed for `child` of `parent`. In a topological order it
/// is missing only when `child` lies on a cycle through `parent`.
fn computed<'a, T>(memo: &'a HashMap<NodeId, T>, parent: NodeId, child: NodeId) -> Result<&'a T> {
    memo.get(&child).ok_or_else(|| {
        Error::MalformedGraph(format!("cycle through {} and its child {}", parent, child))
    })
}

impl Circuit {
    /// Length (in edges) of the longest path from `root` down to a leaf.
    ///
    /// A cycle reachable from `root` is a [`MalformedGraph`][Error::MalformedGraph] error.
    pub fn height(&self, root: NodeId) -> Result<usize> {
        debug!("height(root = {})", root);
        self.check(root)?;
        let mut heights: HashMap<NodeId, usize> = HashMap::new();
        for id in self.topological_order(root) {
            let mut h = 0;
            for &c in self.children(id) {
                h = h.max(computed(&heights, id, c)? + 1);
            }
            heights.insert(id, h);
        }
        Ok(heights.get(&root).copied().unwrap_or(0))
    }

    /// Number of edges between nodes reachable from `root`. An edge used by
    /// several parents is counted once per parent.
    pub fn num_edges(&self, root: NodeId) -> usize {
        self.topological_order(root).iter().map(|&id| self.children(id).len()).sum()
    }

    /// Number of free parameters: one per sum weight, one per multinomial
    /// probability, and two (mean and deviation) per Gaussian.
    pub fn num_parameters(&self, root: NodeId) -> usize {
        self.topological_order(root)
            .iter()
            .map(|&id| match self.node(id) {
                Node::Sum { weights, .. } => weights.len(),
                Node::Product { .. } => 0,
                Node::Leaf(Leaf::Multinomial(m)) => m.pr().len(),
                Node::Leaf(Leaf::Gaussian(_)) => 2,
                Node::Leaf(Leaf::Indicator(_)) => 0,
            })
            .sum()
    }

    /// Number of induced trees of the circuit: the sub-circuits obtained by
    /// keeping exactly one child of every sum and all children of every product.
    ///
    /// This is the number of mixture components the circuit represents, and
    /// grows exponentially with depth, hence the arbitrary-precision result.
    /// A cycle reachable from `root` is a [`MalformedGraph`][Error::MalformedGraph] error.
    pub fn count_induced_trees(&self, root: NodeId) -> Result<BigUint> {
        debug!("count_induced_trees(root = {})", root);
        self.check(root)?;
        let mut cache: HashMap<NodeId, BigUint> = HashMap::new();
        for id in self.topological_order(root) {
            let counts = self
                .children(id)
                .iter()
                .map(|&c| computed(&cache, id, c))
                .collect::<Result<Vec<&BigUint>>>()?;
            let count = match self.node(id) {
                Node::Leaf(_) => BigUint::from(1u32),
                Node::Sum { .. } => counts.into_iter().sum(),
                Node::Product { .. } => counts.into_iter().product(),
            };
            cache.insert(id, count);
        }
        let count = cache.remove(&root).unwrap_or(BigUint::ZERO);
        debug!("count_induced_trees(root = {}) -> {}", root, count);
        Ok(count)
    }
}
