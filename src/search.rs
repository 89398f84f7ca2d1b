//! Predicate-driven graph traversal.

use std::collections::{HashSet, VecDeque};

use log::debug;

use crate::circuit::Circuit;
use crate::node::NodeKind;
use crate::reference::NodeId;

/// What a traversal should do after visiting a node.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Visit {
    /// Keep going, descending into the node's children.
    Continue,
    /// Keep going, but do not descend into this node's children.
    Skip,
    /// End the traversal immediately.
    Stop,
}

/// Reachable node counts by kind.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct NodeCounts {
    pub sums: usize,
    pub products: usize,
    pub leaves: usize,
}

impl NodeCounts {
    pub fn total(&self) -> usize {
        self.sums + self.products + self.leaves
    }
}

/// Frontier of a traversal: FIFO for breadth-first, LIFO for depth-first.
enum Frontier {
    Queue(VecDeque<NodeId>),
    Stack(Vec<NodeId>),
}

impl Frontier {
    fn give(&mut self, id: NodeId) {
        match self {
            Frontier::Queue(q) => q.push_back(id),
            Frontier::Stack(s) => s.push(id),
        }
    }

    fn take(&mut self) -> Option<NodeId> {
        match self {
            Frontier::Queue(q) => q.pop_front(),
            Frontier::Stack(s) => s.pop(),
        }
    }
}

impl Circuit {
    fn search<F>(&self, root: NodeId, mut frontier: Frontier, mut f: F)
    where
        F: FnMut(NodeId) -> Visit,
    {
        if !self.contains(root) {
            return;
        }
        let mut visited = HashSet::new();
        visited.insert(root);
        frontier.give(root);

        while let Some(id) = frontier.take() {
            match f(id) {
                Visit::Stop => return,
                Visit::Skip => continue,
                Visit::Continue => {}
            }
            for &c in self.children(id) {
                if visited.insert(c) {
                    frontier.give(c);
                }
            }
        }
    }

    /// Visit every node reachable from `root` once, level by level.
    pub fn breadth_first<F>(&self, root: NodeId, f: F)
    where
        F: FnMut(NodeId) -> Visit,
    {
        debug!("breadth_first(root = {})", root);
        self.search(root, Frontier::Queue(VecDeque::new()), f)
    }

    /// Visit every node reachable from `root` once, most recently discovered first.
    pub fn depth_first<F>(&self, root: NodeId, f: F)
    where
        F: FnMut(NodeId) -> Visit,
    {
        debug!("depth_first(root = {})", root);
        self.search(root, Frontier::Stack(Vec::new()), f)
    }

    /// Nodes reachable from `root` in breadth-first order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut nodes = Vec::new();
        self.breadth_first(root, |id| {
            nodes.push(id);
            Visit::Continue
        });
        nodes
    }

    pub fn count_nodes(&self, root: NodeId) -> NodeCounts {
        debug!("count_nodes(root = {})", root);
        let mut counts = NodeCounts::default();
        self.breadth_first(root, |id| {
            match self.kind(id) {
                NodeKind::Sum => counts.sums += 1,
                NodeKind::Product => counts.products += 1,
                NodeKind::Leaf => counts.leaves += 1,
            }
            Visit::Continue
        });
        debug!("count_nodes(root = {}) -> {:?}", root, counts);
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    // s -> [p1, p2], p1 -> [x0, x1], p2 -> [x0, x2]
    fn diamond() -> (Circuit, NodeId) {
        let mut c = Circuit::new();
        let x0 = c.add_indicator(0, 0);
        let x1 = c.add_indicator(1, 0);
        let x2 = c.add_indicator(1, 1);
        let p1 = c.add_product();
        c.add_child(p1, x0).unwrap();
        c.add_child(p1, x1).unwrap();
        let p2 = c.add_product();
        c.add_child(p2, x0).unwrap();
        c.add_child(p2, x2).unwrap();
        let s = c.add_sum();
        c.add_weighted_child(s, p1, 0.5).unwrap();
        c.add_weighted_child(s, p2, 0.5).unwrap();
        (c, s)
    }

    #[test]
    fn test_count_nodes() {
        let (c, s) = diamond();
        let counts = c.count_nodes(s);
        assert_eq!(counts, NodeCounts { sums: 1, products: 2, leaves: 3 });
        assert_eq!(counts.total(), 6);
    }

    #[test]
    fn test_breadth_first_levels() {
        let (c, s) = diamond();
        let order = c.descendants(s);
        assert_eq!(order[0], s);
        assert_eq!(&order[1..3], c.children(s));
        assert_eq!(order.len(), 6);
    }

    #[test]
    fn test_stop_and_skip() {
        let (c, s) = diamond();

        let mut n = 0;
        c.breadth_first(s, |_| {
            n += 1;
            if n == 2 {
                Visit::Stop
            } else {
                Visit::Continue
            }
        });
        assert_eq!(n, 2);

        // Skipping every product hides all leaves.
        let mut seen = Vec::new();
        c.depth_first(s, |id| {
            seen.push(id);
            if c.kind(id) == NodeKind::Product {
                Visit::Skip
            } else {
                Visit::Continue
            }
        });
        assert_eq!(seen.len(), 3);
        assert!(seen.iter().all(|&id| c.kind(id) != NodeKind::Leaf));
    }
}
