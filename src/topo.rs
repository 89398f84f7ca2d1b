//! Topological ordering of the nodes reachable from a root.
//!
//! Every evaluation pass runs over an order produced here: children before
//! parents, the root last, each reachable node exactly once. The traversal
//! keeps an explicit stack, so deep circuits cannot overflow the call stack.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::circuit::Circuit;
use crate::reference::NodeId;

impl Circuit {
    /// Nodes reachable from `root` in dependency order: every child precedes
    /// all of its parents, and `root` comes last.
    pub fn topological_order(&self, root: NodeId) -> Vec<NodeId> {
        debug!("topological_order(root = {})", root);
        self.topological_order_with(root, |_| true)
    }

    /// Same traversal as [`topological_order`][Self::topological_order], calling
    /// `f` on each node as it is emitted.
    ///
    /// As soon as `f` returns `false` the traversal halts and the nodes emitted so
    /// far (including the one just passed to `f`) are returned.
    pub fn topological_order_with<F>(&self, root: NodeId, mut f: F) -> Vec<NodeId>
    where
        F: FnMut(NodeId) -> bool,
    {
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }

        let mut visited = HashSet::new();
        // (node, index of the next child to descend into)
        let mut stack = vec![(root, 0usize)];
        visited.insert(root);

        while let Some((node, next)) = stack.last_mut() {
            let node = *node;
            let children = self.children(node);
            if let Some(&child) = children.get(*next) {
                *next += 1;
                if visited.insert(child) {
                    stack.push((child, 0));
                }
                continue;
            }
            stack.pop();
            order.push(node);
            if !f(node) {
                debug!("topological_order halted at {} after {} nodes", node, order.len());
                break;
            }
        }

        order
    }

    /// A depth-first listing that emits a node once none of its children are
    /// still unseen.
    ///
    /// Cheaper bookkeeping than [`topological_order`][Self::topological_order],
    /// but a node may be emitted before a child that was first reached through a
    /// different parent, so the result is **not** guaranteed to be topological.
    pub fn dfs_order(&self, root: NodeId) -> Vec<NodeId> {
        debug!("dfs_order(root = {})", root);
        let mut order = Vec::new();
        if !self.contains(root) {
            return order;
        }

        let mut visited = HashSet::new();
        let mut stack = vec![root];
        visited.insert(root);

        while let Some(node) = stack.pop() {
            let unseen: Vec<NodeId> = self
                .children(node)
                .iter()
                .copied()
                .filter(|c| !visited.contains(c))
                .collect();
            if unseen.is_empty() {
                order.push(node);
            } else {
                stack.push(node);
                for c in unseen {
                    if visited.insert(c) {
                        stack.push(c);
                    }
                }
            }
        }

        order
    }
}

/// Position of every node within `order`.
pub(crate) fn positions(order: &[NodeId]) -> HashMap<NodeId, usize> {
    order.iter().enumerate().map(|(i, &n)| (n, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn assert_topological(c: &Circuit, order: &[NodeId]) {
        let pos = positions(order);
        for &p in order {
            for c in c.children(p) {
                assert!(pos[c] < pos[&p], "{} must precede {}", c, p);
            }
        }
    }

    #[test]
    fn test_children_first_root_last() {
        let mut c = Circuit::new();
        let x = c.add_indicator(0, 0);
        let y = c.add_indicator(1, 0);
        let p = c.add_product();
        c.add_child(p, x).unwrap();
        c.add_child(p, y).unwrap();
        let s = c.add_sum();
        c.add_weighted_child(s, p, 1.0).unwrap();

        let order = c.topological_order(s);
        assert_eq!(order.len(), 4);
        assert_eq!(order.last(), Some(&s));
        assert_topological(&c, &order);
    }

    #[test]
    fn test_shared_node_once() {
        // R -> [B, A], A -> [B]: B is reached twice, and A must wait for it.
        let mut c = Circuit::new();
        let b = c.add_indicator(0, 0);
        let a = c.add_product();
        c.add_child(a, b).unwrap();
        let r = c.add_product();
        c.add_child(r, b).unwrap();
        c.add_child(r, a).unwrap();

        let order = c.topological_order(r);
        assert_eq!(order, vec![b, a, r]);
    }

    #[test]
    fn test_unreachable_nodes_skipped() {
        let mut c = Circuit::new();
        let x = c.add_indicator(0, 0);
        let _orphan = c.add_indicator(1, 0);
        let p = c.add_product();
        c.add_child(p, x).unwrap();
        assert_eq!(c.topological_order(p), vec![x, p]);
        assert_eq!(c.topological_order(x), vec![x]);
        assert!(c.topological_order(NodeId::new(99)).is_empty());
    }

    #[test]
    fn test_order_with_halts() {
        let mut c = Circuit::new();
        let leaves: Vec<_> = (0..4).map(|i| c.add_indicator(i, 0)).collect();
        let p = c.add_product();
        for &l in &leaves {
            c.add_child(p, l).unwrap();
        }

        let mut seen = 0;
        let prefix = c.topological_order_with(p, |_| {
            seen += 1;
            seen < 2
        });
        assert_eq!(prefix, vec![leaves[0], leaves[1]]);
        assert_eq!(seen, 2);
    }

    #[test]
    fn test_dfs_order_covers_reachable() {
        let mut c = Circuit::new();
        let x = c.add_indicator(0, 0);
        let y = c.add_indicator(1, 0);
        let p = c.add_product();
        c.add_child(p, x).unwrap();
        c.add_child(p, y).unwrap();
        let order = c.dfs_order(p);
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&p));
        let set: HashSet<_> = order.into_iter().collect();
        assert!(set.contains(&x) && set.contains(&y));
    }
}
