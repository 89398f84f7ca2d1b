//! Structural invariants of a circuit.
//!
//! A circuit computes a valid distribution only when it is:
//!
//! - **decomposable**: the children of every product have pairwise disjoint scopes;
//! - **complete**: the children of every sum (with non-leaf children) share one scope;
//! - **acyclic**.
//!
//! Construction does not enforce these, since a circuit is usually built
//! top-down and is incomplete most of the time. Call [`Circuit::validate`] once
//! the circuit is finished.

use std::collections::HashSet;

use log::{debug, warn};

use crate::circuit::Circuit;
use crate::error::{Error, Result};
use crate::node::Node;
use crate::reference::NodeId;
use crate::search::Visit;
use crate::types::Var;

impl Circuit {
    fn parity_violation(&self, root: NodeId) -> Option<String> {
        self.descendants(root).into_iter().find_map(|id| match self.node(id) {
            Node::Sum { children, weights } if children.len() != weights.len() => Some(format!(
                "sum {} has {} children but {} weights",
                id,
                children.len(),
                weights.len()
            )),
            _ => None,
        })
    }

    fn decomposability_violation(&self, root: NodeId) -> Option<String> {
        for id in self.descendants(root) {
            if !self.node(id).is_product() {
                continue;
            }
            let mut seen: HashSet<Var> = HashSet::new();
            for &c in self.children(id) {
                for &v in self.scope(c) {
                    if !seen.insert(v) {
                        return Some(format!("product {} is not decomposable: {} appears in more than one child", id, v));
                    }
                }
            }
        }
        None
    }

    fn completeness_violation(&self, root: NodeId) -> Option<String> {
        for id in self.descendants(root) {
            let Node::Sum { children, .. } = self.node(id) else {
                continue;
            };
            if children.iter().all(|&c| self.node(c).is_leaf()) {
                continue;
            }
            let Some((&first, rest)) = children.split_first() else {
                continue;
            };
            if let Some(&c) = rest.iter().find(|&&c| self.scope(c) != self.scope(first)) {
                return Some(format!(
                    "sum {} is not complete: scope of {} differs from scope of {}",
                    id, c, first
                ));
            }
        }
        None
    }

    /// `true` if every reachable sum has as many weights as children.
    ///
    /// The construction API cannot break this; the check exists for circuits
    /// coming from untrusted sources.
    pub fn check_parity(&self, root: NodeId) -> bool {
        self.parity_violation(root).is_none()
    }

    /// `true` if every reachable product has children with pairwise disjoint scopes.
    pub fn is_decomposable(&self, root: NodeId) -> bool {
        debug!("is_decomposable(root = {})", root);
        self.decomposability_violation(root).is_none()
    }

    /// `true` if every reachable sum with at least one non-leaf child has
    /// children sharing a single scope.
    pub fn is_complete(&self, root: NodeId) -> bool {
        debug!("is_complete(root = {})", root);
        self.completeness_violation(root).is_none()
    }

    /// A cycle reachable from `root`, as the list of nodes along it (the first
    /// node is a child of the last), or `None` if the reachable part is acyclic.
    pub fn find_cycle(&self, root: NodeId) -> Option<Vec<NodeId>> {
        debug!("find_cycle(root = {})", root);
        if !self.contains(root) {
            return None;
        }

        // Nodes on the current DFS path, with their next-child cursor.
        let mut path: Vec<(NodeId, usize)> = vec![(root, 0)];
        let mut on_path: HashSet<NodeId> = HashSet::from([root]);
        let mut done: HashSet<NodeId> = HashSet::new();

        while let Some((node, next)) = path.last_mut() {
            let node = *node;
            if let Some(&child) = self.children(node).get(*next) {
                *next += 1;
                if on_path.contains(&child) {
                    let start = path.iter().position(|&(n, _)| n == child).unwrap_or(0);
                    return Some(path[start..].iter().map(|&(n, _)| n).collect());
                }
                if !done.contains(&child) {
                    on_path.insert(child);
                    path.push((child, 0));
                }
                continue;
            }
            path.pop();
            on_path.remove(&node);
            done.insert(node);
        }

        None
    }

    /// Check every structural invariant of the circuit rooted at `root`,
    /// reporting the first violation as [`Error::MalformedGraph`].
    pub fn validate(&self, root: NodeId) -> Result<()> {
        debug!("validate(root = {})", root);
        self.check(root)?;
        if let Some(cycle) = self.find_cycle(root) {
            let path: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
            return Err(Error::MalformedGraph(format!("cycle {}", path.join(" -> "))));
        }
        let violation = self
            .parity_violation(root)
            .or_else(|| self.decomposability_violation(root))
            .or_else(|| self.completeness_violation(root));
        match violation {
            Some(msg) => Err(Error::MalformedGraph(msg)),
            None => Ok(()),
        }
    }

    /// Rescale the weights of every sum reachable from `root` so they sum to one.
    ///
    /// Sums whose weights have no mass are left untouched.
    pub fn normalize(&mut self, root: NodeId) {
        debug!("normalize(root = {})", root);
        let mut sums = Vec::new();
        self.breadth_first(root, |id| {
            if self.node(id).is_sum() {
                sums.push(id);
            }
            Visit::Continue
        });
        for id in sums {
            if let Ok(w) = self.weights_mut(id) {
                if !crate::utils::normalize(w) {
                    warn!("cannot normalize weights of {}: total mass is zero", id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    fn mixture() -> (Circuit, NodeId) {
        let mut c = Circuit::new();
        let a0 = c.add_multinomial(0, vec![0.2, 0.8]);
        let b0 = c.add_multinomial(1, vec![0.5, 0.5]);
        let a1 = c.add_multinomial(0, vec![0.9, 0.1]);
        let b1 = c.add_multinomial(1, vec![0.3, 0.7]);
        let p0 = c.add_product();
        c.add_child(p0, a0).unwrap();
        c.add_child(p0, b0).unwrap();
        let p1 = c.add_product();
        c.add_child(p1, a1).unwrap();
        c.add_child(p1, b1).unwrap();
        let s = c.add_sum();
        c.add_weighted_child(s, p0, 2.0).unwrap();
        c.add_weighted_child(s, p1, 6.0).unwrap();
        (c, s)
    }

    #[test]
    fn test_valid_mixture() {
        let (c, s) = mixture();
        assert!(c.check_parity(s));
        assert!(c.is_decomposable(s));
        assert!(c.is_complete(s));
        assert!(c.find_cycle(s).is_none());
        c.validate(s).unwrap();
    }

    #[test]
    fn test_not_decomposable() {
        let mut c = Circuit::new();
        let a = c.add_indicator(0, 0);
        let b = c.add_indicator(0, 1);
        let p = c.add_product();
        c.add_child(p, a).unwrap();
        c.add_child(p, b).unwrap();
        assert!(!c.is_decomposable(p));
        assert!(matches!(c.validate(p), Err(Error::MalformedGraph(msg)) if msg.contains("decomposable")));
    }

    #[test]
    fn test_not_complete() {
        let mut c = Circuit::new();
        let a = c.add_indicator(0, 0);
        let b = c.add_indicator(1, 0);
        let p = c.add_product();
        c.add_child(p, a).unwrap();
        let q = c.add_product();
        c.add_child(q, b).unwrap();
        let s = c.add_sum();
        c.add_weighted_child(s, p, 0.5).unwrap();
        c.add_weighted_child(s, q, 0.5).unwrap();
        assert!(!c.is_complete(s));
        assert!(matches!(c.validate(s), Err(Error::MalformedGraph(msg)) if msg.contains("complete")));
    }

    #[test]
    fn test_sum_over_leaves_is_exempt() {
        let mut c = Circuit::new();
        let a = c.add_indicator(0, 0);
        let b = c.add_indicator(1, 0);
        let s = c.add_sum();
        c.add_weighted_child(s, a, 0.5).unwrap();
        c.add_weighted_child(s, b, 0.5).unwrap();
        assert!(c.is_complete(s));
    }

    #[test]
    fn test_find_cycle() {
        let mut c = Circuit::new();
        let p = c.add_product();
        let q = c.add_product();
        let r = c.add_product();
        c.add_child(p, q).unwrap();
        c.add_child(q, r).unwrap();
        assert!(c.find_cycle(p).is_none());
        c.add_child(r, q).unwrap();
        assert_eq!(c.find_cycle(p), Some(vec![q, r]));
        assert!(matches!(c.validate(p), Err(Error::MalformedGraph(msg)) if msg.starts_with("cycle")));
    }

    #[test]
    fn test_validate_unknown_root() {
        let c = Circuit::new();
        assert!(matches!(c.validate(NodeId::new(0)), Err(Error::MalformedGraph(_))));
    }

    #[test]
    fn test_normalize() {
        let (mut c, s) = mixture();
        c.normalize(s);
        assert_eq!(c.weights(s).unwrap(), &[0.25, 0.75]);

        let mut z = Circuit::new();
        let x = z.add_indicator(0, 0);
        let t = z.add_sum();
        z.add_weighted_child(t, x, 0.0).unwrap();
        z.normalize(t);
        assert_eq!(z.weights(t).unwrap(), &[0.0]);
    }
}
