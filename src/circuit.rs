//! The circuit arena.
//!
//! All nodes of a circuit live in a single [`Circuit`], addressed by [`NodeId`].
//! A node with several parents is stored once and referenced by id from every
//! parent, so sharing costs nothing and ownership is never ambiguous.
//!
//! Besides its [`Node`], every arena slot keeps the node's parents (used only by
//! bottom-up bookkeeping) and its scope. Scopes are kept up to date eagerly:
//! attaching a child recomputes the parent's scope and pushes any change further
//! up through the parents, so [`Circuit::scope`] never returns a stale value.

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::ops::Index;

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::leaf::{Gaussian, Indicator, Leaf, Multinomial};
use crate::node::{Node, NodeKind};
use crate::reference::NodeId;
use crate::types::Var;

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    parents: Vec<NodeId>,
    /// Sorted, duplicate-free.
    scope: Vec<Var>,
}

/// Arena of circuit nodes.
#[derive(Clone, Default)]
pub struct Circuit {
    slots: Vec<Slot>,
}

impl Debug for Circuit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let count = |k: NodeKind| self.slots.iter().filter(|s| s.node.kind() == k).count();
        f.debug_struct("Circuit")
            .field("size", &self.slots.len())
            .field("sums", &count(NodeKind::Sum))
            .field("products", &count(NodeKind::Product))
            .field("leaves", &count(NodeKind::Leaf))
            .finish()
    }
}

impl Circuit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Number of nodes in the arena (reachable or not).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.slots.len()
    }

    /// All node ids in allocation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.slots.len() as u32).map(NodeId::new)
    }

    pub(crate) fn check(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::MalformedGraph(format!(
                "node {} does not exist (circuit has {} nodes)",
                id,
                self.slots.len()
            )))
        }
    }

    fn push(&mut self, node: Node) -> NodeId {
        let scope = match &node {
            Node::Leaf(leaf) => leaf.scope(),
            _ => Vec::new(),
        };
        let id = NodeId::new(self.slots.len() as u32);
        trace!("alloc {} as {}", id, node.kind());
        self.slots.push(Slot {
            node,
            parents: Vec::new(),
            scope,
        });
        id
    }

    pub fn add_sum(&mut self) -> NodeId {
        self.push(Node::sum())
    }

    pub fn add_product(&mut self) -> NodeId {
        self.push(Node::product())
    }

    pub fn add_leaf(&mut self, leaf: impl Into<Leaf>) -> NodeId {
        self.push(Node::Leaf(leaf.into()))
    }

    pub fn add_multinomial(&mut self, var: u32, pr: Vec<f64>) -> NodeId {
        self.add_leaf(Multinomial::new(Var::new(var), pr))
    }

    pub fn add_gaussian(&mut self, var: u32, mean: f64, sd: f64) -> NodeId {
        self.add_leaf(Gaussian::new(Var::new(var), mean, sd))
    }

    pub fn add_indicator(&mut self, var: u32, value: usize) -> NodeId {
        self.add_leaf(Indicator::new(Var::new(var), value))
    }

    fn check_edge(&self, parent: NodeId, child: NodeId) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        if parent == child {
            return Err(Error::MalformedGraph(format!("self-loop on {}", parent)));
        }
        Ok(())
    }

    /// Append `child` to the children of the product `parent`.
    ///
    /// Sum nodes need a weight for every child, so calling this on a sum is a
    /// [`MalformedGraph`][Error::MalformedGraph] error; use
    /// [`add_weighted_child`][Self::add_weighted_child] instead.
    ///
    /// No cycle detection happens here; see [`Circuit::validate`].
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        debug!("add_child(parent = {}, child = {})", parent, child);
        self.check_edge(parent, child)?;
        match &mut self.slots[parent.index()].node {
            Node::Product { children } => children.push(child),
            Node::Sum { .. } => {
                return Err(Error::MalformedGraph(format!(
                    "sum {} cannot take an unweighted child {}",
                    parent, child
                )))
            }
            Node::Leaf(_) => {
                return Err(Error::TypeMismatch {
                    node: parent,
                    expected: NodeKind::Product,
                    found: NodeKind::Leaf,
                })
            }
        }
        self.link(parent, child);
        Ok(())
    }

    /// Append `child` with edge weight `weight` to the sum `parent`.
    pub fn add_weighted_child(&mut self, parent: NodeId, child: NodeId, weight: f64) -> Result<()> {
        debug!("add_weighted_child(parent = {}, child = {}, weight = {})", parent, child, weight);
        self.check_edge(parent, child)?;
        match &mut self.slots[parent.index()].node {
            Node::Sum { children, weights } => {
                children.push(child);
                weights.push(weight);
            }
            other => {
                return Err(Error::TypeMismatch {
                    node: parent,
                    expected: NodeKind::Sum,
                    found: other.kind(),
                })
            }
        }
        self.link(parent, child);
        Ok(())
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.slots[child.index()].parents.push(parent);
        self.refresh_scope(parent);
    }

    fn compute_scope(&self, id: NodeId) -> Vec<Var> {
        match &self.slots[id.index()].node {
            Node::Leaf(leaf) => leaf.scope(),
            Node::Sum { children, .. } => children
                .first()
                .map(|c| self.slots[c.index()].scope.clone())
                .unwrap_or_default(),
            Node::Product { children } => {
                let mut scope: Vec<Var> = children
                    .iter()
                    .flat_map(|c| self.slots[c.index()].scope.iter().copied())
                    .collect();
                scope.sort();
                scope.dedup();
                scope
            }
        }
    }

    /// Recompute the scope of `start` and of every ancestor whose scope changes as a result.
    fn refresh_scope(&mut self, start: NodeId) {
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            let scope = self.compute_scope(id);
            let slot = &mut self.slots[id.index()];
            if slot.scope != scope {
                trace!("scope of {} is now {:?}", id, scope);
                slot.scope = scope;
                queue.extend(slot.parents.iter().copied());
            }
        }
    }

    /// The node stored at `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this circuit; [`get`][Self::get] is the non-panicking lookup.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.slots[id.index()].node
    }

    /// The node stored at `id`, or `None` for an id from another circuit.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.index()).map(|s| &s.node)
    }

    /// Variant tag of `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this circuit; [`get`][Self::get] is the non-panicking lookup.
    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind()
    }

    /// Children of `id` in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this circuit; [`get`][Self::get] is the non-panicking lookup.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    /// Parents of `id`, in the order the edges were added. A parent appears
    /// once per edge, so a node used twice by the same parent lists it twice.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this circuit; [`get`][Self::get] is the non-panicking lookup.
    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.index()].parents
    }

    /// Sorted scope of `id`: the leaf's own variable(s), the union of the
    /// children's scopes for a product, or the first child's scope for a sum.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this circuit; [`get`][Self::get] is the non-panicking lookup.
    pub fn scope(&self, id: NodeId) -> &[Var] {
        &self.slots[id.index()].scope
    }

    /// Edge weights of the sum `id`, parallel to its children.
    pub fn weights(&self, id: NodeId) -> Result<&[f64]> {
        self.check(id)?;
        match &self.slots[id.index()].node {
            Node::Sum { weights, .. } => Ok(weights),
            other => Err(Error::TypeMismatch {
                node: id,
                expected: NodeKind::Sum,
                found: other.kind(),
            }),
        }
    }

    /// Mutable edge weights of the sum `id`. The slice cannot change length,
    /// so the weight/child parity is preserved.
    pub fn weights_mut(&mut self, id: NodeId) -> Result<&mut [f64]> {
        self.check(id)?;
        match &mut self.slots[id.index()].node {
            Node::Sum { weights, .. } => Ok(weights),
            other => Err(Error::TypeMismatch {
                node: id,
                expected: NodeKind::Sum,
                found: other.kind(),
            }),
        }
    }

    pub fn leaf(&self, id: NodeId) -> Result<&Leaf> {
        self.check(id)?;
        match &self.slots[id.index()].node {
            Node::Leaf(leaf) => Ok(leaf),
            other => Err(Error::TypeMismatch {
                node: id,
                expected: NodeKind::Leaf,
                found: other.kind(),
            }),
        }
    }
}

/// Panics on a foreign id, like [`Circuit::node`].
impl Index<NodeId> for Circuit {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Self::Output {
        self.node(id)
    }
}
