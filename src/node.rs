use std::fmt;

use crate::leaf::Leaf;
use crate::reference::NodeId;

/// Variant tag of a [`Node`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind {
    Sum,
    Product,
    Leaf,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Sum => "sum",
            NodeKind::Product => "product",
            NodeKind::Leaf => "leaf",
        };
        f.write_str(s)
    }
}

/// A circuit node.
///
/// # Invariant
///
/// For `Sum`, `weights.len() == children.len()`. A circuit only hands out nodes
/// by shared reference, so the only way to grow a sum is
/// [`Circuit::add_weighted_child`][crate::circuit::Circuit::add_weighted_child].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Sum { children: Vec<NodeId>, weights: Vec<f64> },
    Product { children: Vec<NodeId> },
    Leaf(Leaf),
}

impl Node {
    pub(crate) fn sum() -> Self {
        Node::Sum {
            children: Vec::new(),
            weights: Vec::new(),
        }
    }

    pub(crate) fn product() -> Self {
        Node::Product { children: Vec::new() }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Sum { .. } => NodeKind::Sum,
            Node::Product { .. } => NodeKind::Product,
            Node::Leaf(_) => NodeKind::Leaf,
        }
    }

    pub fn is_sum(&self) -> bool {
        matches!(self, Node::Sum { .. })
    }

    pub fn is_product(&self) -> bool {
        matches!(self, Node::Product { .. })
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Children in insertion order. Empty for leaves.
    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Sum { children, .. } | Node::Product { children } => children,
            Node::Leaf(_) => &[],
        }
    }

    /// Weights of a sum node, `None` for other variants.
    pub fn weights(&self) -> Option<&[f64]> {
        match self {
            Node::Sum { weights, .. } => Some(weights),
            _ => None,
        }
    }

    pub fn leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }
}
