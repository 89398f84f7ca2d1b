use std::fmt::{Display, Formatter};

/// A handle to a node stored in a [`Circuit`][crate::circuit::Circuit].
///
/// Children, parents and serialized adjacency records all refer to nodes by
/// this index, so a node shared by several parents is simply the same `NodeId`
/// appearing in several child lists.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the internal representation of the handle.
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Return the index for arena access.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "@{}", self.0)
    }
}

impl From<NodeId> for usize {
    fn from(id: NodeId) -> Self {
        id.index()
    }
}
