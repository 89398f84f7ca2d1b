//! Type-safe wrapper for circuit variables.
//!
//! Variables are 0-indexed: `X0`, `X1`, ... name the columns of a dataset.
//! Keeping them apart from [`NodeId`][crate::reference::NodeId] prevents mixing up
//! "which variable" with "which node" in scope and evidence code.
use std::fmt;

/// A variable identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Var(u32);

impl Var {
    pub const fn new(id: u32) -> Self {
        Var(id)
    }

    /// Returns the raw variable ID as a `u32`.
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X{}", self.0)
    }
}

impl From<u32> for Var {
    fn from(id: u32) -> Self {
        Var(id)
    }
}

impl From<Var> for u32 {
    fn from(var: Var) -> Self {
        var.0
    }
}
