//! Error taxonomy for circuit construction, evaluation and persistence.

use std::io;

use crate::node::NodeKind;
use crate::reference::NodeId;
use crate::storer::Ticket;

/// Errors produced by the circuit engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural invariant violated: weight/child mismatch, overlapping product scopes,
    /// incomplete sum scopes, a cycle, or a dangling node id.
    #[error("malformed graph: {0}")]
    MalformedGraph(String),

    /// An operation requiring a specific node variant was invoked on another variant.
    #[error("type mismatch at {node}: expected {expected}, found {found}")]
    TypeMismatch {
        node: NodeId,
        expected: NodeKind,
        found: NodeKind,
    },

    /// Lookup against a ticket that was never allocated or has been deleted.
    #[error("missing ticket {0}")]
    MissingTicket(Ticket),

    /// Lookup of a node (or slot) never written for the given ticket.
    #[error("missing entry for {node} (slot {slot}) in ticket {ticket}")]
    MissingEntry { ticket: Ticket, node: NodeId, slot: usize },

    /// Truncated, trailing or inconsistent serialized payload.
    #[error("serialization desync: {0}")]
    SerializationDesync(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
