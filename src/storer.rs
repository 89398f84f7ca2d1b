//! Ticketed dynamic-programming tables.
//!
//! A [`Storer`] owns a set of independent tables, each named by a [`Ticket`].
//! Inference writes one log-value per node into its ticket's table, the
//! differentiation pass writes node derivatives into another, and per-edge weight
//! gradients go into a third where every sum node uses one slot per child.
//!
//! Tables never interfere with one another, and nothing is ever cached inside the
//! circuit itself, so any number of evaluation episodes may share a circuit as
//! long as each one owns its storer (or at least its tickets).
//!
//! Reading an entry that was never written is an error
//! ([`MissingEntry`][Error::MissingEntry]) rather than a silent zero: a read before
//! write means a traversal visited nodes in the wrong order.
//!
//! # Example
//!
//! ```
//! use spn_rs::reference::NodeId;
//! use spn_rs::storer::Storer;
//!
//! let mut storer = Storer::new();
//! let t = storer.new_ticket();
//! let n = NodeId::new(0);
//!
//! storer.store_single(t, n, -0.5).unwrap();
//! assert_eq!(storer.single(t, n).unwrap(), -0.5);
//!
//! storer.reset(t).unwrap();
//! assert!(storer.single(t, n).is_err());
//! ```

use std::collections::HashMap;
use std::fmt;

use log::trace;

use crate::error::{Error, Result};
use crate::reference::NodeId;

/// Handle naming one table of a [`Storer`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ticket(u32);

impl Ticket {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One DP table: `node -> [slot_0, slot_1, ...]`.
#[derive(Debug, Clone)]
pub struct StorerTable {
    ticket: Ticket,
    entries: HashMap<NodeId, Vec<Option<f64>>>,
}

impl StorerTable {
    fn new(ticket: Ticket) -> Self {
        Self {
            ticket,
            entries: HashMap::new(),
        }
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Number of nodes with at least one slot written.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Slot `slot` of `node`, if written.
    pub fn try_entry(&self, node: NodeId, slot: usize) -> Option<f64> {
        self.entries.get(&node).and_then(|v| v.get(slot).copied().flatten())
    }

    pub fn entry(&self, node: NodeId, slot: usize) -> Result<f64> {
        self.try_entry(node, slot).ok_or(Error::MissingEntry {
            ticket: self.ticket,
            node,
            slot,
        })
    }

    pub fn single(&self, node: NodeId) -> Result<f64> {
        self.entry(node, 0)
    }

    pub fn store(&mut self, node: NodeId, slot: usize, value: f64) {
        let slots = self.entries.entry(node).or_default();
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        slots[slot] = Some(value);
    }

    pub fn store_single(&mut self, node: NodeId, value: f64) {
        self.store(node, 0, value)
    }

    /// All slots of `node` (unwritten slots are `None`).
    pub fn values(&self, node: NodeId) -> Option<&[Option<f64>]> {
        self.entries.get(&node).map(|v| v.as_slice())
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.keys().copied()
    }
}

/// A collection of independent DP tables indexed by [`Ticket`].
#[derive(Debug, Clone, Default)]
pub struct Storer {
    tables: HashMap<Ticket, StorerTable>,
    next: u32,
}

impl Storer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh, empty table and return its ticket.
    pub fn new_ticket(&mut self) -> Ticket {
        let ticket = Ticket(self.next);
        self.next += 1;
        self.tables.insert(ticket, StorerTable::new(ticket));
        trace!("new ticket {}", ticket);
        ticket
    }

    pub(crate) fn ticket_or_new(&mut self, ticket: Option<Ticket>) -> Result<Ticket> {
        match ticket {
            Some(t) => {
                self.table(t)?;
                Ok(t)
            }
            None => Ok(self.new_ticket()),
        }
    }

    /// Number of live tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn contains(&self, ticket: Ticket) -> bool {
        self.tables.contains_key(&ticket)
    }

    pub fn table(&self, ticket: Ticket) -> Result<&StorerTable> {
        self.tables.get(&ticket).ok_or(Error::MissingTicket(ticket))
    }

    pub fn table_mut(&mut self, ticket: Ticket) -> Result<&mut StorerTable> {
        self.tables.get_mut(&ticket).ok_or(Error::MissingTicket(ticket))
    }

    pub fn entry(&self, ticket: Ticket, node: NodeId, slot: usize) -> Result<f64> {
        self.table(ticket)?.entry(node, slot)
    }

    /// Shorthand for `entry(ticket, node, 0)`.
    pub fn single(&self, ticket: Ticket, node: NodeId) -> Result<f64> {
        self.entry(ticket, node, 0)
    }

    pub fn store(&mut self, ticket: Ticket, node: NodeId, slot: usize, value: f64) -> Result<()> {
        self.table_mut(ticket)?.store(node, slot, value);
        Ok(())
    }

    /// Shorthand for `store(ticket, node, 0, value)`.
    pub fn store_single(&mut self, ticket: Ticket, node: NodeId, value: f64) -> Result<()> {
        self.store(ticket, node, 0, value)
    }

    /// Discard every entry of `ticket`, keeping the ticket valid.
    ///
    /// Prefer this over [`delete`][Self::delete] followed by [`new_ticket`][Self::new_ticket]
    /// when running many episodes in sequence.
    pub fn reset(&mut self, ticket: Ticket) -> Result<Ticket> {
        trace!("reset ticket {}", ticket);
        self.table_mut(ticket)?.clear();
        Ok(ticket)
    }

    /// Free the table of `ticket`. The ticket is never handed out again.
    pub fn delete(&mut self, ticket: Ticket) -> Result<()> {
        trace!("delete ticket {}", ticket);
        self.tables.remove(&ticket).map(|_| ()).ok_or(Error::MissingTicket(ticket))
    }
}
