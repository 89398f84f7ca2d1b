//! Reverse-mode differentiation.
//!
//! Given a table of inference values `S_n` (see [`Circuit::store_inference`]),
//! [`Circuit::differentiate`] computes, in the log domain,
//!
//! - `∂S/∂S_n` for every node `n` reachable from the root, and
//! - `∂S/∂w_{n,i} = S_{c_i} · ∂S/∂S_n` for every edge `i` of every sum `n`.
//!
//! The pass walks the topological order backwards, so the root is seeded first
//! (`∂S/∂S = 1`, i.e. `0` in log-space) and every parent has contributed to a
//! child before the child's own derivative is read.

use log::{debug, trace};

use crate::circuit::Circuit;
use crate::error::Result;
use crate::node::Node;
use crate::reference::NodeId;
use crate::storer::{Storer, StorerTable, Ticket};
use crate::utils::{ln, log_sum_exp_pair};

/// Tickets produced by [`Circuit::differentiate`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Gradients {
    /// `ln ∂S/∂S_n`, one slot per node.
    pub nodes: Ticket,
    /// `ln ∂S/∂w_{n,i}`, slot `i` of every sum `n`.
    pub weights: Ticket,
}

impl Gradients {
    pub fn node_derivative(&self, storer: &Storer, node: NodeId) -> Result<f64> {
        storer.single(self.nodes, node)
    }

    pub fn weight_gradient(&self, storer: &Storer, sum: NodeId, child: usize) -> Result<f64> {
        storer.entry(self.weights, sum, child)
    }
}

/// Add `value` (log-space) into slot `slot` of `node`.
fn accumulate(table: &mut StorerTable, node: NodeId, slot: usize, value: f64) {
    let total = match table.try_entry(node, slot) {
        Some(old) => log_sum_exp_pair(old, value),
        None => value,
    };
    table.store(node, slot, total);
}

impl Circuit {
    /// Contributions `(child, ln ∂S/∂S_child)` flowing from `id` to its children,
    /// given `pv = ln ∂S/∂S_id`.
    fn child_derivatives(&self, id: NodeId, pv: f64, inference: &StorerTable) -> Result<Vec<(NodeId, f64)>> {
        match self.node(id) {
            Node::Leaf(_) => Ok(Vec::new()),
            Node::Sum { children, weights } => Ok(children
                .iter()
                .zip(weights)
                .map(|(&c, &w)| (c, ln(w) + pv))
                .collect()),
            Node::Product { children } => {
                // ∂S_id/∂S_i = Π_{j≠i} S_j, from prefix and suffix sums of the logs.
                let values = children
                    .iter()
                    .map(|&c| inference.single(c))
                    .collect::<Result<Vec<f64>>>()?;
                let n = values.len();
                let mut suffix = vec![0.0; n + 1];
                for i in (0..n).rev() {
                    suffix[i] = suffix[i + 1] + values[i];
                }
                let mut prefix = 0.0;
                let mut out = Vec::with_capacity(n);
                for (i, &c) in children.iter().enumerate() {
                    out.push((c, pv + prefix + suffix[i + 1]));
                    prefix += values[i];
                }
                Ok(out)
            }
        }
    }

    /// Edge gradients `ln ∂S/∂w_{id,i} = ln S_{c_i} + pv` of the sum `id`.
    fn edge_gradients(&self, id: NodeId, pv: f64, inference: &StorerTable) -> Result<Vec<f64>> {
        match self.node(id) {
            Node::Sum { children, .. } => children.iter().map(|&c| Ok(inference.single(c)? + pv)).collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// Derivatives of the root with respect to every node and every sum weight,
    /// using the inference values stored under `inference`.
    ///
    /// Both tables are allocated fresh in `storer`.
    pub fn differentiate(&self, root: NodeId, storer: &mut Storer, inference: Ticket) -> Result<Gradients> {
        debug!("differentiate(root = {}, inference = {})", root, inference);
        self.check(root)?;
        storer.table(inference)?;

        let gradients = Gradients {
            nodes: storer.new_ticket(),
            weights: storer.new_ticket(),
        };
        storer.store_single(gradients.nodes, root, 0.0)?;

        let mut order = self.topological_order(root);
        order.reverse();
        for id in order {
            let pv = storer.single(gradients.nodes, id)?;
            trace!("differentiate: {} -> {}", id, pv);
            let table = storer.table(inference)?;
            let contributions = self.child_derivatives(id, pv, table)?;
            let edges = self.edge_gradients(id, pv, table)?;

            let nodes = storer.table_mut(gradients.nodes)?;
            for (c, v) in contributions {
                accumulate(nodes, c, 0, v);
            }
            let weights = storer.table_mut(gradients.weights)?;
            for (i, g) in edges.into_iter().enumerate() {
                weights.store(id, i, g);
            }
        }

        Ok(gradients)
    }

    /// Add the edge gradients of one instance into the running `batch` table.
    ///
    /// `derivatives` holds the node derivatives (as in [`Gradients::nodes`]) and
    /// `inference` the matching inference values. Repeated calls accumulate in
    /// log-space, so after a mini-batch the table holds `ln Σ ∂S/∂w` over its
    /// instances.
    pub fn accumulate_weight_gradients(
        &self,
        root: NodeId,
        storer: &mut Storer,
        derivatives: Ticket,
        inference: Ticket,
        batch: Ticket,
    ) -> Result<()> {
        debug!(
            "accumulate_weight_gradients(root = {}, derivatives = {}, inference = {}, batch = {})",
            root, derivatives, inference, batch
        );
        self.check(root)?;
        storer.table(batch)?;

        for id in self.topological_order(root) {
            if !self.node(id).is_sum() {
                continue;
            }
            let pv = storer.single(derivatives, id)?;
            let edges = self.edge_gradients(id, pv, storer.table(inference)?)?;
            let table = storer.table_mut(batch)?;
            for (i, g) in edges.into_iter().enumerate() {
                accumulate(table, id, i, g);
            }
        }

        Ok(())
    }
}
