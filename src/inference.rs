//! Exact marginal and MAP inference.
//!
//! Both passes walk the [topological order][Circuit::topological_order] of the
//! circuit and fill one log-value per node into a [`Storer`] table:
//!
//! | node    | marginal (`store_inference`) | max-product (`store_map`) |
//! |---------|------------------------------|---------------------------|
//! | leaf    | `log_value`                  | `log_max`                 |
//! | product | `Σ v_c`                      | `Σ v_c`                   |
//! | sum     | `ln Σ w_c · exp(v_c)`        | `max_c (ln w_c + v_c)`    |
//!
//! MAP decoding then walks down from the root: a sum follows the child that
//! attained its maximum (the lowest index among ties), a product follows all of
//! its children, and each leaf reached contributes its [`arg_max`][crate::leaf::Leaf::arg_max].

use std::collections::{HashMap, HashSet, VecDeque};

use log::{debug, trace};

use crate::circuit::Circuit;
use crate::error::Result;
use crate::node::Node;
use crate::reference::NodeId;
use crate::storer::{Storer, StorerTable, Ticket};
use crate::utils::{ln, weighted_log_sum_exp, LOG_ZERO};
use crate::varset::VarSet;

/// Index and value of the first maximal element, `None` if empty.
pub(crate) fn first_max(values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, v) in values.into_iter().enumerate() {
        if best.map_or(true, |(_, m)| v > m) {
            best = Some((i, v));
        }
    }
    best
}

impl Circuit {
    /// `ln w_c + v_c` for every child `c` of the sum `id`, reading `v_c` from `table`.
    fn weighted_terms(&self, table: &StorerTable, children: &[NodeId], weights: &[f64]) -> Result<Vec<f64>> {
        children
            .iter()
            .zip(weights)
            .map(|(&c, &w)| Ok(ln(w) + table.single(c)?))
            .collect()
    }

    fn product_value(table: &StorerTable, children: &[NodeId]) -> Result<f64> {
        children.iter().map(|&c| table.single(c)).sum()
    }

    fn sum_value(table: &StorerTable, children: &[NodeId], weights: &[f64]) -> Result<f64> {
        let values = children.iter().map(|&c| table.single(c)).collect::<Result<Vec<f64>>>()?;
        Ok(weighted_log_sum_exp(&values, weights))
    }

    /// Compute the log-probability of `evidence` at every node reachable from
    /// `root`, storing the values under `ticket` (a fresh ticket if `None`).
    ///
    /// Variables absent from `evidence` are marginalised out.
    pub fn store_inference(
        &self,
        root: NodeId,
        evidence: &VarSet,
        storer: &mut Storer,
        ticket: Option<Ticket>,
    ) -> Result<Ticket> {
        debug!("store_inference(root = {}, evidence = {})", root, evidence);
        self.check(root)?;
        let ticket = storer.ticket_or_new(ticket)?;
        let order = self.topological_order(root);
        let table = storer.table_mut(ticket)?;

        for id in order {
            let value = match self.node(id) {
                Node::Leaf(leaf) => leaf.log_value(evidence),
                Node::Product { children } => Self::product_value(table, children)?,
                Node::Sum { children, weights } => Self::sum_value(table, children, weights)?,
            };
            trace!("store_inference: {} -> {}", id, value);
            table.store_single(id, value);
        }

        Ok(ticket)
    }

    /// Log-probability of `evidence` under the circuit rooted at `root`.
    pub fn evaluate(&self, root: NodeId, evidence: &VarSet) -> Result<f64> {
        debug!("evaluate(root = {}, evidence = {})", root, evidence);
        let mut storer = Storer::new();
        let ticket = self.store_inference(root, evidence, &mut storer, None)?;
        let value = storer.single(ticket, root)?;
        debug!("evaluate(root = {}) -> {}", root, value);
        Ok(value)
    }

    fn store_max(&self, root: NodeId, evidence: &VarSet, table: &mut StorerTable) -> Result<()> {
        for id in self.topological_order(root) {
            let value = match self.node(id) {
                Node::Leaf(leaf) => leaf.log_max(evidence),
                Node::Product { children } => Self::product_value(table, children)?,
                Node::Sum { children, weights } => first_max(self.weighted_terms(table, children, weights)?)
                    .map_or(LOG_ZERO, |(_, m)| m),
            };
            trace!("store_map: {} -> {}", id, value);
            table.store_single(id, value);
        }
        Ok(())
    }

    /// The child index a sum follows during decoding, given the stored max-values.
    fn map_choice(&self, table: &StorerTable, id: NodeId) -> Result<Option<usize>> {
        match self.node(id) {
            Node::Sum { children, weights } => {
                Ok(first_max(self.weighted_terms(table, children, weights)?).map(|(i, _)| i))
            }
            _ => Ok(None),
        }
    }

    /// Walk the decoding path from `root`, calling `f` on every node on it
    /// together with the child index chosen at sums.
    fn walk_map_path<F>(&self, root: NodeId, table: &StorerTable, mut f: F) -> Result<()>
    where
        F: FnMut(NodeId, Option<usize>),
    {
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let choice = self.map_choice(table, id)?;
            f(id, choice);
            let next: &[NodeId] = match (self.node(id), choice) {
                (Node::Sum { children, .. }, Some(i)) => &children[i..=i],
                (Node::Product { children }, _) => children,
                _ => &[],
            };
            for &c in next {
                if visited.insert(c) {
                    queue.push_back(c);
                }
            }
        }
        Ok(())
    }

    /// Max-product pass followed by top-down decoding.
    ///
    /// Stores the max-values under `ticket` (a fresh ticket if `None`) and returns
    /// it together with the decoded assignment. Evidence variables keep their
    /// observed values.
    pub fn store_map(
        &self,
        root: NodeId,
        evidence: &VarSet,
        storer: &mut Storer,
        ticket: Option<Ticket>,
    ) -> Result<(Ticket, VarSet)> {
        debug!("store_map(root = {}, evidence = {})", root, evidence);
        self.check(root)?;
        let ticket = storer.ticket_or_new(ticket)?;
        let table = storer.table_mut(ticket)?;
        self.store_max(root, evidence, table)?;

        let mut assignment = VarSet::new();
        self.walk_map_path(root, table, |id, _| {
            if let Node::Leaf(leaf) = self.node(id) {
                assignment.insert(leaf.var(), leaf.arg_max(evidence));
            }
        })?;

        debug!("store_map(root = {}) -> {}", root, assignment);
        Ok((ticket, assignment))
    }

    /// Most probable completion of `evidence` and its log-probability.
    pub fn evaluate_map(&self, root: NodeId, evidence: &VarSet) -> Result<(VarSet, f64)> {
        debug!("evaluate_map(root = {}, evidence = {})", root, evidence);
        let mut storer = Storer::new();
        let (ticket, assignment) = self.store_map(root, evidence, &mut storer, None)?;
        let value = storer.single(ticket, root)?;
        Ok((assignment, value))
    }

    /// The child index chosen by every sum on the MAP decoding path of `evidence`.
    pub fn trace_map(&self, root: NodeId, evidence: &VarSet) -> Result<HashMap<NodeId, usize>> {
        debug!("trace_map(root = {}, evidence = {})", root, evidence);
        self.check(root)?;
        let mut storer = Storer::new();
        let ticket = storer.new_ticket();
        let table = storer.table_mut(ticket)?;
        self.store_max(root, evidence, table)?;

        let mut trace = HashMap::new();
        self.walk_map_path(root, table, |id, choice| {
            if let Some(i) = choice {
                trace.insert(id, i);
            }
        })?;
        Ok(trace)
    }
}
