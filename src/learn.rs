//! Weight learning.
//!
//! The circuit structure is fixed; only the sum weights change. Three update
//! rules are available, selected by [`LearningMethod`]:
//!
//! - **soft gradient descent**: `w_i += η · ∂S/∂w_i`, the gradient coming from
//!   [`Circuit::differentiate`] (optionally summed over a mini-batch);
//! - **hard gradient descent**: `w_i += η · c_i / w_i`, where `c_i` counts how
//!   many MAP decoding paths went through edge `i`;
//! - **hard EM**: `w_i ∝ 1 + c_i`.
//!
//! [`Circuit::learn_discriminative`] instead maximises the conditional
//! likelihood `P(query | observed)`, stepping along the difference between the
//! gradients under the full evidence and under the evidence with the query
//! variables hidden.
//!
//! After each update the weights of a sum are renormalised if
//! [`LearnConfig::normalize`] is set.

use log::{debug, info, trace, warn};

use crate::circuit::Circuit;
use crate::error::Result;
use crate::reference::NodeId;
use crate::search::Visit;
use crate::storer::{Storer, Ticket};
use crate::types::Var;
use crate::utils::LOG_ZERO;
use crate::varset::VarSet;

/// Weight update rule.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LearningMethod {
    SoftGd,
    HardGd,
    HardEm,
}

/// Configuration for [`Circuit::learn_weights`].
#[derive(Debug, Clone)]
pub struct LearnConfig {
    /// Renormalise sum weights after every update (default: true)
    pub normalize: bool,
    /// Learning rate (default: 0.1)
    pub eta: f64,
    /// Stop once the total log-likelihood changes by less than this between epochs (default: 1.0)
    pub epsilon: f64,
    /// Instances per gradient step; `0` or `1` updates after every instance (default: 0)
    pub batch_size: usize,
    /// Update rule (default: soft gradient descent)
    pub method: LearningMethod,
    /// Upper bound on the number of passes over the data (default: 100)
    pub max_epochs: usize,
}

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            eta: 0.1,
            epsilon: 1.0,
            batch_size: 0,
            method: LearningMethod::SoftGd,
            max_epochs: 100,
        }
    }
}

impl LearnConfig {
    /// Hard EM with default stopping criteria.
    pub fn hard_em() -> Self {
        Self {
            method: LearningMethod::HardEm,
            ..Self::default()
        }
    }

    /// Mini-batch soft gradient descent.
    pub fn mini_batch(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Self::default()
        }
    }
}

/// Outcome of [`Circuit::learn_weights`].
#[derive(Debug, Clone, PartialEq)]
pub struct LearnReport {
    /// Number of completed passes over the data.
    pub epochs: usize,
    /// Total log-likelihood of the data after the last epoch.
    pub log_likelihood: f64,
    /// Total log-likelihood after each epoch.
    pub history: Vec<f64>,
    /// Whether training stopped on `epsilon` rather than `max_epochs`.
    pub converged: bool,
}

impl Circuit {
    fn reachable_sums(&self, root: NodeId) -> Vec<NodeId> {
        let mut sums = Vec::new();
        self.breadth_first(root, |id| {
            if self.node(id).is_sum() {
                sums.push(id);
            }
            Visit::Continue
        });
        sums
    }

    fn renormalize(&mut self, id: NodeId) -> Result<()> {
        if !crate::utils::normalize(self.weights_mut(id)?) {
            warn!("cannot normalize weights of {}: total mass is zero", id);
        }
        Ok(())
    }

    /// Apply `w_i += eta · exp(g_i)` to every sum reachable from `root`, where
    /// `g_i` is slot `i` of the sum in the weight-gradient table `gradients`.
    pub fn apply_weight_gradient(
        &mut self,
        root: NodeId,
        storer: &Storer,
        gradients: Ticket,
        eta: f64,
        normalize: bool,
    ) -> Result<()> {
        debug!("apply_weight_gradient(root = {}, gradients = {}, eta = {})", root, gradients, eta);
        let table = storer.table(gradients)?;
        for id in self.reachable_sums(root) {
            let n = self.children(id).len();
            let deltas = (0..n)
                .map(|i| Ok(eta * table.entry(id, i)?.exp()))
                .collect::<Result<Vec<f64>>>()?;
            for (w, d) in self.weights_mut(id)?.iter_mut().zip(deltas) {
                *w += d;
            }
            if normalize {
                self.renormalize(id)?;
            }
        }
        Ok(())
    }

    /// Count, into `ticket`, one visit for every sum edge on the MAP decoding
    /// path of `evidence`. Counts are plain (not log-space) and accumulate over
    /// calls sharing a ticket.
    pub fn derive_hard(
        &self,
        root: NodeId,
        evidence: &VarSet,
        storer: &mut Storer,
        ticket: Option<Ticket>,
    ) -> Result<Ticket> {
        debug!("derive_hard(root = {}, evidence = {})", root, evidence);
        let trace = self.trace_map(root, evidence)?;
        let ticket = storer.ticket_or_new(ticket)?;
        let table = storer.table_mut(ticket)?;
        for (id, i) in trace {
            let count = table.try_entry(id, i).unwrap_or(0.0);
            table.store(id, i, count + 1.0);
        }
        Ok(ticket)
    }

    /// Edge counts of the sum `id` from a [`derive_hard`][Self::derive_hard] table.
    fn edge_counts(&self, storer: &Storer, ticket: Ticket, id: NodeId) -> Result<Vec<f64>> {
        let table = storer.table(ticket)?;
        Ok((0..self.children(id).len())
            .map(|i| table.try_entry(id, i).unwrap_or(0.0))
            .collect())
    }

    /// Replace the weights of every reachable sum by its Laplace-smoothed edge
    /// counts `1 + c_i` from `ticket`.
    pub fn apply_counts(&mut self, root: NodeId, storer: &Storer, ticket: Ticket, normalize: bool) -> Result<()> {
        debug!("apply_counts(root = {}, ticket = {})", root, ticket);
        for id in self.reachable_sums(root) {
            let counts = self.edge_counts(storer, ticket, id)?;
            for (w, c) in self.weights_mut(id)?.iter_mut().zip(counts) {
                *w = 1.0 + c;
            }
            if normalize {
                self.renormalize(id)?;
            }
        }
        Ok(())
    }

    /// Apply `w_i += eta · c_i / w_i` using the edge counts in `ticket`.
    pub fn apply_hard_gradient(
        &mut self,
        root: NodeId,
        storer: &Storer,
        ticket: Ticket,
        eta: f64,
        normalize: bool,
    ) -> Result<()> {
        debug!("apply_hard_gradient(root = {}, ticket = {}, eta = {})", root, ticket, eta);
        for id in self.reachable_sums(root) {
            let counts = self.edge_counts(storer, ticket, id)?;
            for (w, c) in self.weights_mut(id)?.iter_mut().zip(counts) {
                if c > 0.0 && *w > 0.0 {
                    *w += eta * c / *w;
                }
            }
            if normalize {
                self.renormalize(id)?;
            }
        }
        Ok(())
    }

    /// Total log-likelihood `Σ ln S(e)` of `data`.
    pub fn log_likelihood(&self, root: NodeId, data: &[VarSet]) -> Result<f64> {
        let mut storer = Storer::new();
        let ticket = storer.new_ticket();
        let mut total = 0.0;
        for e in data {
            storer.reset(ticket)?;
            self.store_inference(root, e, &mut storer, Some(ticket))?;
            total += storer.single(ticket, root)?;
        }
        Ok(total)
    }

    fn soft_gd_step(&mut self, root: NodeId, batch: &[VarSet], config: &LearnConfig) -> Result<()> {
        let mut storer = Storer::new();
        let inference = storer.new_ticket();
        let acc = storer.new_ticket();
        for e in batch {
            storer.reset(inference)?;
            self.store_inference(root, e, &mut storer, Some(inference))?;
            let g = self.differentiate(root, &mut storer, inference)?;
            self.accumulate_weight_gradients(root, &mut storer, g.nodes, inference, acc)?;
            storer.delete(g.nodes)?;
            storer.delete(g.weights)?;
        }
        self.apply_weight_gradient(root, &storer, acc, config.eta, config.normalize)
    }

    fn hard_step(&mut self, root: NodeId, batch: &[VarSet], config: &LearnConfig) -> Result<()> {
        let mut storer = Storer::new();
        let counts = storer.new_ticket();
        for e in batch {
            self.derive_hard(root, e, &mut storer, Some(counts))?;
        }
        match config.method {
            LearningMethod::HardEm => self.apply_counts(root, &storer, counts, config.normalize),
            _ => self.apply_hard_gradient(root, &storer, counts, config.eta, config.normalize),
        }
    }

    /// `evidence` with the `query` variables removed.
    fn hide(evidence: &VarSet, query: &[Var]) -> VarSet {
        let mut hidden = evidence.clone();
        for &v in query {
            hidden.remove(v);
        }
        hidden
    }

    /// Conditional log-likelihood `Σ ln S(e) - ln S(e \ query)` of `data`.
    pub fn conditional_log_likelihood(&self, root: NodeId, data: &[VarSet], query: &[Var]) -> Result<f64> {
        let mut total = 0.0;
        for e in data {
            total += self.evaluate(root, e)? - self.evaluate(root, &Self::hide(e, query))?;
        }
        Ok(total)
    }

    fn discriminative_step(&mut self, root: NodeId, batch: &[VarSet], query: &[Var], config: &LearnConfig) -> Result<()> {
        let sums = self.reachable_sums(root);
        let mut deltas: Vec<Vec<f64>> = sums.iter().map(|&id| vec![0.0; self.children(id).len()]).collect();

        let mut storer = Storer::new();
        let inference = storer.new_ticket();
        for correct in batch {
            let expected = Self::hide(correct, query);
            // ∂ ln P(q | o) / ∂w = ∂S(q, o)/∂w / S(q, o) - ∂S(o)/∂w / S(o)
            for (evidence, sign) in [(correct, 1.0), (&expected, -1.0)] {
                storer.reset(inference)?;
                self.store_inference(root, evidence, &mut storer, Some(inference))?;
                let value = storer.single(inference, root)?;
                if value == LOG_ZERO {
                    warn!("skipping impossible evidence {}", evidence);
                    continue;
                }
                let g = self.differentiate(root, &mut storer, inference)?;
                for (&id, delta) in sums.iter().zip(deltas.iter_mut()) {
                    for (i, d) in delta.iter_mut().enumerate() {
                        *d += sign * (g.weight_gradient(&storer, id, i)? - value).exp();
                    }
                }
                storer.delete(g.nodes)?;
                storer.delete(g.weights)?;
            }
        }

        for (id, delta) in sums.into_iter().zip(deltas) {
            trace!("discriminative update of {}: {:?}", id, delta);
            for (w, d) in self.weights_mut(id)?.iter_mut().zip(delta) {
                *w = (*w + config.eta * d).max(0.0);
            }
            if config.normalize {
                self.renormalize(id)?;
            }
        }
        Ok(())
    }

    /// Shared epoch loop: apply `step` to every batch, then score the data.
    fn run_epochs<S, L>(
        &mut self,
        data: &[VarSet],
        chunk: usize,
        config: &LearnConfig,
        mut step: S,
        score: L,
    ) -> Result<LearnReport>
    where
        S: FnMut(&mut Circuit, &[VarSet]) -> Result<()>,
        L: Fn(&Circuit) -> Result<f64>,
    {
        let mut history: Vec<f64> = Vec::new();
        let mut converged = false;
        for epoch in 0..config.max_epochs {
            for batch in data.chunks(chunk) {
                step(self, batch)?;
            }
            let ll = score(self)?;
            info!("epoch {} log-likelihood {:.5}", epoch, ll);
            let delta = history.last().map(|&prev| (ll - prev).abs());
            history.push(ll);
            if delta.is_some_and(|d| d < config.epsilon) {
                converged = true;
                break;
            }
        }

        Ok(LearnReport {
            epochs: history.len(),
            log_likelihood: history.last().copied().unwrap_or(0.0),
            history,
            converged,
        })
    }

    /// Learn the sum weights of the circuit rooted at `root` from `data`.
    ///
    /// Each epoch is one pass over `data` (in batches of
    /// [`batch_size`][LearnConfig::batch_size]; hard EM always uses the whole
    /// data set). Training stops when the total log-likelihood moves by less than
    /// [`epsilon`][LearnConfig::epsilon] or after
    /// [`max_epochs`][LearnConfig::max_epochs] epochs.
    pub fn learn_weights(&mut self, root: NodeId, data: &[VarSet], config: &LearnConfig) -> Result<LearnReport> {
        debug!("learn_weights(root = {}, data = {} instances, config = {:?})", root, data.len(), config);
        self.check(root)?;

        let chunk = match config.method {
            LearningMethod::HardEm => data.len().max(1),
            _ => config.batch_size.max(1),
        };

        self.run_epochs(
            data,
            chunk,
            config,
            |c, batch| match config.method {
                LearningMethod::SoftGd => c.soft_gd_step(root, batch, config),
                LearningMethod::HardGd | LearningMethod::HardEm => c.hard_step(root, batch, config),
            },
            |c| c.log_likelihood(root, data),
        )
    }

    /// Discriminative gradient descent on the conditional likelihood of the
    /// `query` variables given the rest of each instance.
    ///
    /// Every instance contributes `∂S(e)/∂w / S(e) - ∂S(e')/∂w / S(e')`, where
    /// `e'` is `e` without the query variables. Weights are clamped at zero
    /// before renormalisation. [`method`][LearnConfig::method] is ignored, the
    /// other fields of `config` apply as in [`learn_weights`][Self::learn_weights],
    /// and the reported log-likelihoods are conditional.
    pub fn learn_discriminative(
        &mut self,
        root: NodeId,
        data: &[VarSet],
        query: &[Var],
        config: &LearnConfig,
    ) -> Result<LearnReport> {
        debug!(
            "learn_discriminative(root = {}, data = {} instances, query = {:?}, config = {:?})",
            root,
            data.len(),
            query,
            config
        );
        self.check(root)?;
        self.run_epochs(
            data,
            config.batch_size.max(1),
            config,
            |c, batch| c.discriminative_step(root, batch, query, config),
            |c| c.conditional_log_likelihood(root, data, query),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::error::Error;
    use crate::types::Var;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // s = 0.5 · [X0 = 0] + 0.5 · [X0 = 1]
    fn switch() -> (Circuit, NodeId) {
        let mut c = Circuit::new();
        let a = c.add_indicator(0, 0);
        let b = c.add_indicator(0, 1);
        let s = c.add_sum();
        c.add_weighted_child(s, a, 0.5).unwrap();
        c.add_weighted_child(s, b, 0.5).unwrap();
        (c, s)
    }

    fn data(zeros: usize, ones: usize) -> Vec<VarSet> {
        let mut v = vec![VarSet::from([(0, 0)]); zeros];
        v.extend(vec![VarSet::from([(0, 1)]); ones]);
        v
    }

    #[test]
    fn test_defaults() {
        let cfg = LearnConfig::default();
        assert!(cfg.normalize);
        assert_eq!(cfg.eta, 0.1);
        assert_eq!(cfg.epsilon, 1.0);
        assert_eq!(cfg.batch_size, 0);
        assert_eq!(cfg.method, LearningMethod::SoftGd);
        assert_eq!(LearnConfig::hard_em().method, LearningMethod::HardEm);
        assert_eq!(LearnConfig::mini_batch(8).batch_size, 8);
    }

    #[test]
    fn test_apply_weight_gradient() {
        let (mut c, s) = switch();
        let mut storer = Storer::new();
        let t = storer.new_ticket();
        storer.store(t, s, 0, 1.0f64.ln()).unwrap();
        storer.store(t, s, 1, 0.0f64.ln()).unwrap();
        c.apply_weight_gradient(s, &storer, t, 0.5, false).unwrap();
        assert_eq!(c.weights(s).unwrap(), &[1.0, 0.5]);
        c.apply_weight_gradient(s, &storer, t, 0.5, true).unwrap();
        let w = c.weights(s).unwrap();
        assert!(close(w[0], 1.5 / 2.0) && close(w[1], 0.5 / 2.0));
    }

    #[test]
    fn test_apply_weight_gradient_missing_slot() {
        let (mut c, s) = switch();
        let mut storer = Storer::new();
        let t = storer.new_ticket();
        storer.store(t, s, 0, 0.0).unwrap();
        assert!(matches!(
            c.apply_weight_gradient(s, &storer, t, 0.1, true),
            Err(Error::MissingEntry { slot: 1, .. })
        ));
    }

    #[test]
    fn test_derive_hard_counts() {
        let (c, s) = switch();
        let mut storer = Storer::new();
        let t = c.derive_hard(s, &VarSet::from([(0, 1)]), &mut storer, None).unwrap();
        c.derive_hard(s, &VarSet::from([(0, 1)]), &mut storer, Some(t)).unwrap();
        c.derive_hard(s, &VarSet::from([(0, 0)]), &mut storer, Some(t)).unwrap();
        assert_eq!(storer.entry(t, s, 0).unwrap(), 1.0);
        assert_eq!(storer.entry(t, s, 1).unwrap(), 2.0);
    }

    #[test]
    fn test_apply_counts() {
        let (mut c, s) = switch();
        let mut storer = Storer::new();
        let t = storer.new_ticket();
        storer.store(t, s, 1, 2.0).unwrap();
        c.apply_counts(s, &storer, t, true).unwrap();
        let w = c.weights(s).unwrap();
        assert!(close(w[0], 0.25) && close(w[1], 0.75));
    }

    #[test]
    fn test_log_likelihood() {
        let (c, s) = switch();
        let ll = c.log_likelihood(s, &data(2, 1)).unwrap();
        assert!(close(ll, 3.0 * 0.5f64.ln()));
    }

    #[test]
    fn test_soft_gd_moves_towards_data() {
        let (mut c, s) = switch();
        let d = data(1, 3);
        let before = c.log_likelihood(s, &d).unwrap();
        let cfg = LearnConfig {
            epsilon: 1e-6,
            max_epochs: 20,
            ..LearnConfig::default()
        };
        let report = c.learn_weights(s, &d, &cfg).unwrap();
        let w = c.weights(s).unwrap();
        assert!(w[1] > w[0]);
        assert!(close(w[0] + w[1], 1.0));
        assert!(report.log_likelihood > before);
        assert_eq!(report.epochs, report.history.len());
    }

    #[test]
    fn test_hard_em_converges() {
        let (mut c, s) = switch();
        let d = data(1, 3);
        let report = c.learn_weights(s, &d, &LearnConfig::hard_em()).unwrap();
        // One epoch sets w ∝ (1 + 1, 1 + 3); the second changes nothing.
        let w = c.weights(s).unwrap();
        assert!(close(w[0], 2.0 / 6.0) && close(w[1], 4.0 / 6.0));
        assert!(report.converged);
        assert_eq!(report.epochs, 2);
    }

    #[test]
    fn test_mini_batch_and_hard_gd() {
        let d = data(2, 6);

        let (mut c, s) = switch();
        let cfg = LearnConfig {
            max_epochs: 3,
            ..LearnConfig::mini_batch(4)
        };
        c.learn_weights(s, &d, &cfg).unwrap();
        let w = c.weights(s).unwrap();
        assert!(w[1] > w[0]);

        let (mut c, s) = switch();
        let cfg = LearnConfig {
            method: LearningMethod::HardGd,
            max_epochs: 3,
            ..LearnConfig::default()
        };
        c.learn_weights(s, &d, &cfg).unwrap();
        let w = c.weights(s).unwrap();
        assert!(w[1] > w[0]);
        assert_eq!(c.evaluate_map(s, &VarSet::new()).unwrap().0.get(Var::new(0)), Some(1));
    }

    // s = 0.5 · ([X0: 0.9, 0.1] ⊗ [X1: 0.9, 0.1]) + 0.5 · ([X0: 0.1, 0.9] ⊗ [X1: 0.1, 0.9])
    fn correlated() -> (Circuit, NodeId) {
        let mut c = Circuit::new();
        let component = |c: &mut Circuit, p: f64| {
            let x0 = c.add_multinomial(0, vec![p, 1.0 - p]);
            let x1 = c.add_multinomial(1, vec![p, 1.0 - p]);
            let prod = c.add_product();
            c.add_child(prod, x0).unwrap();
            c.add_child(prod, x1).unwrap();
            prod
        };
        let p0 = component(&mut c, 0.9);
        let p1 = component(&mut c, 0.1);
        let s = c.add_sum();
        c.add_weighted_child(s, p0, 0.5).unwrap();
        c.add_weighted_child(s, p1, 0.5).unwrap();
        (c, s)
    }

    #[test]
    fn test_conditional_log_likelihood() {
        let (c, s) = correlated();
        let d = vec![VarSet::from([(0, 0), (1, 1)])];
        // P(X1 = 1 | X0 = 0) = (0.5 · 0.09 + 0.5 · 0.09) / (0.5 · 0.9 + 0.5 · 0.1)
        let cll = c.conditional_log_likelihood(s, &d, &[Var::new(1)]).unwrap();
        assert!(close(cll, 0.18f64.ln()));
        // With nothing queried the condition is the whole instance.
        assert!(close(c.conditional_log_likelihood(s, &d, &[]).unwrap(), 0.0));
    }

    #[test]
    fn test_discriminative_raises_conditional_likelihood() {
        let (mut c, s) = correlated();
        let d = vec![VarSet::from([(0, 0), (1, 1)]); 2];
        let query = [Var::new(1)];
        let before = c.conditional_log_likelihood(s, &d, &query).unwrap();

        let cfg = LearnConfig {
            epsilon: 1e-9,
            max_epochs: 5,
            ..LearnConfig::default()
        };
        let report = c.learn_discriminative(s, &d, &query, &cfg).unwrap();

        let w = c.weights(s).unwrap();
        assert!(w[1] > w[0]);
        assert!(w.iter().all(|&x| x >= 0.0));
        assert!(close(w[0] + w[1], 1.0));
        assert!(report.log_likelihood > before);
        assert!(report.history.windows(2).all(|h| h[1] >= h[0]));
        // The first component is driven to zero within two epochs, then nothing moves.
        assert_eq!(w[0], 0.0);
        assert!(report.converged);
        assert_eq!(report.epochs, 3);
    }

    #[test]
    fn test_discriminative_single_step() {
        let (mut c, s) = correlated();
        let d = vec![VarSet::from([(0, 0), (1, 1)])];
        let cfg = LearnConfig {
            max_epochs: 1,
            normalize: false,
            ..LearnConfig::default()
        };
        c.learn_discriminative(s, &d, &[Var::new(1)], &cfg).unwrap();
        // ∂/∂w0 = 1 - 0.9 / 0.5 = -0.8 and ∂/∂w1 = 1 - 0.1 / 0.5 = 0.8
        let w = c.weights(s).unwrap();
        assert!(close(w[0], 0.5 - 0.08));
        assert!(close(w[1], 0.5 + 0.08));
    }
}
