//! Leaf distributions.
//!
//! Each leaf answers three questions about its variable given some evidence:
//!
//! - [`log_value`][Leaf::log_value]: log-probability of the evidence, or `ln 1 = 0`
//!   when the variable is unobserved (marginalisation);
//! - [`log_max`][Leaf::log_max]: the maximal log-probability compatible with the evidence;
//! - [`arg_max`][Leaf::arg_max]: the value attaining `log_max`.

use log::trace;

use crate::types::Var;
use crate::utils::{ln, LOG_GAUSS_MAX, LOG_ZERO};
use crate::varset::VarSet;

/// A leaf distribution.
#[derive(Debug, Clone, PartialEq)]
pub enum Leaf {
    Multinomial(Multinomial),
    Gaussian(Gaussian),
    Indicator(Indicator),
}

impl Leaf {
    /// The variable this leaf is a distribution over.
    pub fn var(&self) -> Var {
        match self {
            Leaf::Multinomial(m) => m.var,
            Leaf::Gaussian(g) => g.var,
            Leaf::Indicator(i) => i.var,
        }
    }

    /// The variables this leaf depends on, sorted.
    pub fn scope(&self) -> Vec<Var> {
        match self {
            Leaf::Multinomial(m) => m.scope.clone(),
            _ => vec![self.var()],
        }
    }

    pub fn log_value(&self, evidence: &VarSet) -> f64 {
        match self {
            Leaf::Multinomial(m) => m.log_value(evidence),
            Leaf::Gaussian(g) => g.log_value(evidence),
            Leaf::Indicator(i) => i.log_value(evidence),
        }
    }

    pub fn log_max(&self, evidence: &VarSet) -> f64 {
        match self {
            Leaf::Multinomial(m) => m.log_max(evidence),
            Leaf::Gaussian(g) => g.log_max(evidence),
            Leaf::Indicator(i) => i.log_max(evidence),
        }
    }

    /// The decoded value of this leaf's variable: the observed value if the
    /// evidence fixes it, the mode otherwise.
    pub fn arg_max(&self, evidence: &VarSet) -> usize {
        if let Some(x) = evidence.get(self.var()) {
            return x;
        }
        match self {
            Leaf::Multinomial(m) => m.mode,
            Leaf::Gaussian(g) => g.mode(),
            Leaf::Indicator(i) => i.value,
        }
    }

    /// Location and scale parameters, as printed by the text dump.
    pub fn location_scale(&self) -> (f64, f64) {
        match self {
            Leaf::Multinomial(m) => (m.mean(), m.std_dev()),
            Leaf::Gaussian(g) => (g.mean, g.sd),
            Leaf::Indicator(i) => (i.value as f64, 0.0),
        }
    }
}

impl From<Multinomial> for Leaf {
    fn from(m: Multinomial) -> Self {
        Leaf::Multinomial(m)
    }
}

impl From<Gaussian> for Leaf {
    fn from(g: Gaussian) -> Self {
        Leaf::Gaussian(g)
    }
}

impl From<Indicator> for Leaf {
    fn from(i: Indicator) -> Self {
        Leaf::Indicator(i)
    }
}

// ─── Multinomial ───

/// A categorical distribution over the values `0..pr.len()`.
#[derive(Debug, Clone, PartialEq)]
pub struct Multinomial {
    var: Var,
    pr: Vec<f64>,
    /// Index of the first maximal entry of `pr`.
    mode: usize,
    scope: Vec<Var>,
}

fn compute_mode(pr: &[f64]) -> usize {
    let mut mode = 0;
    for (i, &p) in pr.iter().enumerate() {
        if p > pr[mode] {
            mode = i;
        }
    }
    mode
}

fn laplace(counts: &[u64]) -> Vec<f64> {
    let total: f64 = counts.iter().map(|&c| 1.0 + c as f64).sum();
    counts.iter().map(|&c| (1.0 + c as f64) / total).collect()
}

impl Multinomial {
    /// Multinomial with the given probability vector.
    pub fn new(var: Var, pr: Vec<f64>) -> Self {
        let mode = compute_mode(&pr);
        Self {
            var,
            pr,
            mode,
            scope: vec![var],
        }
    }

    /// Multinomial estimated from category counts with Laplace smoothing:
    /// `pr_i = (1 + c_i) / Σ_j (1 + c_j)`.
    pub fn from_counts(var: Var, counts: &[u64]) -> Self {
        Self::new(var, laplace(counts))
    }

    /// Like [`from_counts`][Self::from_counts], but the leaf claims the wider
    /// scope `scope` (which must contain `var`).
    pub fn scoped_from_counts(var: Var, scope: &[Var], counts: &[u64]) -> Self {
        let mut m = Self::from_counts(var, counts);
        let mut scope = scope.to_vec();
        if !scope.contains(&var) {
            scope.push(var);
        }
        scope.sort();
        scope.dedup();
        m.scope = scope;
        m
    }

    /// Uniform multinomial over `cardinality` categories.
    pub fn uniform(var: Var, cardinality: usize) -> Self {
        Self::new(var, vec![1.0 / cardinality as f64; cardinality])
    }

    pub(crate) fn with_scope(mut self, scope: Vec<Var>) -> Self {
        self.scope = scope;
        self
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn pr(&self) -> &[f64] {
        &self.pr
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn scope(&self) -> &[Var] {
        &self.scope
    }

    fn log_pr(&self, x: usize) -> f64 {
        match self.pr.get(x) {
            Some(&p) => ln(p),
            None => {
                trace!("{} = {} is outside the support of size {}", self.var, x, self.pr.len());
                LOG_ZERO
            }
        }
    }

    pub fn log_value(&self, evidence: &VarSet) -> f64 {
        match evidence.get(self.var) {
            Some(x) => self.log_pr(x),
            None => 0.0,
        }
    }

    pub fn log_max(&self, evidence: &VarSet) -> f64 {
        match evidence.get(self.var) {
            Some(x) => self.log_pr(x),
            None => self.pr.get(self.mode).map_or(LOG_ZERO, |&p| ln(p)),
        }
    }

    pub fn mean(&self) -> f64 {
        self.pr.iter().enumerate().map(|(i, &p)| p * i as f64).sum()
    }

    /// Spread of the category indices around [`mean`][Self::mean].
    pub fn std_dev(&self) -> f64 {
        if self.pr.is_empty() {
            return 0.0;
        }
        let mu = self.mean();
        let ss: f64 = (0..self.pr.len()).map(|i| (i as f64 - mu).powi(2)).sum();
        (ss / self.pr.len() as f64).sqrt()
    }
}

// ─── Gaussian ───

/// A univariate Gaussian over the integer value of its variable.
///
/// The log-density is that of a standard normal evaluated at `(x - mean) / sd`,
/// so the maximum is always `ln(1/sqrt(2π))`.
#[derive(Debug, Clone, PartialEq)]
pub struct Gaussian {
    var: Var,
    mean: f64,
    sd: f64,
}

impl Gaussian {
    /// Gaussian with the given parameters. A non-positive `sd` is replaced by `1`.
    pub fn new(var: Var, mean: f64, sd: f64) -> Self {
        let sd = if sd > 0.0 { sd } else { 1.0 };
        Self { var, mean, sd }
    }

    /// Gaussian fitted to a histogram, where `counts[i]` is the number of
    /// observations of value `i`.
    pub fn from_counts(var: Var, counts: &[u64]) -> Self {
        let n: f64 = counts.iter().map(|&c| c as f64).sum();
        if n == 0.0 {
            return Self::new(var, 0.0, 1.0);
        }
        let mean = counts.iter().enumerate().map(|(i, &c)| (i as f64) * c as f64).sum::<f64>() / n;
        let var_sum: f64 = counts
            .iter()
            .enumerate()
            .map(|(i, &c)| c as f64 * (i as f64 - mean).powi(2))
            .sum();
        Self::new(var, mean, (var_sum / n).sqrt())
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn sd(&self) -> f64 {
        self.sd
    }

    fn log_pdf(&self, x: usize) -> f64 {
        let z = (x as f64 - self.mean) / self.sd;
        LOG_GAUSS_MAX - 0.5 * z * z
    }

    /// The integer value closest to the mean.
    pub fn mode(&self) -> usize {
        self.mean.round().max(0.0) as usize
    }

    pub fn log_value(&self, evidence: &VarSet) -> f64 {
        match evidence.get(self.var) {
            Some(x) => self.log_pdf(x),
            None => 0.0,
        }
    }

    pub fn log_max(&self, evidence: &VarSet) -> f64 {
        match evidence.get(self.var) {
            Some(x) => self.log_pdf(x),
            None => LOG_GAUSS_MAX,
        }
    }
}

// ─── Indicator ───

/// Indicator of `var = value`: `1` when the variable takes that value or is
/// unobserved, `0` otherwise.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Indicator {
    var: Var,
    value: usize,
}

impl Indicator {
    pub fn new(var: Var, value: usize) -> Self {
        Self { var, value }
    }

    pub fn var(&self) -> Var {
        self.var
    }

    pub fn value(&self) -> usize {
        self.value
    }

    pub fn log_value(&self, evidence: &VarSet) -> f64 {
        match evidence.get(self.var) {
            Some(x) if x != self.value => LOG_ZERO,
            _ => 0.0,
        }
    }

    pub fn log_max(&self, evidence: &VarSet) -> f64 {
        self.log_value(evidence)
    }
}
