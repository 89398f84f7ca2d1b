//! Log-domain arithmetic.
//!
//! Every value flowing through the engine is a natural logarithm. Products become
//! sums, and sums need the max-shift trick to stay finite:
//!
//! ```text
//! ln(Σ exp(t_i)) = m + ln(1 + Σ_{i ≠ argmax} exp(t_i - m)),   m = max t_i
//! ```

/// `ln(0)`.
pub const LOG_ZERO: f64 = f64::NEG_INFINITY;

/// `ln(1/sqrt(2π))`, the log-density of a standard normal at its mode.
pub const LOG_GAUSS_MAX: f64 = -0.918_938_533_204_672_7;

/// Natural logarithm mapping `0` to [`LOG_ZERO`] explicitly.
pub fn ln(x: f64) -> f64 {
    if x == 0.0 {
        LOG_ZERO
    } else {
        x.ln()
    }
}

/// Stable `ln(Σ exp(t_i))`. Returns [`LOG_ZERO`] for an empty slice.
pub fn log_sum_exp(terms: &[f64]) -> f64 {
    let Some((imax, &max)) = terms
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
    else {
        return LOG_ZERO;
    };
    if max.is_infinite() {
        // Either every term is ln(0), or some term is +inf.
        return max;
    }
    let rest: f64 = terms
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != imax)
        .map(|(_, &t)| (t - max).exp())
        .sum();
    max + rest.ln_1p()
}

/// Stable `ln(exp(a) + exp(b))`.
pub fn log_sum_exp_pair(a: f64, b: f64) -> f64 {
    let (hi, lo) = if a >= b { (a, b) } else { (b, a) };
    if hi.is_infinite() {
        return hi;
    }
    hi + (lo - hi).exp().ln_1p()
}

/// Stable `ln(Σ w_i · exp(t_i))` for non-negative weights `w_i`.
pub fn weighted_log_sum_exp(terms: &[f64], weights: &[f64]) -> f64 {
    debug_assert_eq!(terms.len(), weights.len());
    let shifted: Vec<f64> = terms.iter().zip(weights).map(|(&t, &w)| t + ln(w)).collect();
    log_sum_exp(&shifted)
}

/// Rescale `v` in place so that it sums to one. Returns `false` (leaving `v`
/// untouched) when the total mass is zero or not finite.
pub fn normalize(v: &mut [f64]) -> bool {
    let total: f64 = v.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return false;
    }
    for x in v.iter_mut() {
        *x /= total;
    }
    true
}
