//! Deterministic binomial sampling driven by the keyed mix
//!
//! `sample(mix, node_id, n, p)` draws `Binomial(n, p)` by inverse CDF at a
//! uniform point derived from `mix.eval(node_id)` truncated to 32 bits.
//!
//! Known approximations, kept for compatibility with existing hints:
//! - `n > 100` uses a normal approximation with `u` clamped to `[0.001, 0.999]`
//! - [`inv_normal_cdf`] returns `+/-2.0` outside the central band `|p - 0.5| < 0.42`
//!
//! Both bias extreme quantiles; they are accuracy trade-offs, never errors.

use crate::prf::KeyedMix;

/// Above this ball count the normal approximation is used
pub const EXACT_CDF_LIMIT: u64 = 100;

const U_CLAMP_LOW: f64 = 0.001;
const U_CLAMP_HIGH: f64 = 0.999;

/// Map a 32-bit PRF output into the open interval (0, 1)
#[inline]
pub fn uniform_from_prf(prf_output: u64) -> f64 {
    let masked = prf_output & 0xFFFF_FFFF;
    (masked as f64 + 1.0) / ((1u64 << 32) as f64 + 2.0)
}

/// Sample `Binomial(n, p)` deterministically for tree node `node_id`
pub fn sample<M: KeyedMix>(mix: &M, node_id: u64, n: u64, p: f64) -> u64 {
    let u = uniform_from_prf(mix.eval(node_id));
    inverse_cdf(n, p, u)
}

/// Inverse CDF of `Binomial(n, p)` at `u`
pub fn inverse_cdf(n: u64, p: f64, u: f64) -> u64 {
    if p == 0.0 {
        return 0;
    }
    if p == 1.0 {
        return n;
    }
    if n == 0 {
        return 0;
    }

    if n > EXACT_CDF_LIMIT {
        return normal_approx(n, p, u);
    }

    let q = 1.0 - p;

    // P(X = 0) = q^n, then P(k+1) = P(k) * (n-k)/(k+1) * p/q
    let mut prob = q.powf(n as f64);
    let mut cum_prob = prob;
    if u <= cum_prob {
        return 0;
    }

    for k in 0..n {
        prob = prob * (n - k) as f64 / (k + 1) as f64 * p / q;
        cum_prob += prob;
        if u <= cum_prob {
            return k + 1;
        }
    }

    n
}

/// Normal approximation `N(np, np(1-p))`, rounded and clamped to `[0, n]`
fn normal_approx(n: u64, p: f64, u: f64) -> u64 {
    let mean = n as f64 * p;
    let stddev = (n as f64 * p * (1.0 - p)).sqrt();

    let u = u.clamp(U_CLAMP_LOW, U_CLAMP_HIGH);
    let result = mean + inv_normal_cdf(u) * stddev;

    if result < 0.0 {
        return 0;
    }
    if result > n as f64 {
        return n;
    }
    result.round() as u64
}

/// Approximate inverse of the standard normal CDF
///
/// Quadratic-over-quadratic rational approximation in the central band.
/// Outside it the tails collapse to `+/-2.0` (`+/-10.0` at exactly 0 or 1).
pub fn inv_normal_cdf(p: f64) -> f64 {
    if p <= 0.0 || p >= 1.0 {
        if p == 0.0 {
            return -10.0;
        }
        if p == 1.0 {
            return 10.0;
        }
        return 0.0;
    }

    const A0: f64 = 2.50662823884;
    const A1: f64 = -18.61500062529;
    const A2: f64 = 41.39119773534;
    const A3: f64 = -25.44106049637;

    const B0: f64 = -8.47351093090;
    const B1: f64 = 23.08336743743;
    const B2: f64 = -21.06224101826;
    const B3: f64 = 3.13082909833;

    let y = p - 0.5;

    if y.abs() < 0.42 {
        let r = y * y;
        return y * (((A3 * r + A2) * r + A1) * r + A0)
            / ((((B3 * r + B2) * r + B1) * r + B0) * r + 1.0);
    }

    // TODO: replace the constant tails with a log-based approximation once
    // existing client hints can be regenerated.
    if y > 0.0 {
        2.0
    } else {
        -2.0
    }
}
