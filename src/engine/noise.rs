// src/engine/noise.rs
//
// Seeded additive noise: Gaussian (Box-Muller), uniform, and Poisson via
// per-intensity inverse-CDF tables.

use super::buffer::{clamp_u8, PixelBuffer, CHANNELS};
use super::pool;
use crate::ops::NoiseKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

/// Seed substituted for `0` so the default stays reproducible.
pub const DEFAULT_SEED: u64 = 1;

/// Cumulative probability at which a CDF table stops growing.
const CDF_TAIL: f64 = 1.0 - 1e-12;

/// Above this mean the tables would grow without bound; a rounded normal
/// approximation is sampled instead.
pub const POISSON_TABLE_MAX_LAMBDA: f64 = 4096.0;

/// Inverse-CDF tables for every 8-bit input intensity.
pub struct PoissonTables {
    amount: f64,
    cdfs: Vec<Vec<f64>>,
}

impl PoissonTables {
    /// Build the 256 tables on the worker pool. Each uses mean
    /// `(value / 255) * amount`.
    pub fn new(amount: f64) -> Self {
        let cdfs = pool::par_collect(256, |v| {
            let lambda = v as f64 / 255.0 * amount;
            if lambda > POISSON_TABLE_MAX_LAMBDA {
                Vec::new()
            } else {
                poisson_cdf(lambda)
            }
        });
        Self { amount, cdfs }
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// CDF for intensity `value`; empty when the normal approximation applies.
    pub fn cdf(&self, value: u8) -> &[f64] {
        &self.cdfs[value as usize]
    }

    /// Draw an event count for intensity `value`.
    fn sample(&self, value: u8, rng: &mut StdRng) -> f64 {
        let cdf = self.cdf(value);
        if cdf.is_empty() {
            let lambda = value as f64 / 255.0 * self.amount;
            return (lambda + lambda.sqrt() * standard_normal(rng)).round().max(0.0);
        }
        let u: f64 = rng.gen();
        cdf.partition_point(|&c| c < u) as f64
    }
}

/// Poisson CDF for mean `lambda`, truncated once it reaches `CDF_TAIL` or
/// `ceil(lambda + 10*sqrt(lambda) + 10)` terms (at least 32).
///
/// Terms are accumulated in log space so large means do not underflow.
pub fn poisson_cdf(lambda: f64) -> Vec<f64> {
    if !(lambda > 0.0) {
        return vec![1.0];
    }
    let upper = ((lambda + 10.0 * lambda.sqrt() + 10.0).ceil() as usize).max(32);
    let ln_lambda = lambda.ln();
    let mut ln_p = -lambda;
    let mut cum = ln_p.exp();
    let mut cdf = Vec::with_capacity(upper.min(1 << 16) + 1);
    cdf.push(cum);
    let mut k = 1usize;
    while cum < CDF_TAIL && k <= upper {
        ln_p += ln_lambda - (k as f64).ln();
        cum = (cum + ln_p.exp()).min(1.0);
        cdf.push(cum);
        k += 1;
    }
    cdf
}

/// Box-Muller standard normal sample.
#[inline]
fn standard_normal(rng: &mut StdRng) -> f64 {
    // 1 - gen() lies in (0, 1], keeping the logarithm finite.
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Add noise of `kind` and strength `amount` to RGB; alpha is copied.
///
/// `amount` is the standard deviation for Gaussian, the maximum deviation
/// for uniform, and the intensity scale for Poisson. The same `seed` always
/// produces the same output; `0` maps to [`DEFAULT_SEED`].
pub fn add_noise(src: &PixelBuffer, kind: NoiseKind, amount: f64, seed: i64) -> PixelBuffer {
    if !(amount > 0.0) || !amount.is_finite() {
        tracing::debug!(target: "raster_cmd::noise", amount, "non-positive noise amount, returning clone");
        return src.clone();
    }
    let seed = if seed == 0 { DEFAULT_SEED } else { seed as u64 };
    let mut rng = StdRng::seed_from_u64(seed);
    let tables = matches!(kind, NoiseKind::Poisson).then(|| PoissonTables::new(amount));

    let mut out = src.clone();
    for px in out.data_mut().chunks_exact_mut(CHANNELS) {
        for c in 0..3 {
            let v = px[c];
            let noisy = match (&tables, kind) {
                (Some(t), _) => t.sample(v, &mut rng) * (255.0 / amount),
                (None, NoiseKind::Uniform) => v as f64 + (rng.gen::<f64>() * 2.0 - 1.0) * amount,
                (None, _) => v as f64 + standard_normal(&mut rng) * amount,
            };
            px[c] = clamp_u8(noisy);
        }
    }
    out
}
