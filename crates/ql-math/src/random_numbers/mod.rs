//! Random and quasi-random number generation.
//!
//! Scalar generators ([`MersenneTwisterUniformRng`],
//! [`InverseCumulativeNormalRng`]) feed the Gaussian sequence generators
//! consumed by Monte Carlo path generators through the
//! [`RandomSequenceGenerator`] trait.

mod brownian_bridge;
mod sobol;

pub use brownian_bridge::BrownianBridge;
pub use sobol::{SobolRsg, MAX_DIMENSION as SOBOL_MAX_DIMENSION};

use crate::distributions::normal_cdf_inverse;
use ql_core::{BigNatural, Real, Result};
use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};
use rand_distr::StandardNormal;
use rand_mt::Mt19937GenRand64;

/// Seed used when a generator is constructed with seed 0.
pub const DEFAULT_SEED: BigNatural = 5489;

/// Uniform generator on `(0, 1)` backed by MT19937-64.
#[derive(Clone)]
pub struct MersenneTwisterUniformRng {
    rng: Mt19937GenRand64,
}

impl std::fmt::Debug for MersenneTwisterUniformRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MersenneTwisterUniformRng").finish_non_exhaustive()
    }
}

/// The seed a generator actually uses: [`DEFAULT_SEED`] for 0.
pub fn effective_seed(seed: BigNatural) -> BigNatural {
    if seed == 0 {
        DEFAULT_SEED
    } else {
        seed
    }
}

impl MersenneTwisterUniformRng {
    /// Generator seeded with `seed` ([`DEFAULT_SEED`] when 0).
    pub fn new(seed: BigNatural) -> Self {
        Self {
            rng: Mt19937GenRand64::new(effective_seed(seed)),
        }
    }

    /// Next deviate in the open interval `(0, 1)`.
    pub fn next_real(&mut self) -> Real {
        // top 53 bits, shifted half an ulp off zero
        let bits = self.rng.next_u64() >> 11;
        (bits as Real + 0.5) / 9_007_199_254_740_992.0
    }

    /// Next raw 64-bit output.
    pub fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }
}

/// Standard normal deviates by inverting the cumulative distribution of
/// Mersenne-Twister uniforms.
#[derive(Debug, Clone)]
pub struct InverseCumulativeNormalRng {
    uniform: MersenneTwisterUniformRng,
}

impl InverseCumulativeNormalRng {
    /// Generator seeded with `seed` ([`DEFAULT_SEED`] when 0).
    pub fn new(seed: BigNatural) -> Self {
        Self {
            uniform: MersenneTwisterUniformRng::new(seed),
        }
    }

    /// Next standard normal deviate.
    pub fn next_real(&mut self) -> Real {
        normal_cdf_inverse(self.uniform.next_real())
    }
}

/// A generator of Gaussian vectors of fixed dimension.
///
/// Implementations own their output buffer; `next_sequence` overwrites it
/// and returns a view that stays valid until the next call.
pub trait RandomSequenceGenerator: Send {
    /// Length of each sequence.
    fn dimension(&self) -> usize;

    /// Draw the next sequence.
    fn next_sequence(&mut self) -> &[Real];

    /// The most recently drawn sequence.
    fn last_sequence(&self) -> &[Real];

    /// Whether sample statistics give a valid error estimate (false for
    /// low-discrepancy sequences).
    fn allows_error_estimate(&self) -> bool;
}

/// Pseudo-random Gaussian sequences.
#[derive(Debug, Clone)]
pub struct PseudoRandomSequence {
    rng: InverseCumulativeNormalRng,
    buffer: Vec<Real>,
}

impl PseudoRandomSequence {
    /// Sequences of length `dimension` from a generator seeded with `seed`.
    pub fn new(dimension: usize, seed: BigNatural) -> Result<Self> {
        ql_core::ensure!(dimension > 0, "sequence dimension must be positive");
        Ok(Self {
            rng: InverseCumulativeNormalRng::new(seed),
            buffer: vec![0.0; dimension],
        })
    }
}

impl RandomSequenceGenerator for PseudoRandomSequence {
    fn dimension(&self) -> usize {
        self.buffer.len()
    }

    fn next_sequence(&mut self) -> &[Real] {
        for x in self.buffer.iter_mut() {
            *x = self.rng.next_real();
        }
        &self.buffer
    }

    fn last_sequence(&self) -> &[Real] {
        &self.buffer
    }

    fn allows_error_estimate(&self) -> bool {
        true
    }
}

/// Gaussian sequences from Sobol points.
#[derive(Debug, Clone)]
pub struct LowDiscrepancySequence {
    sobol: SobolRsg,
    buffer: Vec<Real>,
}

impl LowDiscrepancySequence {
    /// Sobol-based sequences of length `dimension`; `seed` selects how many
    /// initial points are skipped.
    pub fn new(dimension: usize, seed: BigNatural) -> Result<Self> {
        Ok(Self {
            sobol: SobolRsg::new(dimension, seed)?,
            buffer: vec![0.0; dimension],
        })
    }
}

impl RandomSequenceGenerator for LowDiscrepancySequence {
    fn dimension(&self) -> usize {
        self.buffer.len()
    }

    fn next_sequence(&mut self) -> &[Real] {
        let u = self.sobol.next_sequence();
        for (x, &ui) in self.buffer.iter_mut().zip(u.iter()) {
            *x = normal_cdf_inverse(ui);
        }
        &self.buffer
    }

    fn last_sequence(&self) -> &[Real] {
        &self.buffer
    }

    fn allows_error_estimate(&self) -> bool {
        false
    }
}

/// Gaussian sequences drawn from any `rand` generator.
#[derive(Debug, Clone)]
pub struct RandGaussianSequence<R> {
    rng: R,
    buffer: Vec<Real>,
}

impl RandGaussianSequence<StdRng> {
    /// Sequences from a `StdRng` seeded with `seed`.
    pub fn seeded(dimension: usize, seed: BigNatural) -> Result<Self> {
        Self::new(dimension, StdRng::seed_from_u64(seed))
    }
}

impl<R: RngCore + Send> RandGaussianSequence<R> {
    /// Sequences of length `dimension` drawn from `rng`.
    pub fn new(dimension: usize, rng: R) -> Result<Self> {
        ql_core::ensure!(dimension > 0, "sequence dimension must be positive");
        Ok(Self {
            rng,
            buffer: vec![0.0; dimension],
        })
    }
}

impl<R: RngCore + Send> RandomSequenceGenerator for RandGaussianSequence<R> {
    fn dimension(&self) -> usize {
        self.buffer.len()
    }

    fn next_sequence(&mut self) -> &[Real] {
        for x in self.buffer.iter_mut() {
            *x = self.rng.sample(StandardNormal);
        }
        &self.buffer
    }

    fn last_sequence(&self) -> &[Real] {
        &self.buffer
    }

    fn allows_error_estimate(&self) -> bool {
        true
    }
}

/// Deterministic seed for the `index`-th independent stream derived from
/// `master`; distinct indices give unrelated streams.  A zero master is
/// resolved to [`DEFAULT_SEED`] first, so it derives the same streams as
/// the seed it stands for.
pub fn derived_seed(master: BigNatural, index: u64) -> BigNatural {
    let master = effective_seed(master);
    let mut rng = StdRng::seed_from_u64(master ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    // never hand out 0, which means "default seed" to the MT generators
    rng.next_u64().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn uniforms_stay_in_open_interval() {
        let mut rng = MersenneTwisterUniformRng::new(42);
        assert!((0..10_000).map(|_| rng.next_real()).all(|u| u > 0.0 && u < 1.0));
    }

    #[test]
    fn seed_zero_is_reproducible() {
        let mut a = MersenneTwisterUniformRng::new(0);
        let mut b = MersenneTwisterUniformRng::new(DEFAULT_SEED);
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn gaussian_moments() {
        let mut g = PseudoRandomSequence::new(4, 1234).unwrap();
        let n = 25_000;
        let (mut s1, mut s2) = (0.0, 0.0);
        for _ in 0..n {
            for &x in g.next_sequence() {
                s1 += x;
                s2 += x * x;
            }
        }
        let m = (4 * n) as Real;
        assert_abs_diff_eq!(s1 / m, 0.0, epsilon = 0.02);
        assert_abs_diff_eq!(s2 / m, 1.0, epsilon = 0.02);
        assert!(g.allows_error_estimate());
    }

    #[test]
    fn rand_backed_sequence_and_seeds() {
        let mut g = RandGaussianSequence::seeded(3, 9).unwrap();
        let first = g.next_sequence().to_vec();
        let mut h = RandGaussianSequence::seeded(3, 9).unwrap();
        assert_eq!(first, h.next_sequence().to_vec());
        assert_eq!(derived_seed(5, 1), derived_seed(5, 1));
        assert_ne!(derived_seed(5, 1), derived_seed(5, 2));
    }

    #[test]
    fn low_discrepancy_is_symmetric_and_flagged() {
        let mut g = LowDiscrepancySequence::new(2, 0).unwrap();
        assert!(!g.allows_error_estimate());
        assert_eq!(g.next_sequence()[0], 0.0); // Φ⁻¹(0.5)
        assert_eq!(g.last_sequence().len(), 2);
    }
}
