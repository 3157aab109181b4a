//! Deterministic random number generation.
//!
//! RULE: Nothing in the calibration core may call any platform RNG.
//! All randomness flows through NoiseStream instances derived from
//! the single master seed supplied by the caller.
//!
//! Each noise use-site gets its own stream, seeded deterministically
//! from (master_seed XOR stream_index). This means:
//!   - Adding a new stream never changes existing streams' draws.
//!   - Each stream is fully reproducible in isolation.

use crate::error::{CalibError, CalibResult};
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};

/// Parameters of the Normal perturbation applied to original survey
/// weights before optimization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub mean:    f64,
    pub std_dev: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        // Survey weights are perturbed with N(10, 1) unless the
        // caller overrides.
        Self { mean: 10.0, std_dev: 1.0 }
    }
}

/// A named, deterministic RNG for a single noise use-site.
pub struct NoiseStream {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl NoiseStream {
    /// Create a stream from the master seed and a stable stream index.
    /// The index must never change once assigned.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw one sample from N(mean, std_dev).
    pub fn normal(&mut self, cfg: NoiseConfig) -> CalibResult<f64> {
        let dist = Normal::new(cfg.mean, cfg.std_dev).map_err(|e| CalibError::InvalidNoise {
            reason: e.to_string(),
        })?;
        Ok(dist.sample(&mut self.inner))
    }

    /// Return `weights` with independent N(mean, std_dev) noise added
    /// to every entry.
    pub fn perturb(&mut self, weights: &[f64], cfg: NoiseConfig) -> CalibResult<Vec<f64>> {
        let dist = Normal::new(cfg.mean, cfg.std_dev).map_err(|e| CalibError::InvalidNoise {
            reason: e.to_string(),
        })?;
        Ok(weights
            .iter()
            .map(|w| w + dist.sample(&mut self.inner))
            .collect())
    }
}

/// All noise streams for a single calibration run, indexed by stable slot.
pub struct NoiseBank {
    master_seed: u64,
}

impl NoiseBank {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn for_slot(&self, slot: NoiseSlot) -> NoiseStream {
        NoiseStream::new(self.master_seed, slot as u64).with_name(slot.name())
    }
}

/// Stable stream slot assignments.
/// NEVER reorder or remove entries — only append.
/// Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum NoiseSlot {
    WeightPerturbation = 0,
    // Add new streams here — append only.
}

impl NoiseSlot {
    pub fn name(&self) -> &'static str {
        match self {
            Self::WeightPerturbation => "weight_perturbation",
        }
    }
}
