//! Seeded uniform sampling of the export stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a selected document is actually exported.
///
/// One generator is threaded through the whole run, so a fixed seed gives
/// the same export on every rerun.
#[derive(Debug, Clone)]
pub struct ExportSampler {
    probability: Option<f64>,
    rng: StdRng,
}

impl ExportSampler {
    /// Sample with `probability` (keep everything when `None`); seed from
    /// the OS when no seed is given
    pub fn new(seed: Option<u64>, probability: Option<f64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { probability, rng }
    }

    /// Keep every document
    pub fn keep_all() -> Self {
        Self::new(Some(0), None)
    }

    /// Draw once; only call for documents that passed selection
    pub fn keep(&mut self) -> bool {
        match self.probability {
            None => true,
            Some(p) => self.rng.gen::<f64>() < p,
        }
    }
}
