//! Fabricated duty-cycle measurements.

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::MeasureProvider;

/// Measurement provider that draws values uniformly from a range.
///
/// Stands in for the RC-filter ADC reading on development machines.
#[derive(Debug, Clone)]
pub struct MockMeasureProvider {
    range: RangeInclusive<u16>,
    rng: StdRng,
}

impl MockMeasureProvider {
    /// Fabricate measurements from the given inclusive range.
    ///
    /// # Panics
    ///
    /// Panics on an empty range.
    pub fn new(range: RangeInclusive<u16>) -> Self {
        assert!(!range.is_empty(), "measurement range must not be empty");
        Self {
            range,
            rng: StdRng::from_entropy(),
        }
    }

    /// Seed the internal RNG for reproducible measurements.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl MeasureProvider for MockMeasureProvider {
    fn measure(&mut self) -> u16 {
        self.rng.gen_range(self.range.clone())
    }
}
