//! Procedural ambient sound sources.
//!
//! All three are endless mono/stereo generators; the sink mixes nothing, it
//! just plays whichever single source the engine appended.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rodio::Source;

const SAMPLE_RATE: u32 = 44_100;

/// Two sine tones, one per stereo channel, whose frequency difference is
/// the perceived binaural beat.
pub struct BinauralTone {
    left_hz: f32,
    right_hz: f32,
    sample_index: u64,
    /// Next sample goes to the left channel when true.
    left_next: bool,
}

impl BinauralTone {
    pub fn new(left_hz: f32, right_hz: f32) -> Self {
        Self {
            left_hz,
            right_hz,
            sample_index: 0,
            left_next: true,
        }
    }
}

impl Iterator for BinauralTone {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let t = self.sample_index as f32 / SAMPLE_RATE as f32;
        let hz = if self.left_next { self.left_hz } else { self.right_hz };
        let value = (std::f32::consts::TAU * hz * t).sin() * 0.25;
        if !self.left_next {
            self.sample_index += 1;
        }
        self.left_next = !self.left_next;
        Some(value)
    }
}

impl Source for BinauralTone {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        2
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Integrated white noise, leaky so it never wanders off center.
pub struct BrownNoise {
    level: f32,
    rng: StdRng,
}

impl BrownNoise {
    pub fn new() -> Self {
        Self {
            level: 0.0,
            rng: StdRng::from_entropy(),
        }
    }

    fn step(&mut self) -> f32 {
        let white: f32 = self.rng.gen_range(-1.0..1.0);
        self.level = ((self.level + white * 0.02) * 0.999).clamp(-1.0, 1.0);
        self.level
    }
}

impl Iterator for BrownNoise {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        Some(self.step() * 0.5)
    }
}

impl Source for BrownNoise {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}

/// Rain: brown noise pushed through a crude one-pole high-pass with slow
/// amplitude drift so it doesn't sound like a constant hiss.
pub struct RainNoise {
    noise: BrownNoise,
    previous_in: f32,
    previous_out: f32,
    drift_phase: f32,
}

impl RainNoise {
    pub fn new() -> Self {
        Self {
            noise: BrownNoise::new(),
            previous_in: 0.0,
            previous_out: 0.0,
            drift_phase: 0.0,
        }
    }
}

impl Iterator for RainNoise {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        let input = self.noise.step();
        // y[n] = a * (y[n-1] + x[n] - x[n-1])
        let filtered = 0.85 * (self.previous_out + input - self.previous_in);
        self.previous_in = input;
        self.previous_out = filtered;

        self.drift_phase += 0.4 / SAMPLE_RATE as f32;
        if self.drift_phase > std::f32::consts::TAU {
            self.drift_phase -= std::f32::consts::TAU;
        }
        let drift = 0.75 + 0.25 * self.drift_phase.sin();

        Some((filtered * 0.8 + input * 0.2) * drift * 0.4)
    }
}

impl Source for RainNoise {
    fn current_frame_len(&self) -> Option<usize> {
        None
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None
    }
}
