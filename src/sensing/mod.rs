//! Sensor boundary: the opaque radar decoder, the environmental sensor, and
//! the reader that merges them into [`VitalsSample`]s.
//!
//! Nothing in this module lets a hardware failure reach the acquisition
//! loop: vitals degrade to synthetic values and environmental readings stay
//! stale rather than going missing.

pub mod environment;
pub mod radar;
pub mod synthetic;

use chrono::Local;
use log::{debug, warn};
use thiserror::Error;

use crate::vitals::VitalsSample;
use environment::EnvHandle;
use synthetic::SyntheticVitals;

/// Estimates above this are decoder glitches, not physiology.
pub const MAX_PLAUSIBLE_BPM: f64 = 500.0;

#[derive(Debug, Error)]
pub enum SensingError {
    /// The device is missing or could not be opened.
    #[error("hardware unavailable: {0}")]
    HardwareUnavailable(String),
    /// The device exists but this read did not produce data.
    #[error("sensor read failed: {0}")]
    ReadFailed(String),
    /// Bytes arrived but did not form a decodable frame.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Heart/breathing estimate from the upstream decoder, before capping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalEstimate {
    pub heart_rate: f64,
    pub breathing_rate: f64,
}

/// The opaque radar decoder. Implementations block at most for their own
/// hardware timeout and never panic.
pub trait VitalSource: Send {
    fn read_vitals(&mut self) -> Result<VitalEstimate, SensingError>;
}

/// Environmental sensor (temperature / humidity / pressure).
pub trait EnvSensor: Send {
    fn sample(&mut self) -> Result<environment::EnvReading, SensingError>;
}

/// Merges the radar decoder and the environmental snapshot into samples.
///
/// `poll` never fails: a decoder error falls back to synthetic values in
/// the physiological range, and the environmental side always has the last
/// good reading (zeros before the first one).
pub struct SensorReader {
    source: Option<Box<dyn VitalSource>>,
    fallback: SyntheticVitals,
    env: EnvHandle,
    /// Whether the previous poll came from the fallback, for edge-triggered
    /// warnings instead of one per cycle.
    was_synthetic: bool,
}

impl SensorReader {
    pub fn new(source: Option<Box<dyn VitalSource>>, env: EnvHandle) -> Self {
        if source.is_none() {
            warn!("no radar decoder available, vitals will be synthetic");
        }
        Self {
            source,
            fallback: SyntheticVitals::new(),
            env,
            was_synthetic: false,
        }
    }

    pub async fn poll(&mut self) -> VitalsSample {
        let estimate = match self.source.as_mut().map(|source| source.read_vitals()) {
            Some(Ok(estimate)) => {
                if self.was_synthetic {
                    debug!("radar decoder recovered, back to real vitals");
                    self.was_synthetic = false;
                }
                estimate
            }
            Some(Err(err)) => {
                if !self.was_synthetic {
                    warn!("radar read failed ({err}), falling back to synthetic vitals");
                    self.was_synthetic = true;
                }
                self.fallback.generate()
            }
            None => {
                self.was_synthetic = true;
                self.fallback.generate()
            }
        };

        let env = self.env.snapshot().await;
        VitalsSample {
            timestamp: Local::now(),
            heart_rate: cap_estimate(estimate.heart_rate),
            breathing_rate: cap_estimate(estimate.breathing_rate),
            temperature: env.temperature,
            humidity: env.humidity,
            pressure: env.pressure,
        }
    }
}

fn cap_estimate(bpm: f64) -> f64 {
    bpm.min(MAX_PLAUSIBLE_BPM)
}
