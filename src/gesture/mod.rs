//! Gesture-driven start/stop.
//!
//! A swipe LEFT in front of the sensor starts a monitoring session, a swipe
//! RIGHT ends it. The sensor itself sits behind [`GestureSource`] so the
//! worker is testable; the APDS9960 driver only exists with the `hardware`
//! feature.

use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::acquisition::{AcquisitionController, RunState};
use crate::sensing::SensingError;

/// How often the sensor is polled for a pending gesture.
pub const POLL_PERIOD: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Swipe {
    Left,
    Right,
}

pub trait GestureSource: Send {
    /// Return a decoded swipe if one is pending. `Ok(None)` means no
    /// gesture; errors are transient and the worker keeps polling.
    fn poll_swipe(&mut self) -> Result<Option<Swipe>, SensingError>;
}

/// Map swipes onto session transitions until cancelled. A swipe that does
/// not fit the current state (LEFT while running, RIGHT while idle) is
/// ignored, like the original two-state gesture protocol.
pub async fn gesture_worker(
    mut source: Box<dyn GestureSource>,
    acquisition: AcquisitionController,
    cancel: CancellationToken,
) {
    let mut ticker = interval(POLL_PERIOD);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let swipe = match source.poll_swipe() {
                    Ok(Some(swipe)) => swipe,
                    Ok(None) => continue,
                    Err(err) => {
                        debug!("gesture poll failed: {err}");
                        continue;
                    }
                };
                match (swipe, acquisition.status().await) {
                    (Swipe::Left, RunState::Idle) => {
                        info!("gesture: start monitoring");
                        if let Err(err) = acquisition.start_session().await {
                            warn!("gesture start failed: {err:#}");
                        }
                    }
                    (Swipe::Right, RunState::Running) => {
                        info!("gesture: stop monitoring");
                        if let Err(err) = acquisition.end_session().await {
                            warn!("gesture stop failed: {err:#}");
                        }
                    }
                    _ => {}
                }
            }
            _ = cancel.cancelled() => {
                debug!("gesture worker shutting down");
                break;
            }
        }
    }
}

#[cfg(feature = "hardware")]
pub use apds9960::Apds9960;

#[cfg(feature = "hardware")]
mod apds9960 {
    use rppal::i2c::I2c;

    use super::{GestureSource, Swipe};
    use crate::sensing::SensingError;

    pub const APDS9960_ADDR: u16 = 0x39;

    const REG_ENABLE: u8 = 0x80;
    const REG_ID: u8 = 0x92;
    const REG_GPENTH: u8 = 0xA0;
    const REG_GCONF4: u8 = 0xAB;
    const REG_GFLVL: u8 = 0xAE;
    const REG_GSTATUS: u8 = 0xAF;
    const REG_GFIFO_U: u8 = 0xFC;

    const CHIP_ID: u8 = 0xAB;
    /// PON | PEN | GEN: power, proximity and gesture engines.
    const ENABLE_GESTURE: u8 = 0b0100_0101;
    const GVALID: u8 = 0x01;

    /// Minimal APDS9960 gesture driver.
    ///
    /// Reads the gesture FIFO and classifies left/right from the sign of
    /// the left-right photodiode delta between the first and last dataset
    /// of a gesture burst. Up/down swipes are deliberately ignored.
    pub struct Apds9960 {
        bus: I2c,
    }

    impl Apds9960 {
        pub fn open() -> Result<Self, SensingError> {
            let mut bus = I2c::new()
                .map_err(|err| SensingError::HardwareUnavailable(format!("i2c: {err}")))?;
            bus.set_slave_address(APDS9960_ADDR)
                .map_err(|err| SensingError::HardwareUnavailable(format!("i2c addr: {err}")))?;

            let mut id = [0u8; 1];
            bus.write_read(&[REG_ID], &mut id)
                .map_err(|err| SensingError::HardwareUnavailable(format!("chip id: {err}")))?;
            if id[0] != CHIP_ID {
                return Err(SensingError::HardwareUnavailable(format!(
                    "unexpected gesture chip id 0x{:02x}",
                    id[0]
                )));
            }

            // Gesture proximity entry threshold, then enable the engines.
            bus.write(&[REG_GPENTH, 40])
                .map_err(|err| SensingError::ReadFailed(format!("gpenth: {err}")))?;
            bus.write(&[REG_GCONF4, 0x01])
                .map_err(|err| SensingError::ReadFailed(format!("gconf4: {err}")))?;
            bus.write(&[REG_ENABLE, ENABLE_GESTURE])
                .map_err(|err| SensingError::ReadFailed(format!("enable: {err}")))?;

            Ok(Self { bus })
        }

        fn read_reg(&mut self, reg: u8) -> Result<u8, SensingError> {
            let mut value = [0u8; 1];
            self.bus
                .write_read(&[reg], &mut value)
                .map_err(|err| SensingError::ReadFailed(format!("reg 0x{reg:02x}: {err}")))?;
            Ok(value[0])
        }
    }

    impl GestureSource for Apds9960 {
        fn poll_swipe(&mut self) -> Result<Option<Swipe>, SensingError> {
            if self.read_reg(REG_GSTATUS)? & GVALID == 0 {
                return Ok(None);
            }
            let datasets = self.read_reg(REG_GFLVL)?;
            if datasets < 2 {
                return Ok(None);
            }

            // Each dataset is four bytes: up, down, left, right.
            let mut fifo = vec![0u8; usize::from(datasets) * 4];
            self.bus
                .write_read(&[REG_GFIFO_U], &mut fifo)
                .map_err(|err| SensingError::ReadFailed(format!("gesture fifo: {err}")))?;

            let first = &fifo[..4];
            let last = &fifo[fifo.len() - 4..];
            let first_delta = i16::from(first[2]) - i16::from(first[3]);
            let last_delta = i16::from(last[2]) - i16::from(last[3]);

            // The photodiode that sees the hand first dominates early and
            // fades late; the delta sign flip gives the direction.
            Ok(match (first_delta, last_delta) {
                (f, l) if f > 10 && l < -10 => Some(Swipe::Left),
                (f, l) if f < -10 && l > 10 => Some(Swipe::Right),
                _ => None,
            })
        }
    }
}
