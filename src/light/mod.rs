//! Ambient light actuator.
//!
//! The strip itself is a black box behind [`LightActuator`]; callers hand it
//! a fully scaled RGB triple. The WS2812 implementation is only compiled
//! with the `hardware` feature; everywhere else a logging stand-in keeps the
//! actuation path exercised.

use std::sync::Arc;

use anyhow::Result;
use log::debug;

/// Status color while a monitoring session is running.
pub const STATUS_RUNNING_RGB: (u8, u8, u8) = (255, 0, 0);
/// Status color while idle, waiting for a start signal.
pub const STATUS_IDLE_RGB: (u8, u8, u8) = (255, 255, 0);

/// Scale a full-brightness color by a 0–100 brightness value. Out-of-range
/// inputs are clamped rather than wrapped.
pub fn scale_rgb(rgb: (u8, u8, u8), brightness: i64) -> (u8, u8, u8) {
    let factor = brightness.clamp(0, 100) as u32;
    let scale = |component: u8| ((u32::from(component) * factor) / 100) as u8;
    (scale(rgb.0), scale(rgb.1), scale(rgb.2))
}

pub trait LightActuator: Send + Sync {
    fn set_rgb(&self, rgb: (u8, u8, u8)) -> Result<()>;

    fn off(&self) -> Result<()> {
        self.set_rgb((0, 0, 0))
    }
}

pub type LightHandle = Arc<dyn LightActuator>;

/// Stand-in actuator that just logs, used without the `hardware` feature
/// and in tests.
pub struct LoggingLight;

impl LightActuator for LoggingLight {
    fn set_rgb(&self, rgb: (u8, u8, u8)) -> Result<()> {
        debug!("light -> rgb({}, {}, {})", rgb.0, rgb.1, rgb.2);
        Ok(())
    }
}

#[cfg(feature = "hardware")]
pub use ws2812::Ws2812Strip;

#[cfg(feature = "hardware")]
mod ws2812 {
    use std::sync::Mutex;

    use anyhow::{Context, Result};
    use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

    use super::LightActuator;

    /// Number of pixels on the strip.
    const LED_COUNT: usize = 16;
    /// 3.2 MHz: four SPI bits per WS2812 bit-period.
    const SPI_CLOCK_HZ: u32 = 3_200_000;

    /// WS2812 strip driven over SPI.
    ///
    /// Each data bit becomes a 4-bit SPI pattern (`1000` for 0, `1110` for
    /// 1) so the strip's timing comes out of the SPI clock instead of
    /// bit-banged GPIO.
    pub struct Ws2812Strip {
        spi: Mutex<Spi>,
    }

    impl Ws2812Strip {
        pub fn open() -> Result<Self> {
            let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, SPI_CLOCK_HZ, Mode::Mode0)
                .context("failed to open SPI bus for LED strip")?;
            Ok(Self {
                spi: Mutex::new(spi),
            })
        }

        fn encode_byte(byte: u8, out: &mut Vec<u8>) {
            // Two data bits per output byte, MSB first.
            for pair in (0..4).rev() {
                let bits = (byte >> (pair * 2)) & 0b11;
                let hi = if bits & 0b10 != 0 { 0b1110 } else { 0b1000 };
                let lo = if bits & 0b01 != 0 { 0b1110 } else { 0b1000 };
                out.push((hi << 4) | lo);
            }
        }
    }

    impl LightActuator for Ws2812Strip {
        fn set_rgb(&self, rgb: (u8, u8, u8)) -> Result<()> {
            // WS2812 wants GRB order; every pixel gets the same color.
            let mut encoded = Vec::with_capacity(LED_COUNT * 12 + 64);
            for _ in 0..LED_COUNT {
                Self::encode_byte(rgb.1, &mut encoded);
                Self::encode_byte(rgb.0, &mut encoded);
                Self::encode_byte(rgb.2, &mut encoded);
            }
            // Trailing low time acts as the latch.
            encoded.extend_from_slice(&[0u8; 64]);

            let mut spi = self.spi.lock().expect("spi mutex poisoned");
            spi.write(&encoded).context("LED strip SPI write failed")?;
            Ok(())
        }
    }
}
