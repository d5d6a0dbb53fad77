//! Shared environmental state and the worker that keeps it fresh.
//!
//! The environmental sensor runs on its own cadence, independent of whether
//! a monitoring session is active. Vitals samples take whatever snapshot is
//! current at poll time; a failed sensor read leaves the previous values in
//! place (stale-but-present beats missing).

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::RwLock;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{EnvSensor, SensingError};

/// One environmental reading: °C, %RH, hPa.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EnvReading {
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
}

/// Cloneable handle to the most recent environmental reading.
///
/// Starts at zeros until the first successful sensor sample, matching the
/// behavior of a deployment with no environmental sensor attached.
#[derive(Clone, Default)]
pub struct EnvHandle {
    inner: Arc<RwLock<EnvReading>>,
}

impl EnvHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> EnvReading {
        *self.inner.read().await
    }

    pub async fn update(&self, reading: EnvReading) {
        *self.inner.write().await = reading;
    }
}

/// Poll `sensor` every `period` and publish into `handle` until cancelled.
/// Failures keep the previous reading and are logged at warn only on the
/// first consecutive occurrence.
pub async fn environment_worker(
    mut sensor: Box<dyn EnvSensor>,
    handle: EnvHandle,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failing = false;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sensor.sample() {
                    Ok(reading) => {
                        failing = false;
                        handle.update(reading).await;
                    }
                    Err(err) => {
                        if !failing {
                            warn!("environment sensor read failed, keeping stale values: {err}");
                            failing = true;
                        } else {
                            debug!("environment sensor still failing: {err}");
                        }
                    }
                }
            }
            _ = cancel.cancelled() => {
                debug!("environment worker shutting down");
                break;
            }
        }
    }
}

/// BME280 over I2C, used when the `hardware` feature is enabled.
#[cfg(feature = "hardware")]
pub use bme280::Bme280;

#[cfg(feature = "hardware")]
mod bme280 {
    use super::{EnvReading, EnvSensor, SensingError};
    use rppal::i2c::I2c;

    pub const BME280_ADDR: u16 = 0x77;

    const REG_ID: u8 = 0xD0;
    const REG_CTRL_HUM: u8 = 0xF2;
    const REG_CTRL_MEAS: u8 = 0xF4;
    const REG_CONFIG: u8 = 0xF5;
    const REG_DATA: u8 = 0xF7;
    const REG_CALIB_TP: u8 = 0x88;
    const REG_CALIB_H1: u8 = 0xA1;
    const REG_CALIB_H2: u8 = 0xE1;
    const CHIP_ID: u8 = 0x60;

    /// Factory calibration constants, read once at open.
    struct Calibration {
        t1: u16,
        t2: i16,
        t3: i16,
        p1: u16,
        p2: i16,
        p3: i16,
        p4: i16,
        p5: i16,
        p6: i16,
        p7: i16,
        p8: i16,
        p9: i16,
        h1: u8,
        h2: i16,
        h3: u8,
        h4: i16,
        h5: i16,
        h6: i8,
    }

    pub struct Bme280 {
        bus: I2c,
        calib: Calibration,
    }

    impl Bme280 {
        pub fn open() -> Result<Self, SensingError> {
            let mut bus = I2c::new()
                .map_err(|err| SensingError::HardwareUnavailable(format!("i2c: {err}")))?;
            bus.set_slave_address(BME280_ADDR)
                .map_err(|err| SensingError::HardwareUnavailable(format!("i2c addr: {err}")))?;

            let mut id = [0u8; 1];
            bus.write_read(&[REG_ID], &mut id)
                .map_err(|err| SensingError::HardwareUnavailable(format!("chip id: {err}")))?;
            if id[0] != CHIP_ID {
                return Err(SensingError::HardwareUnavailable(format!(
                    "unexpected chip id 0x{:02x} at 0x{BME280_ADDR:02x}",
                    id[0]
                )));
            }

            let calib = Self::read_calibration(&mut bus)?;

            // Humidity oversampling x1, then temp/pressure x1 in normal mode,
            // 500 ms standby. ctrl_hum must be written before ctrl_meas.
            bus.write(&[REG_CTRL_HUM, 0x01])
                .map_err(|err| SensingError::ReadFailed(format!("ctrl_hum: {err}")))?;
            bus.write(&[REG_CTRL_MEAS, 0x27])
                .map_err(|err| SensingError::ReadFailed(format!("ctrl_meas: {err}")))?;
            bus.write(&[REG_CONFIG, 0x80])
                .map_err(|err| SensingError::ReadFailed(format!("config: {err}")))?;

            Ok(Self { bus, calib })
        }

        fn read_calibration(bus: &mut I2c) -> Result<Calibration, SensingError> {
            let mut tp = [0u8; 24];
            bus.write_read(&[REG_CALIB_TP], &mut tp)
                .map_err(|err| SensingError::ReadFailed(format!("calib t/p: {err}")))?;
            let mut h1 = [0u8; 1];
            bus.write_read(&[REG_CALIB_H1], &mut h1)
                .map_err(|err| SensingError::ReadFailed(format!("calib h1: {err}")))?;
            let mut hx = [0u8; 7];
            bus.write_read(&[REG_CALIB_H2], &mut hx)
                .map_err(|err| SensingError::ReadFailed(format!("calib h: {err}")))?;

            let u16le = |lo: u8, hi: u8| u16::from(lo) | (u16::from(hi) << 8);

            Ok(Calibration {
                t1: u16le(tp[0], tp[1]),
                t2: u16le(tp[2], tp[3]) as i16,
                t3: u16le(tp[4], tp[5]) as i16,
                p1: u16le(tp[6], tp[7]),
                p2: u16le(tp[8], tp[9]) as i16,
                p3: u16le(tp[10], tp[11]) as i16,
                p4: u16le(tp[12], tp[13]) as i16,
                p5: u16le(tp[14], tp[15]) as i16,
                p6: u16le(tp[16], tp[17]) as i16,
                p7: u16le(tp[18], tp[19]) as i16,
                p8: u16le(tp[20], tp[21]) as i16,
                p9: u16le(tp[22], tp[23]) as i16,
                h1: h1[0],
                h2: u16le(hx[0], hx[1]) as i16,
                h3: hx[2],
                h4: (i16::from(hx[3]) << 4) | i16::from(hx[4] & 0x0F),
                h5: (i16::from(hx[5]) << 4) | i16::from(hx[4] >> 4),
                h6: hx[6] as i8,
            })
        }

        /// Datasheet fixed-point compensation. Returns (°C, %RH, hPa).
        fn compensate(&self, adc_t: i32, adc_p: i32, adc_h: i32) -> (f64, f64, f64) {
            let c = &self.calib;

            let var1 = (((adc_t >> 3) - ((c.t1 as i32) << 1)) * (c.t2 as i32)) >> 11;
            let var2 = (((((adc_t >> 4) - (c.t1 as i32)) * ((adc_t >> 4) - (c.t1 as i32))) >> 12)
                * (c.t3 as i32))
                >> 14;
            let t_fine = var1 + var2;
            let temperature = ((t_fine * 5 + 128) >> 8) as f64 / 100.0;

            let mut pvar1 = (t_fine as i64) - 128_000;
            let mut pvar2 = pvar1 * pvar1 * (c.p6 as i64);
            pvar2 += (pvar1 * (c.p5 as i64)) << 17;
            pvar2 += (c.p4 as i64) << 35;
            pvar1 = ((pvar1 * pvar1 * (c.p3 as i64)) >> 8) + ((pvar1 * (c.p2 as i64)) << 12);
            pvar1 = ((1i64 << 47) + pvar1) * (c.p1 as i64) >> 33;
            let pressure = if pvar1 == 0 {
                0.0
            } else {
                let mut p = 1_048_576 - (adc_p as i64);
                p = (((p << 31) - pvar2) * 3125) / pvar1;
                let v1 = ((c.p9 as i64) * (p >> 13) * (p >> 13)) >> 25;
                let v2 = ((c.p8 as i64) * p) >> 19;
                p = ((p + v1 + v2) >> 8) + ((c.p7 as i64) << 4);
                p as f64 / 256.0 / 100.0
            };

            let mut h = t_fine - 76_800;
            h = ((((adc_h << 14) - ((c.h4 as i32) << 20) - (c.h5 as i32) * h) + 16_384) >> 15)
                * (((((((h * (c.h6 as i32)) >> 10)
                    * (((h * (c.h3 as i32)) >> 11) + 32_768))
                    >> 10)
                    + 2_097_152)
                    * (c.h2 as i32)
                    + 8_192)
                    >> 14);
            h -= (((((h >> 15) * (h >> 15)) >> 7) * (c.h1 as i32)) >> 4) as i32;
            let h = h.clamp(0, 419_430_400);
            let humidity = (h >> 12) as f64 / 1024.0;

            (temperature, humidity, pressure)
        }
    }

    impl EnvSensor for Bme280 {
        fn sample(&mut self) -> Result<EnvReading, SensingError> {
            let mut raw = [0u8; 8];
            self.bus
                .write_read(&[REG_DATA], &mut raw)
                .map_err(|err| SensingError::ReadFailed(format!("burst read: {err}")))?;

            let adc_p =
                ((raw[0] as i32) << 12) | ((raw[1] as i32) << 4) | ((raw[2] as i32) >> 4);
            let adc_t =
                ((raw[3] as i32) << 12) | ((raw[4] as i32) << 4) | ((raw[5] as i32) >> 4);
            let adc_h = ((raw[6] as i32) << 8) | (raw[7] as i32);

            let (temperature, humidity, pressure) = self.compensate(adc_t, adc_p, adc_h);
            Ok(EnvReading {
                temperature,
                humidity,
                pressure,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingSensor {
        calls: Arc<AtomicU32>,
        fail_after: u32,
    }

    impl EnvSensor for CountingSensor {
        fn sample(&mut self) -> Result<EnvReading, SensingError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_after {
                Err(SensingError::ReadFailed("sensor gone".into()))
            } else {
                Ok(EnvReading {
                    temperature: 20.0 + f64::from(n),
                    humidity: 40.0,
                    pressure: 1000.0,
                })
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn worker_retains_stale_reading_on_failure() {
        let handle = EnvHandle::new();
        let calls = Arc::new(AtomicU32::new(0));
        let sensor = CountingSensor {
            calls: calls.clone(),
            fail_after: 2,
        };
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(environment_worker(
            Box::new(sensor),
            handle.clone(),
            Duration::from_secs(2),
            cancel.clone(),
        ));

        // Let several ticks elapse: two good reads, then failures.
        tokio::time::sleep(Duration::from_secs(9)).await;
        cancel.cancel();
        worker.await.unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 3);
        let reading = handle.snapshot().await;
        // Last good value (second read) survives the failures.
        assert_eq!(reading.temperature, 21.0);
    }

    #[tokio::test]
    async fn snapshot_defaults_to_zeros() {
        let handle = EnvHandle::new();
        assert_eq!(handle.snapshot().await, EnvReading::default());
    }
}
