//! Frame decoding for the mmWave vital-signs radar.
//!
//! The radar firmware does all signal processing on-chip and streams TI
//! demo-format frames over UART: a magic word, a fixed header, then TLVs.
//! We only decode the envelope and pull the FFT heart/breathing estimates
//! out of the vital-signs TLV; everything upstream of those two floats is
//! opaque to this crate.
//!
//! Parsing is pure and buffer-oriented so it can be tested byte-for-byte
//! without a serial port; only the UART reader is hardware-gated.

use super::VitalEstimate;

/// Sync pattern preceding every frame.
pub const FRAME_MAGIC: [u8; 8] = [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07];

/// Frame header layout: magic word then seven little-endian u32s.
pub const HEADER_LEN: usize = 36;

const TLV_HEADER_LEN: usize = 8;
/// TLV carrying the vital-signs output stats.
const TLV_TYPE_VITAL_SIGNS: u32 = 6;

/// Byte offsets of the FFT estimates inside the vital-signs payload.
const OFFSET_HEART_RATE_FFT: usize = 28;
const OFFSET_BREATHING_RATE_FFT: usize = 44;
/// Payload must at least cover the breathing estimate.
const MIN_VITAL_PAYLOAD_LEN: usize = OFFSET_BREATHING_RATE_FFT + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u32,
    pub total_packet_len: u32,
    pub platform: u32,
    pub frame_number: u32,
    pub time_cpu_cycles: u32,
    pub num_detected_obj: u32,
    pub num_tlvs: u32,
}

/// Result of scanning a receive buffer for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameScan {
    /// A complete frame was decoded; `consumed` bytes can be discarded.
    Complete {
        header: FrameHeader,
        estimate: Option<VitalEstimate>,
        consumed: usize,
    },
    /// A frame has started but not all of its bytes have arrived yet;
    /// everything before `discard` is garbage and can be dropped.
    Incomplete { discard: usize },
    /// No magic word anywhere; the whole buffer can be dropped.
    NoFrame,
}

/// Scan `buf` for the next complete frame.
pub fn scan_frame(buf: &[u8]) -> FrameScan {
    let Some(start) = find_magic(buf) else {
        return FrameScan::NoFrame;
    };
    let frame = &buf[start..];
    if frame.len() < HEADER_LEN {
        return FrameScan::Incomplete { discard: start };
    }

    let header = parse_header(frame);
    let total = header.total_packet_len as usize;
    // A packet shorter than its own header is firmware garbage; skip the
    // magic word so the scan can resync on the next one.
    if total < HEADER_LEN {
        return FrameScan::Incomplete { discard: start + FRAME_MAGIC.len() };
    }
    if frame.len() < total {
        return FrameScan::Incomplete { discard: start };
    }

    let estimate = extract_vitals(&frame[HEADER_LEN..total], header.num_tlvs);
    FrameScan::Complete {
        header,
        estimate,
        consumed: start + total,
    }
}

fn find_magic(buf: &[u8]) -> Option<usize> {
    buf.windows(FRAME_MAGIC.len())
        .position(|window| window == FRAME_MAGIC)
}

fn parse_header(frame: &[u8]) -> FrameHeader {
    let word = |index: usize| {
        let at = FRAME_MAGIC.len() + index * 4;
        u32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]])
    };
    FrameHeader {
        version: word(0),
        total_packet_len: word(1),
        platform: word(2),
        frame_number: word(3),
        time_cpu_cycles: word(4),
        num_detected_obj: word(5),
        num_tlvs: word(6),
    }
}

/// Walk the TLV list and pull the FFT estimates from the vital-signs
/// payload, if present and long enough.
fn extract_vitals(mut tlvs: &[u8], num_tlvs: u32) -> Option<VitalEstimate> {
    for _ in 0..num_tlvs {
        if tlvs.len() < TLV_HEADER_LEN {
            return None;
        }
        let tlv_type = u32::from_le_bytes([tlvs[0], tlvs[1], tlvs[2], tlvs[3]]);
        let tlv_len = u32::from_le_bytes([tlvs[4], tlvs[5], tlvs[6], tlvs[7]]) as usize;
        let body = &tlvs[TLV_HEADER_LEN..];
        if body.len() < tlv_len {
            return None;
        }
        if tlv_type == TLV_TYPE_VITAL_SIGNS && tlv_len >= MIN_VITAL_PAYLOAD_LEN {
            let f32_at = |at: usize| {
                f32::from_le_bytes([body[at], body[at + 1], body[at + 2], body[at + 3]])
            };
            return Some(VitalEstimate {
                heart_rate: f64::from(f32_at(OFFSET_HEART_RATE_FFT)),
                breathing_rate: f64::from(f32_at(OFFSET_BREATHING_RATE_FFT)),
            });
        }
        tlvs = &body[tlv_len..];
    }
    None
}

#[cfg(feature = "hardware")]
pub use uart::UartRadar;

#[cfg(feature = "hardware")]
mod uart {
    use std::time::Duration;

    use log::debug;
    use rppal::uart::{Parity, Uart};

    use super::super::{SensingError, VitalEstimate, VitalSource};
    use super::{scan_frame, FrameScan};

    /// Data-port baud rate of the radar module.
    const BAUD_RATE: u32 = 921_600;
    const READ_CHUNK: usize = 4096;
    /// Cap on buffered garbage before we resync from scratch.
    const MAX_BUFFER: usize = 64 * 1024;
    const READ_TIMEOUT: Duration = Duration::from_millis(500);

    /// Reads decoder frames off the radar's UART data port.
    pub struct UartRadar {
        port: Uart,
        buffer: Vec<u8>,
    }

    impl UartRadar {
        pub fn open(device: &str) -> Result<Self, SensingError> {
            let mut port = Uart::with_path(device, BAUD_RATE, Parity::None, 8, 1)
                .map_err(|err| {
                    SensingError::HardwareUnavailable(format!("uart {device}: {err}"))
                })?;
            port.set_read_mode(0, READ_TIMEOUT)
                .map_err(|err| SensingError::HardwareUnavailable(format!("uart mode: {err}")))?;
            debug!("radar uart open at {device} ({BAUD_RATE} baud)");
            Ok(Self {
                port,
                buffer: Vec::with_capacity(READ_CHUNK),
            })
        }
    }

    impl VitalSource for UartRadar {
        fn read_vitals(&mut self) -> Result<VitalEstimate, SensingError> {
            let mut chunk = [0u8; READ_CHUNK];
            let read = self
                .port
                .read(&mut chunk)
                .map_err(|err| SensingError::ReadFailed(format!("uart read: {err}")))?;
            if read == 0 && self.buffer.is_empty() {
                return Err(SensingError::ReadFailed("uart read timed out".into()));
            }
            self.buffer.extend_from_slice(&chunk[..read]);
            if self.buffer.len() > MAX_BUFFER {
                self.buffer.clear();
                return Err(SensingError::MalformedFrame(
                    "receive buffer overflowed without a frame".into(),
                ));
            }

            match scan_frame(&self.buffer) {
                FrameScan::Complete {
                    estimate,
                    consumed,
                    ..
                } => {
                    self.buffer.drain(..consumed);
                    estimate.ok_or_else(|| {
                        SensingError::MalformedFrame("frame had no vital-signs payload".into())
                    })
                }
                FrameScan::Incomplete { discard } => {
                    self.buffer.drain(..discard);
                    Err(SensingError::ReadFailed("frame not complete yet".into()))
                }
                FrameScan::NoFrame => {
                    self.buffer.clear();
                    Err(SensingError::MalformedFrame("no magic word in stream".into()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build one frame with a single vital-signs TLV.
    fn build_frame(hr: f32, br: f32, frame_number: u32) -> Vec<u8> {
        let mut payload = vec![0u8; 64];
        payload[OFFSET_HEART_RATE_FFT..OFFSET_HEART_RATE_FFT + 4]
            .copy_from_slice(&hr.to_le_bytes());
        payload[OFFSET_BREATHING_RATE_FFT..OFFSET_BREATHING_RATE_FFT + 4]
            .copy_from_slice(&br.to_le_bytes());

        let total = HEADER_LEN + TLV_HEADER_LEN + payload.len();
        let mut frame = Vec::with_capacity(total);
        frame.extend_from_slice(&FRAME_MAGIC);
        for word in [
            0x0102_0304u32,
            total as u32,
            0xa502,
            frame_number,
            0,
            1,
            1,
        ] {
            frame.extend_from_slice(&word.to_le_bytes());
        }
        frame.extend_from_slice(&TLV_TYPE_VITAL_SIGNS.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        frame
    }

    #[test]
    fn decodes_estimates_from_frame() {
        let frame = build_frame(72.5, 15.25, 41);
        match scan_frame(&frame) {
            FrameScan::Complete {
                header,
                estimate,
                consumed,
            } => {
                assert_eq!(header.frame_number, 41);
                assert_eq!(consumed, frame.len());
                let estimate = estimate.expect("vital-signs TLV present");
                assert_eq!(estimate.heart_rate, 72.5);
                assert_eq!(estimate.breathing_rate, 15.25);
            }
            other => panic!("expected complete frame, got {other:?}"),
        }
    }

    #[test]
    fn resyncs_past_leading_garbage() {
        let mut stream = vec![0xFF, 0x00, 0x13, 0x37];
        let garbage = stream.len();
        stream.extend_from_slice(&build_frame(61.0, 13.0, 7));
        match scan_frame(&stream) {
            FrameScan::Complete { consumed, .. } => assert_eq!(consumed, stream.len()),
            other => panic!("expected complete frame, got {other:?}"),
        }
        assert!(garbage < stream.len());
    }

    #[test]
    fn partial_frame_reports_incomplete() {
        let frame = build_frame(70.0, 14.0, 1);
        let partial = &frame[..frame.len() - 10];
        assert_eq!(scan_frame(partial), FrameScan::Incomplete { discard: 0 });
    }

    #[test]
    fn buffer_without_magic_is_no_frame() {
        assert_eq!(scan_frame(&[0u8; 128]), FrameScan::NoFrame);
    }

    #[test]
    fn unknown_tlv_types_are_skipped() {
        let mut frame = build_frame(68.0, 16.0, 2);
        // Prepend a foreign TLV by rebuilding: header says two TLVs.
        let mut payload = Vec::new();
        payload.extend_from_slice(&9u32.to_le_bytes());
        payload.extend_from_slice(&4u32.to_le_bytes());
        payload.extend_from_slice(&[0xAA; 4]);
        let original_body = frame.split_off(HEADER_LEN);
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&original_body);
        // Fix up total length and TLV count in the header.
        let total = frame.len() as u32;
        frame[12..16].copy_from_slice(&total.to_le_bytes());
        frame[32..36].copy_from_slice(&2u32.to_le_bytes());

        match scan_frame(&frame) {
            FrameScan::Complete { estimate, .. } => {
                let estimate = estimate.expect("second TLV decoded");
                assert_eq!(estimate.heart_rate, 68.0);
            }
            other => panic!("expected complete frame, got {other:?}"),
        }
    }

    #[test]
    fn short_vital_payload_yields_no_estimate() {
        let mut frame = Vec::new();
        frame.extend_from_slice(&FRAME_MAGIC);
        let payload_len = 16u32; // far below the breathing-rate offset
        let total = HEADER_LEN as u32 + TLV_HEADER_LEN as u32 + payload_len;
        for word in [1u32, total, 0, 1, 0, 0, 1] {
            frame.extend_from_slice(&word.to_le_bytes());
        }
        frame.extend_from_slice(&TLV_TYPE_VITAL_SIGNS.to_le_bytes());
        frame.extend_from_slice(&payload_len.to_le_bytes());
        frame.extend_from_slice(&vec![0u8; payload_len as usize]);

        match scan_frame(&frame) {
            FrameScan::Complete { estimate, .. } => assert!(estimate.is_none()),
            other => panic!("expected complete frame, got {other:?}"),
        }
    }
}
