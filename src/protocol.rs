/// Telemetry wire format.
///
/// One flat JSON object per datagram: `{"motion":true,"gas":412.5,"lux":52.0}`.
/// Uses `heapless` buffers for no_std/no-alloc operation.
use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::state::Reading;

/// Telemetry payload sent once per telemetry tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TelemetryMessage {
    pub motion: bool,
    /// Gas concentration in ppm
    pub gas: f32,
    /// Ambient light in lux
    pub lux: f32,
}

impl From<Reading> for TelemetryMessage {
    fn from(r: Reading) -> Self {
        Self {
            motion: r.motion,
            gas: r.gas_ppm,
            lux: r.lux,
        }
    }
}

/// Node software version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized telemetry datagram
pub const MAX_MSG_LEN: usize = 128;

/// Buffer type for serialized datagrams
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Serialize a message into `buf`. Returns the number of bytes written,
/// or `None` if it did not fit.
pub fn serialize_message(msg: &TelemetryMessage, buf: &mut [u8]) -> Option<usize> {
    serde_json_core::to_slice(msg, buf).ok()
}

/// Serialize a message into an owned datagram buffer.
pub fn encode(msg: &TelemetryMessage) -> Option<MsgBuffer> {
    let mut buf = MsgBuffer::new();
    buf.resize_default(MAX_MSG_LEN).ok()?;
    let len = serialize_message(msg, &mut buf)?;
    buf.truncate(len);
    Some(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_str(buf: &[u8]) -> &str {
        core::str::from_utf8(buf).unwrap()
    }

    #[test]
    fn serialize_flat_payload() {
        let msg = TelemetryMessage {
            motion: true,
            gas: 412.5,
            lux: 50.0,
        };
        let buf = encode(&msg).unwrap();
        let json = as_str(&buf);
        assert!(json.starts_with('{') && json.ends_with('}'));
        assert!(json.contains(r#""motion":true"#));
        assert!(json.contains(r#""gas":412.5"#));
        assert!(json.contains(r#""lux":50"#));
    }

    #[test]
    fn field_order_is_motion_gas_lux() {
        let msg = TelemetryMessage {
            motion: false,
            gas: 1.0,
            lux: 2.0,
        };
        let buf = encode(&msg).unwrap();
        let json = as_str(&buf);
        let m = json.find("motion").unwrap();
        let g = json.find("gas").unwrap();
        let l = json.find("lux").unwrap();
        assert!(m < g && g < l);
        assert!(json.contains(r#""motion":false"#));
    }

    #[test]
    fn from_reading() {
        let msg = TelemetryMessage::from(Reading {
            motion: true,
            gas_ppm: 600.0,
            lux: 3.5,
        });
        assert!(msg.motion);
        assert_eq!(msg.gas, 600.0);
        assert_eq!(msg.lux, 3.5);
    }

    #[test]
    fn too_small_buffer_fails() {
        let msg = TelemetryMessage {
            motion: true,
            gas: 412.5,
            lux: 50.0,
        };
        let mut buf = [0u8; 8];
        assert!(serialize_message(&msg, &mut buf).is_none());
    }

    #[test]
    fn extreme_values_fit_buffer() {
        let msg = TelemetryMessage {
            motion: true,
            gas: -f32::MAX,
            lux: f32::MIN_POSITIVE,
        };
        assert!(encode(&msg).is_some());
    }

    #[test]
    fn payload_parses_back_to_same_message() {
        for msg in [
            TelemetryMessage {
                motion: true,
                gas: 412.5,
                lux: 50.0,
            },
            TelemetryMessage {
                motion: false,
                gas: 0.0,
                lux: 3.25,
            },
            TelemetryMessage::from(Reading {
                motion: true,
                gas_ppm: 1234.5,
                lux: 0.125,
            }),
        ] {
            let buf = encode(&msg).unwrap();
            let (parsed, used) = serde_json_core::from_slice::<TelemetryMessage>(&buf).unwrap();
            assert_eq!(used, buf.len());
            assert_eq!(parsed, msg, "{}", as_str(&buf));
        }
    }
}
