use tracing::{debug, warn};

use crate::models::wire::DeviceListFrame;

/// Outcome of decoding one inbound MQTT payload (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedPulse {
    /// Seconds since epoch (`ts` / 1000).
    pub t: f64,
}

/// Parses a raw device-list envelope and extracts the pulse timestamp for
/// `target_mac`, if present. Stateless: every call is independent.
///
/// Returns `None` for any of: malformed JSON, no device record matching
/// `target_mac` (case-insensitive), or a matching record with a missing or
/// zero `ts`. Per spec §4.1 / §7, a non-matching MAC is dropped silently
/// (debug log) while a matching-MAC-but-bad-`ts` record is dropped with a
/// warning.
pub fn decode_pulse(payload: &[u8], target_mac: &str) -> Option<DecodedPulse> {
    let frame: DeviceListFrame = match serde_json::from_slice(payload) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "dropping malformed device-list frame");
            return None;
        }
    };

    let record = frame
        .dev_list
        .iter()
        .find(|d| d.mac.eq_ignore_ascii_case(target_mac));

    let record = match record {
        Some(r) => r,
        None => {
            debug!(target_mac, "no device record matched target MAC, skipping");
            return None;
        }
    };

    match record.ts {
        Some(ts) if ts != 0 => Some(DecodedPulse { t: ts as f64 / 1000.0 }),
        _ => {
            warn!(mac = %record.mac, "matching device record had missing or zero ts, dropping");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "E58D81019613";

    #[test]
    fn decodes_matching_device_timestamp() {
        let payload = br#"{"dev_list":[{"mac":"e58d81019613","ts":1700000000000}]}"#;
        let decoded = decode_pulse(payload, TARGET).expect("should decode");
        assert_eq!(decoded.t, 1_700_000_000.0);
    }

    #[test]
    fn ignores_non_target_mac() {
        let payload = br#"{"dev_list":[{"mac":"AAAAAAAAAAAA","ts":1700000000000}]}"#;
        assert!(decode_pulse(payload, TARGET).is_none());
    }

    #[test]
    fn drops_zero_ts() {
        let payload = br#"{"dev_list":[{"mac":"E58D81019613","ts":0}]}"#;
        assert!(decode_pulse(payload, TARGET).is_none());
    }

    #[test]
    fn drops_missing_ts() {
        let payload = br#"{"dev_list":[{"mac":"E58D81019613"}]}"#;
        assert!(decode_pulse(payload, TARGET).is_none());
    }

    #[test]
    fn drops_malformed_json() {
        let payload = b"not json";
        assert!(decode_pulse(payload, TARGET).is_none());
    }

    #[test]
    fn drops_missing_dev_list() {
        let payload = br#"{}"#;
        assert!(decode_pulse(payload, TARGET).is_none());
    }

    #[test]
    fn selects_first_matching_entry_among_several() {
        let payload = br#"{"dev_list":[
            {"mac":"111111111111","ts":1},
            {"mac":"E58D81019613","ts":1700000001000},
            {"mac":"E58D81019613","ts":1700000002000}
        ]}"#;
        let decoded = decode_pulse(payload, TARGET).expect("should decode");
        assert_eq!(decoded.t, 1_700_000_001.0);
    }
}
