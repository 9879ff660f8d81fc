/// Conversion between decoded payloads and the JSON shape delivered by the
/// network server's payload formatter
use log::{debug, warn};
use serde_json::{json, Map, Number};

use super::tags;
use crate::models::{Decoded, DecodedBatch, DecodedReading, Value};

const VERSION_KEY: &str = "version";
const INTERVAL_KEY: &str = "interval";
const MEASUREMENTS_KEY: &str = "measurements";
const OFFSET_KEY: &str = "timestamp";

/// Render a decoded payload as
/// `{version, interval?, latitude?, longitude?, altitude?, measurements?: [{timestamp, ...}], ...}`
pub fn to_json(decoded: &Decoded) -> serde_json::Value {
    match decoded {
        Decoded::Single(reading) => {
            let mut object = fields_to_json(&reading.fields);
            object.insert(VERSION_KEY.into(), json!(reading.version));
            serde_json::Value::Object(object)
        }
        Decoded::Batch(batch) => {
            let mut object = fields_to_json(&batch.fixed_fields);
            object.insert(VERSION_KEY.into(), json!(batch.version));
            object.insert(INTERVAL_KEY.into(), json!(batch.interval));
            let measurements = batch
                .measurements
                .iter()
                .map(|sample| {
                    let mut entry = fields_to_json(&sample.fields);
                    entry.insert(OFFSET_KEY.into(), json!(sample.offset.unwrap_or(0)));
                    serde_json::Value::Object(entry)
                })
                .collect();
            object.insert(MEASUREMENTS_KEY.into(), serde_json::Value::Array(measurements));
            serde_json::Value::Object(object)
        }
        Decoded::Empty => json!({}),
    }
}

/// Parse an already-decoded payload object.
///
/// A missing `version` means version 1. Versions other than 1, 2 and 3 give
/// `Decoded::Empty`.
pub fn from_json(payload: &serde_json::Value) -> Decoded {
    let Some(object) = payload.as_object() else {
        warn!("Decoded payload is not an object, ignoring it");
        return Decoded::Empty;
    };

    let version = match object.get(VERSION_KEY) {
        None => 1,
        Some(v) => match v.as_u64() {
            Some(version) => version,
            None => {
                warn!("Unreadable payload version {}", v);
                return Decoded::Empty;
            }
        },
    };

    match version {
        1 => Decoded::Single(DecodedReading {
            version: 1,
            offset: None,
            fields: fields_from_json(object),
        }),
        2 | 3 => Decoded::Batch(batch_from_json(version as u8, object)),
        other => {
            debug!("Ignoring payload with unknown version {}", other);
            Decoded::Empty
        }
    }
}

fn batch_from_json(version: u8, object: &Map<String, serde_json::Value>) -> DecodedBatch {
    let interval = object
        .get(INTERVAL_KEY)
        .and_then(serde_json::Value::as_u64)
        .map_or(0, |v| clamp_u8(INTERVAL_KEY, v));

    let fixed_fields = fields_from_json(object)
        .into_iter()
        .filter(|(name, _)| tags::lookup_field(name).map_or(false, |spec| spec.fixed_once))
        .collect();

    let measurements = object
        .get(MEASUREMENTS_KEY)
        .and_then(serde_json::Value::as_array)
        .map(|samples| {
            samples
                .iter()
                .filter_map(serde_json::Value::as_object)
                .map(|sample| DecodedReading {
                    version,
                    offset: sample
                        .get(OFFSET_KEY)
                        .and_then(serde_json::Value::as_u64)
                        .map(|v| clamp_u8(OFFSET_KEY, v)),
                    fields: fields_from_json(sample),
                })
                .collect()
        })
        .unwrap_or_default();

    DecodedBatch {
        version,
        interval,
        fixed_fields,
        measurements,
    }
}

/// Interval and offset are single bytes on the wire
fn clamp_u8(key: &str, value: u64) -> u8 {
    u8::try_from(value).unwrap_or_else(|_| {
        debug!("Clamping {} {} to {}", key, value, u8::MAX);
        u8::MAX
    })
}

fn fields_from_json(
    object: &Map<String, serde_json::Value>,
) -> std::collections::BTreeMap<String, Value> {
    object
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), VERSION_KEY | INTERVAL_KEY | MEASUREMENTS_KEY | OFFSET_KEY))
        .filter_map(|(key, value)| value_from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

fn value_from_json(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int(i))
            } else {
                n.as_f64().map(Value::Float)
            }
        }
        serde_json::Value::String(s) => Some(Value::Text(s.clone())),
        _ => None,
    }
}

fn fields_to_json(
    fields: &std::collections::BTreeMap<String, Value>,
) -> Map<String, serde_json::Value> {
    fields
        .iter()
        .map(|(name, value)| {
            let json_value = match value {
                Value::Float(v) => Number::from_f64(*v)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                Value::Int(v) => json!(v),
                Value::Text(s) => json!(s),
            };
            (name.clone(), json_value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decoder::decode;
    use crate::codec::tags::*;

    #[test]
    fn test_single_reading_is_flat() {
        let decoded = decode(&[1, TAG_BATTERY, 42, TAG_TEMPERATURE, 0x00, 0x00, 0x08, 0x7A]);
        let value = to_json(&decoded);
        assert_eq!(value, json!({"version": 1, "battery": 42, "temperature": 21.7}));
    }

    #[test]
    fn test_batch_nests_measurements() {
        let decoded = decode(&[2, 5, 3, TAG_BATTERY, 90, 0, 5, TAG_BATTERY, 89, 0]);
        let value = to_json(&decoded);
        assert_eq!(
            value,
            json!({
                "version": 2,
                "interval": 5,
                "measurements": [
                    {"timestamp": 3, "battery": 90},
                    {"timestamp": 5, "battery": 89}
                ]
            })
        );
    }

    #[test]
    fn test_missing_version_defaults_to_single() {
        let decoded = from_json(&json!({"temperature": 19.25, "event": "open"}));
        let Decoded::Single(reading) = decoded else {
            panic!("expected single reading");
        };
        assert_eq!(reading.version, 1);
        assert_eq!(reading.fields["temperature"], Value::Float(19.25));
        assert_eq!(reading.fields["event"], Value::Text("open".into()));
    }

    #[test]
    fn test_batch_from_json() {
        let decoded = from_json(&json!({
            "version": 3,
            "interval": 10,
            "latitude": 50.668,
            "longitude": 4.611,
            "measurements": [{"timestamp": 0, "co2": 415.5}, {"timestamp": 1}]
        }));
        let Decoded::Batch(batch) = decoded else {
            panic!("expected batch");
        };
        assert_eq!(batch.interval, 10);
        assert_eq!(batch.fixed_fields.len(), 2);
        assert_eq!(batch.measurements.len(), 2);
        assert_eq!(batch.measurements[0].offset, Some(0));
        assert_eq!(batch.measurements[0].fields["co2"], Value::Float(415.5));
        assert!(batch.measurements[1].fields.is_empty());
    }

    #[test]
    fn test_oversized_interval_and_offset_clamp_to_byte() {
        let decoded = from_json(&json!({
            "version": 2,
            "interval": 1440,
            "measurements": [{"timestamp": 300, "battery": 80}]
        }));
        let Decoded::Batch(batch) = decoded else {
            panic!("expected batch");
        };
        assert_eq!(batch.interval, 255);
        assert_eq!(batch.measurements[0].offset, Some(255));
        assert_eq!(clamp_u8("interval", 60), 60);
    }

    #[test]
    fn test_unknown_version_is_empty() {
        assert_eq!(from_json(&json!({"version": 9, "battery": 1})), Decoded::Empty);
        assert_eq!(from_json(&json!([1, 2])), Decoded::Empty);
    }

    #[test]
    fn test_json_round_trip_through_decoder() {
        let decoded = decode(&[2, 5, 3, TAG_LIGHT, 0x01, 0x00, 0, 4, 0x7E, 0]);
        assert_eq!(from_json(&to_json(&decoded)), decoded);
    }
}
