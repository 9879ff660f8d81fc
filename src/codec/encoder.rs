/// Device-side payload encoding, the inverse of the decoder
use super::tags::{self, TagSpec, ValueKind, TAGS, TERMINATOR};
use crate::error::CodecError;
use crate::models::{DecodedBatch, DecodedReading, Value};
use std::collections::BTreeMap;

/// Most samples one packet may carry, indexed by version.
///
/// The firmware keeps `{1, 5, 8}` and indexes it with the raw version byte,
/// so its v2 packets allow 8 samples and v3 reads past the table. The caps
/// here are the intended ones: v1 = 1, v2 = 5, v3 = 8.
const MAX_SAMPLES: [usize; 4] = [0, 1, 5, 8];

/// Encode a single reading as a version 1 payload
pub fn encode_single(reading: &DecodedReading) -> Result<Vec<u8>, CodecError> {
    let mut payload = vec![1];
    append_fields(&mut payload, &reading.fields, |_| true)?;
    Ok(payload)
}

/// Encode a batch as a version 2 or 3 payload.
///
/// Fixed fields are written once after the preamble; every sample is written
/// as its offset, its tag units and a terminator. Samples without an offset
/// take their position in the batch.
///
/// The first offset may not equal a fixed-once tag code: the decoder would
/// read it as a batch-level field and lose the sample.
pub fn encode_batch(batch: &DecodedBatch) -> Result<Vec<u8>, CodecError> {
    let max = match batch.version {
        2 | 3 => MAX_SAMPLES[batch.version as usize],
        other => return Err(CodecError::UnsupportedVersion(other)),
    };
    if batch.measurements.len() > max {
        return Err(CodecError::TooManySamples {
            version: batch.version,
            max,
            got: batch.measurements.len(),
        });
    }

    let mut payload = vec![batch.version, batch.interval];
    append_fields(&mut payload, &batch.fixed_fields, |spec| spec.fixed_once)?;

    for (index, sample) in batch.measurements.iter().enumerate() {
        let offset = sample.offset.unwrap_or(index as u8);
        if index == 0 && tags::is_fixed_once(offset) {
            return Err(CodecError::AmbiguousOffset(offset));
        }
        payload.push(offset);
        append_fields(&mut payload, &sample.fields, |_| true)?;
        payload.push(TERMINATOR);
    }
    Ok(payload)
}

fn append_fields<F>(
    payload: &mut Vec<u8>,
    fields: &BTreeMap<String, Value>,
    include: F,
) -> Result<(), CodecError>
where
    F: Fn(&TagSpec) -> bool,
{
    for spec in TAGS.iter().filter(|spec| include(spec)) {
        if let Some(value) = fields.get(spec.field) {
            payload.push(spec.code);
            payload.extend_from_slice(&encode_value(spec, value)?);
        }
    }
    Ok(())
}

fn encode_value(spec: &TagSpec, value: &Value) -> Result<Vec<u8>, CodecError> {
    let out_of_range = || CodecError::ValueOutOfRange {
        field: spec.field,
        value: value.to_string(),
        width: spec.width,
    };

    let raw: u32 = match spec.kind {
        ValueKind::Float => {
            let scaled = value.as_f64().ok_or_else(out_of_range)? * spec.scale();
            let rounded = scaled.round();
            if !rounded.is_finite() || rounded < i32::MIN as f64 || rounded > i32::MAX as f64 {
                return Err(out_of_range());
            }
            rounded as i32 as u32
        }
        ValueKind::Int => {
            let v = match value {
                Value::Int(v) => *v,
                other => other.as_f64().ok_or_else(out_of_range)?.round() as i64,
            };
            let limit = 1i64 << (8 * spec.width);
            if v < 0 || v >= limit {
                return Err(out_of_range());
            }
            v as u32
        }
        ValueKind::Text => return Ok(value.to_string().into_bytes()),
    };

    Ok(raw.to_be_bytes()[4 - spec.width..].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decoder::decode;
    use crate::codec::tags::*;
    use crate::models::Decoded;

    fn reading(fields: &[(&str, Value)]) -> DecodedReading {
        let mut reading = DecodedReading::new(1);
        for (name, value) in fields {
            reading.fields.insert(name.to_string(), value.clone());
        }
        reading
    }

    #[test]
    fn test_encode_single_layout() {
        let payload = encode_single(&reading(&[
            ("temperature", Value::Float(21.7)),
            ("battery", Value::Int(87)),
        ]))
        .unwrap();
        assert_eq!(
            payload,
            vec![1, TAG_BATTERY, 87, TAG_TEMPERATURE, 0x00, 0x00, 0x08, 0x7A]
        );
    }

    #[test]
    fn test_encode_skips_unknown_fields() {
        let payload = encode_single(&reading(&[("event", Value::Text("door".into()))])).unwrap();
        assert_eq!(payload, vec![1]);
    }

    #[test]
    fn test_encode_negative_coordinate() {
        let payload = encode_single(&reading(&[("longitude", Value::Float(-0.127758))])).unwrap();
        assert_eq!(payload[1], TAG_LONGITUDE);
        assert_eq!(&payload[2..], &(-127_758i32).to_be_bytes());
    }

    #[test]
    fn test_encode_int_out_of_range() {
        let err = encode_single(&reading(&[("battery", Value::Int(300))])).unwrap_err();
        assert!(matches!(err, CodecError::ValueOutOfRange { field: "battery", .. }));
    }

    #[test]
    fn test_encode_batch_hoists_fixed_fields() {
        let mut batch = DecodedBatch {
            version: 3,
            interval: 10,
            ..DecodedBatch::default()
        };
        batch.fixed_fields.insert("latitude".into(), Value::Float(50.668));
        batch.fixed_fields.insert("longitude".into(), Value::Float(4.611));
        // Not a fixed-once field, ignored at batch level
        batch.fixed_fields.insert("battery".into(), Value::Int(3));
        let mut sample = DecodedReading::sample(3, 0);
        sample.fields.insert("noise".into(), Value::Int(48));
        batch.measurements.push(sample);

        let payload = encode_batch(&batch).unwrap();
        assert_eq!(&payload[..3], &[3, 10, TAG_LATITUDE]);
        assert_eq!(payload[7], TAG_LONGITUDE);
        assert_eq!(&payload[12..], &[0, TAG_NOISE, 0x00, 0x30, TERMINATOR]);

        let Decoded::Batch(decoded) = decode(&payload) else {
            panic!("expected batch");
        };
        assert_eq!(decoded.fixed_fields.len(), 2);
        assert_eq!(decoded.measurements, batch.measurements);
    }

    #[test]
    fn test_encode_batch_sample_cap() {
        let batch = DecodedBatch {
            version: 2,
            interval: 1,
            fixed_fields: BTreeMap::new(),
            measurements: (0..6).map(|i| DecodedReading::sample(2, i)).collect(),
        };
        assert_eq!(
            encode_batch(&batch).unwrap_err(),
            CodecError::TooManySamples {
                version: 2,
                max: 5,
                got: 6
            }
        );
    }

    #[test]
    fn test_encode_batch_rejects_first_offset_equal_to_fixed_tag() {
        for offset in [TAG_ALTITUDE, TAG_LATITUDE, TAG_LONGITUDE] {
            let mut sample = DecodedReading::sample(2, offset);
            sample.fields.insert("battery".into(), Value::Int(50));
            let batch = DecodedBatch {
                version: 2,
                interval: 5,
                fixed_fields: BTreeMap::new(),
                measurements: vec![sample],
            };
            assert_eq!(
                encode_batch(&batch).unwrap_err(),
                CodecError::AmbiguousOffset(offset)
            );
        }
    }

    #[test]
    fn test_encode_batch_later_offsets_are_unrestricted() {
        let batch = DecodedBatch {
            version: 2,
            interval: 5,
            fixed_fields: BTreeMap::new(),
            measurements: (0..5u8)
                .map(|i| {
                    let mut sample = DecodedReading::sample(2, i * 2);
                    sample.fields.insert("battery".into(), Value::Int(90 - i64::from(i)));
                    sample
                })
                .collect(),
        };
        // offsets 0, 2, 4, 6, 8: 8 is a tag code but not in first position
        let payload = encode_batch(&batch).unwrap();
        let Decoded::Batch(decoded) = decode(&payload) else {
            panic!("expected batch");
        };
        assert!(decoded.fixed_fields.is_empty());
        assert_eq!(decoded.measurements, batch.measurements);
    }

    #[test]
    fn test_encode_batch_rejects_single_version() {
        let batch = DecodedBatch {
            version: 1,
            ..DecodedBatch::default()
        };
        assert_eq!(
            encode_batch(&batch).unwrap_err(),
            CodecError::UnsupportedVersion(1)
        );
    }
}
