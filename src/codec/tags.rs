/// Tag registry shared by the decoder and encoder
use crate::models::Value;

// Tag codes, one byte each
pub const TAG_BATTERY: u8 = 0x01;
pub const TAG_TEMPERATURE: u8 = 0x02;
pub const TAG_PRESSURE: u8 = 0x03;
pub const TAG_HUMIDITY: u8 = 0x04;
pub const TAG_ALTITUDE: u8 = 0x05;
pub const TAG_LIGHT: u8 = 0x06;
pub const TAG_LATITUDE: u8 = 0x07;
pub const TAG_LONGITUDE: u8 = 0x08;
pub const TAG_CO2: u8 = 0x09;
pub const TAG_NOISE: u8 = 0x0A;
pub const TAG_AIR_QUALITY: u8 = 0x0B;

/// Sample terminator in batch payloads
pub const TERMINATOR: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Int,
    Text,
}

/// How one tag code is laid out on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSpec {
    pub code: u8,
    pub field: &'static str,
    pub kind: ValueKind,
    /// Value bytes following the tag byte
    pub width: usize,
    /// Decimal places carried by scaled floats
    pub precision: u32,
    /// Sent once per batch instead of per sample
    pub fixed_once: bool,
}

const fn tag(
    code: u8,
    field: &'static str,
    kind: ValueKind,
    width: usize,
    precision: u32,
    fixed_once: bool,
) -> TagSpec {
    TagSpec {
        code,
        field,
        kind,
        width,
        precision,
        fixed_once,
    }
}

/// Every tag the firmware emits, in the order the firmware writes them
pub static TAGS: [TagSpec; 11] = [
    tag(TAG_BATTERY, "battery", ValueKind::Int, 1, 0, false),
    tag(TAG_TEMPERATURE, "temperature", ValueKind::Float, 4, 2, false),
    tag(TAG_PRESSURE, "pressure", ValueKind::Float, 4, 2, false),
    tag(TAG_HUMIDITY, "humidity", ValueKind::Float, 4, 2, false),
    tag(TAG_LIGHT, "light", ValueKind::Int, 2, 0, false),
    tag(TAG_LATITUDE, "latitude", ValueKind::Float, 4, 6, true),
    tag(TAG_LONGITUDE, "longitude", ValueKind::Float, 4, 6, true),
    tag(TAG_ALTITUDE, "altitude", ValueKind::Float, 4, 2, true),
    tag(TAG_CO2, "co2", ValueKind::Float, 4, 2, false),
    tag(TAG_NOISE, "noise", ValueKind::Int, 2, 0, false),
    tag(TAG_AIR_QUALITY, "airQuality", ValueKind::Float, 4, 2, false),
];

pub fn lookup(code: u8) -> Option<&'static TagSpec> {
    TAGS.iter().find(|spec| spec.code == code)
}

pub fn lookup_field(field: &str) -> Option<&'static TagSpec> {
    TAGS.iter().find(|spec| spec.field == field)
}

/// Whether a tag byte opens the fixed-once section of a batch
pub fn is_fixed_once(code: u8) -> bool {
    lookup(code).map_or(false, |spec| spec.fixed_once)
}

impl TagSpec {
    /// Reconstruct the value from its big-endian bytes.
    ///
    /// Floats travel as a 4-byte two's complement integer scaled by
    /// `10^precision`. Integers are unsigned. Bytes missing from a truncated
    /// payload read as zero.
    pub fn decode_value(&self, raw: &[u8]) -> Value {
        let data = (0..self.width).fold(0u32, |acc, i| {
            (acc << 8) | u32::from(raw.get(i).copied().unwrap_or(0))
        });
        match self.kind {
            ValueKind::Int => Value::Int(i64::from(data)),
            ValueKind::Float => {
                let signed = if self.width == 4 {
                    f64::from(data as i32)
                } else {
                    f64::from(data)
                };
                Value::Float(signed / self.scale())
            }
            ValueKind::Text => Value::Text(String::from_utf8_lossy(raw).into_owned()),
        }
    }

    pub fn scale(&self) -> f64 {
        10f64.powi(self.precision as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_codes_are_unique() {
        let codes: HashSet<u8> = TAGS.iter().map(|t| t.code).collect();
        assert_eq!(codes.len(), TAGS.len());
        assert!(lookup(TERMINATOR).is_none());
    }

    #[test]
    fn test_fixed_once_tags() {
        assert!(is_fixed_once(TAG_LATITUDE));
        assert!(is_fixed_once(TAG_LONGITUDE));
        assert!(is_fixed_once(TAG_ALTITUDE));
        assert!(!is_fixed_once(TAG_BATTERY));
        assert!(!is_fixed_once(0x7F));
    }

    #[test]
    fn test_decode_coordinate_precision() {
        // 50.668123 * 10^6
        let raw = 50_668_123i32.to_be_bytes();
        let value = lookup(TAG_LATITUDE).unwrap().decode_value(&raw);
        match value {
            Value::Float(v) => assert!((v - 50.668123).abs() < 1e-9),
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn test_decode_negative_float() {
        let raw = (-1250i32).to_be_bytes();
        let value = lookup(TAG_TEMPERATURE).unwrap().decode_value(&raw);
        assert_eq!(value, Value::Float(-12.5));
    }

    #[test]
    fn test_decode_unsigned_int() {
        let value = lookup(TAG_LIGHT).unwrap().decode_value(&[0xFF, 0xFE]);
        assert_eq!(value, Value::Int(65534));
    }
}
