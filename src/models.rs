use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

/// A typed value decoded from one tag unit
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Float(f64),
    Int(i64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Float(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One sensor reading: field name to value.
///
/// `offset` is the device-local relative index of a batch sample and is only
/// meaningful within that batch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedReading {
    pub version: u8,
    pub offset: Option<u8>,
    pub fields: BTreeMap<String, Value>,
}

impl DecodedReading {
    pub fn new(version: u8) -> Self {
        DecodedReading {
            version,
            offset: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn sample(version: u8, offset: u8) -> Self {
        DecodedReading {
            version,
            offset: Some(offset),
            fields: BTreeMap::new(),
        }
    }

    /// Coordinates carried by the reading itself
    pub fn location(&self) -> LocationCandidate {
        LocationCandidate::from_fields(&self.fields)
    }
}

/// Batched readings sharing an interval and fixed-once fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedBatch {
    pub version: u8,
    /// Minutes between samples
    pub interval: u8,
    pub fixed_fields: BTreeMap<String, Value>,
    pub measurements: Vec<DecodedReading>,
}

impl DecodedBatch {
    /// Coordinates declared once for the whole batch
    pub fn location(&self) -> LocationCandidate {
        LocationCandidate::from_fields(&self.fixed_fields)
    }
}

/// Output of the payload codec
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Single(DecodedReading),
    Batch(DecodedBatch),
    /// Unknown version or nothing to decode
    Empty,
}

impl Decoded {
    pub fn version(&self) -> Option<u8> {
        match self {
            Decoded::Single(reading) => Some(reading.version),
            Decoded::Batch(batch) => Some(batch.version),
            Decoded::Empty => None,
        }
    }
}

/// A possible source of coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LocationCandidate {
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl LocationCandidate {
    pub fn new(longitude: f64, latitude: f64) -> Self {
        LocationCandidate {
            longitude: Some(longitude),
            latitude: Some(latitude),
        }
    }

    pub fn none() -> Self {
        LocationCandidate::default()
    }

    fn from_fields(fields: &BTreeMap<String, Value>) -> Self {
        LocationCandidate {
            longitude: fields.get("longitude").and_then(Value::as_f64),
            latitude: fields.get("latitude").and_then(Value::as_f64),
        }
    }

    /// Both coordinates are supplied and they are not the (0,0) sentinel
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon != 0.0 || lat != 0.0 => Some((lon, lat)),
            _ => None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.coordinates().is_some()
    }
}

/// Which tier supplied a resolved location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationSource {
    Payload,
    PayloadBatch,
    Firebase,
    TtnMetadata,
    Default,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationSource::Payload => "PAYLOAD",
            LocationSource::PayloadBatch => "PAYLOAD_BATCH",
            LocationSource::Firebase => "FIREBASE",
            LocationSource::TtnMetadata => "TTN_METADATA",
            LocationSource::Default => "DEFAULT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedLocation {
    pub longitude: f64,
    pub latitude: f64,
    pub source: LocationSource,
}

/// Device registry record
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub display_name: String,
    pub location: LocationCandidate,
}

impl DeviceInfo {
    /// Record used for devices missing from the registry
    pub fn unregistered(device_id: &str) -> Self {
        DeviceInfo {
            display_name: device_id.to_string(),
            location: LocationCandidate::new(0.0, 0.0),
        }
    }
}

/// One request as produced by a transport adapter
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionRequest {
    pub device_id: String,
    pub payload: Decoded,
    pub metadata: LocationCandidate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointTags {
    pub device_id: String,
    pub device_display_name: String,
}

/// One time-series point, ready for the store
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesPoint {
    pub measurement: String,
    pub tags: PointTags,
    pub value: FieldValue,
    pub longitude: f64,
    pub latitude: f64,
    pub timestamp: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_zero_is_not_present() {
        assert!(!LocationCandidate::new(0.0, 0.0).is_present());
        assert!(LocationCandidate::new(0.0, 50.1).is_present());
        assert!(!LocationCandidate::none().is_present());
    }

    #[test]
    fn test_half_supplied_location_is_not_present() {
        let candidate = LocationCandidate {
            longitude: Some(4.6),
            latitude: None,
        };
        assert!(!candidate.is_present());
    }

    #[test]
    fn test_reading_location_reads_int_coordinates() {
        let mut reading = DecodedReading::new(1);
        reading.fields.insert("longitude".into(), Value::Int(4));
        reading.fields.insert("latitude".into(), Value::Float(50.5));
        assert_eq!(reading.location().coordinates(), Some((4.0, 50.5)));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(FieldValue::Float(21.5).to_string(), "21.5");
        assert_eq!(FieldValue::Text("door-open".into()).to_string(), "door-open");
    }
}
