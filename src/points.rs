/// Conversion of decoded readings into time-series points
use log::{debug, warn};
use std::collections::HashMap;
use time::OffsetDateTime;

use crate::models::{DecodedReading, FieldValue, PointTags, TimeSeriesPoint, Value};

/// Value type a measurement is stored as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Text,
}

/// Measurement fields accepted by the store
#[derive(Debug, Clone)]
pub struct AllowedFields {
    kinds: HashMap<String, FieldKind>,
}

impl AllowedFields {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldKind)>,
        S: Into<String>,
    {
        AllowedFields {
            kinds: entries
                .into_iter()
                .map(|(name, kind)| (name.into(), kind))
                .collect(),
        }
    }

    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.kinds.get(field).copied()
    }
}

impl Default for AllowedFields {
    fn default() -> Self {
        AllowedFields::new([
            ("temperature", FieldKind::Float),
            ("pressure", FieldKind::Float),
            ("humidity", FieldKind::Float),
            ("co2", FieldKind::Float),
            ("co", FieldKind::Float),
            ("light", FieldKind::Float),
            ("battery", FieldKind::Float),
            ("event", FieldKind::Text),
            ("altitude", FieldKind::Float),
            ("no2", FieldKind::Float),
            ("noise", FieldKind::Float),
            ("airQuality", FieldKind::Float),
        ])
    }
}

/// Build one point per allowed field of a reading
///
/// Fields missing from `allowed` are dropped, as are values that cannot be
/// coerced to the allowed kind. Coordinates are always stored as floats.
pub fn build_points(
    reading: &DecodedReading,
    longitude: f64,
    latitude: f64,
    timestamp: OffsetDateTime,
    tags: &PointTags,
    allowed: &AllowedFields,
) -> Vec<TimeSeriesPoint> {
    reading
        .fields
        .iter()
        .filter_map(|(field, value)| {
            let Some(kind) = allowed.kind(field) else {
                debug!("Dropping field [{}]: not an allowed measurement", field);
                return None;
            };
            let value = match coerce(value, kind) {
                Some(value) => value,
                None => {
                    warn!("Dropping field [{}]: value {} is not numeric", field, value);
                    return None;
                }
            };
            debug!("Adding data [{}] with value: {}", field, value);
            Some(TimeSeriesPoint {
                measurement: field.clone(),
                tags: tags.clone(),
                value,
                longitude,
                latitude,
                timestamp,
            })
        })
        .collect()
}

fn coerce(value: &Value, kind: FieldKind) -> Option<FieldValue> {
    match kind {
        FieldKind::Float => value.as_f64().map(FieldValue::Float),
        FieldKind::Text => Some(FieldValue::Text(value.to_string())),
    }
}
