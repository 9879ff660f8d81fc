/// Transport adapter for The Things Network uplink webhooks
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{info, warn};
use serde::Deserialize;

use crate::codec;
use crate::error::{IngestError, Result};
use crate::models::{Decoded, IngestionRequest, LocationCandidate};

/// Coordinates as they appear in TTN metadata
#[derive(Debug, Default, Deserialize)]
struct TtnLocation {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<TtnLocation> for LocationCandidate {
    fn from(location: TtnLocation) -> Self {
        LocationCandidate {
            longitude: location.longitude,
            latitude: location.latitude,
        }
    }
}

/// TTN v2 HTTP integration body
#[derive(Debug, Deserialize)]
struct TtnV2Uplink {
    hardware_serial: String,
    #[serde(default)]
    payload_fields: Option<serde_json::Value>,
    #[serde(default)]
    metadata: Option<TtnLocation>,
}

#[derive(Debug, Deserialize)]
struct EndDeviceIds {
    dev_eui: String,
}

#[derive(Debug, Default, Deserialize)]
struct Locations {
    #[serde(default)]
    user: Option<TtnLocation>,
}

#[derive(Debug, Default, Deserialize)]
struct UplinkMessage {
    #[serde(default)]
    decoded_payload: Option<serde_json::Value>,
    #[serde(default)]
    frm_payload: Option<String>,
    #[serde(default)]
    locations: Option<Locations>,
}

/// TTN v3 webhook body
#[derive(Debug, Deserialize)]
struct TtnV3Uplink {
    end_device_ids: EndDeviceIds,
    #[serde(default)]
    uplink_message: UplinkMessage,
}

/// Extract device id, payload and metadata location from an uplink body.
///
/// Recognizes the TTN v2 shape (`hardware_serial`) and the TTN v3 shape
/// (`end_device_ids.dev_eui`). TTN v3 uplinks without a decoded payload are
/// decoded from `frm_payload`.
///
/// # Errors
/// `MalformedRequest` when neither shape is present or the body does not
/// deserialize.
pub fn parse_uplink(body: &serde_json::Value) -> Result<IngestionRequest> {
    if body.get("hardware_serial").is_some() {
        info!("Payload format: TTNv2");
        warn!("The TTNv2 format should not be used anymore. Consider updating to TTNv3.");
        let uplink = TtnV2Uplink::deserialize(body)
            .map_err(|e| IngestError::MalformedRequest(e.to_string()))?;
        return Ok(IngestionRequest {
            device_id: uplink.hardware_serial.to_lowercase(),
            payload: uplink
                .payload_fields
                .as_ref()
                .map_or(Decoded::Empty, codec::json::from_json),
            metadata: uplink.metadata.map(Into::into).unwrap_or_default(),
        });
    }

    if body.pointer("/end_device_ids/dev_eui").is_some() {
        info!("Payload format: TTNv3");
        let uplink = TtnV3Uplink::deserialize(body)
            .map_err(|e| IngestError::MalformedRequest(e.to_string()))?;
        let message = uplink.uplink_message;
        let payload = match (&message.decoded_payload, &message.frm_payload) {
            (Some(decoded), _) => codec::json::from_json(decoded),
            (None, Some(raw)) => {
                let bytes = STANDARD
                    .decode(raw)
                    .map_err(|e| IngestError::MalformedRequest(format!("frm_payload: {}", e)))?;
                codec::decode(&bytes)
            }
            (None, None) => Decoded::Empty,
        };
        let metadata = message
            .locations
            .and_then(|locations| locations.user)
            .map(Into::into)
            .unwrap_or_default();
        return Ok(IngestionRequest {
            device_id: uplink.end_device_ids.dev_eui.to_lowercase(),
            payload,
            metadata,
        });
    }

    Err(IngestError::MalformedRequest(
        "neither hardware_serial nor end_device_ids.dev_eui present".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;
    use serde_json::json;

    #[test]
    fn test_ttn_v2_body() {
        let body = json!({
            "hardware_serial": "70B3D57ED0041234",
            "payload_fields": {"temperature": 20.5},
            "metadata": {"latitude": 50.67, "longitude": 4.61, "gateways": []}
        });
        let request = parse_uplink(&body).unwrap();
        assert_eq!(request.device_id, "70b3d57ed0041234");
        assert_eq!(request.metadata.coordinates(), Some((4.61, 50.67)));
        let Decoded::Single(reading) = request.payload else {
            panic!("expected single reading");
        };
        assert_eq!(reading.fields["temperature"], Value::Float(20.5));
    }

    #[test]
    fn test_ttn_v2_without_fields() {
        let request = parse_uplink(&json!({"hardware_serial": "AB"})).unwrap();
        assert_eq!(request.payload, Decoded::Empty);
        assert!(!request.metadata.is_present());
    }

    #[test]
    fn test_ttn_v3_decoded_payload() {
        let body = json!({
            "end_device_ids": {"device_id": "node-1", "dev_eui": "70B3D57ED0041234"},
            "uplink_message": {
                "decoded_payload": {"version": 2, "interval": 5, "measurements": [{"timestamp": 0, "battery": 80}]},
                "locations": {"user": {"latitude": 50.1, "longitude": 4.2, "source": "SOURCE_REGISTRY"}}
            }
        });
        let request = parse_uplink(&body).unwrap();
        assert_eq!(request.device_id, "70b3d57ed0041234");
        assert_eq!(request.metadata.coordinates(), Some((4.2, 50.1)));
        let Decoded::Batch(batch) = request.payload else {
            panic!("expected batch");
        };
        assert_eq!(batch.measurements.len(), 1);
    }

    #[test]
    fn test_ttn_v3_raw_payload_is_decoded() {
        // [1, battery tag, 42]
        let body = json!({
            "end_device_ids": {"dev_eui": "aa"},
            "uplink_message": {"frm_payload": "AQEq"}
        });
        let request = parse_uplink(&body).unwrap();
        let Decoded::Single(reading) = request.payload else {
            panic!("expected single reading");
        };
        assert_eq!(reading.fields["battery"], Value::Int(42));
        assert!(!request.metadata.is_present());
    }

    #[test]
    fn test_ttn_v3_bad_base64() {
        let body = json!({
            "end_device_ids": {"dev_eui": "aa"},
            "uplink_message": {"frm_payload": "***"}
        });
        assert!(matches!(
            parse_uplink(&body),
            Err(IngestError::MalformedRequest(_))
        ));
    }

    #[test]
    fn test_unrecognized_body() {
        assert!(matches!(
            parse_uplink(&json!({"end_device_ids": {"device_id": "x"}})),
            Err(IngestError::MalformedRequest(_))
        ));
        assert!(matches!(
            parse_uplink(&json!("text")),
            Err(IngestError::MalformedRequest(_))
        ));
    }
}
