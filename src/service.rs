/// Request handling: authentication, envelope parsing, registry lookup and
/// ingestion, mapped to a status and a short message
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::Authenticator;
use crate::envelope::parse_uplink;
use crate::error::{IngestError, Result};
use crate::ingest::Ingestor;
use crate::registry::DeviceRegistry;

/// Outcome returned to the caller of one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn done() -> Self {
        Reply {
            status: 200,
            body: "Done".to_string(),
        }
    }
}

impl From<&IngestError> for Reply {
    fn from(e: &IngestError) -> Self {
        Reply {
            status: e.status_code(),
            body: e.user_message().to_string(),
        }
    }
}

pub struct IngestService {
    authenticator: Arc<dyn Authenticator>,
    registry: Arc<dyn DeviceRegistry>,
    ingestor: Ingestor,
}

impl IngestService {
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        registry: Arc<dyn DeviceRegistry>,
        ingestor: Ingestor,
    ) -> Self {
        IngestService {
            authenticator,
            registry,
            ingestor,
        }
    }

    /// Process one uplink request.
    ///
    /// Authentication and envelope failures abort before any lookup or
    /// write.
    pub async fn process(&self, authorization: &str, body: &serde_json::Value) -> Result<usize> {
        self.authenticator.validate(authorization).await?;
        let request = parse_uplink(body)?;
        info!("Device ID: {}", request.device_id);
        info!("Payload version: {:?}", request.payload.version());

        let device = self.registry.lookup(&request.device_id).await;
        self.ingestor.ingest(&request, &device).await
    }

    pub async fn handle(&self, authorization: &str, body: &serde_json::Value) -> Reply {
        match self.process(authorization, body).await {
            Ok(_) => Reply::done(),
            Err(e) => {
                error!("Request failed: {}", e);
                Reply::from(&e)
            }
        }
    }
}
