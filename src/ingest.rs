/// Per-request ingestion: location, timestamps, points and the store flush
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

use crate::database::PointStore;
use crate::error::{IngestError, Result};
use crate::location;
use crate::models::{
    Decoded, DecodedBatch, DecodedReading, DeviceInfo, IngestionRequest, LocationCandidate,
    PointTags, TimeSeriesPoint,
};
use crate::points::{build_points, AllowedFields};
use crate::utils::{format_datetime, max_offset, reconstruct_timestamp};

/// Drives one decoded request through to the store
pub struct Ingestor {
    store: Arc<dyn PointStore>,
    allowed: AllowedFields,
    write_timeout: Duration,
}

impl Ingestor {
    pub fn new(store: Arc<dyn PointStore>, allowed: AllowedFields, write_timeout: Duration) -> Self {
        Ingestor {
            store,
            allowed,
            write_timeout,
        }
    }

    /// Build the points of one request and flush them together.
    ///
    /// # Returns
    /// Number of points written. Payloads of unknown version write nothing
    /// and are not an error.
    ///
    /// # Errors
    /// `StoreTimeout` when the flush exceeds the write timeout, otherwise the
    /// store failure kind.
    pub async fn ingest(&self, request: &IngestionRequest, device: &DeviceInfo) -> Result<usize> {
        let points = build_request_points(
            request,
            device,
            OffsetDateTime::now_utc(),
            &self.allowed,
        );

        if points.is_empty() {
            info!("No points to write for device {}", request.device_id);
            return Ok(0);
        }

        match tokio::time::timeout(self.write_timeout, self.store.write(&points)).await {
            Ok(result) => result?,
            Err(_) => return Err(IngestError::StoreTimeout(self.write_timeout)),
        }

        info!(
            "Wrote {} point(s) for device {}",
            points.len(),
            request.device_id
        );
        Ok(points.len())
    }
}

/// Turn a request into points, in input order, as of `now`
pub fn build_request_points(
    request: &IngestionRequest,
    device: &DeviceInfo,
    now: OffsetDateTime,
    allowed: &AllowedFields,
) -> Vec<TimeSeriesPoint> {
    let tags = PointTags {
        device_id: request.device_id.clone(),
        device_display_name: device.display_name.clone(),
    };
    let context = ReadingContext {
        metadata: &request.metadata,
        registry: &device.location,
        tags: &tags,
        allowed,
    };

    match &request.payload {
        Decoded::Single(reading) => {
            info!("Payload version {} (single measurement)", reading.version);
            context.points(reading, None, now)
        }
        Decoded::Batch(batch) => {
            info!(
                "Payload version {} ({} batch measurements)",
                batch.version,
                if batch.version == 3 { "optimized" } else { "plain" }
            );
            batch_points(&context, batch, now)
        }
        Decoded::Empty => {
            info!("Unknown payload version, nothing to ingest");
            Vec::new()
        }
    }
}

fn batch_points(
    context: &ReadingContext<'_>,
    batch: &DecodedBatch,
    now: OffsetDateTime,
) -> Vec<TimeSeriesPoint> {
    let newest = max_offset(&batch.measurements);
    let batch_location = batch.location();
    debug!("Batch location: {:?}", batch_location);

    batch
        .measurements
        .iter()
        .flat_map(|sample| {
            let timestamp =
                reconstruct_timestamp(now, batch.interval, newest, sample.offset.unwrap_or(0));
            let sample = with_fixed_fields(batch, sample);
            context.points(&sample, Some(&batch_location), timestamp)
        })
        .collect()
}

/// Apply batch-level fields to one sample; the sample's own values win.
///
/// Coordinates are left out: they act as the batch location tier instead.
fn with_fixed_fields(batch: &DecodedBatch, sample: &DecodedReading) -> DecodedReading {
    let mut merged = sample.clone();
    for (name, value) in &batch.fixed_fields {
        if name == "latitude" || name == "longitude" {
            continue;
        }
        merged
            .fields
            .entry(name.clone())
            .or_insert_with(|| value.clone());
    }
    merged
}

/// Inputs shared by every reading of a request
struct ReadingContext<'a> {
    metadata: &'a LocationCandidate,
    registry: &'a LocationCandidate,
    tags: &'a PointTags,
    allowed: &'a AllowedFields,
}

impl ReadingContext<'_> {
    fn points(
        &self,
        reading: &DecodedReading,
        batch_location: Option<&LocationCandidate>,
        timestamp: OffsetDateTime,
    ) -> Vec<TimeSeriesPoint> {
        let resolved = location::resolve(
            self.metadata,
            &reading.location(),
            self.registry,
            batch_location,
        );
        info!(
            "Location from {}: {},{} at {}",
            resolved.source,
            resolved.latitude,
            resolved.longitude,
            format_datetime(&timestamp)
        );
        build_points(
            reading,
            resolved.longitude,
            resolved.latitude,
            timestamp,
            self.tags,
            self.allowed,
        )
    }
}
