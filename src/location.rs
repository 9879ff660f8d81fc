/// Location resolution across the ranked coordinate sources
use crate::models::{LocationCandidate, LocationSource, ResolvedLocation};

/// Pick the coordinates of one reading.
///
/// Priority, highest first:
/// 1. coordinates embedded in the reading (`Payload`)
/// 2. coordinates declared once for the batch (`PayloadBatch`)
/// 3. the device registry record (`Firebase`)
/// 4. the network server's location metadata (`TtnMetadata`)
///
/// A candidate only counts when both coordinates are supplied and they are
/// not both zero. With no candidate the result is `(0, 0)` from `Default`.
pub fn resolve(
    metadata: &LocationCandidate,
    reading: &LocationCandidate,
    registry: &LocationCandidate,
    batch: Option<&LocationCandidate>,
) -> ResolvedLocation {
    let tiers = [
        (Some(reading), LocationSource::Payload),
        (batch, LocationSource::PayloadBatch),
        (Some(registry), LocationSource::Firebase),
        (Some(metadata), LocationSource::TtnMetadata),
    ];

    tiers
        .iter()
        .find_map(|(candidate, source)| {
            candidate
                .and_then(LocationCandidate::coordinates)
                .map(|(longitude, latitude)| ResolvedLocation {
                    longitude,
                    latitude,
                    source: *source,
                })
        })
        .unwrap_or(ResolvedLocation {
            longitude: 0.0,
            latitude: 0.0,
            source: LocationSource::Default,
        })
}
