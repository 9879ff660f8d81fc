/// Utility functions for timestamp reconstruction and formatting
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::models::DecodedReading;

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    let format = format_description!("[day].[month].[year] - [hour]:[minute]:[second]");
    dt.format(&format).unwrap_or_else(|_| dt.to_string())
}

/// Highest relative offset among the samples of one batch
///
/// Samples without an offset count as offset 0. An empty batch yields 0.
pub fn max_offset(samples: &[DecodedReading]) -> u8 {
    samples
        .iter()
        .map(|sample| sample.offset.unwrap_or(0))
        .max()
        .unwrap_or(0)
}

/// Convert a sample's relative offset into an absolute instant
///
/// The sensor has no real-time clock: offsets are counters, and the newest
/// sample (offset == `max_offset`) is taken to have been measured `now`.
/// Older samples are pushed back by `interval` minutes per step:
///
/// `now - interval * (max_offset - sample_offset)` minutes
///
/// This assumes a uniform sampling cadence with no gaps. Offsets above
/// `max_offset` map to `now`.
///
/// # Arguments
/// * `now` - Reception time of the batch
/// * `interval` - Minutes between samples
/// * `max_offset` - Highest offset in the batch
/// * `sample_offset` - Offset of the sample being placed
pub fn reconstruct_timestamp(
    now: OffsetDateTime,
    interval: u8,
    max_offset: u8,
    sample_offset: u8,
) -> OffsetDateTime {
    let steps = i64::from(max_offset.saturating_sub(sample_offset));
    now - Duration::minutes(i64::from(interval) * steps)
}
