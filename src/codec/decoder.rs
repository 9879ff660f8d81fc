/// Binary payload decoding: version dispatch, tag units and batches
use log::{debug, warn};

use super::tags::{self, TERMINATOR};
use crate::models::{Decoded, DecodedBatch, DecodedReading, Value};

const VERSION_SINGLE: u8 = 1;
const VERSION_BATCH: u8 = 2;
const VERSION_BATCH_OPTIMIZED: u8 = 3;

/// Read position over one payload, owned by a single decode call
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Cursor { bytes, pos }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn next_byte(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    /// Read one tag unit and advance past it.
    ///
    /// Unknown tags consume only their own byte and yield no field. If the
    /// unknown tag actually carried value bytes the rest of the payload is
    /// read misaligned; the format has no length field to recover from that.
    fn read_unit(&mut self) -> Option<(&'static str, Value)> {
        let code = self.next_byte()?;
        match tags::lookup(code) {
            Some(spec) => {
                let end = (self.pos + spec.width).min(self.bytes.len());
                let value = spec.decode_value(&self.bytes[self.pos..end]);
                if end - self.pos < spec.width {
                    debug!(
                        "Truncated {} value: {} of {} bytes present",
                        spec.field,
                        end - self.pos,
                        spec.width
                    );
                }
                self.pos += spec.width;
                Some((spec.field, value))
            }
            None => {
                debug!("Skipping unknown tag 0x{:02X} at index {}", code, self.pos - 1);
                None
            }
        }
    }
}

/// Decode a raw uplink payload.
///
/// Byte 0 selects the format generation:
/// - 1: a flat sequence of tag units
/// - 2, 3: interval byte, fixed-once tag units, then
///   `[offset][tag units...][0x00]` blocks, one per sample
///
/// Anything else decodes to `Decoded::Empty`; unknown packets are dropped
/// rather than rejected.
pub fn decode(bytes: &[u8]) -> Decoded {
    match bytes.first() {
        Some(&VERSION_SINGLE) => Decoded::Single(decode_single(bytes)),
        Some(&version) if version == VERSION_BATCH || version == VERSION_BATCH_OPTIMIZED => {
            Decoded::Batch(decode_batch(version, bytes))
        }
        Some(version) => {
            warn!("Dropping payload with unknown version {}", version);
            Decoded::Empty
        }
        None => Decoded::Empty,
    }
}

fn decode_single(bytes: &[u8]) -> DecodedReading {
    let mut reading = DecodedReading::new(VERSION_SINGLE);
    let mut cursor = Cursor::new(bytes, 1);
    while !cursor.at_end() {
        if let Some((field, value)) = cursor.read_unit() {
            reading.fields.insert(field.to_string(), value);
        }
    }
    reading
}

fn decode_batch(version: u8, bytes: &[u8]) -> DecodedBatch {
    let mut batch = DecodedBatch {
        version,
        interval: bytes.get(1).copied().unwrap_or(0),
        ..DecodedBatch::default()
    };
    let mut cursor = Cursor::new(bytes, 2);

    while cursor.peek().map_or(false, tags::is_fixed_once) {
        if let Some((field, value)) = cursor.read_unit() {
            batch.fixed_fields.insert(field.to_string(), value);
        }
    }

    while let Some(offset) = cursor.next_byte() {
        let mut sample = DecodedReading::sample(version, offset);
        while let Some(code) = cursor.peek() {
            if code == TERMINATOR {
                cursor.pos += 1;
                break;
            }
            if let Some((field, value)) = cursor.read_unit() {
                sample.fields.insert(field.to_string(), value);
            }
        }
        batch.measurements.push(sample);
    }

    debug!(
        "Decoded batch v{}: interval={} min, {} fixed field(s), {} sample(s)",
        version,
        batch.interval,
        batch.fixed_fields.len(),
        batch.measurements.len()
    );
    batch
}
