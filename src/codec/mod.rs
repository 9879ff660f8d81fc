//! Payload codec for the sensor wire format.
//!
//! Three format generations share one tag registry: version 1 carries a
//! single reading, versions 2 and 3 carry a batch of samples with relative
//! offsets and optional fixed-once coordinates.

pub mod decoder;
pub mod encoder;
pub mod json;
pub mod tags;

pub use decoder::decode;
pub use encoder::{encode_batch, encode_single};
