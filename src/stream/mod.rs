//! Data channel: blob format, reassembly and frame delivery.
//!
//! ```text
//! TCP bytes ─▶ BlobAssembler ─▶ RawBlob ─▶ Decoder ─▶ Frame
//! ```
//!
//! [`FrameChannel`] drives this pipeline over a socket; [`BlobAssembler`] and
//! [`BlobWriter`] are usable on their own for recorded or simulated streams.

mod assembler;
mod blob;
mod channel;
mod throttle;

#[cfg(test)]
mod tests;

pub use assembler::BlobAssembler;
pub use blob::{
    BLOB_MAGIC, BLOB_VERSION, BlobWriter, CALIBRATION_SIZE, DEFAULT_MAX_BLOB_SIZE, PACKET_TYPE,
    RawBlob, Segment, SegmentType, decode_calibration, encode_calibration,
};
pub use channel::{FrameChannel, StreamOptions};
pub use throttle::{Throttle, ThrottleExt};
