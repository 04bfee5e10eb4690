//! Telephony audio primitives.
//!
//! Everything in this module is synchronous and CPU-only so it can run inline
//! on a per-call event loop without stalling it:
//!
//! - [`codec`]: G.711 μ-law companding to and from 16-bit linear PCM
//! - [`resample`]: integer-ratio sample-rate conversion (8 kHz ↔ 24 kHz)
//! - [`framer`]: slicing synthesized PCM into fixed-duration telephony frames
//!
//! Buffers carry no runtime format tag. Linear PCM is always 16-bit signed,
//! little-endian, mono; the sample rate is implied by the pipeline stage.

pub mod codec;
pub mod framer;
pub mod resample;

use thiserror::Error;

pub use codec::{decode_mulaw, encode_mulaw, mulaw_to_pcm, pcm_to_mulaw};
pub use framer::OutboundFramer;
pub use resample::resample;

/// Sample rate of the telephony leg.
pub const TELEPHONY_SAMPLE_RATE: u32 = 8000;

/// Bytes per linear PCM sample (16-bit).
pub const BYTES_PER_SAMPLE: usize = 2;

/// Errors raised by the transcoding stages.
///
/// These are per-chunk failures: the offending chunk is dropped and the call
/// continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranscodeError {
    /// No conversion exists between the requested rates
    #[error("Unsupported sample rate conversion: {from} Hz -> {to} Hz")]
    UnsupportedRate { from: u32, to: u32 },

    /// Media payload was not valid base64
    #[error("Invalid media payload: {0}")]
    InvalidPayload(String),
}

/// Result type for transcoding operations.
pub type TranscodeResult<T> = Result<T, TranscodeError>;
