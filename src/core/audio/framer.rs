//! Outbound telephony framing.
//!
//! The telephony side only accepts fixed-size frames (20 ms by default), while
//! synthesized speech arrives in chunks of arbitrary size. Each chunk is cut
//! into whole frames and every frame is μ-law encoded on its own. A short tail
//! is discarded: an undersized frame glitches or gets rejected downstream.

use super::codec::pcm_to_mulaw;
use super::{BYTES_PER_SAMPLE, TELEPHONY_SAMPLE_RATE};

/// Default frame duration in milliseconds.
pub const DEFAULT_FRAME_DURATION_MS: u32 = 20;

/// Slices 8 kHz linear PCM into fixed-size μ-law frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundFramer {
    frame_bytes: usize,
}

impl Default for OutboundFramer {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_DURATION_MS)
    }
}

impl OutboundFramer {
    /// Create a framer for frames of `frame_duration_ms` at 8 kHz, 16-bit mono.
    pub fn new(frame_duration_ms: u32) -> Self {
        Self::with_sample_rate(TELEPHONY_SAMPLE_RATE, frame_duration_ms)
    }

    /// Create a framer for an arbitrary PCM sample rate.
    pub fn with_sample_rate(sample_rate: u32, frame_duration_ms: u32) -> Self {
        let samples = (sample_rate as usize * frame_duration_ms as usize) / 1000;
        Self {
            frame_bytes: samples.max(1) * BYTES_PER_SAMPLE,
        }
    }

    /// Size of one PCM frame in bytes (320 for 20 ms at 8 kHz).
    pub fn frame_bytes(&self) -> usize {
        self.frame_bytes
    }

    /// Number of whole frames `pcm_len` bytes of PCM will produce.
    pub fn frame_count(&self, pcm_len: usize) -> usize {
        pcm_len / self.frame_bytes
    }

    /// Cut `pcm` into whole frames and μ-law encode each one, in order.
    ///
    /// Returns the encoded frames; any trailing partial frame is dropped.
    pub fn frame(&self, pcm: &[u8]) -> Vec<Vec<u8>> {
        let dropped = pcm.len() % self.frame_bytes;
        if dropped > 0 {
            tracing::trace!(dropped, "Discarding partial outbound frame");
        }
        pcm.chunks_exact(self.frame_bytes).map(pcm_to_mulaw).collect()
    }
}
