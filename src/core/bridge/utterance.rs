//! Silence-based utterance segmentation.
//!
//! Caller audio arrives as an unbroken stream of small chunks. The buffer
//! collects them in arrival order and declares an utterance complete once no
//! audio has arrived for the silence timeout, or when the stream ends.
//!
//! Time is passed in rather than read so the owning session decides the clock
//! (tests run it on tokio's paused clock).

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::Instant;

/// Whether the buffer currently holds audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceState {
    Idle,
    Accumulating,
}

/// Ordered accumulator of linear PCM chunks for one call.
#[derive(Debug)]
pub struct UtteranceBuffer {
    chunks: Vec<Bytes>,
    buffered_bytes: usize,
    last_audio: Option<Instant>,
    silence_timeout: Duration,
}

impl UtteranceBuffer {
    pub fn new(silence_timeout: Duration) -> Self {
        Self {
            chunks: Vec::new(),
            buffered_bytes: 0,
            last_audio: None,
            silence_timeout,
        }
    }

    pub fn state(&self) -> UtteranceState {
        if self.chunks.is_empty() {
            UtteranceState::Idle
        } else {
            UtteranceState::Accumulating
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total buffered PCM in bytes.
    pub fn len_bytes(&self) -> usize {
        self.buffered_bytes
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Append a chunk received at `now`. Empty chunks carry no audio and are ignored.
    pub fn push(&mut self, chunk: Bytes, now: Instant) {
        if chunk.is_empty() {
            return;
        }
        self.buffered_bytes += chunk.len();
        self.chunks.push(chunk);
        self.last_audio = Some(now);
    }

    /// Flush if the caller has been silent for at least the silence timeout.
    pub fn poll(&mut self, now: Instant) -> Option<Bytes> {
        let last = self.last_audio?;
        if now.saturating_duration_since(last) >= self.silence_timeout {
            self.flush()
        } else {
            None
        }
    }

    /// Concatenate and clear everything buffered.
    ///
    /// Returns `None` when there is nothing to send; a zero-length utterance
    /// is never produced.
    pub fn flush(&mut self) -> Option<Bytes> {
        self.last_audio = None;
        if self.chunks.is_empty() {
            return None;
        }

        let mut utterance = BytesMut::with_capacity(self.buffered_bytes);
        for chunk in self.chunks.drain(..) {
            utterance.extend_from_slice(&chunk);
        }
        self.buffered_bytes = 0;
        Some(utterance.freeze())
    }
}
