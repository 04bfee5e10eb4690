//! OpenAI Realtime API provider.
//!
//! Duplex speech-to-speech over a single WebSocket. The bridge uses it in
//! explicit-commit mode: server VAD is disabled and each caller utterance is
//! appended, committed and answered as one turn.
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.
//!
//! # Example
//!
//! ```rust,ignore
//! use voicebridge_gateway::core::realtime::{BaseRealtime, RealtimeConfig, OpenAIRealtime};
//!
//! let mut realtime = OpenAIRealtime::new(RealtimeConfig {
//!     api_key: "sk-...".to_string(),
//!     voice: Some("alloy".to_string()),
//!     instructions: Some("You answer the phone for a barber shop.".to_string()),
//!     ..Default::default()
//! })?;
//! realtime.connect().await?;
//! realtime.submit_utterance(pcm_24k).await?;
//! ```

mod client;
mod config;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    OPENAI_REALTIME_AUDIO_FORMAT, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use messages::{ClientEvent, ResponseConfig, ServerEvent, SessionConfig};
