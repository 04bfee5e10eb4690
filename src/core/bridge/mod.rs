//! Telephony ↔ speech AI call bridge.
//!
//! ```text
//! telephony ─ media ─▶ μ-law decode ─▶ 8k→24k ─▶ UtteranceBuffer ─ flush ─▶ AiSession
//! telephony ◀─ media ─ μ-law encode ◀─ OutboundFramer ◀─ 24k→8k ◀─ audio delta ─┘
//! ```

mod ai_session;
mod config;
mod error;
pub mod messages;
mod session;
mod utterance;

pub use ai_session::{AiEvent, AiSession, AiSessionState};
pub use config::{
    BridgeConfig, DEFAULT_AI_CONNECT_TIMEOUT, DEFAULT_FLUSH_POLL_INTERVAL,
    DEFAULT_KEEPALIVE_INTERVAL, DEFAULT_SILENCE_TIMEOUT,
};
pub use error::{BridgeError, BridgeResult};
pub use messages::{MediaRoute, OutgoingMediaMessage, TransportInbound};
pub use session::{
    BridgeState, CallBridgeParams, CallBridgeSession, EndReason, SessionEnd, SessionStats,
};
pub use utterance::{UtteranceBuffer, UtteranceState};
