use thiserror::Error;

use crate::core::audio::TranscodeError;
use crate::core::realtime::RealtimeError;

/// Errors surfaced by a call bridge session.
///
/// `ProtocolParse` and `Transcode` are per-message: the message is skipped and
/// the call continues. `UpstreamUnavailable` and `TransportDisconnect` end the
/// session they occur in and nothing else.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// Inbound envelope could not be decoded
    #[error("Protocol parse error: {0}")]
    ProtocolParse(String),

    /// Codec or resampler rejected a chunk
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// Speech AI session never became ready or was lost
    #[error("Speech AI unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Telephony side went away
    #[error("Telephony transport disconnected")]
    TransportDisconnect,

    /// A call with this id is already bridged
    #[error("Call {0} is already active")]
    CallAlreadyActive(String),
}

impl From<RealtimeError> for BridgeError {
    fn from(err: RealtimeError) -> Self {
        BridgeError::UpstreamUnavailable(err.to_string())
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::ProtocolParse(err.to_string())
    }
}

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;
