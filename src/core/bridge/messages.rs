//! Telephony media stream envelopes.
//!
//! The telephony side speaks JSON text frames keyed by `event`. Inbound
//! `media` payloads are base64 μ-law at 8 kHz; outbound frames use the same
//! shape addressed by `streamSid`.

use std::collections::HashMap;

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::audio::{TranscodeError, TranscodeResult};

// =============================================================================
// Inbound (telephony -> bridge)
// =============================================================================

/// One inbound envelope from the telephony transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum TransportInbound {
    /// Transport handshake, sent before `start`
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },

    /// Caller audio stream has begun
    Start {
        /// Some transports put the id at top level, others only inside `start`
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        start: Option<StartMetadata>,
    },

    /// One chunk of caller audio
    Media {
        media: MediaPayload,
    },

    /// Caller audio stream ended
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },

    /// Playback marker echoed back by the transport
    Mark {
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    /// Keypad digit pressed by the caller
    Dtmf {
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },

    #[serde(other)]
    Unknown,
}

impl TransportInbound {
    /// Parse a text frame.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Stream id carried by a `start` event, wherever the transport put it.
    pub fn start_stream_sid(&self) -> Option<&str> {
        match self {
            TransportInbound::Start { stream_sid, start } => stream_sid
                .as_deref()
                .or_else(|| start.as_ref().and_then(|s| s.stream_sid.as_deref())),
            _ => None,
        }
    }
}

/// Body of a `start` event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartMetadata {
    #[serde(rename = "streamSid", default)]
    pub stream_sid: Option<String>,
    #[serde(rename = "callSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: HashMap<String, String>,
}

/// Body of a `media` event.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    /// Base64 μ-law bytes
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
}

impl MediaPayload {
    /// Decode the base64 payload into raw μ-law bytes.
    pub fn decode(&self) -> TranscodeResult<Vec<u8>> {
        BASE64_STANDARD
            .decode(&self.payload)
            .map_err(|e| TranscodeError::InvalidPayload(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DtmfPayload {
    pub digit: String,
}

// =============================================================================
// Outbound (bridge -> telephony)
// =============================================================================

/// One outbound audio frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMediaMessage {
    pub event: String,
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    pub media: OutgoingMedia,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMedia {
    /// Base64 μ-law bytes
    pub payload: String,
}

impl OutgoingMediaMessage {
    /// Wrap one encoded μ-law frame for `stream_sid`.
    pub fn media(stream_sid: &str, mulaw: &[u8]) -> Self {
        Self {
            event: "media".to_string(),
            stream_sid: stream_sid.to_string(),
            media: OutgoingMedia {
                payload: BASE64_STANDARD.encode(mulaw),
            },
        }
    }
}

/// Instruction for the transport writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRoute {
    /// Serialize and send as a text frame
    Outgoing(OutgoingMediaMessage),
    /// Keep-alive ping frame
    Ping,
    /// Close the transport
    Close,
}
