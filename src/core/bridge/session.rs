//! Per-call bridge actor.
//!
//! A [`CallBridgeSession`] owns everything belonging to one phone call: the
//! outbound transport channel, the speech AI session, the utterance buffer and
//! both timers. [`CallBridgeSession::run`] is the single place any of it is
//! mutated; transport frames, timer ticks, AI events, AI readiness and hangup
//! requests are merged into one `select!` loop, so per-call ordering holds
//! without locks.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::ai_session::{AiEvent, AiSession};
use super::config::BridgeConfig;
use super::error::{BridgeError, BridgeResult};
use super::messages::{MediaRoute, OutgoingMediaMessage, TransportInbound};
use super::utterance::UtteranceBuffer;
use crate::core::audio::{OutboundFramer, TELEPHONY_SAMPLE_RATE, mulaw_to_pcm, resample};
use crate::core::realtime::{BoxedRealtime, RealtimeAudioData, TranscriptResult};
use crate::core::registry::{CallContext, CallRegistry, RegistryError};

/// Lifecycle of a bridged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeState::Connecting => write!(f, "connecting"),
            BridgeState::Active => write!(f, "active"),
            BridgeState::Closing => write!(f, "closing"),
            BridgeState::Closed => write!(f, "closed"),
        }
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Telephony connection closed
    TransportClosed,
    /// Telephony sent `stop`
    StreamStopped,
    /// Hangup requested through the registry
    HungUp,
    /// Call exceeded the configured maximum duration
    MaxDurationReached,
    /// Speech AI never became ready or was lost
    UpstreamUnavailable(String),
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndReason::TransportClosed => write!(f, "transport closed"),
            EndReason::StreamStopped => write!(f, "stream stopped"),
            EndReason::HungUp => write!(f, "hung up"),
            EndReason::MaxDurationReached => write!(f, "max call duration reached"),
            EndReason::UpstreamUnavailable(e) => write!(f, "speech AI unavailable: {e}"),
        }
    }
}

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub media_chunks: u64,
    pub skipped_messages: u64,
    pub utterances_forwarded: u64,
    pub utterances_dropped: u64,
    pub frames_sent: u64,
}

/// Final report of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnd {
    pub call_id: String,
    pub stream_sid: Option<String>,
    pub reason: EndReason,
    pub stats: SessionStats,
}

/// Inputs needed to bridge one call.
#[derive(Debug, Clone)]
pub struct CallBridgeParams {
    pub call_id: String,
    pub config: BridgeConfig,
    pub context: CallContext,
}

/// One bridged phone call.
pub struct CallBridgeSession {
    call_id: String,
    stream_sid: Option<String>,
    state: BridgeState,
    config: BridgeConfig,
    greeting: Option<String>,
    ai: AiSession,
    ai_events: mpsc::Receiver<AiEvent>,
    buffer: UtteranceBuffer,
    framer: OutboundFramer,
    outbound: mpsc::Sender<MediaRoute>,
    registry: Arc<CallRegistry>,
    cancel: CancellationToken,
    stats: SessionStats,
}

/// Result of handling one event inside the loop.
type Step = Option<EndReason>;

impl CallBridgeSession {
    /// Register the call and start connecting its speech AI session.
    ///
    /// `provider` must already be configured for this call; it is connected
    /// in the background and the session stays `connecting` until the
    /// transport sends `start`.
    pub async fn start(
        params: CallBridgeParams,
        provider: BoxedRealtime,
        outbound: mpsc::Sender<MediaRoute>,
        registry: Arc<CallRegistry>,
    ) -> BridgeResult<Self> {
        let CallBridgeParams {
            call_id,
            config,
            context,
        } = params;

        let cancel = registry
            .activate(&call_id, context.identity.clone())
            .await
            .map_err(|RegistryError::AlreadyActive(id)| BridgeError::CallAlreadyActive(id))?;

        let (ai, ai_events) = match AiSession::start(&call_id, provider, config.ai_connect_timeout) {
            Ok(started) => started,
            Err(e) => {
                registry.remove(&call_id).await;
                return Err(e.into());
            }
        };

        info!(call_id = %call_id, identity = ?context.identity, "Call bridge session created");

        Ok(Self {
            buffer: UtteranceBuffer::new(config.silence_timeout),
            framer: OutboundFramer::new(config.frame_duration_ms),
            stream_sid: None,
            state: BridgeState::Connecting,
            greeting: context.greeting,
            call_id,
            config,
            ai,
            ai_events,
            outbound,
            registry,
            cancel,
            stats: SessionStats::default(),
        })
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Drive the call until it ends, then tear everything down.
    ///
    /// `inbound` yields telephony text frames; the channel closing means the
    /// transport disconnected.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<String>) -> SessionEnd {
        let mut flush_poll = tokio::time::interval(self.config.flush_poll_interval);
        flush_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut keepalive = tokio::time::interval_at(
            Instant::now() + self.config.keepalive_interval,
            self.config.keepalive_interval,
        );
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let max_duration = self.config.max_call_duration;
        let deadline = tokio::time::sleep(max_duration.unwrap_or_default());
        tokio::pin!(deadline);

        let cancel = self.cancel.clone();

        let reason = loop {
            let step = tokio::select! {
                biased;

                _ = cancel.cancelled() => Some(EndReason::HungUp),

                result = self.ai.ready(), if self.ai.is_connecting() => match result {
                    Ok(()) => self.on_ai_ready().await,
                    Err(e) => Some(EndReason::UpstreamUnavailable(e.to_string())),
                },

                event = self.ai_events.recv() => match event {
                    Some(event) => self.on_ai_event(event).await,
                    None => Some(EndReason::UpstreamUnavailable(
                        "speech AI event stream ended".to_string(),
                    )),
                },

                frame = inbound.recv() => match frame {
                    Some(text) => self.on_transport_text(&text).await,
                    None => Some(EndReason::TransportClosed),
                },

                _ = flush_poll.tick() => {
                    match self.buffer.poll(Instant::now()) {
                        Some(utterance) => self.forward_utterance(utterance).await,
                        None => None,
                    }
                }

                _ = keepalive.tick() => {
                    trace!(call_id = %self.call_id, "Sending keep-alive ping");
                    self.send(MediaRoute::Ping).await.err().map(|_| EndReason::TransportClosed)
                }

                _ = &mut deadline, if max_duration.is_some() => Some(EndReason::MaxDurationReached),
            };

            if let Some(reason) = step {
                break reason;
            }
        };

        self.teardown(reason).await
    }

    // -------------------------------------------------------------------------
    // Transport ingress
    // -------------------------------------------------------------------------

    async fn on_transport_text(&mut self, text: &str) -> Step {
        let message = match TransportInbound::parse(text) {
            Ok(message) => message,
            Err(e) => {
                self.stats.skipped_messages += 1;
                warn!(
                    call_id = %self.call_id,
                    error = %BridgeError::from(e),
                    "Skipping malformed transport message"
                );
                return None;
            }
        };

        match message {
            TransportInbound::Connected { protocol } => {
                debug!(call_id = %self.call_id, protocol = ?protocol, "Transport connected");
                None
            }
            TransportInbound::Start { .. } => {
                let stream_sid = message.start_stream_sid().map(str::to_string);
                self.on_start(stream_sid).await;
                None
            }
            TransportInbound::Media { media } => {
                match media.decode() {
                    Ok(mulaw) => self.on_media(&mulaw),
                    Err(e) => {
                        self.stats.skipped_messages += 1;
                        warn!(call_id = %self.call_id, error = %BridgeError::from(e), "Dropping media chunk");
                    }
                }
                None
            }
            TransportInbound::Stop { .. } => {
                info!(call_id = %self.call_id, stream_sid = ?self.stream_sid, "Transport stream stopped");
                if let Some(utterance) = self.buffer.flush()
                    && let Some(reason) = self.forward_utterance(utterance).await
                {
                    return Some(reason);
                }
                Some(EndReason::StreamStopped)
            }
            TransportInbound::Mark { mark } => {
                debug!(call_id = %self.call_id, mark = ?mark.map(|m| m.name), "Playback mark");
                None
            }
            TransportInbound::Dtmf { dtmf } => {
                info!(call_id = %self.call_id, digit = ?dtmf.map(|d| d.digit), "DTMF received");
                None
            }
            TransportInbound::Unknown => {
                debug!(call_id = %self.call_id, "Ignoring unknown transport event");
                None
            }
        }
    }

    async fn on_start(&mut self, stream_sid: Option<String>) {
        match stream_sid {
            Some(sid) => {
                info!(call_id = %self.call_id, stream_sid = %sid, "Transport stream started");
                self.stream_sid = Some(sid);
            }
            None => warn!(call_id = %self.call_id, "Start event without streamSid"),
        }
        self.transition(BridgeState::Active).await;
    }

    /// Decode, upsample and buffer one μ-law chunk. Never blocks.
    fn on_media(&mut self, mulaw: &[u8]) {
        self.stats.media_chunks += 1;
        let pcm = mulaw_to_pcm(mulaw);
        match resample(&pcm, TELEPHONY_SAMPLE_RATE, self.config.ai_sample_rate) {
            Ok(upsampled) => {
                trace!(call_id = %self.call_id, bytes = upsampled.len(), "Buffered caller audio");
                self.buffer.push(Bytes::from(upsampled), Instant::now());
            }
            Err(e) => {
                self.stats.skipped_messages += 1;
                warn!(call_id = %self.call_id, error = %BridgeError::from(e), "Dropping media chunk");
            }
        }
    }

    async fn forward_utterance(&mut self, utterance: Bytes) -> Step {
        let bytes = utterance.len();
        match self.ai.submit(utterance).await {
            Ok(true) => {
                self.stats.utterances_forwarded += 1;
                debug!(call_id = %self.call_id, bytes, "Utterance forwarded to speech AI");
                None
            }
            Ok(false) => {
                self.stats.utterances_dropped += 1;
                None
            }
            Err(e) if e.is_connection_lost() => {
                error!(call_id = %self.call_id, error = %e, "Speech AI connection lost");
                Some(EndReason::UpstreamUnavailable(e.to_string()))
            }
            Err(e) => {
                self.stats.utterances_dropped += 1;
                warn!(call_id = %self.call_id, error = %e, "Failed to forward utterance");
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Speech AI egress
    // -------------------------------------------------------------------------

    async fn on_ai_ready(&mut self) -> Step {
        let Some(greeting) = self.greeting.take() else {
            return None;
        };
        match self.ai.greet(&greeting).await {
            Ok(()) => {
                debug!(call_id = %self.call_id, "Greeting requested");
                None
            }
            Err(e) if e.is_connection_lost() => Some(EndReason::UpstreamUnavailable(e.to_string())),
            Err(e) => {
                warn!(call_id = %self.call_id, error = %e, "Failed to request greeting");
                None
            }
        }
    }

    async fn on_ai_event(&mut self, event: AiEvent) -> Step {
        match event {
            AiEvent::Audio(audio) => self.on_ai_audio(audio).await,
            AiEvent::Transcript(transcript) => {
                self.log_transcript(&transcript);
                None
            }
            AiEvent::ResponseDone(response_id) => {
                debug!(call_id = %self.call_id, response_id = %response_id, "Speech AI response done");
                None
            }
            AiEvent::Failed(e) if e.is_connection_lost() => {
                error!(call_id = %self.call_id, error = %e, "Speech AI session lost");
                self.ai.mark_closed();
                Some(EndReason::UpstreamUnavailable(e.to_string()))
            }
            AiEvent::Failed(e) => {
                warn!(call_id = %self.call_id, error = %e, "Speech AI reported an error");
                None
            }
        }
    }

    /// Downsample, frame and send one chunk of synthesized speech, in order.
    async fn on_ai_audio(&mut self, audio: RealtimeAudioData) -> Step {
        let Some(stream_sid) = self.stream_sid.clone() else {
            debug!(call_id = %self.call_id, "No streamSid yet, dropping synthesized audio");
            return None;
        };

        let pcm = match resample(&audio.data, audio.sample_rate, TELEPHONY_SAMPLE_RATE) {
            Ok(pcm) => pcm,
            Err(e) => {
                warn!(call_id = %self.call_id, error = %BridgeError::from(e), "Dropping synthesized audio");
                return None;
            }
        };

        for frame in self.framer.frame(&pcm) {
            let message = OutgoingMediaMessage::media(&stream_sid, &frame);
            if self.send(MediaRoute::Outgoing(message)).await.is_err() {
                return Some(EndReason::TransportClosed);
            }
            self.stats.frames_sent += 1;
        }
        None
    }

    fn log_transcript(&self, transcript: &TranscriptResult) {
        info!(
            call_id = %self.call_id,
            role = %transcript.role,
            text = %transcript.text,
            "Transcript"
        );
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    async fn send(&self, route: MediaRoute) -> BridgeResult<()> {
        self.outbound
            .send(route)
            .await
            .map_err(|_| BridgeError::TransportDisconnect)
    }

    async fn transition(&mut self, state: BridgeState) {
        if self.state == state {
            return;
        }
        debug!(call_id = %self.call_id, from = %self.state, to = %state, "Bridge state change");
        self.state = state;
        self.registry
            .update(&self.call_id, state, self.stream_sid.as_deref())
            .await;
    }

    async fn teardown(mut self, reason: EndReason) -> SessionEnd {
        self.transition(BridgeState::Closing).await;

        self.ai.close().await;
        if reason != EndReason::TransportClosed {
            let _ = self.send(MediaRoute::Close).await;
        }
        self.registry.remove(&self.call_id).await;
        self.state = BridgeState::Closed;

        info!(
            call_id = %self.call_id,
            stream_sid = ?self.stream_sid,
            reason = %reason,
            media_chunks = self.stats.media_chunks,
            utterances_forwarded = self.stats.utterances_forwarded,
            utterances_dropped = self.stats.utterances_dropped,
            frames_sent = self.stats.frames_sent,
            "Call bridge session closed"
        );

        SessionEnd {
            call_id: self.call_id.clone(),
            stream_sid: self.stream_sid.take(),
            reason,
            stats: std::mem::take(&mut self.stats),
        }
    }
}
