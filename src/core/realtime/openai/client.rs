//! OpenAI Realtime API client implementation.
//!
//! Implements [`BaseRealtime`] over OpenAI's WebSocket Realtime API.
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! Server-side VAD is switched off in the session configuration: the bridge
//! segments caller speech itself and commits each utterance explicitly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http::HeaderValue;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use super::config::{
    OPENAI_REALTIME_AUDIO_FORMAT, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
use super::messages::{
    ClientEvent, InputAudioTranscription, MaxTokens, ResponseConfig, ServerEvent, SessionConfig,
};
use crate::core::realtime::base::{
    AudioOutputCallback, BaseRealtime, ConnectionState, RealtimeAudioData, RealtimeConfig,
    RealtimeError, RealtimeErrorCallback, RealtimeResult, ReconnectionCallback,
    ReconnectionConfig, ReconnectionEvent, ResponseDoneCallback, TranscriptCallback,
    TranscriptResult, TranscriptRole,
};

/// Channel capacity for WebSocket message sending.
const WS_CHANNEL_CAPACITY: usize = 256;

/// How long `disconnect` waits for queued events to reach the upstream.
const DISCONNECT_DRAIN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Callback slots shared between the client and its connection task.
#[derive(Clone, Default)]
struct Callbacks {
    transcript: Arc<Mutex<Option<TranscriptCallback>>>,
    audio: Arc<Mutex<Option<AudioOutputCallback>>>,
    error: Arc<Mutex<Option<RealtimeErrorCallback>>>,
    response_done: Arc<Mutex<Option<ResponseDoneCallback>>>,
    reconnection: Arc<Mutex<Option<ReconnectionCallback>>>,
}

/// Store a callback without blocking; falls back to a task if the slot is busy.
fn register<T: Send + 'static>(slot: &Arc<Mutex<Option<T>>>, callback: T) {
    if let Ok(mut guard) = slot.try_lock() {
        *guard = Some(callback);
    } else {
        let slot = slot.clone();
        tokio::spawn(async move {
            *slot.lock().await = Some(callback);
        });
    }
}

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client.
///
/// All state touched by the spawned connection task lives behind `Arc`s. The
/// `connected` flag is what [`BaseRealtime::is_ready`] reports; it is false
/// while a reconnect is in progress so callers drop audio instead of queueing
/// it against a dead socket.
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    model: OpenAIRealtimeModel,
    voice: OpenAIRealtimeVoice,
    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    session_id: Arc<RwLock<Option<String>>>,
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
    callbacks: Callbacks,
    connection_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    reconnection_config: ReconnectionConfig,
    /// Set by `disconnect` to suppress reconnection
    intentional_disconnect: Arc<AtomicBool>,
}

impl OpenAIRealtime {
    /// Get the configured model.
    pub fn model(&self) -> OpenAIRealtimeModel {
        self.model
    }

    /// Get the configured voice.
    pub fn voice(&self) -> OpenAIRealtimeVoice {
        self.voice
    }

    /// Get the session ID if connected.
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.read().await.clone()
    }

    /// Build the WebSocket URL with model parameter.
    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let base = self.config.endpoint.as_deref().unwrap_or(OPENAI_REALTIME_URL);
        let mut url = Url::parse(base).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("Invalid realtime endpoint '{base}': {e}"))
        })?;
        url.query_pairs_mut()
            .append_pair("model", self.model.as_str());
        Ok(url)
    }

    /// Build the initial session configuration.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            voice: Some(self.voice.as_str().to_string()),
            instructions: self.config.instructions.clone(),
            input_audio_format: Some(OPENAI_REALTIME_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(OPENAI_REALTIME_AUDIO_FORMAT.to_string()),
            input_audio_transcription: self.config.input_audio_transcription.as_ref().map(|t| {
                InputAudioTranscription {
                    model: t.model.clone(),
                }
            }),
            turn_detection: None,
            temperature: self.config.temperature,
            max_response_output_tokens: self
                .config
                .max_response_output_tokens
                .map(MaxTokens::from_limit),
        }
    }

    /// Open the WebSocket with bearer auth.
    async fn open_socket(url: &Url, api_key: &str) -> RealtimeResult<WsStream> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert(http::header::AUTHORIZATION, auth);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::Http(response)
                    if response.status() == http::StatusCode::UNAUTHORIZED =>
                {
                    RealtimeError::AuthenticationFailed("API key rejected".to_string())
                }
                other => RealtimeError::ConnectionFailed(other.to_string()),
            })?;
        Ok(ws_stream)
    }

    /// Dispatch one server event to the registered callbacks.
    async fn handle_server_event(
        event: ServerEvent,
        callbacks: &Callbacks,
        session_id: &Arc<RwLock<Option<String>>>,
    ) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!("OpenAI Realtime session created: {}", session.id);
                *session_id.write().await = Some(session.id);
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::debug!("OpenAI Realtime session updated: {}", session.id);
            }

            ServerEvent::Error { error } => {
                tracing::error!(
                    "OpenAI Realtime error: {} - {}",
                    error.error_type,
                    error.message
                );
                if let Some(cb) = callbacks.error.lock().await.as_ref() {
                    cb(RealtimeError::ProviderError(format!(
                        "{}: {}",
                        error.error_type, error.message
                    )))
                    .await;
                }
            }

            ServerEvent::InputAudioBufferCommitted { item_id } => {
                tracing::debug!("Input audio committed as item {}", item_id);
            }

            ServerEvent::TranscriptionCompleted {
                item_id,
                transcript,
            } => {
                if let Some(cb) = callbacks.transcript.lock().await.as_ref() {
                    cb(TranscriptResult {
                        text: transcript,
                        role: TranscriptRole::User,
                        item_id: Some(item_id),
                    })
                    .await;
                }
            }

            ServerEvent::TranscriptionFailed { item_id, error } => {
                tracing::warn!(
                    "Input transcription failed for item {}: {}",
                    item_id,
                    error.message
                );
            }

            ServerEvent::AudioTranscriptDone {
                item_id,
                transcript,
            } => {
                if let Some(cb) = callbacks.transcript.lock().await.as_ref() {
                    cb(TranscriptResult {
                        text: transcript,
                        role: TranscriptRole::Assistant,
                        item_id: Some(item_id),
                    })
                    .await;
                }
            }

            ServerEvent::AudioDelta {
                delta,
                item_id,
                response_id,
            } => {
                if let Some(cb) = callbacks.audio.lock().await.as_ref() {
                    match ServerEvent::decode_audio_delta(&delta) {
                        Ok(audio_bytes) => {
                            cb(RealtimeAudioData {
                                data: Bytes::from(audio_bytes),
                                sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
                                item_id: Some(item_id),
                                response_id: Some(response_id),
                            })
                            .await;
                        }
                        Err(e) => {
                            tracing::error!("Failed to decode audio delta: {}", e);
                        }
                    }
                }
            }

            ServerEvent::AudioDone { response_id, .. } => {
                tracing::trace!("Audio done for response {}", response_id);
            }

            ServerEvent::ResponseCreated { response } => {
                tracing::debug!("Response created: {}", response.id);
            }

            ServerEvent::ResponseDone { response } => {
                tracing::debug!(
                    "Response done: {} ({})",
                    response.id,
                    response.status.as_deref().unwrap_or("unknown")
                );
                if let Some(cb) = callbacks.response_done.lock().await.as_ref() {
                    cb(response.id).await;
                }
            }

            ServerEvent::Other => {
                tracing::trace!("Unhandled server event");
            }
        }
    }

    /// Send an event to the WebSocket.
    async fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        if let Some(sender) = self.ws_sender.lock().await.as_ref() {
            sender
                .send(event)
                .await
                .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;
            Ok(())
        } else {
            Err(RealtimeError::NotConnected)
        }
    }
}

/// State moved into the spawned connection task.
struct ConnectionTask {
    url: Url,
    api_key: String,
    session_config: SessionConfig,
    callbacks: Callbacks,
    session_id: Arc<RwLock<Option<String>>>,
    state: Arc<RwLock<ConnectionState>>,
    connected: Arc<AtomicBool>,
    ws_sender: Arc<Mutex<Option<mpsc::Sender<ClientEvent>>>>,
    reconnection_config: ReconnectionConfig,
    intentional_disconnect: Arc<AtomicBool>,
}

impl ConnectionTask {
    async fn run(self, socket: WsStream, mut rx: mpsc::Receiver<ClientEvent>) {
        let (mut ws_sink, mut ws_stream) = socket.split();
        let mut reconnect_attempt: u32 = 0;

        'outer: loop {
            // Pump events both ways until the socket dies
            loop {
                tokio::select! {
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else {
                            // Sender dropped and every queued event written
                            if let Err(e) = ws_sink.send(Message::Close(None)).await {
                                tracing::debug!("Failed to send close frame: {}", e);
                            }
                            break 'outer;
                        };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            tracing::error!("Failed to send WebSocket message: {}", e);
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                reconnect_attempt = 0;
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => {
                                        OpenAIRealtime::handle_server_event(
                                            event,
                                            &self.callbacks,
                                            &self.session_id,
                                        )
                                        .await;
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse server event: {}", e);
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                tracing::info!("WebSocket closed by server");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                tracing::error!("WebSocket error: {}", e);
                                break;
                            }
                            None => {
                                tracing::info!("WebSocket stream ended");
                                break;
                            }
                        }
                    }
                }
            }

            self.connected.store(false, Ordering::SeqCst);

            if self.intentional_disconnect.load(Ordering::SeqCst) {
                tracing::info!("Intentional disconnect, not attempting reconnection");
                break 'outer;
            }

            // Bounded retry with backoff
            loop {
                if !self.reconnection_config.should_retry(reconnect_attempt) {
                    tracing::warn!(
                        "Reconnection disabled or max attempts ({}) reached",
                        self.reconnection_config.max_attempts
                    );
                    *self.state.write().await = ConnectionState::Failed;
                    if let Some(cb) = self.callbacks.error.lock().await.as_ref() {
                        cb(RealtimeError::ConnectionFailed(format!(
                            "Connection lost after {} reconnection attempts",
                            reconnect_attempt
                        )))
                        .await;
                    }
                    break 'outer;
                }

                reconnect_attempt += 1;
                *self.state.write().await = ConnectionState::Reconnecting;

                let delay_ms = self.reconnection_config.calculate_delay(reconnect_attempt);
                tracing::info!(
                    "Attempting reconnection {}/{} in {}ms",
                    reconnect_attempt,
                    self.reconnection_config.max_attempts,
                    delay_ms
                );
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;

                if self.intentional_disconnect.load(Ordering::SeqCst) {
                    tracing::info!("Disconnect requested during reconnection delay");
                    break 'outer;
                }

                match OpenAIRealtime::open_socket(&self.url, &self.api_key).await {
                    Ok(socket) => {
                        tracing::info!("Reconnected to OpenAI Realtime API");
                        let (sink, stream) = socket.split();
                        ws_sink = sink;
                        ws_stream = stream;

                        // A new upstream session starts empty; restore its configuration
                        *self.session_id.write().await = None;
                        let event = ClientEvent::SessionUpdate {
                            session: self.session_config.clone(),
                        };
                        match serde_json::to_string(&event) {
                            Ok(json) => {
                                if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                                    tracing::error!(
                                        "Failed to restore session config after reconnection: {}",
                                        e
                                    );
                                    continue;
                                }
                            }
                            Err(e) => tracing::error!("Failed to serialize session config: {}", e),
                        }

                        // Events queued while disconnected belong to the dead session
                        while rx.try_recv().is_ok() {}

                        self.connected.store(true, Ordering::SeqCst);
                        *self.state.write().await = ConnectionState::Connected;

                        if let Some(cb) = self.callbacks.reconnection.lock().await.as_ref() {
                            cb(ReconnectionEvent {
                                attempt: reconnect_attempt,
                                success: true,
                                error: None,
                            })
                            .await;
                        }
                        continue 'outer;
                    }
                    Err(e) => {
                        tracing::error!("Reconnection attempt {} failed: {}", reconnect_attempt, e);
                        if let Some(cb) = self.callbacks.reconnection.lock().await.as_ref() {
                            cb(ReconnectionEvent {
                                attempt: reconnect_attempt,
                                success: false,
                                error: Some(e.to_string()),
                            })
                            .await;
                        }
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        if self.intentional_disconnect.load(Ordering::SeqCst) {
            *self.state.write().await = ConnectionState::Disconnected;
        }
        *self.ws_sender.lock().await = None;
        tracing::info!("OpenAI Realtime connection task ended");
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let model = if config.model.is_empty() {
            OpenAIRealtimeModel::default()
        } else {
            OpenAIRealtimeModel::from_str_or_default(&config.model)
        };

        let voice = config
            .voice
            .as_deref()
            .map(OpenAIRealtimeVoice::from_str_or_default)
            .unwrap_or_default();

        // Calls fail fast unless reconnection was asked for explicitly
        let reconnection_config = config
            .reconnection
            .clone()
            .unwrap_or_else(ReconnectionConfig::disabled);

        Ok(Self {
            config,
            model,
            voice,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            session_id: Arc::new(RwLock::new(None)),
            ws_sender: Arc::new(Mutex::new(None)),
            callbacks: Callbacks::default(),
            connection_handle: Arc::new(Mutex::new(None)),
            reconnection_config,
            intentional_disconnect: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn connect(&mut self) -> RealtimeResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.intentional_disconnect.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connecting;

        let url = self.build_ws_url()?;
        let socket = match Self::open_socket(&url, &self.config.api_key).await {
            Ok(socket) => socket,
            Err(e) => {
                *self.state.write().await = ConnectionState::Failed;
                return Err(e);
            }
        };

        tracing::info!("Connected to OpenAI Realtime API");

        let (tx, rx) = mpsc::channel::<ClientEvent>(WS_CHANNEL_CAPACITY);
        *self.ws_sender.lock().await = Some(tx);

        let session_config = self.build_session_config();
        let task = ConnectionTask {
            url,
            api_key: self.config.api_key.clone(),
            session_config: session_config.clone(),
            callbacks: self.callbacks.clone(),
            session_id: self.session_id.clone(),
            state: self.state.clone(),
            connected: self.connected.clone(),
            ws_sender: self.ws_sender.clone(),
            reconnection_config: self.reconnection_config.clone(),
            intentional_disconnect: self.intentional_disconnect.clone(),
        };

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Connected;

        let handle = tokio::spawn(task.run(socket, rx));
        *self.connection_handle.lock().await = Some(handle);

        self.send_event(ClientEvent::SessionUpdate {
            session: session_config,
        })
        .await
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.intentional_disconnect.store(true, Ordering::SeqCst);

        // Dropping the sender lets the task write what is queued, then exit
        *self.ws_sender.lock().await = None;

        let handle = self.connection_handle.lock().await.take();
        if let Some(mut handle) = handle
            && tokio::time::timeout(DISCONNECT_DRAIN_TIMEOUT, &mut handle)
                .await
                .is_err()
        {
            tracing::warn!("Connection task did not drain in time, aborting");
            handle.abort();
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write().await = ConnectionState::Disconnected;
        *self.session_id.write().await = None;

        tracing::info!("Disconnected from OpenAI Realtime API");
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_connection_state(&self) -> ConnectionState {
        if let Ok(state) = self.state.try_read() {
            *state
        } else if self.connected.load(Ordering::SeqCst) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn send_audio(&mut self, audio_data: Bytes) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::audio_append(&audio_data)).await
    }

    async fn commit_audio_buffer(&mut self) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        self.send_event(ClientEvent::InputAudioBufferCommit).await
    }

    async fn create_response(&mut self, instructions: Option<&str>) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let response = instructions.map(|text| ResponseConfig {
            instructions: Some(text.to_string()),
            ..Default::default()
        });
        self.send_event(ClientEvent::ResponseCreate { response }).await
    }

    fn on_transcript(&mut self, callback: TranscriptCallback) -> RealtimeResult<()> {
        register(&self.callbacks.transcript, callback);
        Ok(())
    }

    fn on_audio(&mut self, callback: AudioOutputCallback) -> RealtimeResult<()> {
        register(&self.callbacks.audio, callback);
        Ok(())
    }

    fn on_error(&mut self, callback: RealtimeErrorCallback) -> RealtimeResult<()> {
        register(&self.callbacks.error, callback);
        Ok(())
    }

    fn on_response_done(&mut self, callback: ResponseDoneCallback) -> RealtimeResult<()> {
        register(&self.callbacks.response_done, callback);
        Ok(())
    }

    fn on_reconnection(&mut self, callback: ReconnectionCallback) -> RealtimeResult<()> {
        register(&self.callbacks.reconnection, callback);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> RealtimeConfig {
        RealtimeConfig {
            api_key: "test_key".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_openai_realtime_creation() {
        let config = RealtimeConfig {
            model: "gpt-4o-mini-realtime-preview".to_string(),
            voice: Some("shimmer".to_string()),
            ..test_config()
        };

        let realtime = OpenAIRealtime::new(config).unwrap();
        assert!(!realtime.is_ready());
        assert_eq!(
            realtime.get_connection_state(),
            ConnectionState::Disconnected
        );
        assert_eq!(
            realtime.model(),
            OpenAIRealtimeModel::Gpt4oMiniRealtimePreview
        );
        assert_eq!(realtime.voice(), OpenAIRealtimeVoice::Shimmer);
    }

    #[test]
    fn test_api_key_required() {
        let result = OpenAIRealtime::new(RealtimeConfig::default());
        assert!(matches!(result, Err(RealtimeError::AuthenticationFailed(_))));
    }

    #[tokio::test]
    async fn test_send_audio_requires_connection() {
        let mut realtime = OpenAIRealtime::new(test_config()).unwrap();
        let result = realtime.send_audio(Bytes::from(vec![0u8; 100])).await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));

        let result = realtime.submit_utterance(Bytes::from(vec![0u8; 100])).await;
        assert!(matches!(result, Err(RealtimeError::NotConnected)));
    }

    #[test]
    fn test_build_ws_url_default() {
        let realtime = OpenAIRealtime::new(test_config()).unwrap();
        let url = realtime.build_ws_url().unwrap();
        assert_eq!(
            url.as_str(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
    }

    #[test]
    fn test_build_ws_url_endpoint_override() {
        let config = RealtimeConfig {
            endpoint: Some("ws://127.0.0.1:9000/v1/realtime".to_string()),
            model: "gpt-realtime".to_string(),
            ..test_config()
        };
        let realtime = OpenAIRealtime::new(config).unwrap();
        let url = realtime.build_ws_url().unwrap();
        assert_eq!(url.host_str(), Some("127.0.0.1"));
        assert_eq!(url.port(), Some(9000));
        assert!(url.as_str().ends_with("?model=gpt-realtime"));
    }

    #[test]
    fn test_build_ws_url_invalid_endpoint() {
        let config = RealtimeConfig {
            endpoint: Some("not a url".to_string()),
            ..test_config()
        };
        let realtime = OpenAIRealtime::new(config).unwrap();
        assert!(matches!(
            realtime.build_ws_url(),
            Err(RealtimeError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_session_config_is_pcm16_without_server_vad() {
        let config = RealtimeConfig {
            instructions: Some("You answer the phone for Fade Factory.".to_string()),
            max_response_output_tokens: Some(-1),
            ..test_config()
        };
        let realtime = OpenAIRealtime::new(config).unwrap();
        let session = realtime.build_session_config();
        assert_eq!(session.input_audio_format.as_deref(), Some("pcm16"));
        assert_eq!(session.output_audio_format.as_deref(), Some("pcm16"));
        assert!(session.turn_detection.is_none());
        assert!(matches!(
            session.max_response_output_tokens,
            Some(MaxTokens::Infinite(_))
        ));
        assert_eq!(
            session.instructions.as_deref(),
            Some("You answer the phone for Fade Factory.")
        );
    }

    #[test]
    fn test_reconnection_defaults_to_disabled() {
        let realtime = OpenAIRealtime::new(test_config()).unwrap();
        assert!(!realtime.reconnection_config.enabled);
        assert!(!realtime.reconnection_config.should_retry(0));
    }

    #[test]
    fn test_custom_reconnection_config() {
        let config = RealtimeConfig {
            reconnection: Some(ReconnectionConfig {
                enabled: true,
                max_attempts: 4,
                initial_delay_ms: 250,
                max_delay_ms: 2000,
                backoff_multiplier: 1.5,
                jitter: false,
            }),
            ..test_config()
        };

        let realtime = OpenAIRealtime::new(config).unwrap();
        assert!(realtime.reconnection_config.enabled);
        assert_eq!(realtime.reconnection_config.max_attempts, 4);
        assert_eq!(realtime.reconnection_config.initial_delay_ms, 250);
    }

    #[tokio::test]
    async fn test_connect_failure_marks_failed() {
        // Nothing listens on port 9 of the loopback interface
        let config = RealtimeConfig {
            endpoint: Some("ws://127.0.0.1:9/v1/realtime".to_string()),
            ..test_config()
        };
        let mut realtime = OpenAIRealtime::new(config).unwrap();
        let result = realtime.connect().await;
        assert!(matches!(result, Err(RealtimeError::ConnectionFailed(_))));
        assert!(!realtime.is_ready());
        assert_eq!(realtime.get_connection_state(), ConnectionState::Failed);
    }
}
