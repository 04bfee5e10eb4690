//! Scripted speech AI provider
//!
//! Records every request the bridge makes and lets a test push synthesized
//! audio, transcripts and failures back through the registered callbacks.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use voicebridge_gateway::core::realtime::{
    AudioOutputCallback, BaseRealtime, ConnectionState, RealtimeAudioData, RealtimeConfig,
    RealtimeError, RealtimeErrorCallback, RealtimeResult, ReconnectionCallback,
    ResponseDoneCallback, TranscriptCallback, TranscriptResult, TranscriptRole,
};

/// One request received from the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Connect,
    Append(Vec<u8>),
    Commit,
    Response(Option<String>),
    Disconnect,
}

/// How `connect` behaves.
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
    Ready,
    /// Ready after a delay
    Delay(Duration),
    Fail(RealtimeError),
    /// Never completes
    Hang,
}

#[derive(Default)]
struct Inner {
    requests: Vec<Request>,
    state: ConnectionState,
    config: Option<RealtimeConfig>,
    audio: Option<AudioOutputCallback>,
    transcript: Option<TranscriptCallback>,
    error: Option<RealtimeErrorCallback>,
    response_done: Option<ResponseDoneCallback>,
    reconnection: Option<ReconnectionCallback>,
}

/// Test-side view of a [`MockRealtime`].
#[derive(Clone, Default)]
pub struct MockHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockHandle {
    pub fn requests(&self) -> Vec<Request> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Audio of every append, in order.
    pub fn appended(&self) -> Vec<Vec<u8>> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Append(audio) => Some(audio),
                _ => None,
            })
            .collect()
    }

    pub fn commit_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, Request::Commit))
            .count()
    }

    pub fn responses(&self) -> Vec<Option<String>> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Response(instructions) => Some(instructions),
                _ => None,
            })
            .collect()
    }

    pub fn config(&self) -> Option<RealtimeConfig> {
        self.inner.lock().unwrap().config.clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state
    }

    /// Deliver synthesized 24kHz PCM as the provider would.
    pub async fn emit_audio(&self, pcm: Vec<u8>) {
        self.emit_audio_at(pcm, 24000).await;
    }

    pub async fn emit_audio_at(&self, pcm: Vec<u8>, sample_rate: u32) {
        let callback = self.inner.lock().unwrap().audio.clone();
        if let Some(callback) = callback {
            callback(RealtimeAudioData {
                data: Bytes::from(pcm),
                sample_rate,
                item_id: None,
                response_id: Some("resp_1".to_string()),
            })
            .await;
        }
    }

    pub async fn emit_transcript(&self, text: &str, role: TranscriptRole) {
        let callback = self.inner.lock().unwrap().transcript.clone();
        if let Some(callback) = callback {
            callback(TranscriptResult {
                text: text.to_string(),
                role,
                item_id: None,
            })
            .await;
        }
    }

    pub async fn emit_error(&self, error: RealtimeError) {
        let callback = self.inner.lock().unwrap().error.clone();
        if let Some(callback) = callback {
            callback(error).await;
        }
    }

    /// Lose the upstream connection for good.
    pub async fn drop_connection(&self) {
        self.inner.lock().unwrap().state = ConnectionState::Failed;
        self.emit_error(RealtimeError::ConnectionFailed(
            "upstream closed".to_string(),
        ))
        .await;
    }
}

/// Scripted [`BaseRealtime`] implementation.
pub struct MockRealtime {
    handle: MockHandle,
    behavior: ConnectBehavior,
}

impl MockRealtime {
    pub fn new_mock(behavior: ConnectBehavior) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                handle: handle.clone(),
                behavior,
            },
            handle,
        )
    }

    fn record(&self, request: Request) {
        self.handle.inner.lock().unwrap().requests.push(request);
    }

    fn ensure_ready(&self) -> RealtimeResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(RealtimeError::NotConnected)
        }
    }
}

#[async_trait]
impl BaseRealtime for MockRealtime {
    fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        let (mock, handle) = Self::new_mock(ConnectBehavior::Ready);
        handle.inner.lock().unwrap().config = Some(config);
        Ok(mock)
    }

    async fn connect(&mut self) -> RealtimeResult<()> {
        self.record(Request::Connect);
        self.handle.inner.lock().unwrap().state = ConnectionState::Connecting;
        match self.behavior.clone() {
            ConnectBehavior::Ready => {}
            ConnectBehavior::Delay(delay) => tokio::time::sleep(delay).await,
            ConnectBehavior::Fail(error) => {
                self.handle.inner.lock().unwrap().state = ConnectionState::Failed;
                return Err(error);
            }
            ConnectBehavior::Hang => std::future::pending::<()>().await,
        }
        self.handle.inner.lock().unwrap().state = ConnectionState::Connected;
        Ok(())
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        self.record(Request::Disconnect);
        self.handle.inner.lock().unwrap().state = ConnectionState::Disconnected;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.handle.state() == ConnectionState::Connected
    }

    fn get_connection_state(&self) -> ConnectionState {
        self.handle.state()
    }

    async fn send_audio(&mut self, audio_data: Bytes) -> RealtimeResult<()> {
        self.ensure_ready()?;
        self.record(Request::Append(audio_data.to_vec()));
        Ok(())
    }

    async fn commit_audio_buffer(&mut self) -> RealtimeResult<()> {
        self.ensure_ready()?;
        self.record(Request::Commit);
        Ok(())
    }

    async fn create_response(&mut self, instructions: Option<&str>) -> RealtimeResult<()> {
        self.ensure_ready()?;
        self.record(Request::Response(instructions.map(str::to_string)));
        Ok(())
    }

    fn on_transcript(&mut self, callback: TranscriptCallback) -> RealtimeResult<()> {
        self.handle.inner.lock().unwrap().transcript = Some(callback);
        Ok(())
    }

    fn on_audio(&mut self, callback: AudioOutputCallback) -> RealtimeResult<()> {
        self.handle.inner.lock().unwrap().audio = Some(callback);
        Ok(())
    }

    fn on_error(&mut self, callback: RealtimeErrorCallback) -> RealtimeResult<()> {
        self.handle.inner.lock().unwrap().error = Some(callback);
        Ok(())
    }

    fn on_response_done(&mut self, callback: ResponseDoneCallback) -> RealtimeResult<()> {
        self.handle.inner.lock().unwrap().response_done = Some(callback);
        Ok(())
    }

    fn on_reconnection(&mut self, callback: ReconnectionCallback) -> RealtimeResult<()> {
        self.handle.inner.lock().unwrap().reconnection = Some(callback);
        Ok(())
    }
}
