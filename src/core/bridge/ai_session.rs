//! Per-call speech AI session.
//!
//! Wraps one [`BoxedRealtime`] provider with the `connecting | ready | closed`
//! state machine the bridge relies on. Provider callbacks are turned into
//! [`AiEvent`]s on a channel so the owning session consumes them on its own
//! event loop instead of mutating shared state from provider tasks.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::realtime::{
    BoxedRealtime, RealtimeAudioData, RealtimeError, RealtimeResult, ReconnectionEvent,
    TranscriptResult,
};

/// Capacity of the provider -> session event channel.
const AI_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Lifecycle of the upstream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiSessionState {
    Connecting,
    Ready,
    Closed,
}

impl std::fmt::Display for AiSessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiSessionState::Connecting => write!(f, "connecting"),
            AiSessionState::Ready => write!(f, "ready"),
            AiSessionState::Closed => write!(f, "closed"),
        }
    }
}

/// Events relayed from the provider to the owning session.
#[derive(Debug, Clone)]
pub enum AiEvent {
    /// Synthesized speech
    Audio(RealtimeAudioData),
    /// Transcript of either side
    Transcript(TranscriptResult),
    /// A response finished generating
    ResponseDone(String),
    /// Provider reported an error; fatal when the connection is lost
    Failed(RealtimeError),
}

type ConnectTask = JoinHandle<(BoxedRealtime, RealtimeResult<()>)>;

/// One upstream speech AI connection owned by a single call.
pub struct AiSession {
    call_id: String,
    state: AiSessionState,
    /// Present once the connect task has handed the provider back
    provider: Option<BoxedRealtime>,
    connecting: Option<ConnectTask>,
}

impl AiSession {
    /// Register callbacks and begin connecting in the background.
    ///
    /// The returned receiver yields every provider event for this call.
    pub fn start(
        call_id: &str,
        mut provider: BoxedRealtime,
        connect_timeout: Duration,
    ) -> RealtimeResult<(Self, mpsc::Receiver<AiEvent>)> {
        let (tx, rx) = mpsc::channel(AI_EVENT_CHANNEL_CAPACITY);

        let audio_tx = tx.clone();
        provider.on_audio(Arc::new(move |audio: RealtimeAudioData| {
            let tx = audio_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AiEvent::Audio(audio)).await;
            })
        }))?;

        let transcript_tx = tx.clone();
        provider.on_transcript(Arc::new(move |transcript: TranscriptResult| {
            let tx = transcript_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AiEvent::Transcript(transcript)).await;
            })
        }))?;

        let done_tx = tx.clone();
        provider.on_response_done(Arc::new(move |response_id: String| {
            let tx = done_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AiEvent::ResponseDone(response_id)).await;
            })
        }))?;

        let error_tx = tx;
        provider.on_error(Arc::new(move |error: RealtimeError| {
            let tx = error_tx.clone();
            Box::pin(async move {
                let _ = tx.send(AiEvent::Failed(error)).await;
            })
        }))?;

        let reconnect_call_id = call_id.to_string();
        provider.on_reconnection(Arc::new(move |event: ReconnectionEvent| {
            let call_id = reconnect_call_id.clone();
            Box::pin(async move {
                if event.success {
                    info!(call_id = %call_id, attempt = event.attempt, "Speech AI session reconnected");
                } else {
                    warn!(
                        call_id = %call_id,
                        attempt = event.attempt,
                        error = ?event.error,
                        "Speech AI reconnection attempt failed"
                    );
                }
            })
        }))?;

        let connecting = tokio::spawn(async move {
            let result = match tokio::time::timeout(connect_timeout, provider.connect()).await {
                Ok(result) => result,
                Err(_) => Err(RealtimeError::Timeout(format!(
                    "speech AI session not ready after {}ms",
                    connect_timeout.as_millis()
                ))),
            };
            (provider, result)
        });

        let session = Self {
            call_id: call_id.to_string(),
            state: AiSessionState::Connecting,
            provider: None,
            connecting: Some(connecting),
        };
        Ok((session, rx))
    }

    pub fn state(&self) -> AiSessionState {
        self.state
    }

    pub fn is_connecting(&self) -> bool {
        self.state == AiSessionState::Connecting
    }

    /// Ready and the provider currently holds a live connection.
    ///
    /// False while the provider is reconnecting.
    pub fn is_ready(&self) -> bool {
        self.state == AiSessionState::Ready && self.provider.as_ref().is_some_and(|p| p.is_ready())
    }

    /// Wait for the connect task to finish.
    ///
    /// Cancel-safe; pends forever once the session has left `Connecting`, so it
    /// can sit in a `select!` guarded by [`AiSession::is_connecting`].
    pub async fn ready(&mut self) -> RealtimeResult<()> {
        let Some(task) = self.connecting.as_mut() else {
            return std::future::pending().await;
        };
        let joined = task.await;
        self.connecting = None;

        match joined {
            Ok((provider, result)) => {
                self.provider = Some(provider);
                match &result {
                    Ok(()) => {
                        self.state = AiSessionState::Ready;
                        info!(call_id = %self.call_id, "Speech AI session ready");
                    }
                    Err(e) => {
                        self.state = AiSessionState::Closed;
                        warn!(call_id = %self.call_id, error = %e, "Speech AI session failed to connect");
                    }
                }
                result
            }
            Err(e) => {
                self.state = AiSessionState::Closed;
                Err(RealtimeError::ConnectionFailed(format!(
                    "connect task failed: {e}"
                )))
            }
        }
    }

    /// Forward one finished utterance: append, commit, request a response.
    ///
    /// Returns `Ok(false)` when the session is not ready and the utterance was
    /// dropped.
    pub async fn submit(&mut self, utterance: Bytes) -> RealtimeResult<bool> {
        if !self.is_ready() {
            debug!(
                call_id = %self.call_id,
                state = %self.state,
                bytes = utterance.len(),
                "Speech AI session not ready, dropping utterance"
            );
            return Ok(false);
        }
        let Some(provider) = self.provider.as_mut() else {
            return Ok(false);
        };
        provider.submit_utterance(utterance).await?;
        Ok(true)
    }

    /// Ask the assistant to speak `greeting` before the caller says anything.
    pub async fn greet(&mut self, greeting: &str) -> RealtimeResult<()> {
        if !self.is_ready() {
            return Err(RealtimeError::NotConnected);
        }
        let Some(provider) = self.provider.as_mut() else {
            return Err(RealtimeError::NotConnected);
        };
        let instructions = format!("Greet the caller by saying: {greeting}");
        provider.create_response(Some(&instructions)).await
    }

    /// Mark the session closed after a fatal upstream error.
    pub fn mark_closed(&mut self) {
        self.state = AiSessionState::Closed;
    }

    /// Tear down the upstream connection, including an unfinished connect.
    pub async fn close(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
        if let Some(mut provider) = self.provider.take()
            && let Err(e) = provider.disconnect().await
        {
            warn!(call_id = %self.call_id, error = %e, "Failed to disconnect speech AI session");
        }
        self.state = AiSessionState::Closed;
    }
}

impl Drop for AiSession {
    fn drop(&mut self) {
        if let Some(task) = self.connecting.take() {
            task.abort();
        }
    }
}
