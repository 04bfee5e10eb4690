//! Media stream WebSocket handler
//!
//! Accepts the telephony provider's media stream, resolves the call context
//! and runs one [`CallBridgeSession`] for the lifetime of the socket.

use axum::{
    Extension,
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::core::bridge::{CallBridgeParams, CallBridgeSession, MediaRoute};
use crate::core::realtime::BoxedRealtime;
use crate::core::registry::CallContext;
use crate::errors::app_error::{AppError, AppResult};
use crate::middleware::ClientIp;
use crate::state::AppState;

/// Buffer between the socket reader and the session loop.
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (64 KiB)
const MAX_WS_FRAME_SIZE: usize = 64 * 1024;

/// Maximum WebSocket message size (256 KiB)
const MAX_WS_MESSAGE_SIZE: usize = 256 * 1024;

/// How long queued outbound frames may take to drain after the session ends.
const SENDER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// `GET /media-stream/{call_id}`
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    upgrade(ws, state, Some(call_id), client_ip.map(|Extension(ip)| ip)).await
}

/// `GET /media-stream`, for calls the routing layer never registered.
pub async fn anonymous_media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    upgrade(ws, state, None, client_ip.map(|Extension(ip)| ip)).await
}

async fn upgrade(
    ws: WebSocketUpgrade,
    state: Arc<AppState>,
    call_id: Option<String>,
    client_ip: Option<ClientIp>,
) -> Response {
    let prepared = match prepare_call(&state, call_id).await {
        Ok(prepared) => prepared,
        Err(e) => return e.into_response(),
    };

    info!(call_id = %prepared.call_id, "Media stream upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_media_stream(socket, state, prepared, client_ip))
}

/// Everything resolved before the upgrade is accepted.
struct PreparedCall {
    call_id: String,
    context: CallContext,
    provider: BoxedRealtime,
}

/// Resolve the call context and build its speech AI provider.
///
/// Fails before the upgrade so the telephony provider sees a plain HTTP error.
async fn prepare_call(state: &AppState, call_id: Option<String>) -> AppResult<PreparedCall> {
    let defaults = state.config.default_context();
    let require_registered = state.config.require_registered_calls;

    let (call_id, context) = match call_id {
        Some(call_id) => {
            if state.registry.get(&call_id).await.is_some() {
                return Err(AppError::Conflict(format!("Call {call_id} is already active")));
            }
            match state.registry.claim_pending(&call_id).await {
                Some(context) => (call_id, context.or(&defaults)),
                None if require_registered => {
                    return Err(AppError::NotFound(format!(
                        "Call {call_id} is not registered"
                    )));
                }
                None => {
                    debug!(call_id = %call_id, "No registered context, using defaults");
                    (call_id, defaults)
                }
            }
        }
        None if require_registered => {
            return Err(AppError::NotFound(
                "Media streams require a registered call id".to_string(),
            ));
        }
        None => (uuid::Uuid::new_v4().to_string(), defaults),
    };

    let realtime = state
        .config
        .realtime_config(&context)
        .map_err(AppError::ServiceUnavailable)?;
    let provider = state.create_realtime(realtime).map_err(|e| {
        error!(call_id = %call_id, error = %e, "Failed to create speech AI provider");
        AppError::ServiceUnavailable(format!("Speech AI unavailable: {e}"))
    })?;

    Ok(PreparedCall {
        call_id,
        context,
        provider,
    })
}

/// Run one call over an upgraded socket.
async fn handle_media_stream(
    socket: WebSocket,
    state: Arc<AppState>,
    prepared: PreparedCall,
    client_ip: Option<ClientIp>,
) {
    let PreparedCall {
        call_id,
        context,
        provider,
    } = prepared;
    info!(call_id = %call_id, "Media stream connected");

    let (mut sender, mut receiver) = socket.split();
    let (route_tx, mut route_rx) = mpsc::channel::<MediaRoute>(CHANNEL_BUFFER_SIZE);
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(CHANNEL_BUFFER_SIZE);

    let sender_call_id = call_id.clone();
    let sender_task = tokio::spawn(async move {
        while let Some(route) = route_rx.recv().await {
            let should_close = matches!(route, MediaRoute::Close);

            let result = match route {
                MediaRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json) => sender.send(Message::Text(json.into())).await,
                    Err(e) => {
                        error!(call_id = %sender_call_id, "Failed to serialize media frame: {}", e);
                        continue;
                    }
                },
                MediaRoute::Ping => sender.send(Message::Ping(Bytes::new())).await,
                MediaRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!(call_id = %sender_call_id, "Failed to write to media stream: {}", e);
                break;
            }
            if should_close {
                break;
            }
        }
    });

    let reader_call_id = call_id.clone();
    let reader_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Ok(Message::Binary(data)) => {
                    debug!(call_id = %reader_call_id, bytes = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Close(_)) => {
                    debug!(call_id = %reader_call_id, "Media stream closed by peer");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(call_id = %reader_call_id, "Media stream read error: {}", e);
                    break;
                }
            }
        }
    });

    let params = CallBridgeParams {
        call_id: call_id.clone(),
        config: state.config.bridge_config(),
        context,
    };

    match CallBridgeSession::start(params, provider, route_tx.clone(), state.registry.clone()).await
    {
        Ok(session) => {
            drop(route_tx);
            let end = session.run(inbound_rx).await;
            info!(
                call_id = %end.call_id,
                stream_sid = ?end.stream_sid,
                reason = %end.reason,
                "Media stream finished"
            );
        }
        Err(e) => {
            warn!(call_id = %call_id, error = %e, "Could not start call bridge");
            let _ = route_tx.send(MediaRoute::Close).await;
            drop(route_tx);
        }
    }

    reader_task.abort();
    if tokio::time::timeout(SENDER_DRAIN_TIMEOUT, sender_task)
        .await
        .is_err()
    {
        debug!(call_id = %call_id, "Media stream writer did not drain in time");
    }

    if let Some(ClientIp(ip)) = client_ip {
        state.release_connection(ip);
    }
}
