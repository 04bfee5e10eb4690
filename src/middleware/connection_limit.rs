//! Connection limits for media stream WebSockets
//!
//! - Global maximum of concurrent WebSocket connections
//! - Per-IP connection limit
//!
//! The slot taken here is released by the media stream handler once its call
//! ends, using the [`ClientIp`] extension.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::state::{AppState, ConnectionLimitError};

/// Client IP carried to the handler so it can release its slot.
#[derive(Clone, Debug)]
pub struct ClientIp(pub IpAddr);

/// Enforce connection limits on WebSocket upgrade requests.
///
/// Over the global limit returns 503, over the per-IP limit returns 429.
/// Requests without an `Upgrade: websocket` header pass straight through.
pub async fn connection_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let is_ws_upgrade = request
        .headers()
        .get("upgrade")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

    if !is_ws_upgrade {
        return next.run(request).await;
    }

    let client_ip = addr.ip();
    match state.try_acquire_connection(client_ip) {
        Ok(()) => {
            request.extensions_mut().insert(ClientIp(client_ip));
            let response = next.run(request).await;
            // A refused upgrade never reaches the session, so the slot is returned here
            if response.status() != StatusCode::SWITCHING_PROTOCOLS {
                state.release_connection(client_ip);
            }
            response
        }
        Err(ConnectionLimitError::GlobalLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting media stream: global limit reached");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Server at capacity. Please try again later.",
            )
                .into_response()
        }
        Err(ConnectionLimitError::PerIpLimitReached) => {
            tracing::warn!(ip = %client_ip, "Rejecting media stream: per-IP limit reached");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many connections from your IP address.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::{Extension, Router, extract::connect_info::MockConnectInfo, routing::get};
    use std::net::Ipv4Addr;
    use tower::ServiceExt;

    fn app(state: Arc<AppState>) -> Router {
        Router::new()
            .route(
                "/media-stream",
                get(|ip: Option<Extension<ClientIp>>| async move {
                    match ip {
                        Some(Extension(ClientIp(ip))) => ip.to_string(),
                        None => "none".to_string(),
                    }
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                connection_limit_middleware,
            ))
            .layer(MockConnectInfo(SocketAddr::from((
                Ipv4Addr::new(10, 1, 2, 3),
                4000,
            ))))
    }

    fn upgrade_request() -> Request<Body> {
        Request::builder()
            .uri("/media-stream")
            .header("upgrade", "websocket")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_request_passes_through() {
        let state = AppState::new(ServerConfig::default());
        let response = app(state.clone())
            .oneshot(Request::builder().uri("/media-stream").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_upgrade_returns_slot() {
        let state = AppState::new(ServerConfig::default());
        let response = app(state.clone()).oneshot(upgrade_request()).await.unwrap();
        // The stand-in handler answers 200 rather than 101
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.ws_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_limits_reject_with_status() {
        let mut config = ServerConfig::default();
        config.max_websocket_connections = Some(1);
        let state = AppState::new(config);
        let other: IpAddr = Ipv4Addr::new(10, 9, 9, 9).into();
        state.try_acquire_connection(other).unwrap();

        let response = app(state.clone()).oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let mut config = ServerConfig::default();
        config.max_connections_per_ip = 1;
        let state = AppState::new(config);
        state
            .try_acquire_connection(Ipv4Addr::new(10, 1, 2, 3).into())
            .unwrap();

        let response = app(state).oneshot(upgrade_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
