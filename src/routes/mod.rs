//! Router assembly.

pub mod api;
pub mod media_stream;

use axum::{Router, middleware, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::middleware::{auth_middleware, connection_limit_middleware};
use crate::state::AppState;

/// Build the full application router
///
/// - `GET /` health check, always public
/// - `/calls` routing API behind bearer auth
/// - `/media-stream` WebSockets behind connection limits
///
/// The connection limit middleware reads `ConnectInfo<SocketAddr>`, so the
/// router must be served with `into_make_service_with_connect_info`.
pub fn create_app(state: Arc<AppState>) -> Router {
    let api_routes = api::create_api_router().layer(middleware::from_fn_with_state(
        state.clone(),
        auth_middleware,
    ));

    let media_routes = media_stream::create_media_stream_router().layer(
        middleware::from_fn_with_state(state.clone(), connection_limit_middleware),
    );

    Router::new()
        .route("/", get(health_check))
        .merge(api_routes)
        .merge(media_routes)
        .with_state(state)
}
