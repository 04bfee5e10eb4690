use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::calls;
use crate::state::AppState;
use std::sync::Arc;

/// Create the call-routing API router
///
/// Authentication middleware is layered on by [`super::create_app`].
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/calls", post(calls::register_call).get(calls::list_calls))
        .route(
            "/calls/{call_id}",
            get(calls::get_call).delete(calls::hangup_call),
        )
        .layer(TraceLayer::new_for_http())
}
