//! Media stream WebSocket route configuration
//!
//! # Endpoints
//!
//! - `GET /media-stream/{call_id}` - media stream for a call announced via `POST /calls`
//! - `GET /media-stream` - media stream for an unannounced call (configured defaults)
//!
//! # Protocol
//!
//! The telephony provider sends JSON text frames keyed by `event`:
//!
//! ```json
//! {"event": "start", "start": {"streamSid": "MZ..."}}
//! {"event": "media", "media": {"payload": "<base64 μ-law 8kHz>"}}
//! {"event": "stop"}
//! ```
//!
//! The gateway answers with `media` frames addressed by `streamSid`, plus
//! periodic ping frames:
//!
//! ```json
//! {"event": "media", "streamSid": "MZ...", "media": {"payload": "<base64 μ-law 8kHz>"}}
//! ```

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{anonymous_media_stream_handler, media_stream_handler};
use crate::state::AppState;
use std::sync::Arc;

/// Create the media stream WebSocket router
///
/// Connection limits are layered on by [`super::create_app`].
pub fn create_media_stream_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media-stream", get(anonymous_media_stream_handler))
        .route("/media-stream/{call_id}", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
