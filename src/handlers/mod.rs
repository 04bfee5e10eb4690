//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `calls` - Call-routing API used to announce and manage calls
//! - `media_stream` - Telephony media stream WebSocket bridged to the speech AI

pub mod api;
pub mod calls;
pub mod media_stream;

pub use media_stream::{anonymous_media_stream_handler, media_stream_handler};
