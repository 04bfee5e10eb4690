//! Telephony media stream endpoint.

mod handler;

pub use handler::{anonymous_media_stream_handler, media_stream_handler};
