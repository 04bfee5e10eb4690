//! HTTP-facing error types.
//!
//! - `app_error`: handler errors mapped to status codes and JSON bodies
//! - `auth_error`: bearer authentication failures

pub mod app_error;
pub mod auth_error;

pub use app_error::{AppError, AppResult};
pub use auth_error::{AuthError, AuthResult};
