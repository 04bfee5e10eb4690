pub mod auth;
pub mod connection_limit;

pub use auth::{Auth, auth_middleware};
pub use connection_limit::{ClientIp, connection_limit_middleware};
