//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{AuthApiSecret, ServerConfig, TlsConfig, parse_auth_api_secrets_json, validation};

/// Read a variable, treating empty strings as unset.
fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a variable into `T`, falling back to `default` when unset.
fn parse_var<T: FromStr>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| format!("Invalid {key} value '{raw}': {e}").into()),
        None => Ok(default),
    }
}

fn parse_bool(key: &str, default: bool) -> Result<bool, Box<dyn std::error::Error>> {
    match var(key) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(format!("Invalid {key} value '{raw}': expected true or false").into()),
        },
        None => Ok(default),
    }
}

/// Build a configuration from the process environment without validating it.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let defaults = ServerConfig::default();

    let tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(
                "Invalid TLS configuration: TLS_CERT_PATH and TLS_KEY_PATH must be set together"
                    .into(),
            );
        }
    };

    let mut auth_api_secrets = match var("AUTH_API_SECRETS_JSON") {
        Some(json) => parse_auth_api_secrets_json(&json)?,
        None => Vec::new(),
    };
    if auth_api_secrets.is_empty()
        && let Some(secret) = var("AUTH_API_SECRET")
    {
        auth_api_secrets.push(AuthApiSecret {
            id: var("AUTH_API_SECRET_ID").unwrap_or_else(|| "default".to_string()),
            secret,
        });
    }

    let max_websocket_connections = match var("MAX_WEBSOCKET_CONNECTIONS") {
        Some(raw) => Some(raw.trim().parse::<usize>().map_err(|e| {
            format!("Invalid MAX_WEBSOCKET_CONNECTIONS value '{raw}': {e}")
        })?),
        None => None,
    };

    Ok(ServerConfig {
        host: var("HOST").unwrap_or_else(|| defaults.host.clone()),
        port: parse_var("PORT", defaults.port)?,
        tls,
        openai_api_key: var("OPENAI_API_KEY"),
        realtime_model: var("REALTIME_MODEL").unwrap_or_else(|| defaults.realtime_model.clone()),
        realtime_voice: var("REALTIME_VOICE"),
        realtime_url: var("REALTIME_URL"),
        realtime_transcription_model: var("REALTIME_TRANSCRIPTION_MODEL"),
        default_identity: var("DEFAULT_IDENTITY"),
        default_greeting: var("DEFAULT_GREETING"),
        default_instructions: var("DEFAULT_INSTRUCTIONS"),
        silence_timeout_ms: parse_var("SILENCE_TIMEOUT_MS", defaults.silence_timeout_ms)?,
        flush_poll_interval_ms: parse_var(
            "FLUSH_POLL_INTERVAL_MS",
            defaults.flush_poll_interval_ms,
        )?,
        keepalive_interval_secs: parse_var(
            "KEEPALIVE_INTERVAL_SECS",
            defaults.keepalive_interval_secs,
        )?,
        frame_duration_ms: parse_var("FRAME_DURATION_MS", defaults.frame_duration_ms)?,
        ai_connect_timeout_secs: parse_var(
            "AI_CONNECT_TIMEOUT_SECS",
            defaults.ai_connect_timeout_secs,
        )?,
        ai_reconnect_attempts: parse_var("AI_RECONNECT_ATTEMPTS", defaults.ai_reconnect_attempts)?,
        call_context_ttl_seconds: parse_var(
            "CALL_CONTEXT_TTL_SECONDS",
            defaults.call_context_ttl_seconds,
        )?,
        max_call_duration_seconds: parse_var(
            "MAX_CALL_DURATION_SECONDS",
            defaults.max_call_duration_seconds,
        )?,
        require_registered_calls: parse_bool(
            "REQUIRE_REGISTERED_CALLS",
            defaults.require_registered_calls,
        )?,
        auth_api_secrets,
        auth_required: parse_bool("AUTH_REQUIRED", defaults.auth_required)?,
        rate_limit_requests_per_second: parse_var(
            "RATE_LIMIT_REQUESTS_PER_SECOND",
            defaults.rate_limit_requests_per_second,
        )?,
        rate_limit_burst_size: parse_var("RATE_LIMIT_BURST_SIZE", defaults.rate_limit_burst_size)?,
        max_websocket_connections,
        max_connections_per_ip: parse_var(
            "MAX_CONNECTIONS_PER_IP",
            defaults.max_connections_per_ip,
        )?,
    })
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables take their defaults. The .env file, if any, is expected
    /// to have been loaded into the environment already.
    ///
    /// # Errors
    /// Returns an error when a variable cannot be parsed or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = load_from_env()?;
        validation::validate(&config)?;
        Ok(config)
    }
}
