//! Configuration validation logic.

use std::collections::HashSet;

use url::Url;

use super::{AuthApiSecret, ServerConfig, TlsConfig};

/// Outbound frame durations a telephony transport accepts.
pub const SUPPORTED_FRAME_DURATIONS_MS: [u32; 5] = [10, 20, 30, 40, 60];

/// Run every check against a merged configuration.
pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_port(config.port)?;
    validate_bridge_timing(config.silence_timeout_ms, config.flush_poll_interval_ms)?;
    validate_frame_duration(config.frame_duration_ms)?;
    if let Some(url) = &config.realtime_url {
        validate_realtime_url(url)?;
    }
    validate_auth_api_secrets(&config.auth_api_secrets)?;
    validate_auth_required(config.auth_required, &config.auth_api_secrets)?;
    if let Some(tls) = &config.tls {
        validate_tls(tls)?;
    }
    Ok(())
}

pub(super) fn validate_port(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    if port == 0 {
        return Err("Invalid PORT: must be non-zero".into());
    }
    Ok(())
}

/// The silence check must run more often than the silence it detects.
pub(super) fn validate_bridge_timing(
    silence_timeout_ms: u64,
    flush_poll_interval_ms: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    if flush_poll_interval_ms == 0 {
        return Err("Invalid FLUSH_POLL_INTERVAL_MS: must be non-zero".into());
    }
    if silence_timeout_ms <= flush_poll_interval_ms {
        return Err(format!(
            "Invalid SILENCE_TIMEOUT_MS: silence timeout ({silence_timeout_ms}ms) must be greater than the flush poll interval ({flush_poll_interval_ms}ms)"
        )
        .into());
    }
    Ok(())
}

pub(super) fn validate_frame_duration(frame_duration_ms: u32) -> Result<(), Box<dyn std::error::Error>> {
    if !SUPPORTED_FRAME_DURATIONS_MS.contains(&frame_duration_ms) {
        return Err(format!(
            "Invalid FRAME_DURATION_MS: {frame_duration_ms}ms is not one of {SUPPORTED_FRAME_DURATIONS_MS:?}"
        )
        .into());
    }
    Ok(())
}

/// The speech AI endpoint override must be a WebSocket URL with a host.
pub(super) fn validate_realtime_url(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let parsed =
        Url::parse(url).map_err(|e| format!("Invalid REALTIME_URL '{url}': {e}"))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(format!(
            "Invalid REALTIME_URL '{url}': scheme must be ws or wss, got {}",
            parsed.scheme()
        )
        .into());
    }
    if parsed.host_str().is_none() {
        return Err(format!("Invalid REALTIME_URL '{url}': missing host").into());
    }
    Ok(())
}

pub(super) fn validate_auth_api_secrets(
    secrets: &[AuthApiSecret],
) -> Result<(), Box<dyn std::error::Error>> {
    let mut seen = HashSet::new();
    for entry in secrets {
        if entry.id.trim().is_empty() {
            return Err("Invalid AUTH_API_SECRETS_JSON: secret id must not be empty".into());
        }
        if entry.secret.is_empty() {
            return Err(format!(
                "Invalid AUTH_API_SECRETS_JSON: secret for id '{}' is empty",
                entry.id
            )
            .into());
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(format!(
                "Invalid AUTH_API_SECRETS_JSON: duplicate secret id '{}'",
                entry.id
            )
            .into());
        }
    }
    Ok(())
}

pub(super) fn validate_auth_required(
    auth_required: bool,
    secrets: &[AuthApiSecret],
) -> Result<(), Box<dyn std::error::Error>> {
    if auth_required && secrets.is_empty() {
        return Err(
            "Invalid AUTH_REQUIRED: authentication is required but no API secrets are configured"
                .into(),
        );
    }
    Ok(())
}

pub(super) fn validate_tls(tls: &TlsConfig) -> Result<(), Box<dyn std::error::Error>> {
    if tls.cert_path.as_os_str().is_empty() || tls.key_path.as_os_str().is_empty() {
        return Err("Invalid TLS configuration: cert and key paths must both be set".into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn secret(id: &str, secret: &str) -> AuthApiSecret {
        AuthApiSecret {
            id: id.to_string(),
            secret: secret.to_string(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_port() {
        assert!(validate_port(3001).is_ok());
        assert!(validate_port(0).unwrap_err().to_string().contains("Invalid PORT"));
    }

    #[test]
    fn test_bridge_timing() {
        assert!(validate_bridge_timing(700, 120).is_ok());
        assert!(validate_bridge_timing(120, 120).is_err());
        assert!(validate_bridge_timing(700, 0).is_err());
    }

    #[test]
    fn test_frame_duration() {
        for ms in SUPPORTED_FRAME_DURATIONS_MS {
            assert!(validate_frame_duration(ms).is_ok());
        }
        assert!(validate_frame_duration(0).is_err());
        assert!(validate_frame_duration(25).is_err());
    }

    #[test]
    fn test_realtime_url() {
        assert!(validate_realtime_url("wss://api.openai.com/v1/realtime").is_ok());
        assert!(validate_realtime_url("ws://127.0.0.1:9000").is_ok());

        let err = validate_realtime_url("https://api.openai.com/v1/realtime").unwrap_err();
        assert!(err.to_string().contains("scheme must be ws or wss"));
        assert!(validate_realtime_url("not a url").is_err());
    }

    #[test]
    fn test_auth_secrets() {
        assert!(validate_auth_api_secrets(&[secret("a", "1"), secret("b", "2")]).is_ok());

        let err = validate_auth_api_secrets(&[secret("a", "1"), secret("a", "2")]).unwrap_err();
        assert!(err.to_string().contains("duplicate secret id 'a'"));

        assert!(validate_auth_api_secrets(&[secret(" ", "1")]).is_err());
        assert!(validate_auth_api_secrets(&[secret("a", "")]).is_err());
    }

    #[test]
    fn test_auth_required() {
        assert!(validate_auth_required(false, &[]).is_ok());
        assert!(validate_auth_required(true, &[secret("a", "1")]).is_ok());
        assert!(validate_auth_required(true, &[]).is_err());
    }

    #[test]
    fn test_tls() {
        let tls = TlsConfig {
            cert_path: PathBuf::from("/etc/cert.pem"),
            key_path: PathBuf::new(),
        };
        assert!(validate_tls(&tls).is_err());
    }
}
