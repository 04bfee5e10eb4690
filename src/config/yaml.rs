use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   tls:
///     cert_path: "/etc/voicebridge/cert.pem"
///     key_path: "/etc/voicebridge/key.pem"
///
/// providers:
///   openai_api_key: "sk-..."
///
/// realtime:
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   transcription_model: "whisper-1"
///
/// bridge:
///   default_identity: "Fade Factory Barbershop"
///   default_greeting: "Thanks for calling Fade Factory, how can I help?"
///   silence_timeout_ms: 700
///   flush_poll_interval_ms: 120
///   keepalive_interval_secs: 15
///   frame_duration_ms: 20
///   ai_connect_timeout_secs: 10
///   ai_reconnect_attempts: 0
///
/// calls:
///   context_ttl_seconds: 300
///   max_call_duration_seconds: 14400
///   require_registered: false
///
/// auth:
///   required: true
///   api_secrets:
///     - id: "call-router"
///       secret: "your-api-secret"
///
/// security:
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///   max_websocket_connections: 500
///   max_connections_per_ip: 100
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub bridge: Option<BridgeYaml>,
    pub calls: Option<CallsYaml>,
    pub auth: Option<AuthYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider API keys from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    pub openai_api_key: Option<String>,
}

/// Speech AI session settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub model: Option<String>,
    pub voice: Option<String>,
    /// Endpoint override, e.g. a proxy or a local test server
    pub url: Option<String>,
    pub transcription_model: Option<String>,
}

/// Bridge tuning and fallback call context from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BridgeYaml {
    pub default_identity: Option<String>,
    pub default_greeting: Option<String>,
    pub default_instructions: Option<String>,
    pub silence_timeout_ms: Option<u64>,
    pub flush_poll_interval_ms: Option<u64>,
    pub keepalive_interval_secs: Option<u64>,
    pub frame_duration_ms: Option<u32>,
    pub ai_connect_timeout_secs: Option<u64>,
    pub ai_reconnect_attempts: Option<u32>,
}

/// Call registry settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CallsYaml {
    pub context_ttl_seconds: Option<u64>,
    pub max_call_duration_seconds: Option<u64>,
    pub require_registered: Option<bool>,
}

/// Authentication configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AuthYaml {
    pub required: Option<bool>,
    /// Preferred multi-secret form. If non-empty, it takes precedence over api_secret.
    #[serde(default)]
    pub api_secrets: Vec<AuthApiSecretYaml>,
    /// Single-secret form. Ignored when api_secrets is non-empty.
    pub api_secret: Option<String>,
}

/// API secret authentication entry in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct AuthApiSecretYaml {
    pub id: String,
    pub secret: String,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    pub rate_limit_requests_per_second: Option<u32>,
    pub rate_limit_burst_size: Option<u32>,
    pub max_websocket_connections: Option<usize>,
    pub max_connections_per_ip: Option<u32>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_config_full() {
        let yaml = r#"
server:
  host: "127.0.0.1"
  port: 8443
  tls:
    cert_path: "/certs/cert.pem"
    key_path: "/certs/key.pem"
providers:
  openai_api_key: "sk-yaml"
realtime:
  model: "gpt-realtime"
  voice: "coral"
  url: "ws://127.0.0.1:9000/v1/realtime"
bridge:
  default_identity: "Fade Factory"
  silence_timeout_ms: 900
  frame_duration_ms: 40
  ai_reconnect_attempts: 2
calls:
  context_ttl_seconds: 60
  require_registered: true
auth:
  required: true
  api_secrets:
    - id: "router"
      secret: "s3cret"
security:
  max_connections_per_ip: 5
"#;
        let config: YamlConfig = serde_yaml::from_str(yaml).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.port, Some(8443));
        assert_eq!(server.tls.unwrap().key_path.as_deref(), Some("/certs/key.pem"));
        assert_eq!(config.providers.unwrap().openai_api_key.as_deref(), Some("sk-yaml"));
        assert_eq!(config.realtime.unwrap().voice.as_deref(), Some("coral"));

        let bridge = config.bridge.unwrap();
        assert_eq!(bridge.silence_timeout_ms, Some(900));
        assert_eq!(bridge.frame_duration_ms, Some(40));
        assert_eq!(bridge.ai_reconnect_attempts, Some(2));
        assert_eq!(bridge.flush_poll_interval_ms, None);

        assert_eq!(config.calls.unwrap().require_registered, Some(true));
        let auth = config.auth.unwrap();
        assert_eq!(auth.api_secrets.len(), 1);
        assert_eq!(auth.api_secrets[0].id, "router");
        assert_eq!(config.security.unwrap().max_connections_per_ip, Some(5));
    }

    #[test]
    fn test_yaml_config_empty() {
        let config: YamlConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.server.is_none());
        assert!(config.bridge.is_none());
    }

    #[test]
    fn test_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(&config_path, "server:\n  host: \"localhost\"\n  port: 3000\n").unwrap();

        let config = YamlConfig::from_file(&config_path).unwrap();
        assert_eq!(
            config.server.as_ref().unwrap().host,
            Some("localhost".to_string())
        );
        assert_eq!(config.server.as_ref().unwrap().port, Some(3000));
    }

    #[test]
    fn test_from_file_not_found() {
        let path = PathBuf::from("/nonexistent/config.yaml");
        let result = YamlConfig::from_file(&path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_from_file_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");
        fs::write(&config_path, "invalid: yaml: content:").unwrap();

        let result = YamlConfig::from_file(&config_path);
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );
    }
}
