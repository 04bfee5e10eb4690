//! Configuration module for the VoiceBridge gateway
//!
//! Configuration comes from .env files, environment variables and an optional
//! YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voicebridge_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::from_env()?;
//!
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use subtle::ConstantTimeEq;

use crate::core::bridge::BridgeConfig;
use crate::core::realtime::{
    InputTranscriptionConfig, OpenAIRealtimeModel, RealtimeConfig, ReconnectionConfig,
};
use crate::core::registry::CallContext;

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::SUPPORTED_FRAME_DURATIONS_MS;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// API secret authentication entry with a client identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthApiSecret {
    pub id: String,
    pub secret: String,
}

/// Server configuration
///
/// Everything needed to run the gateway:
/// - Server settings (host, port, TLS)
/// - Speech AI provider credentials and session defaults
/// - Bridge timing and the fallback call context
/// - Call registry lifetimes
/// - Authentication and connection limits
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    pub tls: Option<TlsConfig>,

    // Speech AI provider
    /// OpenAI API key for the Realtime API. Checked per call, not at startup.
    pub openai_api_key: Option<String>,
    pub realtime_model: String,
    pub realtime_voice: Option<String>,
    /// Realtime endpoint override
    pub realtime_url: Option<String>,
    /// Enables caller transcripts when set (e.g. "whisper-1")
    pub realtime_transcription_model: Option<String>,

    // Fallback call context
    pub default_identity: Option<String>,
    pub default_greeting: Option<String>,
    pub default_instructions: Option<String>,

    // Bridge tuning
    /// Default: 700
    pub silence_timeout_ms: u64,
    /// Default: 120
    pub flush_poll_interval_ms: u64,
    /// Default: 15
    pub keepalive_interval_secs: u64,
    /// Default: 20
    pub frame_duration_ms: u32,
    /// Default: 10
    pub ai_connect_timeout_secs: u64,
    /// 0 disables reconnection. Default: 0
    pub ai_reconnect_attempts: u32,

    // Call registry
    /// Default: 300
    pub call_context_ttl_seconds: u64,
    /// Default: 14400
    pub max_call_duration_seconds: u64,
    /// Reject media streams for calls the routing layer never registered
    pub require_registered_calls: bool,

    // Authentication configuration
    pub auth_api_secrets: Vec<AuthApiSecret>,
    pub auth_required: bool,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    // Connection limits
    /// Maximum concurrent WebSocket connections
    /// Default: None (unlimited)
    pub max_websocket_connections: Option<usize>,
    /// Maximum connections per IP address
    /// Default: 100
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            tls: None,
            openai_api_key: None,
            realtime_model: OpenAIRealtimeModel::default().as_str().to_string(),
            realtime_voice: None,
            realtime_url: None,
            realtime_transcription_model: None,
            default_identity: None,
            default_greeting: None,
            default_instructions: None,
            silence_timeout_ms: 700,
            flush_poll_interval_ms: 120,
            keepalive_interval_secs: 15,
            frame_duration_ms: 20,
            ai_connect_timeout_secs: 10,
            ai_reconnect_attempts: 0,
            call_context_ttl_seconds: 300,
            max_call_duration_seconds: 14400,
            require_registered_calls: false,
            auth_api_secrets: Vec::new(),
            auth_required: false,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            max_websocket_connections: None,
            max_connections_per_ip: 100,
        }
    }
}

/// Zeroize secrets when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        for secret in &mut self.auth_api_secrets {
            secret.secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values (loaded in main.rs)
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if the YAML file cannot be read or is malformed, an
    /// environment variable has an invalid format, or validation fails.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Returns true if at least one API secret entry is configured
    pub fn has_api_secret_auth(&self) -> bool {
        !self.auth_api_secrets.is_empty()
    }

    /// Find the API secret identifier that matches a bearer token
    ///
    /// Every configured secret is compared in constant time.
    pub fn find_api_secret_id(&self, token: &str) -> Option<&str> {
        let mut matched = None;
        for entry in &self.auth_api_secrets {
            if bool::from(entry.secret.as_bytes().ct_eq(token.as_bytes())) && matched.is_none() {
                matched = Some(entry.id.as_str());
            }
        }
        matched
    }

    /// Timing settings for each call bridge session.
    pub fn bridge_config(&self) -> BridgeConfig {
        BridgeConfig {
            silence_timeout: Duration::from_millis(self.silence_timeout_ms),
            flush_poll_interval: Duration::from_millis(self.flush_poll_interval_ms),
            keepalive_interval: Duration::from_secs(self.keepalive_interval_secs),
            frame_duration_ms: self.frame_duration_ms,
            ai_connect_timeout: Duration::from_secs(self.ai_connect_timeout_secs),
            max_call_duration: Some(self.max_call_duration()),
            ..BridgeConfig::default()
        }
    }

    pub fn call_context_ttl(&self) -> Duration {
        Duration::from_secs(self.call_context_ttl_seconds)
    }

    pub fn max_call_duration(&self) -> Duration {
        Duration::from_secs(self.max_call_duration_seconds)
    }

    /// Call context used when the routing layer registered none.
    pub fn default_context(&self) -> CallContext {
        CallContext {
            identity: self.default_identity.clone(),
            greeting: self.default_greeting.clone(),
            instructions: self.default_instructions.clone(),
            voice: self.realtime_voice.clone(),
        }
    }

    /// Speech AI session configuration for one call.
    ///
    /// # Errors
    /// Returns a message when no OpenAI API key is configured.
    pub fn realtime_config(&self, context: &CallContext) -> Result<RealtimeConfig, String> {
        let api_key = self
            .openai_api_key
            .clone()
            .ok_or_else(|| "OpenAI API key not configured in server environment".to_string())?;

        Ok(RealtimeConfig {
            api_key,
            provider: "openai".to_string(),
            model: self.realtime_model.clone(),
            voice: context.voice.clone().or_else(|| self.realtime_voice.clone()),
            instructions: context.session_instructions(),
            input_audio_transcription: self
                .realtime_transcription_model
                .clone()
                .map(|model| InputTranscriptionConfig { model }),
            endpoint: self.realtime_url.clone(),
            reconnection: Some(ReconnectionConfig::bounded(self.ai_reconnect_attempts)),
            ..Default::default()
        })
    }
}

pub(crate) fn parse_auth_api_secrets_json(
    json_str: &str,
) -> Result<Vec<AuthApiSecret>, Box<dyn std::error::Error>> {
    #[derive(serde::Deserialize)]
    struct AuthApiSecretJson {
        id: String,
        secret: String,
    }

    let secrets: Vec<AuthApiSecretJson> = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid AUTH_API_SECRETS_JSON format: {e}"))?;

    Ok(secrets
        .into_iter()
        .map(|entry| AuthApiSecret {
            id: entry.id,
            secret: entry.secret,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn config_with_secrets() -> ServerConfig {
        let mut config = ServerConfig::default();
        config.auth_api_secrets = vec![
            AuthApiSecret {
                id: "router".to_string(),
                secret: "router-secret".to_string(),
            },
            AuthApiSecret {
                id: "ops".to_string(),
                secret: "ops-secret".to_string(),
            },
        ];
        config
    }

    #[test]
    fn test_address_and_tls() {
        let mut config = ServerConfig::default();
        assert_eq!(config.address(), "0.0.0.0:3001");
        assert!(!config.is_tls_enabled());

        config.tls = Some(TlsConfig {
            cert_path: PathBuf::from("/c.pem"),
            key_path: PathBuf::from("/k.pem"),
        });
        assert!(config.is_tls_enabled());
    }

    #[test]
    fn test_find_api_secret_id() {
        let config = config_with_secrets();
        assert!(config.has_api_secret_auth());
        assert_eq!(config.find_api_secret_id("router-secret"), Some("router"));
        assert_eq!(config.find_api_secret_id("ops-secret"), Some("ops"));
        assert_eq!(config.find_api_secret_id("router-secre"), None);
        assert_eq!(config.find_api_secret_id(""), None);
        assert!(!ServerConfig::default().has_api_secret_auth());
    }

    #[test]
    fn test_bridge_config_from_settings() {
        let mut config = ServerConfig::default();
        config.silence_timeout_ms = 900;
        config.frame_duration_ms = 40;

        let bridge = config.bridge_config();
        assert_eq!(bridge.silence_timeout, Duration::from_millis(900));
        assert_eq!(bridge.flush_poll_interval, Duration::from_millis(120));
        assert_eq!(bridge.keepalive_interval, Duration::from_secs(15));
        assert_eq!(bridge.frame_duration_ms, 40);
        assert_eq!(bridge.max_call_duration, Some(Duration::from_secs(14400)));
    }

    #[test]
    fn test_realtime_config_requires_api_key() {
        let config = ServerConfig::default();
        let err = config.realtime_config(&CallContext::default()).unwrap_err();
        assert!(err.contains("OpenAI API key"));
    }

    #[test]
    fn test_realtime_config_uses_call_context() {
        let mut config = ServerConfig::default();
        config.openai_api_key = Some("sk-test".to_string());
        config.realtime_voice = Some("alloy".to_string());
        config.realtime_transcription_model = Some("whisper-1".to_string());
        config.ai_reconnect_attempts = 2;

        let context = CallContext {
            identity: Some("Fade Factory".to_string()),
            voice: Some("coral".to_string()),
            ..Default::default()
        };
        let realtime = config.realtime_config(&context).unwrap();
        assert_eq!(realtime.api_key, "sk-test");
        assert_eq!(realtime.voice.as_deref(), Some("coral"));
        assert!(realtime.instructions.unwrap().contains("Fade Factory"));
        assert_eq!(realtime.input_audio_transcription.unwrap().model, "whisper-1");
        let reconnection = realtime.reconnection.unwrap();
        assert!(reconnection.enabled);
        assert_eq!(reconnection.max_attempts, 2);

        config.ai_reconnect_attempts = 0;
        let realtime = config.realtime_config(&CallContext::default()).unwrap();
        assert_eq!(realtime.voice.as_deref(), Some("alloy"));
        assert!(!realtime.reconnection.unwrap().enabled);
    }

    #[test]
    fn test_parse_auth_api_secrets_json() {
        let secrets =
            parse_auth_api_secrets_json(r#"[{"id":"a","secret":"one"},{"id":"b","secret":"two"}]"#)
                .unwrap();
        assert_eq!(secrets.len(), 2);
        assert_eq!(secrets[1].id, "b");

        let err = parse_auth_api_secrets_json("not json").unwrap_err();
        assert!(err.to_string().contains("Invalid AUTH_API_SECRETS_JSON"));
    }

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for key in [
                "HOST",
                "PORT",
                "OPENAI_API_KEY",
                "REALTIME_VOICE",
                "SILENCE_TIMEOUT_MS",
                "FLUSH_POLL_INTERVAL_MS",
                "FRAME_DURATION_MS",
                "AUTH_REQUIRED",
                "AUTH_API_SECRETS_JSON",
                "AUTH_API_SECRET",
                "AUTH_API_SECRET_ID",
                "REQUIRE_REGISTERED_CALLS",
            ] {
                env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
  port: 8080
providers:
  openai_api_key: "yaml-key"
bridge:
  silence_timeout_ms: 800
"#,
        )
        .unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("OPENAI_API_KEY", "env-key");
            env::set_var("REALTIME_VOICE", "sage");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        assert_eq!(config.silence_timeout_ms, 800);
        // Not in YAML, so the environment value stands
        assert_eq!(config.realtime_voice.as_deref(), Some("sage"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = ServerConfig::from_file(&PathBuf::from("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_with_auth() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
auth:
  required: true
  api_secrets:
    - id: "router"
      secret: "router-secret"
"#,
        )
        .unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();
        assert!(config.auth_required);
        assert_eq!(config.find_api_secret_id("router-secret"), Some("router"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_bridge_timing() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            "bridge:\n  silence_timeout_ms: 100\n  flush_poll_interval_ms: 120\n",
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("silence timeout"));
    }
}
