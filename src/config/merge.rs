//! YAML overrides on top of the environment.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{AuthApiSecret, ServerConfig, TlsConfig, env};

/// Overwrite `target` when the YAML value is present.
fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Overwrite an optional `target` when the YAML value is present.
fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

/// Load the environment, then apply every value the YAML file sets.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        set(&mut config.host, server.host);
        set(&mut config.port, server.port);
        if let Some(tls) = server.tls {
            match tls.enabled {
                Some(false) => config.tls = None,
                _ => match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) if tls.enabled.is_none() => {}
                    _ => {
                        return Err(
                            "Invalid server.tls: cert_path and key_path must both be set".into(),
                        );
                    }
                },
            }
        }
    }

    if let Some(providers) = yaml.providers {
        set_opt(&mut config.openai_api_key, providers.openai_api_key);
    }

    if let Some(realtime) = yaml.realtime {
        set(&mut config.realtime_model, realtime.model);
        set_opt(&mut config.realtime_voice, realtime.voice);
        set_opt(&mut config.realtime_url, realtime.url);
        set_opt(
            &mut config.realtime_transcription_model,
            realtime.transcription_model,
        );
    }

    if let Some(bridge) = yaml.bridge {
        set_opt(&mut config.default_identity, bridge.default_identity);
        set_opt(&mut config.default_greeting, bridge.default_greeting);
        set_opt(&mut config.default_instructions, bridge.default_instructions);
        set(&mut config.silence_timeout_ms, bridge.silence_timeout_ms);
        set(&mut config.flush_poll_interval_ms, bridge.flush_poll_interval_ms);
        set(&mut config.keepalive_interval_secs, bridge.keepalive_interval_secs);
        set(&mut config.frame_duration_ms, bridge.frame_duration_ms);
        set(&mut config.ai_connect_timeout_secs, bridge.ai_connect_timeout_secs);
        set(&mut config.ai_reconnect_attempts, bridge.ai_reconnect_attempts);
    }

    if let Some(calls) = yaml.calls {
        set(&mut config.call_context_ttl_seconds, calls.context_ttl_seconds);
        set(
            &mut config.max_call_duration_seconds,
            calls.max_call_duration_seconds,
        );
        set(&mut config.require_registered_calls, calls.require_registered);
    }

    if let Some(auth) = yaml.auth {
        set(&mut config.auth_required, auth.required);
        if !auth.api_secrets.is_empty() {
            config.auth_api_secrets = auth
                .api_secrets
                .into_iter()
                .map(|entry| AuthApiSecret {
                    id: entry.id,
                    secret: entry.secret,
                })
                .collect();
        } else if let Some(secret) = auth.api_secret {
            config.auth_api_secrets = vec![AuthApiSecret {
                id: "default".to_string(),
                secret,
            }];
        }
    }

    if let Some(security) = yaml.security {
        set(
            &mut config.rate_limit_requests_per_second,
            security.rate_limit_requests_per_second,
        );
        set(&mut config.rate_limit_burst_size, security.rate_limit_burst_size);
        set_opt(
            &mut config.max_websocket_connections,
            security.max_websocket_connections,
        );
        set(
            &mut config.max_connections_per_ip,
            security.max_connections_per_ip,
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::yaml::{AuthYaml, BridgeYaml, SecurityYaml, ServerYaml, TlsYaml};
    use serial_test::serial;

    fn cleanup_env_vars() {
        unsafe {
            for key in ["HOST", "PORT", "TLS_CERT_PATH", "TLS_KEY_PATH", "AUTH_API_SECRET"] {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_merge_without_yaml_is_env() {
        cleanup_env_vars();
        let config = merge_config(None).unwrap();
        assert_eq!(config.port, 3001);
    }

    #[test]
    #[serial]
    fn test_merge_partial_sections() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("HOST", "10.0.0.1");
        }

        let yaml = YamlConfig {
            server: Some(ServerYaml {
                port: Some(4000),
                ..Default::default()
            }),
            bridge: Some(BridgeYaml {
                frame_duration_ms: Some(40),
                default_greeting: Some("Hi there".to_string()),
                ..Default::default()
            }),
            security: Some(SecurityYaml {
                max_websocket_connections: Some(25),
                ..Default::default()
            }),
            ..Default::default()
        };

        let config = merge_config(Some(yaml)).unwrap();
        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 4000);
        assert_eq!(config.frame_duration_ms, 40);
        assert_eq!(config.default_greeting.as_deref(), Some("Hi there"));
        assert_eq!(config.max_websocket_connections, Some(25));
        assert_eq!(config.silence_timeout_ms, 700);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_merge_tls() {
        cleanup_env_vars();

        let yaml = YamlConfig {
            server: Some(ServerYaml {
                tls: Some(TlsYaml {
                    enabled: Some(true),
                    cert_path: Some("/etc/cert.pem".to_string()),
                    key_path: Some("/etc/key.pem".to_string()),
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = merge_config(Some(yaml)).unwrap();
        let tls = config.tls.as_ref().unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/etc/cert.pem"));

        let yaml = YamlConfig {
            server: Some(ServerYaml {
                tls: Some(TlsYaml {
                    enabled: Some(true),
                    cert_path: Some("/etc/cert.pem".to_string()),
                    key_path: None,
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = merge_config(Some(yaml)).unwrap_err();
        assert!(err.to_string().contains("Invalid server.tls"));
    }

    #[test]
    #[serial]
    fn test_merge_single_api_secret() {
        cleanup_env_vars();

        let yaml = YamlConfig {
            auth: Some(AuthYaml {
                required: Some(true),
                api_secret: Some("yaml-secret".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let config = merge_config(Some(yaml)).unwrap();
        assert!(config.auth_required);
        assert_eq!(config.find_api_secret_id("yaml-secret"), Some("default"));
    }
}
