//! Per-call bridge tuning.

use std::time::Duration;

use crate::core::audio::framer::DEFAULT_FRAME_DURATION_MS;
use crate::core::realtime::OPENAI_REALTIME_SAMPLE_RATE;

/// Default gap of caller silence that completes an utterance.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_millis(700);

/// Default period of the silence check.
pub const DEFAULT_FLUSH_POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Default period of transport keep-alive pings.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Default bound on reaching a ready AI session.
pub const DEFAULT_AI_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timing and format settings for one [`CallBridgeSession`](super::CallBridgeSession).
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    /// Silence after the last media chunk that completes an utterance
    pub silence_timeout: Duration,
    /// How often the utterance buffer is checked for silence
    pub flush_poll_interval: Duration,
    /// How often a keep-alive ping is sent to the telephony side
    pub keepalive_interval: Duration,
    /// Duration of one outbound telephony frame
    pub frame_duration_ms: u32,
    /// Upper bound on AI session creation
    pub ai_connect_timeout: Duration,
    /// Calls are hung up after this long; `None` for no limit
    pub max_call_duration: Option<Duration>,
    /// PCM sample rate spoken by the AI session
    pub ai_sample_rate: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            silence_timeout: DEFAULT_SILENCE_TIMEOUT,
            flush_poll_interval: DEFAULT_FLUSH_POLL_INTERVAL,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            frame_duration_ms: DEFAULT_FRAME_DURATION_MS,
            ai_connect_timeout: DEFAULT_AI_CONNECT_TIMEOUT,
            max_call_duration: None,
            ai_sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.silence_timeout, Duration::from_millis(700));
        assert_eq!(config.flush_poll_interval, Duration::from_millis(120));
        assert_eq!(config.keepalive_interval, Duration::from_secs(15));
        assert_eq!(config.frame_duration_ms, 20);
        assert_eq!(config.ai_sample_rate, 24000);
        assert!(config.max_call_duration.is_none());
    }
}
