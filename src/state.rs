//! Shared application state.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::core::realtime::{BoxedRealtime, RealtimeConfig, RealtimeResult, create_realtime_provider};
use crate::core::registry::CallRegistry;

/// Builds the speech AI provider for one call.
pub type RealtimeFactory =
    Arc<dyn Fn(RealtimeConfig) -> RealtimeResult<BoxedRealtime> + Send + Sync>;

/// Why a WebSocket connection slot was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionLimitError {
    #[error("global WebSocket connection limit reached")]
    GlobalLimitReached,
    #[error("per-IP WebSocket connection limit reached")]
    PerIpLimitReached,
}

/// State shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<CallRegistry>,
    realtime_factory: RealtimeFactory,
    ws_connections: AtomicUsize,
    ip_connections: DashMap<IpAddr, usize>,
}

impl AppState {
    /// State backed by the configured speech AI provider.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let factory: RealtimeFactory =
            Arc::new(|realtime: RealtimeConfig| create_realtime_provider("openai", realtime));
        Self::with_realtime_factory(config, factory)
    }

    /// State with a custom provider factory, e.g. a scripted provider in tests.
    pub fn with_realtime_factory(config: ServerConfig, factory: RealtimeFactory) -> Arc<Self> {
        let registry = CallRegistry::new(config.call_context_ttl(), config.max_call_duration());
        Arc::new(Self {
            config,
            registry: Arc::new(registry),
            realtime_factory: factory,
            ws_connections: AtomicUsize::new(0),
            ip_connections: DashMap::new(),
        })
    }

    /// Create the speech AI provider for one call.
    pub fn create_realtime(&self, config: RealtimeConfig) -> RealtimeResult<BoxedRealtime> {
        (self.realtime_factory)(config)
    }

    /// Reserve a WebSocket connection slot for `ip`.
    pub fn try_acquire_connection(&self, ip: IpAddr) -> Result<(), ConnectionLimitError> {
        let mut per_ip = self.ip_connections.entry(ip).or_insert(0);
        if *per_ip >= self.config.max_connections_per_ip as usize {
            drop(per_ip);
            self.ip_connections.remove_if(&ip, |_, count| *count == 0);
            return Err(ConnectionLimitError::PerIpLimitReached);
        }

        let reserved = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match self.config.max_websocket_connections {
                    Some(max) if current >= max => None,
                    _ => Some(current + 1),
                }
            });
        if reserved.is_err() {
            drop(per_ip);
            self.ip_connections.remove_if(&ip, |_, count| *count == 0);
            return Err(ConnectionLimitError::GlobalLimitReached);
        }

        *per_ip += 1;
        Ok(())
    }

    /// Return a slot taken by [`AppState::try_acquire_connection`].
    pub fn release_connection(&self, ip: IpAddr) {
        let _ = self
            .ws_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            });
        self.ip_connections.remove_if_mut(&ip, |_, count| {
            *count = count.saturating_sub(1);
            *count == 0
        });
    }

    pub fn ws_connection_count(&self) -> usize {
        self.ws_connections.load(Ordering::Acquire)
    }

    pub fn ip_connection_count(&self, ip: &IpAddr) -> usize {
        self.ip_connections.get(ip).map(|c| *c).unwrap_or(0)
    }
}
