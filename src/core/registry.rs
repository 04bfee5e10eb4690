//! Call registry.
//!
//! Tracks calls announced by the routing layer but not yet connected
//! (pending contexts) and calls currently bridged (active calls). Both maps
//! are TTL-bounded caches; active entries are also removed explicitly when
//! their session ends.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::core::bridge::BridgeState;

/// Default lifetime of a registered-but-unclaimed call context.
pub const DEFAULT_CONTEXT_TTL: Duration = Duration::from_secs(300);

/// Default upper bound on how long an active call entry may live.
pub const DEFAULT_MAX_CALL_DURATION: Duration = Duration::from_secs(4 * 60 * 60);

/// Registry failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Call {0} is already active")]
    AlreadyActive(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// What the routing layer knows about a call before audio arrives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Caller-facing identity, e.g. the business answering
    #[serde(default)]
    pub identity: Option<String>,
    /// First thing the assistant says
    #[serde(default)]
    pub greeting: Option<String>,
    /// Extra system instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,
    /// Voice override
    #[serde(default)]
    pub voice: Option<String>,
}

impl CallContext {
    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: &CallContext) -> CallContext {
        CallContext {
            identity: self.identity.or_else(|| defaults.identity.clone()),
            greeting: self.greeting.or_else(|| defaults.greeting.clone()),
            instructions: self.instructions.or_else(|| defaults.instructions.clone()),
            voice: self.voice.or_else(|| defaults.voice.clone()),
        }
    }

    /// System instructions for the AI session, combining identity and instructions.
    pub fn session_instructions(&self) -> Option<String> {
        match (self.identity.as_deref(), self.instructions.as_deref()) {
            (Some(identity), Some(instructions)) => Some(format!(
                "You are answering a phone call on behalf of {identity}.\n\n{instructions}"
            )),
            (Some(identity), None) => Some(format!(
                "You are answering a phone call on behalf of {identity}. Keep replies short and conversational."
            )),
            (None, Some(instructions)) => Some(instructions.to_string()),
            (None, None) => None,
        }
    }
}

/// Parts of an active call that change while it runs.
#[derive(Debug)]
struct CallStatus {
    state: BridgeState,
    stream_sid: Option<String>,
}

/// Registry entry for a bridged call.
///
/// The status is shared with every clone handed out by the cache, so updates
/// happen in place and never re-insert the entry (which would restart its TTL).
#[derive(Debug, Clone)]
pub struct ActiveCall {
    pub call_id: String,
    pub identity: Option<String>,
    pub started_at: SystemTime,
    /// Cancelled to hang the call up
    pub cancel: CancellationToken,
    status: Arc<RwLock<CallStatus>>,
}

impl ActiveCall {
    fn set_status(&self, state: BridgeState, stream_sid: Option<&str>) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        status.state = state;
        if let Some(sid) = stream_sid {
            status.stream_sid = Some(sid.to_string());
        }
    }

    pub fn summary(&self) -> CallSummary {
        let (state, stream_sid) = {
            let status = self.status.read().unwrap_or_else(PoisonError::into_inner);
            (status.state, status.stream_sid.clone())
        };
        let started_at_ms = self
            .started_at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        let duration_ms = SystemTime::now()
            .duration_since(self.started_at)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        CallSummary {
            call_id: self.call_id.clone(),
            stream_sid,
            state,
            identity: self.identity.clone(),
            started_at_ms,
            duration_ms,
        }
    }
}

/// Serializable view of an active call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSummary {
    pub call_id: String,
    pub stream_sid: Option<String>,
    pub state: BridgeState,
    pub identity: Option<String>,
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

/// Outcome of a hangup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hangup {
    /// An active call was signalled to tear down
    Active,
    /// A pending context was discarded
    Pending,
    NotFound,
}

/// Pending contexts and active calls, shared by all sessions.
#[derive(Clone)]
pub struct CallRegistry {
    pending: Cache<String, CallContext>,
    active: Cache<String, ActiveCall>,
}

impl Default for CallRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CONTEXT_TTL, DEFAULT_MAX_CALL_DURATION)
    }
}

impl CallRegistry {
    pub fn new(context_ttl: Duration, max_call_duration: Duration) -> Self {
        Self {
            pending: Cache::builder().time_to_live(context_ttl).build(),
            active: Cache::builder().time_to_live(max_call_duration).build(),
        }
    }

    /// Register a context for a call that will connect shortly.
    pub async fn register_pending(&self, call_id: &str, context: CallContext) -> RegistryResult<()> {
        if self.active.contains_key(call_id) {
            return Err(RegistryError::AlreadyActive(call_id.to_string()));
        }
        self.pending.insert(call_id.to_string(), context).await;
        tracing::debug!(call_id = %call_id, "Registered pending call context");
        Ok(())
    }

    /// Take the pending context for `call_id`, if any. A context is claimed once.
    pub async fn claim_pending(&self, call_id: &str) -> Option<CallContext> {
        self.pending.remove(call_id).await
    }

    pub async fn has_pending(&self, call_id: &str) -> bool {
        self.pending.contains_key(call_id)
    }

    /// Record a newly bridged call and return its hangup token.
    pub async fn activate(
        &self,
        call_id: &str,
        identity: Option<String>,
    ) -> RegistryResult<CancellationToken> {
        let cancel = CancellationToken::new();
        let entry = ActiveCall {
            call_id: call_id.to_string(),
            identity,
            started_at: SystemTime::now(),
            cancel: cancel.clone(),
            status: Arc::new(RwLock::new(CallStatus {
                state: BridgeState::Connecting,
                stream_sid: None,
            })),
        };

        let inserted = self
            .active
            .entry(call_id.to_string())
            .or_insert_with(async move { entry })
            .await;
        if inserted.is_fresh() {
            Ok(cancel)
        } else {
            Err(RegistryError::AlreadyActive(call_id.to_string()))
        }
    }

    /// Update the lifecycle state and stream id of an active call.
    pub async fn update(&self, call_id: &str, state: BridgeState, stream_sid: Option<&str>) {
        if let Some(call) = self.active.get(call_id).await {
            call.set_status(state, stream_sid);
        }
    }

    /// Drop an active call; called by its session on teardown.
    pub async fn remove(&self, call_id: &str) {
        self.active.invalidate(call_id).await;
    }

    pub async fn get(&self, call_id: &str) -> Option<CallSummary> {
        self.active.get(call_id).await.map(|call| call.summary())
    }

    /// All active calls, oldest first.
    pub fn list(&self) -> Vec<CallSummary> {
        let mut calls: Vec<CallSummary> = self.active.iter().map(|(_, call)| call.summary()).collect();
        calls.sort_by_key(|c| c.started_at_ms);
        calls
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().count()
    }

    /// Hang up an active call or discard a pending context.
    pub async fn hangup(&self, call_id: &str) -> Hangup {
        if let Some(call) = self.active.get(call_id).await {
            call.cancel.cancel();
            tracing::info!(call_id = %call_id, "Hangup requested");
            return Hangup::Active;
        }
        if self.pending.remove(call_id).await.is_some() {
            return Hangup::Pending;
        }
        Hangup::NotFound
    }
}
