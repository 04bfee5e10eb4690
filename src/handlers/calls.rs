//! Call-routing API.
//!
//! The routing layer announces a call with `POST /calls` before pointing the
//! telephony provider at the returned `stream_path`. Active calls can be
//! listed, inspected and hung up.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use crate::core::registry::{CallContext, CallSummary, Hangup};
use crate::errors::app_error::{AppError, AppResult};
use crate::middleware::Auth;
use crate::state::AppState;

/// Longest accepted caller-supplied call id.
const MAX_CALL_ID_LEN: usize = 128;

/// Body of `POST /calls`.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterCallRequest {
    /// Generated when absent
    #[serde(default)]
    pub call_id: Option<String>,
    #[serde(flatten)]
    pub context: CallContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterCallResponse {
    pub call_id: String,
    /// Path the telephony provider should open the media stream on
    pub stream_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HangupResponse {
    pub call_id: String,
    pub status: String,
}

/// Call ids end up in a URL path segment.
fn validate_call_id(call_id: &str) -> AppResult<()> {
    if call_id.is_empty() || call_id.len() > MAX_CALL_ID_LEN {
        return Err(AppError::BadRequest(format!(
            "call_id must be 1 to {MAX_CALL_ID_LEN} characters"
        )));
    }
    if !call_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::BadRequest(
            "call_id may only contain letters, digits, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

/// `POST /calls`: register the context of an upcoming call.
pub async fn register_call(
    State(state): State<Arc<AppState>>,
    auth: Option<Extension<Auth>>,
    Json(request): Json<RegisterCallRequest>,
) -> AppResult<(StatusCode, Json<RegisterCallResponse>)> {
    let call_id = match request.call_id {
        Some(id) => {
            validate_call_id(&id)?;
            id
        }
        None => uuid::Uuid::new_v4().to_string(),
    };

    state
        .registry
        .register_pending(&call_id, request.context)
        .await?;

    tracing::info!(
        call_id = %call_id,
        auth_id = ?auth.and_then(|Extension(a)| a.id),
        "Call registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(RegisterCallResponse {
            stream_path: format!("/media-stream/{call_id}"),
            call_id,
        }),
    ))
}

/// `GET /calls`: active calls, oldest first.
pub async fn list_calls(State(state): State<Arc<AppState>>) -> Json<Vec<CallSummary>> {
    Json(state.registry.list())
}

/// `GET /calls/{call_id}`
pub async fn get_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> AppResult<Json<CallSummary>> {
    state
        .registry
        .get(&call_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Call {call_id} not found")))
}

/// `DELETE /calls/{call_id}`: hang up an active call or discard a pending one.
pub async fn hangup_call(
    State(state): State<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> AppResult<Json<HangupResponse>> {
    let status = match state.registry.hangup(&call_id).await {
        Hangup::Active => "hangup_requested",
        Hangup::Pending => "discarded",
        Hangup::NotFound => return Err(AppError::NotFound(format!("Call {call_id} not found"))),
    };
    Ok(Json(HangupResponse {
        call_id,
        status: status.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_validate_call_id() {
        assert!(validate_call_id("CA1234-abc_def.1").is_ok());
        assert!(validate_call_id("").is_err());
        assert!(validate_call_id("has/slash").is_err());
        assert!(validate_call_id(&"x".repeat(MAX_CALL_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_register_request_flattens_context() {
        let request: RegisterCallRequest = serde_json::from_str(
            r#"{"call_id":"c1","identity":"Fade Factory","greeting":"Hi!"}"#,
        )
        .unwrap();
        assert_eq!(request.call_id.as_deref(), Some("c1"));
        assert_eq!(request.context.identity.as_deref(), Some("Fade Factory"));
        assert_eq!(request.context.greeting.as_deref(), Some("Hi!"));
        assert!(request.context.voice.is_none());
    }

    #[tokio::test]
    async fn test_register_generates_call_id() {
        let state = AppState::new(ServerConfig::default());
        let (status, Json(response)) = register_call(
            State(state.clone()),
            None,
            Json(RegisterCallRequest::default()),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert!(uuid::Uuid::parse_str(&response.call_id).is_ok());
        assert_eq!(response.stream_path, format!("/media-stream/{}", response.call_id));
        assert!(state.registry.has_pending(&response.call_id).await);
    }

    #[tokio::test]
    async fn test_register_conflicts_with_active_call() {
        let state = AppState::new(ServerConfig::default());
        state.registry.activate("busy", None).await.unwrap();

        let request = RegisterCallRequest {
            call_id: Some("busy".to_string()),
            ..Default::default()
        };
        let err = register_call(State(state), None, Json(request)).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_get_and_hangup() {
        let state = AppState::new(ServerConfig::default());
        let token = state.registry.activate("call-1", None).await.unwrap();

        let Json(summary) = get_call(State(state.clone()), Path("call-1".to_string()))
            .await
            .unwrap();
        assert_eq!(summary.call_id, "call-1");

        let Json(response) = hangup_call(State(state.clone()), Path("call-1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.status, "hangup_requested");
        assert!(token.is_cancelled());

        let err = hangup_call(State(state), Path("call-9".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
