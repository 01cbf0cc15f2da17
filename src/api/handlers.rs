use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};

use super::types::CapabilityInfo;
use super::ServerState;
use crate::capability::Capability;
use crate::dispatch::{DispatchRequest, DispatchResult};
use crate::error::DispatchError;

/// Validates the Bearer token when the server has an auth key configured.
fn authorize(state: &ServerState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let Some(key) = &state.auth_key else {
        return Ok(());
    };

    let auth_header = headers.get("Authorization").ok_or((
        StatusCode::UNAUTHORIZED,
        "Missing authorization".to_string(),
    ))?;

    let auth_str = auth_header.to_str().map_err(|_| {
        (
            StatusCode::UNAUTHORIZED,
            "Invalid authorization header".to_string(),
        )
    })?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if token == key => Ok(()),
        _ => Err((StatusCode::UNAUTHORIZED, "Invalid API key".to_string())),
    }
}

/// Runs one conversation turn.
///
/// An empty submission answers 400 with the error in a [`DispatchResult`] body. Every
/// other outcome, including capability and upstream failures, answers 200 and carries
/// the failure in `error`.
pub(super) async fn handle_dispatch(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(req): Json<DispatchRequest>,
) -> Result<(StatusCode, Json<DispatchResult>), (StatusCode, String)> {
    authorize(&state, &headers)?;

    let result = state.dispatcher.try_dispatch(req).await;
    let status = match &result {
        Err(DispatchError::EmptyInput) => StatusCode::BAD_REQUEST,
        Err(e) => {
            log::error!("dispatch failed: {e}");
            StatusCode::OK
        }
        Ok(outcome) => {
            log::debug!("dispatched to {}", outcome.capability);
            StatusCode::OK
        }
    };

    Ok((status, Json(DispatchResult::from(result))))
}

/// Lists plain chat and every registered capability.
pub(super) async fn handle_capabilities(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<Vec<CapabilityInfo>>, (StatusCode, String)> {
    authorize(&state, &headers)?;

    let registered = state.dispatcher.registry().capabilities();
    let listing = std::iter::once(Capability::PlainChat)
        .chain(registered)
        .map(CapabilityInfo::from)
        .collect();
    Ok(Json(listing))
}
