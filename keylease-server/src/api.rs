//! Client-facing lease endpoints.

use crate::{blocking, blocking_read, now_secs, AppState, ServerError};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};
use keylease_core::{LeaseError, LeaseOutcome};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Body of `/api/authenticate` and `/api/release`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct KeyRequest {
    /// Missing keys are treated as empty, which is never a valid key.
    #[serde(default)]
    pub key: String,
}

/// Response shape shared by the lease endpoints.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    fn ok(message: &str) -> (StatusCode, Json<Self>) {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                message: message.to_string(),
            }),
        )
    }

    fn failed(status: StatusCode, message: &str) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                success: false,
                message: message.to_string(),
            }),
        )
    }
}

pub const MSG_ACCEPTED: &str = "Key accepted. Access granted.";
pub const MSG_RELEASED: &str = "Key released.";
pub const MSG_INVALID: &str = "Invalid key.";
pub const MSG_EXPIRED: &str = "Key expired. Please purchase a new key.";
pub const MSG_BUSY: &str = "Key is busy. Already in use on another computer.";
pub const MSG_STORAGE: &str = "Internal storage error.";

fn outcome_response(result: Result<LeaseOutcome, ServerError>) -> (StatusCode, Json<ApiResponse>) {
    match result {
        Ok(LeaseOutcome::Accepted) => ApiResponse::ok(MSG_ACCEPTED),
        Ok(LeaseOutcome::Released) => ApiResponse::ok(MSG_RELEASED),
        Err(ServerError::Lease(LeaseError::KeyExpired)) => {
            ApiResponse::failed(StatusCode::FORBIDDEN, MSG_EXPIRED)
        }
        Err(ServerError::Lease(LeaseError::KeyBusy)) => {
            ApiResponse::failed(StatusCode::FORBIDDEN, MSG_BUSY)
        }
        Err(ServerError::Lease(e)) if !e.is_storage_failure() => {
            ApiResponse::failed(StatusCode::FORBIDDEN, MSG_INVALID)
        }
        Err(e) => {
            error!("Lease operation failed: {}", e);
            ApiResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, MSG_STORAGE)
        }
    }
}

/// Decodes the request body; a body that is not a `{"key": string}` object gets the
/// same verdict as an unknown key.
fn decode(
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> Result<KeyRequest, (StatusCode, Json<ApiResponse>)> {
    body.map(|Json(req)| req).map_err(|rejection| {
        warn!("Rejected malformed lease request: {}", rejection);
        ApiResponse::failed(StatusCode::FORBIDDEN, MSG_INVALID)
    })
}

pub(crate) async fn authenticate(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let req = match decode(body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let leases = state.leases.clone();
    outcome_response(blocking(move || leases.acquire(&req.key, now_secs())).await)
}

pub(crate) async fn release(
    State(state): State<AppState>,
    body: Result<Json<KeyRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse>) {
    let req = match decode(body) {
        Ok(req) => req,
        Err(response) => return response,
    };
    let leases = state.leases.clone();
    outcome_response(blocking(move || leases.release(&req.key)).await)
}

/// Body of `/api/health`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub keys: usize,
}

pub(crate) async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let store = state.leases.store().clone();
    let keys = blocking_read(move || store.read(|store| store.len()))
        .await
        .map_err(|e| {
            error!("Health check failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        keys,
    }))
}
