//! Session-gated admin endpoints: login, key listing, issuance and revocation.

use crate::render::render_dashboard;
use crate::{blocking, blocking_read, now_secs, AppState, ServerError};
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use keylease_core::{AddOutcome, KeyView, LeaseError};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

/// Name of the cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "keylease_session";

/// Errors surfaced by admin endpoints as `{"error": ...}` bodies.
#[derive(Debug)]
pub enum AdminError {
    /// No valid session was presented.
    Unauthorized,
    /// Login failed.
    Forbidden,
    /// The request was well-formed JSON but not acceptable.
    BadRequest(String),
    /// A core call failed.
    Server(ServerError),
}

impl From<ServerError> for AdminError {
    fn from(e: ServerError) -> Self {
        Self::Server(e)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "admin session required".to_string()),
            Self::Forbidden => (StatusCode::FORBIDDEN, "invalid password".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Server(ServerError::Lease(
                e @ (LeaseError::InvalidClass(_) | LeaseError::EmptyKey),
            )) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Server(e) => {
                error!("Admin operation failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal storage error".to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Proof that the request carries a live admin session, via
/// `Authorization: Bearer <token>` or the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession {
    pub token: Uuid,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AdminError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or(AdminError::Unauthorized)?;
        if state.sessions.is_valid(&token, now_secs()) {
            Ok(Self { token })
        } else {
            warn!("Rejected admin request with unknown or expired session");
            Err(AdminError::Unauthorized)
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<Uuid> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    Uuid::parse_str(value.strip_prefix("Bearer ")?.trim()).ok()
}

fn cookie_token(parts: &Parts) -> Option<Uuid> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            if name == SESSION_COOKIE {
                Uuid::parse_str(value).ok()
            } else {
                None
            }
        })
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub token: Uuid,
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AdminError> {
    let token = state
        .sessions
        .login(&req.password, now_secs())
        .ok_or(AdminError::Forbidden)?;
    let cookie = format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/admin");
    Ok(([(header::SET_COOKIE, cookie)], Json(LoginResponse { token })))
}

pub(crate) async fn logout(State(state): State<AppState>, session: AdminSession) -> StatusCode {
    state.sessions.logout(&session.token);
    StatusCode::NO_CONTENT
}

async fn current_keys(state: &AppState) -> Result<Vec<KeyView>, AdminError> {
    let admin = state.admin.clone();
    Ok(blocking_read(move || admin.list_keys(now_secs())).await?)
}

pub(crate) async fn list_keys(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Json<Vec<KeyView>>, AdminError> {
    Ok(Json(current_keys(&state).await?))
}

pub(crate) async fn dashboard(
    State(state): State<AppState>,
    _session: AdminSession,
) -> Result<Html<String>, AdminError> {
    Ok(Html(render_dashboard(&current_keys(&state).await?)))
}

/// Body of `POST /admin/keys`. Exactly one of `expiry` and `valid_for_secs` is required.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct AddKeyRequest {
    pub key_class: String,
    pub key: String,
    /// Absolute expiry in epoch seconds.
    #[serde(default)]
    pub expiry: Option<i64>,
    /// Expiry relative to the time of the request.
    #[serde(default)]
    pub valid_for_secs: Option<i64>,
    #[serde(default)]
    pub owner: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddKeyResponse {
    pub outcome: AddOutcome,
    pub expiry: i64,
}

pub(crate) async fn add_key(
    State(state): State<AppState>,
    _session: AdminSession,
    Json(req): Json<AddKeyRequest>,
) -> Result<(StatusCode, Json<AddKeyResponse>), AdminError> {
    let expiry = match (req.expiry, req.valid_for_secs) {
        (Some(expiry), None) => expiry,
        (None, Some(secs)) => now_secs().saturating_add(secs),
        _ => {
            return Err(AdminError::BadRequest(
                "exactly one of expiry and valid_for_secs is required".to_string(),
            ));
        }
    };

    let admin = state.admin.clone();
    let outcome = blocking(move || admin.add_key(&req.key_class, &req.key, expiry, req.owner)).await?;
    let status = match outcome {
        AddOutcome::Created => StatusCode::CREATED,
        AddOutcome::Replaced => StatusCode::OK,
    };
    Ok((status, Json(AddKeyResponse { outcome, expiry })))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeleteKeyResponse {
    pub deleted: bool,
}

pub(crate) async fn delete_key(
    State(state): State<AppState>,
    _session: AdminSession,
    Path((class, key)): Path<(String, String)>,
) -> Result<(StatusCode, Json<DeleteKeyResponse>), AdminError> {
    let admin = state.admin.clone();
    let deleted = blocking(move || admin.delete_key(&class, &key)).await?;
    let status = if deleted { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(DeleteKeyResponse { deleted })))
}
