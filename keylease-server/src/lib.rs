//! HTTP front end for the key leasing service.
//!
//! Decodes requests into [`LeaseManager`] and [`AdminOperations`] calls and encodes
//! their results. All lease logic lives in `keylease_core`; this crate only maps
//! outcomes to status codes, gates the admin surface, and renders pages.

pub mod admin;
pub mod api;
pub mod config;
pub mod render;
pub mod session;

use axum::{
    routing::{delete, get, post},
    Router,
};
use keylease_core::{AdminOperations, KeyStore, LeaseError, LeaseManager, LeaseResult, SharedKeyStore};
use std::sync::Arc;
use thiserror::Error;

pub use api::{ApiResponse, KeyRequest};
pub use config::{ConfigError, ServerConfig};
pub use session::SessionStore;

/// Shared application state threaded through axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub leases: LeaseManager,
    pub admin: AdminOperations,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    /// Wires the lease manager and admin surface over one shared store.
    #[must_use]
    pub fn new(store: KeyStore, sessions: SessionStore) -> Self {
        let shared = SharedKeyStore::new(store);
        Self {
            leases: LeaseManager::new(shared.clone()),
            admin: AdminOperations::new(shared),
            sessions: Arc::new(sessions),
        }
    }
}

/// Failure of a core call made from a handler.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// The blocking worker running the core call panicked or was cancelled.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs a core call on the blocking pool; the store lock and file I/O stay off the
/// async workers.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> LeaseResult<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await??)
}

/// Like [`blocking`], for reads that cannot fail once the store lock is held.
pub(crate) async fn blocking_read<T, F>(f: F) -> Result<T, ServerError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f).await?)
}

/// Current time in epoch seconds.
#[must_use]
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Build the HTTP router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/authenticate", post(api::authenticate))
        .route("/api/release", post(api::release))
        .route("/api/health", get(api::health))
        .route("/admin", get(admin::dashboard))
        .route("/admin/login", post(admin::login))
        .route("/admin/logout", post(admin::logout))
        .route("/admin/keys", get(admin::list_keys).post(admin::add_key))
        .route("/admin/keys/{class}/{key}", delete(admin::delete_key))
        .with_state(state)
}
