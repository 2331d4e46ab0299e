//! Session reporting endpoints.
//!
//! - `GET /api/session-count`: `{ count, limit, limitReached }`
//! - `GET /api/debug/sessions`: reduced per-session dump for operators
//!
//! Neither needs a session id and neither creates a session.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn session_count(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.session_count())
}

/// Diagnostic dump.  Not a stable contract.
pub async fn debug_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions.snapshot_all())
}
