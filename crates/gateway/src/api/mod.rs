pub mod controls;
pub mod health;
pub mod request_log;
pub mod session_id;
pub mod sessions;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;

use emdr_sessions::{PatchRejected, SessionHandle};

use crate::state::AppState;
use self::session_id::SessionId;

/// Build the API router.
///
/// Every sub-resource is a GET/POST pair under `/api/`.  Unknown `/api/`
/// paths get a JSON 404 instead of falling through to the frontend.
pub fn router(state: AppState) -> Router<AppState> {
    let api = Router::new()
        // Session state, one pair per sub-resource
        .route("/ball", get(controls::get_ball).post(controls::set_ball))
        .route(
            "/background",
            get(controls::get_background).post(controls::set_background),
        )
        .route(
            "/ballcolor",
            get(controls::get_ball_color).post(controls::set_ball_color),
        )
        .route("/sound", get(controls::get_sound).post(controls::set_sound))
        // Reporting
        .route("/session-count", get(sessions::session_count))
        .route("/debug/sessions", get(sessions::debug_sessions))
        .fallback(api_not_found)
        .layer(middleware::from_fn_with_state(
            state,
            request_log::log_api_request,
        ));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api)
}

async fn api_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": true, "message": "Not Found" })),
    )
        .into_response()
}

/// Resolve (or create) the request's session.
pub(crate) fn open_session(state: &AppState, sid: &SessionId) -> Result<SessionHandle, ApiError> {
    state
        .sessions
        .resolve_or_create(&sid.id)
        .map_err(|_| ApiError::SessionLimit(state.config.sessions.limit_message.clone()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors surfaced to HTTP clients as `{ "error": true, "message": … }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request carried no session identifier.
    #[error("{0}")]
    MissingSessionId(String),

    /// The identifier is new and the store is full.
    #[error("{0}")]
    SessionLimit(String),

    /// A patch value is outside the configured bounds.
    #[error(transparent)]
    PatchRejected(#[from] PatchRejected),

    /// The POST body is not JSON, or was not sent as JSON.
    #[error("invalid request body: {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSessionId(_) => StatusCode::BAD_REQUEST,
            Self::SessionLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::PatchRejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidBody(rejection) => rejection.status(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = serde_json::json!({
            "error": true,
            "message": self.to_string(),
        });
        if let Self::PatchRejected(rejected) = &self {
            body["field"] = serde_json::Value::from(rejected.field);
        }
        (self.status(), Json(body)).into_response()
    }
}
