//! Per-request logging for `/api/` routes.
//!
//! Every API request gets a sequence number so a controller's POST and the
//! display's following GETs can be lined up in the logs.

use axum::body::Body;
use axum::extract::{OriginalUri, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use super::session_id::query_value;
use crate::state::AppState;

pub async fn log_api_request(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let number = state.next_request_number();
    let uri = req
        .extensions()
        .get::<OriginalUri>()
        .map(|o| o.0.clone())
        .unwrap_or_else(|| req.uri().clone());
    let session = query_value(&uri, &state.config.sessions.query_param);

    tracing::debug!(
        request = number,
        method = %req.method(),
        path = %uri.path(),
        session = session.as_deref().unwrap_or("NONE"),
        "api request"
    );

    let response = next.run(req).await;
    if !response.status().is_success() {
        tracing::info!(
            request = number,
            path = %uri.path(),
            status = response.status().as_u16(),
            "api request failed"
        );
    }
    response
}
