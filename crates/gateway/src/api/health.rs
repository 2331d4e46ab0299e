use axum::response::{IntoResponse, Json};

/// `GET /health`: liveness probe for the reverse proxy / systemd.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
