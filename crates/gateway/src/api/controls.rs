//! Session state endpoints: one GET/POST pair per sub-resource.
//!
//! - `GET  /api/ball`: ball motion
//! - `POST /api/ball`: merge-patch ball motion
//! - `GET  /api/background`: background color
//! - `POST /api/background`: merge-patch background color
//! - `GET  /api/ballcolor`: ball color
//! - `POST /api/ballcolor`: merge-patch ball color
//! - `GET  /api/sound`: bilateral sound
//! - `POST /api/sound`: merge-patch bilateral sound
//!
//! POST bodies are parsed leniently: wrong-typed fields are dropped and the
//! stored value is kept.  A body that is not JSON at all is a 400/415 in the
//! usual `{ "error": true, "message": … }` shape.  Bounds are checked before
//! the session is opened, so a rejected patch never takes a capacity slot.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{Json, Response};
use serde_json::Value;

use emdr_sessions::{BackgroundPatch, BallColorPatch, BallPatch, Resource, SoundPatch};

use super::session_id::SessionId;
use super::{open_session, ApiError};
use crate::state::AppState;

fn rejected(sid: &SessionId, resource: Resource, err: emdr_sessions::PatchRejected) -> ApiError {
    tracing::warn!(session_id = %sid.id, %resource, error = %err, "patch rejected");
    emdr_domain::trace::TraceEvent::PatchRejected {
        session_id: sid.id.clone(),
        resource: resource.as_str().to_owned(),
        field: err.field.to_owned(),
    }
    .emit();
    err.into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /api/ball
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_ball(State(state): State<AppState>, sid: SessionId) -> Result<Response, ApiError> {
    let session = open_session(&state, &sid)?;
    Ok(sid.respond(Json(session.ball())))
}

pub async fn set_ball(
    State(state): State<AppState>,
    sid: SessionId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let patch = BallPatch::from_json(&body);
    state
        .validator
        .check_ball(&patch)
        .map_err(|e| rejected(&sid, Resource::Ball, e))?;

    let session = open_session(&state, &sid)?;
    let ball = session.set_ball(&patch);
    tracing::debug!(session_id = %sid.id, ?ball, "ball updated");
    Ok(sid.respond(Json(ball)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /api/background
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_background(
    State(state): State<AppState>,
    sid: SessionId,
) -> Result<Response, ApiError> {
    let session = open_session(&state, &sid)?;
    let background = session.background();
    tracing::debug!(session_id = %sid.id, color = %background.background_color, "background read");
    Ok(sid.respond(Json(background)))
}

pub async fn set_background(
    State(state): State<AppState>,
    sid: SessionId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let session = open_session(&state, &sid)?;
    let old = session.background().background_color;
    let background = session.set_background(&BackgroundPatch::from_json(&body));
    tracing::info!(
        session_id = %sid.id,
        from = %old,
        to = %background.background_color,
        "background changed"
    );
    Ok(sid.respond(Json(background)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /api/ballcolor
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_ball_color(
    State(state): State<AppState>,
    sid: SessionId,
) -> Result<Response, ApiError> {
    let session = open_session(&state, &sid)?;
    Ok(sid.respond(Json(session.ball_color())))
}

pub async fn set_ball_color(
    State(state): State<AppState>,
    sid: SessionId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let session = open_session(&state, &sid)?;
    let ball_color = session.set_ball_color(&BallColorPatch::from_json(&body));
    Ok(sid.respond(Json(ball_color)))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// /api/sound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub async fn get_sound(State(state): State<AppState>, sid: SessionId) -> Result<Response, ApiError> {
    let session = open_session(&state, &sid)?;
    Ok(sid.respond(Json(session.sound())))
}

pub async fn set_sound(
    State(state): State<AppState>,
    sid: SessionId,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let patch = SoundPatch::from_json(&body);
    state
        .validator
        .check_sound(&patch)
        .map_err(|e| rejected(&sid, Resource::Sound, e))?;

    let session = open_session(&state, &sid)?;
    let old = session.sound().bilateral;
    let sound = session.set_sound(&patch);
    tracing::info!(
        session_id = %sid.id,
        from = old,
        to = sound.bilateral,
        "bilateral sound changed"
    );
    Ok(sid.respond(Json(sound)))
}

#[cfg(test)]
mod tests {
    use axum::http::{header, StatusCode};
    use serde_json::json;

    use emdr_domain::config::{Config, NumericRange, SessionIdSource};

    use crate::api::test_support::*;

    #[tokio::test]
    async fn ball_scenario() {
        let state = state_with(Config::default());

        let (status, _, body) = send(app(&state), get("/api/ball?session=abc")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "speed": 5, "bounceMode": "horizontal", "isMoving": false, "ballSize": 30 })
        );

        let (status, _, body) =
            send(app(&state), post_json("/api/ball?session=abc", json!({ "speed": 9 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["speed"], 9);

        send(app(&state), post_json("/api/ball?session=abc", json!({}))).await;
        let (_, _, body) = send(app(&state), get("/api/ball?session=abc")).await;
        assert_eq!(
            body,
            json!({ "speed": 9, "bounceMode": "horizontal", "isMoving": false, "ballSize": 30 })
        );
    }

    #[tokio::test]
    async fn controller_writes_are_seen_by_display() {
        let state = state_with(Config::default());
        send(
            app(&state),
            post_json("/api/background?session=room", json!({ "backgroundColor": "#101010" })),
        )
        .await;
        send(
            app(&state),
            post_json("/api/ballcolor?session=room", json!({ "randomColor": true })),
        )
        .await;
        send(
            app(&state),
            post_json("/api/sound?session=room", json!({ "bilateral": true, "speed": 800 })),
        )
        .await;

        let (_, _, bg) = send(app(&state), get("/api/background?session=room")).await;
        let (_, _, color) = send(app(&state), get("/api/ballcolor?session=room")).await;
        let (_, _, sound) = send(app(&state), get("/api/sound?session=room")).await;
        assert_eq!(bg, json!({ "backgroundColor": "#101010" }));
        assert_eq!(color, json!({ "ballColor": "#2196f3", "randomColor": true }));
        assert_eq!(sound, json!({ "bilateral": true, "speed": 800 }));
    }

    #[tokio::test]
    async fn wrong_types_keep_existing_values() {
        let state = state_with(Config::default());
        let (status, _, body) = send(
            app(&state),
            post_json("/api/sound?session=abc", json!({ "bilateral": "on", "speed": "fast" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "bilateral": false, "speed": 500 }));
    }

    #[tokio::test]
    async fn missing_session_id_is_rejected_before_store() {
        let state = state_with(Config::default());
        let (status, _, body) = send(app(&state), get("/api/ball")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);
        assert!(body["message"].as_str().unwrap().starts_with("Session ID required"));
        assert_eq!(state.sessions.count(), 0);
    }

    #[tokio::test]
    async fn capacity_exceeded_is_429() {
        let mut config = Config::default();
        config.sessions.max_sessions = 2;
        let state = state_with(config);

        for id in ["a", "b"] {
            let (status, _, _) = send(app(&state), get(&format!("/api/ball?session={id}"))).await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, _, body) = send(app(&state), get("/api/sound?session=c")).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Max session limit reached"));

        // Known sessions keep working at capacity.
        let (status, _, _) = send(app(&state), get("/api/sound?session=a")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn bounds_reject_out_of_range_patch() {
        let mut config = Config::default();
        config.sessions.bounds.ball_speed = Some(NumericRange {
            min: Some(1.0),
            max: Some(20.0),
        });
        let state = state_with(config);

        send(app(&state), get("/api/ball?session=abc")).await;
        let (status, _, body) =
            send(app(&state), post_json("/api/ball?session=abc", json!({ "speed": 50 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["field"], "speed");

        let handle = state.sessions.get("abc").unwrap();
        assert_eq!(handle.ball().speed, serde_json::Number::from(5));
        assert_eq!(handle.meta().ball.change_count, 0);
    }

    #[tokio::test]
    async fn rejected_patch_does_not_take_a_slot() {
        let mut config = Config::default();
        config.sessions.max_sessions = 1;
        config.sessions.bounds.sound_speed = Some(NumericRange {
            min: Some(100.0),
            max: None,
        });
        let state = state_with(config);

        let (status, _, _) =
            send(app(&state), post_json("/api/sound?session=new", json!({ "speed": 5 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(!state.sessions.contains("new"));
        assert_eq!(state.sessions.count(), 0);

        // The slot is still free for a valid request.
        let (status, _, _) = send(app(&state), get("/api/sound?session=other")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unparseable_bodies_keep_the_error_shape() {
        let state = state_with(Config::default());

        let malformed = axum::http::Request::builder()
            .method("POST")
            .uri("/api/ball?session=abc")
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(app(&state), malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], true);
        assert!(body["message"].is_string());

        let untyped = axum::http::Request::builder()
            .method("POST")
            .uri("/api/sound?session=abc")
            .body(axum::body::Body::from(r#"{"bilateral": true}"#))
            .unwrap();
        let (status, _, body) = send(app(&state), untyped).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"], true);

        // Neither request reached the store.
        assert_eq!(state.sessions.count(), 0);
    }

    #[tokio::test]
    async fn cookie_source_sets_and_reads_cookie() {
        let mut config = Config::default();
        config.sessions.id_source = SessionIdSource::QueryOrCookie;
        let state = state_with(config);

        let (status, headers, _) = send(app(&state), get("/api/ball")).await;
        assert_eq!(status, StatusCode::OK);
        let cookie = headers
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        let pair = cookie.split(';').next().unwrap().to_owned();
        assert!(pair.starts_with("emdr_session="));

        let request = axum::http::Request::builder()
            .method("POST")
            .uri("/api/ball")
            .header(header::COOKIE, &pair)
            .header(header::CONTENT_TYPE, "application/json")
            .body(axum::body::Body::from(r#"{"isMoving": true}"#))
            .unwrap();
        let (_, _, body) = send(app(&state), request).await;
        assert_eq!(body["isMoving"], true);
        assert_eq!(state.sessions.count(), 1);
    }
}
