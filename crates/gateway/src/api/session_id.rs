//! Session identifier resolution.
//!
//! The store treats identifiers as opaque strings; this module decides where
//! a request's identifier comes from.  Two strategies exist:
//!
//! - [`QueryParam`]: `?session=<id>` is required.  The controller page
//!   generates the id and embeds it in the patient link.
//! - [`QueryOrCookie`]: the query parameter wins; otherwise the session
//!   cookie is used; otherwise a fresh id is minted.  The resolved id is
//!   always written back as a cookie so the browser keeps it.  Cookie
//!   values are percent-encoded, so an id taken from the query string
//!   cannot add cookie attributes.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query};
use axum::http::header;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Uri};
use axum::response::{IntoResponse, Response};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};

use emdr_domain::config::{SessionIdSource, SessionsConfig};

use super::ApiError;
use crate::state::AppState;

/// Pluggable identifier-resolution strategy.
pub trait SessionIdResolver: Send + Sync {
    /// Resolve the identifier for a request, or `None` when the request
    /// carries none and this strategy cannot supply one.
    fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> Option<SessionId>;
}

/// Build the resolver selected by `sessions.id_source`.
pub fn resolver_for(config: &SessionsConfig) -> Arc<dyn SessionIdResolver> {
    match config.id_source {
        SessionIdSource::Query => Arc::new(QueryParam {
            param: config.query_param.clone(),
        }),
        SessionIdSource::QueryOrCookie => Arc::new(QueryOrCookie {
            param: config.query_param.clone(),
            cookie: config.cookie_name.clone(),
        }),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolved identifier
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A request's session identifier, plus the cookie to hand back (cookie
/// strategy only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionId {
    pub id: String,
    pub set_cookie: Option<HeaderValue>,
}

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            set_cookie: None,
        }
    }

    /// Turn `body` into a response, attaching `Set-Cookie` when needed.
    pub fn respond(&self, body: impl IntoResponse) -> Response {
        let mut response = body.into_response();
        if let Some(cookie) = &self.set_cookie {
            response
                .headers_mut()
                .append(header::SET_COOKIE, cookie.clone());
        }
        response
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for SessionId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        state
            .id_resolver
            .resolve(&parts.uri, &parts.headers)
            .ok_or_else(|| {
                tracing::warn!(path = %parts.uri.path(), "request without session id");
                ApiError::MissingSessionId(state.config.sessions.missing_id_message.clone())
            })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Strategies
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Identifier from a required query parameter.
pub struct QueryParam {
    pub param: String,
}

impl SessionIdResolver for QueryParam {
    fn resolve(&self, uri: &Uri, _headers: &HeaderMap) -> Option<SessionId> {
        query_value(uri, &self.param).map(SessionId::new)
    }
}

/// Identifier from the query parameter, then a cookie, then freshly minted.
pub struct QueryOrCookie {
    pub param: String,
    pub cookie: String,
}

impl SessionIdResolver for QueryOrCookie {
    fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> Option<SessionId> {
        let id = query_value(uri, &self.param)
            .or_else(|| cookie_value(headers, &self.cookie))
            .unwrap_or_else(|| {
                let minted = uuid::Uuid::new_v4().to_string();
                tracing::debug!(session_id = %minted, "minted session id");
                minted
            });

        let set_cookie = format_set_cookie(&self.cookie, &id);
        Some(SessionId { id, set_cookie })
    }
}

/// Bytes outside RFC 6265 `cookie-octet`, plus `%` itself.
const COOKIE_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// `Set-Cookie` value persisting `id` for the whole site.
fn format_set_cookie(name: &str, id: &str) -> Option<HeaderValue> {
    let value = utf8_percent_encode(id, COOKIE_VALUE);
    HeaderValue::from_str(&format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax")).ok()
}

/// Value of the first query parameter `name`, if non-empty.
pub(crate) fn query_value(uri: &Uri, name: &str) -> Option<String> {
    let Query(params) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    params
        .into_iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v)
        .filter(|v| !v.is_empty())
}

/// Decoded, non-empty value of cookie `name` across all `Cookie` headers.
fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, v)| *k == name && !v.is_empty())
        .and_then(|(_, v)| percent_decode_str(v).decode_utf8().ok())
        .map(|v| v.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    fn cookie_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn query_strategy_reads_param() {
        let r = QueryParam { param: "session".into() };
        let sid = r.resolve(&uri("/api/ball?session=abc"), &HeaderMap::new()).unwrap();
        assert_eq!(sid, SessionId::new("abc"));
    }

    #[test]
    fn query_strategy_decodes_percent_escapes() {
        let r = QueryParam { param: "session".into() };
        let sid = r.resolve(&uri("/api/ball?session=room%201"), &HeaderMap::new()).unwrap();
        assert_eq!(sid.id, "room 1");
    }

    #[test]
    fn query_strategy_rejects_missing_or_empty() {
        let r = QueryParam { param: "session".into() };
        assert!(r.resolve(&uri("/api/ball"), &HeaderMap::new()).is_none());
        assert!(r.resolve(&uri("/api/ball?session="), &HeaderMap::new()).is_none());
        // Cookies are ignored by this strategy.
        assert!(r
            .resolve(&uri("/api/ball"), &cookie_headers("emdr_session=abc"))
            .is_none());
    }

    #[test]
    fn cookie_strategy_prefers_query() {
        let r = QueryOrCookie {
            param: "session".into(),
            cookie: "emdr_session".into(),
        };
        let sid = r
            .resolve(&uri("/api/ball?session=fromquery"), &cookie_headers("emdr_session=fromcookie"))
            .unwrap();
        assert_eq!(sid.id, "fromquery");
        assert_eq!(
            sid.set_cookie.unwrap(),
            "emdr_session=fromquery; Path=/; HttpOnly; SameSite=Lax"
        );
    }

    #[test]
    fn cookie_strategy_falls_back_to_cookie() {
        let r = QueryOrCookie {
            param: "session".into(),
            cookie: "emdr_session".into(),
        };
        let sid = r
            .resolve(&uri("/api/sound"), &cookie_headers("theme=dark; emdr_session=xyz"))
            .unwrap();
        assert_eq!(sid.id, "xyz");
    }

    #[test]
    fn cookie_strategy_mints_when_nothing_supplied() {
        let r = QueryOrCookie {
            param: "session".into(),
            cookie: "emdr_session".into(),
        };
        let a = r.resolve(&uri("/api/sound"), &HeaderMap::new()).unwrap();
        let b = r.resolve(&uri("/api/sound"), &HeaderMap::new()).unwrap();
        assert_ne!(a.id, b.id);
        assert!(uuid::Uuid::parse_str(&a.id).is_ok());
        assert!(a.set_cookie.is_some());
    }

    #[test]
    fn first_duplicate_query_param_wins() {
        let r = QueryParam { param: "session".into() };
        let sid = r
            .resolve(&uri("/api/ball?session=first&session=second"), &HeaderMap::new())
            .unwrap();
        assert_eq!(sid.id, "first");
        assert!(r
            .resolve(&uri("/api/ball?session=&session=second"), &HeaderMap::new())
            .is_none());
    }

    #[test]
    fn cookie_value_cannot_inject_attributes() {
        let r = QueryOrCookie {
            param: "session".into(),
            cookie: "emdr_session".into(),
        };
        let sid = r
            .resolve(&uri("/api/ball?session=room%3B%20Domain%3Devil.example"), &HeaderMap::new())
            .unwrap();
        assert_eq!(sid.id, "room; Domain=evil.example");

        let cookie = sid.set_cookie.unwrap();
        let cookie = cookie.to_str().unwrap();
        assert_eq!(
            cookie,
            "emdr_session=room%3B%20Domain=evil.example; Path=/; HttpOnly; SameSite=Lax"
        );
        assert!(!cookie.contains("; Domain"));

        // The browser sends the pair back and the id survives the round trip.
        let pair = cookie.split(';').next().unwrap();
        let back = r.resolve(&uri("/api/sound"), &cookie_headers(pair)).unwrap();
        assert_eq!(back.id, "room; Domain=evil.example");
    }

    #[test]
    fn non_ascii_ids_round_trip_through_cookie() {
        let r = QueryOrCookie {
            param: "session".into(),
            cookie: "emdr_session".into(),
        };
        let sid = r.resolve(&uri("/api/ball?session=s%C3%A9ance%2050%25"), &HeaderMap::new()).unwrap();
        assert_eq!(sid.id, "séance 50%");
        let set_cookie = sid.set_cookie.unwrap();
        let pair = set_cookie.to_str().unwrap().split(';').next().unwrap().to_owned();
        let back = r.resolve(&uri("/api/ball"), &cookie_headers(&pair)).unwrap();
        assert_eq!(back.id, "séance 50%");
    }

    #[test]
    fn respond_appends_cookie() {
        let sid = SessionId {
            id: "abc".into(),
            set_cookie: Some(HeaderValue::from_static("emdr_session=abc; Path=/")),
        };
        let response = sid.respond("ok");
        assert_eq!(
            response.headers().get(header::SET_COOKIE).unwrap(),
            "emdr_session=abc; Path=/"
        );
        assert!(SessionId::new("abc").respond("ok").headers().get(header::SET_COOKIE).is_none());
    }
}
