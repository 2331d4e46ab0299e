use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use emdr_domain::config::Config;
use emdr_sessions::{PatchValidator, SessionStore};

use crate::api::session_id::{resolver_for, SessionIdResolver};

/// Shared application state passed to all API handlers.
///
/// Built once by the entry point; tests build their own with a fresh store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionStore>,
    /// Boundary checks applied to patches before they reach the store.
    pub validator: Arc<PatchValidator>,
    /// Where each request's session id comes from.
    pub id_resolver: Arc<dyn SessionIdResolver>,
    /// Running count of `/api/` requests, for log correlation.
    pub request_counter: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(config: Arc<Config>) -> Self {
        let sessions = Arc::new(SessionStore::new(config.sessions.max_sessions));
        let validator = Arc::new(PatchValidator::new(config.sessions.bounds.clone()));
        let id_resolver = resolver_for(&config.sessions);
        Self {
            config,
            sessions,
            validator,
            id_resolver,
            request_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bump the request counter and return the new value.
    pub fn next_request_number(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}
