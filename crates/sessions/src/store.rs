//! In-memory session store.
//!
//! Maps session identifiers to [`SessionState`] and caps the number of live
//! sessions.  The map sits behind a `RwLock`; each session has its own
//! `Mutex`, so requests for different sessions never contend and writes to
//! one session apply in arrival order.
//!
//! State lives only as long as the process.  Every request for a session
//! must reach the same process; running several workers with separate
//! memory splits sessions between them.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use emdr_domain::trace::TraceEvent;

use crate::patch::{BackgroundPatch, BallColorPatch, BallPatch, SoundPatch};
use crate::state::{
    BackgroundState, BallColorState, BallState, Resource, SessionMeta, SessionState, SoundState,
};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors & reports
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returned by [`SessionStore::resolve_or_create`] when the identifier is
/// new and the store is full.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("session limit of {limit} reached")]
pub struct CapacityExceeded {
    pub limit: usize,
}

/// Response shape of the session-count report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCount {
    pub count: usize,
    pub limit: usize,
    pub limit_reached: bool,
}

/// Reduced per-session view used by the diagnostic dump.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub background_color: String,
    pub bilateral: bool,
    pub is_moving: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionsSnapshot {
    pub total: usize,
    pub sessions: BTreeMap<String, SessionSummary>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session handle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Shared reference to one stored session.
///
/// Cloning is cheap.  A handle stays usable even if the session is later
/// evicted; writes through it then no longer reach the store.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Arc<str>,
    state: Arc<Mutex<SessionState>>,
}

impl SessionHandle {
    fn new(id: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Arc::from(id),
            state: Arc::new(Mutex::new(SessionState::new(now))),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// `true` when both handles point at the same stored session.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub fn ball(&self) -> BallState {
        self.state.lock().ball.clone()
    }

    pub fn background(&self) -> BackgroundState {
        self.state.lock().background.clone()
    }

    pub fn ball_color(&self) -> BallColorState {
        self.state.lock().ball_color.clone()
    }

    pub fn sound(&self) -> SoundState {
        self.state.lock().sound.clone()
    }

    pub fn meta(&self) -> SessionMeta {
        self.state.lock().meta.clone()
    }

    pub fn set_ball(&self, patch: &BallPatch) -> BallState {
        self.update(Resource::Ball, |s| {
            patch.apply(&mut s.ball);
            s.ball.clone()
        })
    }

    pub fn set_background(&self, patch: &BackgroundPatch) -> BackgroundState {
        self.update(Resource::Background, |s| {
            patch.apply(&mut s.background);
            s.background.clone()
        })
    }

    pub fn set_ball_color(&self, patch: &BallColorPatch) -> BallColorState {
        self.update(Resource::BallColor, |s| {
            patch.apply(&mut s.ball_color);
            s.ball_color.clone()
        })
    }

    pub fn set_sound(&self, patch: &SoundPatch) -> SoundState {
        self.update(Resource::Sound, |s| {
            patch.apply(&mut s.sound);
            s.sound.clone()
        })
    }

    /// Run `f` under the session lock and stamp the change.  Every set
    /// counts as a change, including an empty patch.
    fn update<T>(&self, resource: Resource, f: impl FnOnce(&mut SessionState) -> T) -> T {
        let (out, change_count) = {
            let mut state = self.state.lock();
            let out = f(&mut state);
            let count = state.meta.record_change(resource, Utc::now());
            (out, count)
        };

        TraceEvent::StateChanged {
            session_id: self.id.to_string(),
            resource: resource.as_str().to_owned(),
            change_count,
        }
        .emit();

        out
    }

    fn touch(&self, now: DateTime<Utc>) {
        self.state.lock().meta.last_seen = now;
    }

    fn last_seen(&self) -> DateTime<Utc> {
        self.state.lock().meta.last_seen
    }

    fn summary(&self) -> SessionSummary {
        let state = self.state.lock();
        SessionSummary {
            background_color: state.background.background_color.clone(),
            bilateral: state.sound.bilateral,
            is_moving: state.ball.is_moving,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Capacity-bounded registry of live sessions.
pub struct SessionStore {
    limit: usize,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new(limit: usize) -> Self {
        tracing::info!(limit, "session store ready");
        Self {
            limit,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Return the session for `session_id`, creating it with default values
    /// if it is new and a slot is free.
    ///
    /// The capacity check and the insert happen under one write lock, so
    /// concurrent callers racing on the same new identifier all receive the
    /// same session, and the last free slot is handed out exactly once.
    pub fn resolve_or_create(&self, session_id: &str) -> Result<SessionHandle, CapacityExceeded> {
        let now = Utc::now();

        // Fast path: session already exists.
        let existing = self.sessions.read().get(session_id).cloned();
        if let Some(handle) = existing {
            handle.touch(now);
            return Ok(handle);
        }

        // Slow path: re-check under the write lock before inserting.
        let (handle, count) = {
            let mut sessions = self.sessions.write();
            if let Some(handle) = sessions.get(session_id).cloned() {
                drop(sessions);
                handle.touch(now);
                return Ok(handle);
            }

            if sessions.len() >= self.limit {
                drop(sessions);
                tracing::warn!(session_id, limit = self.limit, "session limit reached");
                TraceEvent::SessionLimitReached {
                    session_id: session_id.to_owned(),
                    limit: self.limit,
                }
                .emit();
                return Err(CapacityExceeded { limit: self.limit });
            }

            let handle = SessionHandle::new(session_id, now);
            sessions.insert(session_id.to_owned(), handle.clone());
            (handle, sessions.len())
        };

        TraceEvent::SessionCreated {
            session_id: session_id.to_owned(),
            count,
            limit: self.limit,
        }
        .emit();

        Ok(handle)
    }

    /// Look up an existing session without creating it.
    pub fn get(&self, session_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.read().contains_key(session_id)
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn is_at_capacity(&self) -> bool {
        self.count() >= self.limit
    }

    pub fn session_count(&self) -> SessionCount {
        let count = self.count();
        SessionCount {
            count,
            limit: self.limit,
            limit_reached: count >= self.limit,
        }
    }

    /// Diagnostic dump of every session's background color, bilateral flag
    /// and moving flag.
    pub fn snapshot_all(&self) -> SessionsSnapshot {
        let sessions = self.sessions.read();
        let summaries: BTreeMap<String, SessionSummary> = sessions
            .iter()
            .map(|(id, handle)| (id.clone(), handle.summary()))
            .collect();
        SessionsSnapshot {
            total: summaries.len(),
            sessions: summaries,
        }
    }

    /// Drop every session last resolved before `cutoff`.  Returns the
    /// removed identifiers.
    pub fn evict_idle(&self, cutoff: DateTime<Utc>) -> Vec<String> {
        let mut sessions = self.sessions.write();
        let stale: Vec<String> = sessions
            .iter()
            .filter(|(_, handle)| handle.last_seen() < cutoff)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            sessions.remove(id);
        }
        stale
    }
}
