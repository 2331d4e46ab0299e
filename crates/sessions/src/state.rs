//! Per-session state and its defaults.
//!
//! Field names serialize in camelCase because the frontend reads these
//! structs verbatim.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sub-states
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Ball motion.  `speed` and `ballSize` keep whatever JSON number the
/// controller sent (integer or float).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallState {
    pub speed: Number,
    /// `"horizontal"` by default.  Other modes are passed through untouched.
    pub bounce_mode: String,
    pub is_moving: bool,
    pub ball_size: Number,
}

impl Default for BallState {
    fn default() -> Self {
        Self {
            speed: Number::from(5),
            bounce_mode: "horizontal".into(),
            is_moving: false,
            ball_size: Number::from(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundState {
    /// CSS color spec; not validated.
    pub background_color: String,
}

impl Default for BackgroundState {
    fn default() -> Self {
        Self {
            background_color: "#ffffff".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BallColorState {
    pub ball_color: String,
    pub random_color: bool,
}

impl Default for BallColorState {
    fn default() -> Self {
        Self {
            ball_color: "#2196f3".into(),
            random_color: false,
        }
    }
}

/// Bilateral audio.  `speed` is the left/right alternation period in ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoundState {
    pub bilateral: bool,
    pub speed: Number,
}

impl Default for SoundState {
    fn default() -> Self {
        Self {
            bilateral: false,
            speed: Number::from(500),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resources
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The four independently readable/writable parts of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Ball,
    Background,
    BallColor,
    Sound,
}

impl Resource {
    /// Path segment used by the HTTP layer (`/api/<name>`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ball => "ball",
            Self::Background => "background",
            Self::BallColor => "ballcolor",
            Self::Sound => "sound",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Diagnostics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Write history of one sub-state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRecord {
    pub last_changed: Option<DateTime<Utc>>,
    pub change_count: u64,
}

impl ChangeRecord {
    fn record(&mut self, now: DateTime<Utc>) -> u64 {
        self.last_changed = Some(now);
        self.change_count += 1;
        self.change_count
    }
}

/// Diagnostic bookkeeping.  Nothing here affects what clients read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub created: DateTime<Utc>,
    /// Last time the session was resolved by any request.
    pub last_seen: DateTime<Utc>,
    pub ball: ChangeRecord,
    pub background: ChangeRecord,
    pub ball_color: ChangeRecord,
    pub sound: ChangeRecord,
}

impl SessionMeta {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            created: now,
            last_seen: now,
            ball: ChangeRecord::default(),
            background: ChangeRecord::default(),
            ball_color: ChangeRecord::default(),
            sound: ChangeRecord::default(),
        }
    }

    /// Stamp a write to `resource` and return its new change count.
    pub(crate) fn record_change(&mut self, resource: Resource, now: DateTime<Utc>) -> u64 {
        match resource {
            Resource::Ball => self.ball.record(now),
            Resource::Background => self.background.record(now),
            Resource::BallColor => self.ball_color.record(now),
            Resource::Sound => self.sound.record(now),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session state
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything stored for one session.  The four sub-states are always
/// created together.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub ball: BallState,
    pub background: BackgroundState,
    pub ball_color: BallColorState,
    pub sound: SoundState,
    pub meta: SessionMeta,
}

impl SessionState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            ball: BallState::default(),
            background: BackgroundState::default(),
            ball_color: BallColorState::default(),
            sound: SoundState::default(),
            meta: SessionMeta::new(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ball_defaults_serialize_as_frontend_expects() {
        let json = serde_json::to_value(BallState::default()).unwrap();
        assert_eq!(
            json,
            json!({ "speed": 5, "bounceMode": "horizontal", "isMoving": false, "ballSize": 30 })
        );
    }

    #[test]
    fn other_defaults() {
        let state = SessionState::new(Utc::now());
        assert_eq!(
            serde_json::to_value(&state.background).unwrap(),
            json!({ "backgroundColor": "#ffffff" })
        );
        assert_eq!(
            serde_json::to_value(&state.ball_color).unwrap(),
            json!({ "ballColor": "#2196f3", "randomColor": false })
        );
        assert_eq!(
            serde_json::to_value(&state.sound).unwrap(),
            json!({ "bilateral": false, "speed": 500 })
        );
    }

    #[test]
    fn new_state_has_no_changes() {
        let now = Utc::now();
        let state = SessionState::new(now);
        assert_eq!(state.meta.created, now);
        for record in [
            &state.meta.ball,
            &state.meta.background,
            &state.meta.ball_color,
            &state.meta.sound,
        ] {
            assert_eq!(record, &ChangeRecord::default());
        }
    }

    #[test]
    fn record_change_touches_only_its_resource() {
        let now = Utc::now();
        let mut meta = SessionMeta::new(now);
        assert_eq!(meta.record_change(Resource::Sound, now), 1);
        assert_eq!(meta.record_change(Resource::Sound, now), 2);
        assert_eq!(meta.sound.last_changed, Some(now));
        assert_eq!(meta.background.change_count, 0);
        assert!(meta.ball.last_changed.is_none());
    }

    #[test]
    fn resource_path_names() {
        let names: Vec<_> = [
            Resource::Ball,
            Resource::Background,
            Resource::BallColor,
            Resource::Sound,
        ]
        .iter()
        .map(|r| r.as_str())
        .collect();
        assert_eq!(names, ["ball", "background", "ballcolor", "sound"]);
    }
}
