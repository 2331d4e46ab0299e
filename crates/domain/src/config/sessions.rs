use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sessions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Session store and session-identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Maximum number of distinct sessions tracked at once.  Creating one
    /// more is rejected, never queued.
    #[serde(default = "d_max_sessions")]
    pub max_sessions: usize,

    /// Where the session identifier is read from on each request.
    #[serde(default)]
    pub id_source: SessionIdSource,

    /// Query parameter carrying the session identifier.
    #[serde(default = "d_query_param")]
    pub query_param: String,

    /// Cookie carrying the session identifier (`query_or_cookie` only).
    #[serde(default = "d_cookie_name")]
    pub cookie_name: String,

    /// Message returned when the session limit is reached.
    #[serde(default = "d_limit_message")]
    pub limit_message: String,

    /// Message returned when a request carries no session identifier.
    #[serde(default = "d_missing_id_message")]
    pub missing_id_message: String,

    /// Idle eviction.  Disabled unless `idle_minutes` is set.
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Optional bounds checked on incoming patches.  Empty by default.
    #[serde(default)]
    pub bounds: FieldBounds,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            max_sessions: d_max_sessions(),
            id_source: SessionIdSource::default(),
            query_param: d_query_param(),
            cookie_name: d_cookie_name(),
            limit_message: d_limit_message(),
            missing_id_message: d_missing_id_message(),
            eviction: EvictionConfig::default(),
            bounds: FieldBounds::default(),
        }
    }
}

/// How a request's session identifier is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionIdSource {
    /// `?session=<id>` is required; requests without it are rejected.
    #[default]
    Query,
    /// Query parameter first, then the session cookie.  When neither is
    /// present a fresh identifier is minted and handed back as a cookie.
    QueryOrCookie,
}

/// Idle eviction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Sessions not resolved for this many minutes are dropped.  `None`
    /// keeps every session for the lifetime of the process.
    #[serde(default)]
    pub idle_minutes: Option<u32>,

    /// How often the sweeper runs.
    #[serde(default = "d_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            idle_minutes: None,
            sweep_interval_secs: d_sweep_interval(),
        }
    }
}

impl EvictionConfig {
    pub fn is_enabled(&self) -> bool {
        self.idle_minutes.is_some()
    }
}

/// Inclusive numeric range; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// `true` when both ends are set and `min > max`.
    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }
}

/// Optional per-field bounds applied to incoming patches.
///
/// Nothing is enforced by default: the display accepts whatever the
/// controller sends.  Operators who want hard limits set them here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldBounds {
    #[serde(default)]
    pub ball_speed: Option<NumericRange>,
    #[serde(default)]
    pub ball_size: Option<NumericRange>,
    #[serde(default)]
    pub sound_speed: Option<NumericRange>,
    /// Allowed `bounceMode` values.  Empty allows any value.
    #[serde(default)]
    pub bounce_modes: Vec<String>,
}

impl FieldBounds {
    pub fn is_empty(&self) -> bool {
        self.ball_speed.is_none()
            && self.ball_size.is_none()
            && self.sound_speed.is_none()
            && self.bounce_modes.is_empty()
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_sessions() -> usize {
    50
}
fn d_query_param() -> String {
    "session".into()
}
fn d_cookie_name() -> String {
    "emdr_session".into()
}
fn d_limit_message() -> String {
    "Max session limit reached for free version. To allow new connection please \
     subscribe to paid version. You can contact us by email: info@expatpsychologie.nl"
        .into()
}
fn d_missing_id_message() -> String {
    "Session ID required. Please access the app through the therapist control panel.".into()
}
fn d_sweep_interval() -> u64 {
    60
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
