//! AppState construction and background-task spawning, kept out of
//! `main.rs` so tests and the `serve` command share one boot path.

use std::sync::Arc;

use emdr_domain::config::{Config, ConfigSeverity, SessionIdSource};
use emdr_sessions::IdleEviction;

use crate::state::AppState;

/// Validate config and return a fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Session store ────────────────────────────────────────────────
    let state = AppState::new(config.clone());
    let sessions = &config.sessions;
    tracing::info!(
        max_sessions = sessions.max_sessions,
        id_source = ?sessions.id_source,
        query_param = %sessions.query_param,
        "session management ready"
    );
    if sessions.id_source == SessionIdSource::QueryOrCookie {
        tracing::info!(cookie = %sessions.cookie_name, "cookie fallback for session ids enabled");
    }

    match sessions.eviction.idle_minutes {
        Some(idle_minutes) => tracing::info!(
            idle_minutes,
            sweep_interval_secs = sessions.eviction.sweep_interval_secs,
            "idle session eviction enabled"
        ),
        None => tracing::info!("idle session eviction disabled; sessions live until restart"),
    }

    if state.validator.is_noop() {
        tracing::info!("no patch bounds configured; values are stored as sent");
    } else {
        tracing::info!(bounds = ?sessions.bounds, "patch bounds enabled");
    }

    Ok(state)
}

/// Spawn the long-running background tasks.  Currently only the idle
/// eviction sweeper, and only when it is enabled.
pub fn spawn_background_tasks(state: &AppState) {
    // ── Idle eviction sweep ──────────────────────────────────────────
    if let Some(eviction) = IdleEviction::from_config(&state.config.sessions.eviction) {
        let sessions = state.sessions.clone();
        tracing::info!(
            idle_minutes = eviction.idle_minutes(),
            every_secs = eviction.sweep_interval().as_secs(),
            "idle eviction sweeper started"
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(eviction.sweep_interval());
            loop {
                interval.tick().await;
                eviction.sweep(&sessions, chrono::Utc::now());
            }
        });
    }

    tracing::info!("background tasks spawned");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_config() {
        let mut config = Config::default();
        config.sessions.max_sessions = 0;
        let err = build_app_state(Arc::new(config)).err().unwrap();
        assert!(err.to_string().contains("1 error(s)"));
    }

    #[test]
    fn builds_store_with_configured_limit() {
        let mut config = Config::default();
        config.sessions.max_sessions = 10;
        let state = build_app_state(Arc::new(config)).unwrap();
        assert_eq!(state.sessions.limit(), 10);
        assert_eq!(state.sessions.count(), 0);
        assert!(state.validator.is_noop());
    }
}
