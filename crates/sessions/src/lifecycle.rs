//! Idle eviction.
//!
//! Sessions are kept for the lifetime of the process unless
//! `sessions.eviction.idle_minutes` is set.  With it set, a periodic sweep
//! drops sessions nobody has resolved within the window, freeing their
//! capacity slot.  An evicted identifier that comes back starts over from
//! the defaults.

use chrono::{DateTime, Duration, Utc};

use emdr_domain::config::EvictionConfig;
use emdr_domain::trace::TraceEvent;

use crate::store::SessionStore;

/// Evicts sessions idle longer than a fixed window.
#[derive(Debug, Clone)]
pub struct IdleEviction {
    idle_minutes: u32,
    sweep_interval: std::time::Duration,
}

impl IdleEviction {
    /// `None` when eviction is disabled.
    pub fn from_config(config: &EvictionConfig) -> Option<Self> {
        config.idle_minutes.map(|idle_minutes| Self {
            idle_minutes,
            sweep_interval: std::time::Duration::from_secs(config.sweep_interval_secs.max(1)),
        })
    }

    pub fn idle_minutes(&self) -> u32 {
        self.idle_minutes
    }

    pub fn sweep_interval(&self) -> std::time::Duration {
        self.sweep_interval
    }

    /// Remove sessions idle at `now`.  Returns the evicted identifiers.
    pub fn sweep(&self, store: &SessionStore, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - Duration::minutes(i64::from(self.idle_minutes));
        let evicted = store.evict_idle(cutoff);

        for session_id in &evicted {
            TraceEvent::SessionEvicted {
                session_id: session_id.clone(),
                idle_minutes: self.idle_minutes,
            }
            .emit();
        }
        if !evicted.is_empty() {
            tracing::info!(
                evicted = evicted.len(),
                remaining = store.count(),
                "idle sessions evicted"
            );
        }

        evicted
    }
}
