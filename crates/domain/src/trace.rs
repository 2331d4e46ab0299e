use serde::Serialize;

/// Structured trace events emitted across the EMDR remote crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionCreated {
        session_id: String,
        count: usize,
        limit: usize,
    },
    SessionLimitReached {
        session_id: String,
        limit: usize,
    },
    StateChanged {
        session_id: String,
        resource: String,
        change_count: u64,
    },
    PatchRejected {
        session_id: String,
        resource: String,
        field: String,
    },
    SessionEvicted {
        session_id: String,
        idle_minutes: u32,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "emdr_event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_event_tag() {
        let ev = TraceEvent::SessionLimitReached {
            session_id: "abc".into(),
            limit: 50,
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "SessionLimitReached");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(json["limit"], 50);
    }
}
