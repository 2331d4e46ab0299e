//! Optional bounds on incoming patches.
//!
//! Runs at the request boundary after lenient parsing and before the store
//! is touched.  With no bounds configured every patch passes.

use serde_json::Number;

use emdr_domain::config::{FieldBounds, NumericRange};

use crate::patch::{BallPatch, SoundPatch};
use crate::state::Resource;

/// A patch value outside the configured bounds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{resource}.{field}: {reason}")]
pub struct PatchRejected {
    pub resource: Resource,
    pub field: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatchValidator {
    bounds: FieldBounds,
}

impl PatchValidator {
    pub fn new(bounds: FieldBounds) -> Self {
        Self { bounds }
    }

    pub fn is_noop(&self) -> bool {
        self.bounds.is_empty()
    }

    pub fn check_ball(&self, patch: &BallPatch) -> Result<(), PatchRejected> {
        check_number(Resource::Ball, "speed", patch.speed.as_ref(), self.bounds.ball_speed)?;
        check_number(Resource::Ball, "ballSize", patch.ball_size.as_ref(), self.bounds.ball_size)?;

        if let Some(mode) = &patch.bounce_mode {
            let allowed = &self.bounds.bounce_modes;
            if !allowed.is_empty() && !allowed.iter().any(|m| m == mode) {
                return Err(PatchRejected {
                    resource: Resource::Ball,
                    field: "bounceMode",
                    reason: format!("\"{mode}\" is not one of {}", allowed.join(", ")),
                });
            }
        }
        Ok(())
    }

    pub fn check_sound(&self, patch: &SoundPatch) -> Result<(), PatchRejected> {
        check_number(Resource::Sound, "speed", patch.speed.as_ref(), self.bounds.sound_speed)
    }
}

fn check_number(
    resource: Resource,
    field: &'static str,
    value: Option<&Number>,
    range: Option<NumericRange>,
) -> Result<(), PatchRejected> {
    let (Some(value), Some(range)) = (value, range) else {
        return Ok(());
    };
    let Some(v) = value.as_f64() else {
        return Ok(());
    };
    if range.contains(v) {
        return Ok(());
    }

    let reason = match (range.min, range.max) {
        (Some(min), Some(max)) => format!("{v} is outside {min}..={max}"),
        (Some(min), None) => format!("{v} is below {min}"),
        (None, Some(max)) => format!("{v} is above {max}"),
        (None, None) => unreachable!("an open range contains every value"),
    };
    Err(PatchRejected { resource, field, reason })
}
