//! Merge patches for the four sub-states.
//!
//! A patch carries only the fields a caller supplied.  Parsing is lenient:
//! a field that is missing, `null`, or of the wrong JSON type is dropped and
//! the stored value stays as it was.  A body that is not a JSON object is an
//! empty patch.

use serde_json::{Map, Number, Value};

use crate::state::{BackgroundState, BallColorState, BallState, SoundState};

// ── field extraction ────────────────────────────────────────────────

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<Number> {
    match obj.get(key) {
        Some(Value::Number(n)) => Some(n.clone()),
        _ => None,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn bool_field(obj: &Map<String, Value>, key: &str) -> Option<bool> {
    obj.get(key).and_then(Value::as_bool)
}

fn set_if<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ball
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallPatch {
    pub speed: Option<Number>,
    pub bounce_mode: Option<String>,
    pub is_moving: Option<bool>,
    pub ball_size: Option<Number>,
}

impl BallPatch {
    pub fn from_json(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return Self::default();
        };
        Self {
            speed: number_field(obj, "speed"),
            bounce_mode: string_field(obj, "bounceMode"),
            is_moving: bool_field(obj, "isMoving"),
            ball_size: number_field(obj, "ballSize"),
        }
    }

    pub fn apply(&self, state: &mut BallState) {
        set_if(&mut state.speed, &self.speed);
        set_if(&mut state.bounce_mode, &self.bounce_mode);
        set_if(&mut state.is_moving, &self.is_moving);
        set_if(&mut state.ball_size, &self.ball_size);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Background
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackgroundPatch {
    pub background_color: Option<String>,
}

impl BackgroundPatch {
    pub fn from_json(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return Self::default();
        };
        Self {
            background_color: string_field(obj, "backgroundColor"),
        }
    }

    pub fn apply(&self, state: &mut BackgroundState) {
        set_if(&mut state.background_color, &self.background_color);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Ball color
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallColorPatch {
    pub ball_color: Option<String>,
    pub random_color: Option<bool>,
}

impl BallColorPatch {
    pub fn from_json(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return Self::default();
        };
        Self {
            ball_color: string_field(obj, "ballColor"),
            random_color: bool_field(obj, "randomColor"),
        }
    }

    pub fn apply(&self, state: &mut BallColorState) {
        set_if(&mut state.ball_color, &self.ball_color);
        set_if(&mut state.random_color, &self.random_color);
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sound
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SoundPatch {
    pub bilateral: Option<bool>,
    pub speed: Option<Number>,
}

impl SoundPatch {
    pub fn from_json(body: &Value) -> Self {
        let Some(obj) = body.as_object() else {
            return Self::default();
        };
        Self {
            bilateral: bool_field(obj, "bilateral"),
            speed: number_field(obj, "speed"),
        }
    }

    pub fn apply(&self, state: &mut SoundState) {
        set_if(&mut state.bilateral, &self.bilateral);
        set_if(&mut state.speed, &self.speed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_ball_patch_keeps_other_fields() {
        let mut ball = BallState::default();
        BallPatch::from_json(&json!({ "speed": 9 })).apply(&mut ball);
        assert_eq!(ball.speed, Number::from(9));
        assert_eq!(ball.bounce_mode, "horizontal");
        assert!(!ball.is_moving);
        assert_eq!(ball.ball_size, Number::from(30));
    }

    #[test]
    fn empty_object_patches_nothing() {
        assert_eq!(BallPatch::from_json(&json!({})), BallPatch::default());
        assert_eq!(BackgroundPatch::from_json(&json!({})), BackgroundPatch::default());
        assert_eq!(BallColorPatch::from_json(&json!({})), BallColorPatch::default());
        assert_eq!(SoundPatch::from_json(&json!({})), SoundPatch::default());
    }

    #[test]
    fn non_object_body_patches_nothing() {
        assert_eq!(BallPatch::from_json(&json!([1, 2, 3])), BallPatch::default());
        assert_eq!(SoundPatch::from_json(&json!("bilateral")), SoundPatch::default());
        assert_eq!(BackgroundPatch::from_json(&Value::Null), BackgroundPatch::default());
    }

    #[test]
    fn wrong_types_and_nulls_are_ignored() {
        let patch = BallPatch::from_json(&json!({
            "speed": "fast",
            "bounceMode": 3,
            "isMoving": "yes",
            "ballSize": null,
        }));
        assert_eq!(patch, BallPatch::default());

        let mut sound = SoundState::default();
        SoundPatch::from_json(&json!({ "bilateral": 1, "speed": 750 })).apply(&mut sound);
        assert!(!sound.bilateral);
        assert_eq!(sound.speed, Number::from(750));
    }

    #[test]
    fn float_numbers_are_kept_as_sent() {
        let mut ball = BallState::default();
        BallPatch::from_json(&json!({ "speed": 7.5 })).apply(&mut ball);
        assert_eq!(serde_json::to_value(&ball).unwrap()["speed"], json!(7.5));
    }

    #[test]
    fn unknown_bounce_mode_passes_through() {
        let mut ball = BallState::default();
        BallPatch::from_json(&json!({ "bounceMode": "diagonal" })).apply(&mut ball);
        assert_eq!(ball.bounce_mode, "diagonal");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let patch = BackgroundPatch::from_json(&json!({ "backgroundColor": "#000", "extra": true }));
        assert_eq!(patch.background_color.as_deref(), Some("#000"));
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let patch = BallColorPatch::from_json(&json!({ "ballColor": "red", "randomColor": true }));
        let mut once = BallColorState::default();
        patch.apply(&mut once);
        let mut twice = once.clone();
        patch.apply(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn key_order_within_patch_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"isMoving": true, "speed": 3, "ballSize": 40}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"ballSize": 40, "speed": 3, "isMoving": true}"#).unwrap();
        let (mut x, mut y) = (BallState::default(), BallState::default());
        BallPatch::from_json(&a).apply(&mut x);
        BallPatch::from_json(&b).apply(&mut y);
        assert_eq!(x, y);
    }

    #[test]
    fn later_patches_win_per_field() {
        let mut ball = BallState::default();
        for body in [
            json!({ "speed": 2, "isMoving": true }),
            json!({ "speed": 8 }),
            json!({ "bounceMode": "vertical", "isMoving": false }),
        ] {
            BallPatch::from_json(&body).apply(&mut ball);
        }
        assert_eq!(ball.speed, Number::from(8));
        assert!(!ball.is_moving);
        assert_eq!(ball.bounce_mode, "vertical");
        assert_eq!(ball.ball_size, Number::from(30));
    }
}
