//! Session state store for the EMDR remote.
//!
//! A therapist's controller page and a client's display page share one
//! session, identified by an opaque string.  Each session holds the ball,
//! background, ball color and sound parameters.  The store caps the number
//! of live sessions, creates sessions on first access with fixed defaults,
//! and applies merge-patch updates under per-session locks.

pub mod lifecycle;
pub mod patch;
pub mod state;
pub mod store;
pub mod validation;

pub use lifecycle::IdleEviction;
pub use patch::{BackgroundPatch, BallColorPatch, BallPatch, SoundPatch};
pub use state::{
    BackgroundState, BallColorState, BallState, ChangeRecord, Resource, SessionMeta, SessionState,
    SoundState,
};
pub use store::{CapacityExceeded, SessionCount, SessionHandle, SessionStore, SessionSummary, SessionsSnapshot};
pub use validation::{PatchRejected, PatchValidator};
