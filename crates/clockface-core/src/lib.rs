//! clockface-core — Liveness-gated capture logic for the attendance kiosk.
//!
//! Pure library: head-direction classification from facial landmarks, the
//! random side-challenge generator, and the per-attempt liveness session
//! state machine. No I/O, no timers — callers supply timestamps and act on
//! the returned transitions.

pub mod challenge;
pub mod direction;
pub mod session;
pub mod types;

pub use challenge::ChallengeRng;
pub use direction::classify;
pub use session::{LivenessSession, SessionError, REISSUE_INTERVAL};
pub use types::{Direction, LandmarkSample, LogType, Phase};
