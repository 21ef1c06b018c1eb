//! Per-attempt liveness session state machine.
//!
//! One `LivenessSession` lives for the duration of a single capture attempt.
//! It is the sole owner of the phase, the expected direction, and the match
//! flag; external code feeds it classified samples and timer ticks and reads
//! the results back. The session itself holds no timers and performs no I/O —
//! callers pass `Instant`s, which keeps every transition unit-testable.
//!
//! The challenge sequence is two-phase by design: an unpredictable side turn
//! first, then a forced return to center. A static photograph cannot answer
//! the random side instruction, and a pre-recorded loop cannot answer it on
//! cue.

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::challenge::ChallengeRng;
use crate::types::{Direction, LogType, Phase};

/// How long an unmatched side challenge stands before a fresh one is issued.
pub const REISSUE_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a capture attempt is already in progress")]
    AlreadyActive,
}

/// State for one liveness-gated capture attempt.
pub struct LivenessSession {
    phase: Phase,
    requested_log_type: Option<LogType>,
    expected_direction: Option<Direction>,
    direction_matched: bool,
    last_challenge_issued_at: Option<Instant>,
}

impl LivenessSession {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            requested_log_type: None,
            expected_direction: None,
            direction_matched: false,
            last_challenge_issued_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn requested_log_type(&self) -> Option<LogType> {
        self.requested_log_type
    }

    pub fn expected_direction(&self) -> Option<Direction> {
        self.expected_direction
    }

    pub fn direction_matched(&self) -> bool {
        self.direction_matched
    }

    /// True while a capture attempt is underway (camera on, samples flowing).
    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            Phase::AwaitSide | Phase::AwaitCenter | Phase::Verified | Phase::Submitting
        )
    }

    /// Begin a capture attempt. Issues and returns the first side challenge.
    ///
    /// Valid from `Idle`, `Settled`, or `Failed` — a settled or failed
    /// attempt may be restarted without an explicit reset.
    pub fn start(
        &mut self,
        log_type: LogType,
        now: Instant,
        rng: &mut ChallengeRng,
    ) -> Result<Direction, SessionError> {
        if self.is_active() {
            return Err(SessionError::AlreadyActive);
        }

        let challenge = rng.next_side();
        self.phase = Phase::AwaitSide;
        self.requested_log_type = Some(log_type);
        self.expected_direction = Some(challenge);
        self.direction_matched = false;
        self.last_challenge_issued_at = Some(now);

        tracing::debug!(%log_type, %challenge, "capture attempt started");
        Ok(challenge)
    }

    /// Feed one classified sample (`None` = no face found in the frame).
    ///
    /// The match flag is recomputed from this sample alone — it is never
    /// carried over from earlier frames.
    pub fn observe(&mut self, classified: Option<Direction>, now: Instant) {
        match self.phase {
            Phase::AwaitSide => {
                if classified.is_some() && classified == self.expected_direction {
                    // Side challenge passed — it is never re-attempted this
                    // session. Move on to the deterministic center challenge.
                    self.phase = Phase::AwaitCenter;
                    self.expected_direction = Some(Direction::Center);
                    self.direction_matched = true;
                    self.last_challenge_issued_at = Some(now);
                    tracing::debug!("side challenge passed, awaiting center");
                } else {
                    self.direction_matched = false;
                }
            }
            Phase::AwaitCenter => {
                if classified == Some(Direction::Center) {
                    self.phase = Phase::Verified;
                    self.direction_matched = true;
                    tracing::debug!("center confirmed, attempt verified");
                } else {
                    self.direction_matched = false;
                }
            }
            Phase::Verified => {
                if classified == Some(Direction::Center) {
                    self.direction_matched = true;
                } else {
                    // Center lost before a submission started; drop back to
                    // AwaitCenter. The side phase stays passed.
                    self.phase = Phase::AwaitCenter;
                    self.direction_matched = false;
                }
            }
            Phase::Submitting => {
                // Classification keeps running while the submission is
                // outstanding, but only the match flag moves; the phase waits
                // for the submission outcome.
                self.direction_matched = classified == Some(Direction::Center);
            }
            Phase::Idle | Phase::Settled | Phase::Failed => {}
        }
    }

    /// Reissue timer tick: in `AwaitSide` with no match and the reissue
    /// interval elapsed, pick a fresh side challenge (repeats allowed) and
    /// return it. Fires repeatedly for as long as the state holds.
    pub fn maybe_reissue(&mut self, now: Instant, rng: &mut ChallengeRng) -> Option<Direction> {
        if self.phase != Phase::AwaitSide || self.direction_matched {
            return None;
        }
        let issued_at = self.last_challenge_issued_at?;
        if now.duration_since(issued_at) < REISSUE_INTERVAL {
            return None;
        }

        let challenge = rng.next_side();
        self.expected_direction = Some(challenge);
        self.direction_matched = false;
        self.last_challenge_issued_at = Some(now);
        tracing::debug!(%challenge, "side challenge reissued");
        Some(challenge)
    }

    /// True when a capture may be submitted: challenge sequence complete and
    /// the latest sample still matched center.
    pub fn ready_to_submit(&self) -> bool {
        self.phase == Phase::Verified && self.direction_matched
    }

    /// Move into `Submitting`. No-op (returning false) unless
    /// [`ready_to_submit`](Self::ready_to_submit) holds — the submit timer
    /// re-checks preconditions at the moment it fires.
    pub fn begin_submission(&mut self) -> bool {
        if !self.ready_to_submit() {
            return false;
        }
        self.phase = Phase::Submitting;
        true
    }

    /// Submission accepted by the attendance API.
    pub fn settle(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Settled;
        }
    }

    /// Submission rejected recoverably (face not matched, low confidence).
    /// The attempt stays alive: back to `AwaitCenter`, retried on the next
    /// submit tick once center is re-matched.
    pub fn recoverable_failure(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::AwaitCenter;
            self.expected_direction = Some(Direction::Center);
            self.direction_matched = false;
        }
    }

    /// Submission rejected terminally (location denial, transport failure).
    pub fn terminal_failure(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Failed;
        }
    }

    /// Tear the attempt down to `Idle`: user cancel, camera denial, or
    /// cleanup after a terminal failure.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.requested_log_type = None;
        self.expected_direction = None;
        self.direction_matched = false;
        self.last_challenge_issued_at = None;
    }
}

impl Default for LivenessSession {
    fn default() -> Self {
        Self::new()
    }
}
