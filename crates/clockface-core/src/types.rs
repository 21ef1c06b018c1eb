use serde::{Deserialize, Serialize};
use std::fmt;

/// Head-pose direction classified from a single landmark sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
    Center,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
            Direction::Center => write!(f, "center"),
        }
    }
}

/// Attendance direction: clock-in or clock-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    In,
    Out,
}

impl LogType {
    /// One-letter code used on the attendance API wire ("I" / "O").
    pub fn wire_code(&self) -> &'static str {
        match self {
            LogType::In => "I",
            LogType::Out => "O",
        }
    }

    /// Parse either the wire code or the spelled-out form, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "i" | "in" => Some(LogType::In),
            "o" | "out" => Some(LogType::Out),
            _ => None,
        }
    }

    /// The opposite direction (clocking in after out, and vice versa).
    pub fn opposite(&self) -> Self {
        match self {
            LogType::In => LogType::Out,
            LogType::Out => LogType::In,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogType::In => write!(f, "in"),
            LogType::Out => write!(f, "out"),
        }
    }
}

/// One frame's worth of landmark-tracker output.
///
/// `nose_x` is the horizontal nose-tip position normalized to [0, 1]
/// (0 = left edge of the frame). Only meaningful when `found` is true.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LandmarkSample {
    pub found: bool,
    pub nose_x: f32,
}

impl LandmarkSample {
    pub fn face(nose_x: f32) -> Self {
        Self {
            found: true,
            nose_x,
        }
    }

    pub fn no_face() -> Self {
        Self {
            found: false,
            nose_x: 0.0,
        }
    }
}

/// Phase of a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// No capture attempt in progress.
    Idle,
    /// Waiting for the user to match a random side challenge.
    AwaitSide,
    /// Side challenge passed; waiting for the user to face center.
    AwaitCenter,
    /// Facing center with the challenge passed — eligible for capture.
    Verified,
    /// A capture + API submission is outstanding.
    Submitting,
    /// Submission accepted; attempt complete.
    Settled,
    /// Submission failed terminally; attempt must be restarted by the user.
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::AwaitSide => "await_side",
            Phase::AwaitCenter => "await_center",
            Phase::Verified => "verified",
            Phase::Submitting => "submitting",
            Phase::Settled => "settled",
            Phase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_type_parses_wire_codes_and_words() {
        assert_eq!(LogType::parse("I"), Some(LogType::In));
        assert_eq!(LogType::parse("o"), Some(LogType::Out));
        assert_eq!(LogType::parse("in"), Some(LogType::In));
        assert_eq!(LogType::parse(" OUT "), Some(LogType::Out));
        assert_eq!(LogType::parse("x"), None);
        assert_eq!(LogType::parse(""), None);
    }

    #[test]
    fn log_type_wire_codes_round_trip() {
        for lt in [LogType::In, LogType::Out] {
            assert_eq!(LogType::parse(lt.wire_code()), Some(lt));
        }
    }

    #[test]
    fn opposite_flips() {
        assert_eq!(LogType::In.opposite(), LogType::Out);
        assert_eq!(LogType::Out.opposite(), LogType::In);
    }
}
