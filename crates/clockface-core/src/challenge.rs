//! Side-challenge generation.
//!
//! The liveness check asks the user to turn toward a randomly chosen side
//! before facing center. Unpredictability is what defeats a static photo, so
//! the RNG is seeded from OS entropy in production. Picking the same side
//! twice in a row is allowed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::Direction;

/// Random source for side challenges.
pub struct ChallengeRng {
    rng: StdRng,
}

impl ChallengeRng {
    /// Seed from OS entropy. Production path.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic seeding for tests.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Pick the next side challenge, uniform over {Left, Right}.
    pub fn next_side(&mut self) -> Direction {
        if self.rng.gen_bool(0.5) {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}
