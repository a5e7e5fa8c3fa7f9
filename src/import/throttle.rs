use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Delay injected before each record's processing, throttling bursts
/// against external metadata lookups.
pub trait ImportThrottle: Send + Sync {
    fn next_delay(&self) -> Duration;
}

/// Uniform random delay in [min_ms, max_ms). Seedable for deterministic
/// tests.
pub struct RandomThrottle {
    min_ms: u64,
    max_ms: u64,
    rng: Mutex<StdRng>,
}

impl RandomThrottle {
    pub fn new(min_ms: u64, max_ms: u64) -> Self {
        RandomThrottle {
            min_ms,
            max_ms,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(min_ms: u64, max_ms: u64, seed: u64) -> Self {
        RandomThrottle {
            min_ms,
            max_ms,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomThrottle {
    fn default() -> Self {
        RandomThrottle::new(200, 800)
    }
}

impl ImportThrottle for RandomThrottle {
    fn next_delay(&self) -> Duration {
        let ms = self.rng.lock().unwrap().gen_range(self.min_ms..self.max_ms);
        Duration::from_millis(ms)
    }
}

/// No delay at all; used in tests
pub struct NoThrottle;

impl ImportThrottle for NoThrottle {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}
