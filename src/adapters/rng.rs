//! Randomness adapter for replay-counter seeding.
//!
//! `getrandom` resolves to `esp_fill_random` (hardware RNG) on ESP-IDF and
//! to the OS source elsewhere. The fallback is a `fastrand` generator
//! seeded from the clock, so it does not share the entropy source whose
//! failure sent us there. Good enough for a counter seed, never for keys.

use std::time::{SystemTime, UNIX_EPOCH};

use log::warn;

use crate::app::ports::RandomPort;

#[derive(Debug, Clone)]
pub struct SystemRandom {
    fallback: fastrand::Rng,
}

impl Default for SystemRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemRandom {
    pub fn new() -> Self {
        Self::with_fallback_seed(clock_seed())
    }

    /// Deterministic fallback stream, for tests.
    pub fn with_fallback_seed(seed: u64) -> Self {
        Self {
            fallback: fastrand::Rng::with_seed(seed),
        }
    }
}

impl RandomPort for SystemRandom {
    fn secure_u32(&mut self) -> Option<u32> {
        let mut buf = [0u8; 4];
        match getrandom::getrandom(&mut buf) {
            Ok(()) => Some(u32::from_le_bytes(buf)),
            Err(e) => {
                warn!("getrandom failed: {}", e);
                None
            }
        }
    }

    fn fallback_u32(&mut self) -> u32 {
        self.fallback.u32(..)
    }
}

/// Wall clock in nanoseconds (time since boot on a device without SNTP).
fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x00BE_AC0E)
}
