//! Clock, timers and randomness behind one trait.
//!
//! The `Environment` trait decouples the synchronization core from system
//! resources (clock, randomness, timers). The same controller runs against
//! the system clock in production and against a virtual clock with a seeded
//! RNG in the simulation harness.
//!
//! # Invariants
//!
//! - `now()` is monotonic
//! - A seeded implementation replays the same random stream
//! - No process-global state; two worlds in one test stay independent

use std::time::{Duration, Instant};

/// Time and entropy source for a session.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant. Never earlier than a previous call.
    fn now(&self) -> Instant;

    /// Wait for `duration`.
    ///
    /// Only driver code awaits this (broadcast retry backoff). The
    /// controller itself never sleeps.
    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Random `u64`, used for local peer identities.
    fn random_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        self.random_bytes(&mut buf);
        u64::from_be_bytes(buf)
    }
}
