//! [`Environment`] backed by the system clock, tokio timers and OS entropy.

use std::time::{Duration, Instant};

use affirm_core::Environment;

/// Environment for real devices. Must be used inside a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// System environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl std::future::Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(e) = getrandom::fill(buffer) {
            // Peer ids only need to be unique within one session.
            tracing::error!(error = %e, "getrandom failed, falling back to clock entropy");
            let nanos = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map_or(0, |d| d.as_nanos());
            for (byte, source) in buffer.iter_mut().zip(nanos.to_le_bytes().iter().cycle()) {
                *byte = *source;
            }
        }
    }
}
