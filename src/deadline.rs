use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::error::{ForensicsError, Result};

/// Optional wall-clock limit plus a cancel flag shared with the caller.
///
/// Clones share the same flag, so a host can keep one clone and call
/// [`Deadline::cancel`] from another thread while the analysis runs.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    expires_at: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Deadline {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn at(instant: Instant) -> Self {
        Self {
            expires_at: Some(instant),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_expired(&self) -> bool {
        if self.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fails with the stage's own error kind once the deadline has passed.
    pub(crate) fn check(&self, stage_error: fn(String) -> ForensicsError) -> Result<()> {
        if self.is_expired() {
            log::warn!("analysis deadline exceeded");
            return Err(stage_error("deadline exceeded".into()));
        }
        Ok(())
    }
}
