use crate::backoff::WaitOutcome;

/// Optional per-side metrics for a blocking wrapper.
///
/// Owned by one side only, so plain counters suffice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Metrics {
    /// Operations that eventually succeeded
    pub completed: u64,
    /// Attempts that found the ring full (producer) or empty (consumer)
    pub failed_attempts: u64,
    /// Waits that ran to completion
    pub waits: u64,
    /// Waits that returned early because the wait primitive rejected the request
    pub degraded_waits: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_completed(&mut self) {
        self.completed += 1;
    }

    #[inline]
    pub(crate) fn record_wait(&mut self, outcome: WaitOutcome) {
        self.failed_attempts += 1;
        match outcome {
            WaitOutcome::Waited => self.waits += 1,
            WaitOutcome::Degraded => self.degraded_waits += 1,
        }
    }
}
