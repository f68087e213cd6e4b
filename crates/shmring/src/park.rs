//! Event-driven waiting for two workers in the same process.
//!
//! Each side parks on its own [`Parker`] and unparks the other after every
//! successful operation. An unpark that arrives before the park is kept as a
//! token, so a wakeup is never lost. The park timeout is only a safety net.

use crate::backoff::{WaitOutcome, Waiter};
use crossbeam_utils::sync::{Parker, Unparker};
use std::time::Duration;

/// Waiter that sleeps until the counterpart makes progress.
pub struct ParkWaiter {
    parker: Parker,
    peer: Unparker,
    timeout: Duration,
}

impl ParkWaiter {
    /// Returns `(producer_waiter, consumer_waiter)`, each able to wake the other.
    pub fn pair(timeout: Duration) -> (Self, Self) {
        let producer = Parker::new();
        let consumer = Parker::new();
        let wake_producer = producer.unparker().clone();
        let wake_consumer = consumer.unparker().clone();

        (
            Self {
                parker: producer,
                peer: wake_consumer,
                timeout,
            },
            Self {
                parker: consumer,
                peer: wake_producer,
                timeout,
            },
        )
    }
}

impl Waiter for ParkWaiter {
    fn wait(&mut self) -> WaitOutcome {
        tracing::trace!(timeout = ?self.timeout, "parking");
        self.parker.park_timeout(self.timeout);
        WaitOutcome::Waited
    }

    #[inline]
    fn wake_peer(&self) {
        self.peer.unpark();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_wake_before_park_is_not_lost() {
        let (mut producer, consumer) = ParkWaiter::pair(Duration::from_secs(10));

        consumer.wake_peer();

        let start = Instant::now();
        producer.wait();
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_park_times_out_without_peer() {
        let (mut producer, _consumer) = ParkWaiter::pair(Duration::from_millis(5));

        // No unpark ever arrives; the timeout alone ends the wait
        let start = Instant::now();
        assert_eq!(producer.wait(), WaitOutcome::Waited);
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
