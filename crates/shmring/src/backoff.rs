use crate::Config;
use std::fmt;
use std::io;
use std::time::Duration;

/// Which side of the ring a waiter serves. Only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Producer,
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Producer => f.write_str("producer"),
            Role::Consumer => f.write_str("consumer"),
        }
    }
}

/// Result of a single wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The wait ran normally (or was woken by the counterpart).
    Waited,
    /// The wait primitive rejected the request and returned immediately.
    Degraded,
}

/// Wait strategy plugged into `BlockingProducer` / `BlockingConsumer`.
pub trait Waiter {
    /// Called after a failed attempt, before the next one.
    fn wait(&mut self) -> WaitOutcome;

    /// Called after a successful operation so a waiting counterpart can retry.
    fn wake_peer(&self) {}
}

/// Fixed-interval backoff polling.
///
/// Sleeps `interval` after every failed attempt. A rejected sleep is logged
/// and the retry goes ahead as if the sleep had returned immediately.
#[derive(Debug, Clone)]
pub struct Backoff {
    role: Role,
    interval: Duration,
}

impl Backoff {
    /// Creates a backoff with a fixed interval.
    #[inline]
    pub const fn new(role: Role, interval: Duration) -> Self {
        Self { role, interval }
    }

    /// Producer backoff from `config.producer_backoff`.
    pub fn for_producer(config: &Config) -> Self {
        Self::new(Role::Producer, config.producer_backoff)
    }

    /// Consumer backoff from `config.consumer_backoff`.
    pub fn for_consumer(config: &Config) -> Self {
        Self::new(Role::Consumer, config.consumer_backoff)
    }

    /// The sleep between attempts.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Waiter for Backoff {
    fn wait(&mut self) -> WaitOutcome {
        tracing::trace!(role = %self.role, "waiting");
        match nap(self.interval) {
            Ok(()) => WaitOutcome::Waited,
            Err(err) => {
                tracing::warn!(
                    role = %self.role,
                    interval = ?self.interval,
                    error = %err,
                    "bad value for wait time"
                );
                WaitOutcome::Degraded
            }
        }
    }
}

/// Sleeps for `interval` with `nanosleep(2)`.
///
/// An interrupted sleep (`EINTR`) counts as completed: the caller retries
/// anyway. `EINVAL` and unrepresentable durations are returned as errors.
#[cfg(unix)]
pub(crate) fn nap(interval: Duration) -> io::Result<()> {
    let secs = libc::time_t::try_from(interval.as_secs()).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "wait interval does not fit in time_t")
    })?;

    // SAFETY: timespec is plain data; zeroing also covers platform padding fields.
    let mut request: libc::timespec = unsafe { std::mem::zeroed() };
    request.tv_sec = secs;
    request.tv_nsec = interval.subsec_nanos() as libc::c_long;

    // SAFETY: `request` is a valid timespec; the remainder pointer may be null.
    let ret = unsafe { libc::nanosleep(&request, std::ptr::null_mut()) };
    if ret == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EINTR) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
pub(crate) fn nap(interval: Duration) -> io::Result<()> {
    std::thread::sleep(interval);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_backoff_from_config() {
        let config = Config::default();
        assert_eq!(Backoff::for_producer(&config).interval(), Duration::from_millis(50));
        assert_eq!(Backoff::for_consumer(&config).interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_backoff_sleeps_at_least_interval() {
        let mut backoff = Backoff::new(Role::Consumer, Duration::from_millis(5));

        let start = Instant::now();
        assert_eq!(backoff.wait(), WaitOutcome::Waited);
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_zero_interval_returns_immediately() {
        assert!(nap(Duration::ZERO).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_unrepresentable_interval_is_degraded() {
        let mut backoff = Backoff::new(Role::Producer, Duration::MAX);

        let start = Instant::now();
        assert_eq!(backoff.wait(), WaitOutcome::Degraded);
        // Degraded waits must not block
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
