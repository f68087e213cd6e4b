//! Hosts that run the producer/consumer demonstration over one ring.
//!
//! A host owns the ring, starts a consumer worker bound to it, produces
//! `0..count` followed by [`SENTINEL`], and waits for the consumer to stop.
//! [`ThreadHost`] keeps both workers in one process; [`ProcessHost`] puts
//! the ring in a [`SharedRegion`](crate::SharedRegion) and runs the consumer
//! as a child process.

use crate::backoff::{Backoff, Waiter};
use crate::blocking::{BlockingConsumer, BlockingProducer};
use crate::error::HostError;
use crate::invariants::debug_assert_not_terminated;
use crate::park::ParkWaiter;
use crate::ring::{Consumer, Producer};
use crate::{Config, Metrics, RingBuffer, WaitStrategy};
use std::thread;
use tracing::{debug, info, trace};

#[cfg(target_os = "linux")]
use crate::region::SharedRegion;
#[cfg(target_os = "linux")]
use std::{ffi::OsString, io, os::fd::RawFd, process::Command, process::ExitStatus};
#[cfg(target_os = "linux")]
use tracing::warn;

/// End-of-stream marker. Never a legitimate payload.
pub const SENTINEL: i32 = -1;

/// Slots in the demonstration ring (10 usable).
pub const DEMO_SLOTS: usize = 11;

/// Default number of values produced before the sentinel.
pub const DEMO_COUNT: i32 = 50;

/// The ring used by both hosts.
pub type DemoRing = RingBuffer<i32, DEMO_SLOTS>;

/// Consumer progress through the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerState {
    WaitingForItem,
    Terminated,
}

impl ConsumerState {
    /// Transition on a dequeued value. The sentinel is terminal.
    #[inline]
    pub fn on_item(self, value: i32) -> Self {
        debug_assert_not_terminated!(self.is_terminated(), value);
        if value == SENTINEL {
            Self::Terminated
        } else {
            Self::WaitingForItem
        }
    }

    #[inline]
    pub fn is_terminated(self) -> bool {
        self == Self::Terminated
    }
}

/// What the consumer saw, sentinel excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsumerReport {
    pub values: Vec<i32>,
    pub metrics: Metrics,
}

impl ConsumerReport {
    /// Returns true if the values are exactly `0, 1, 2, ...`.
    pub fn is_contiguous_from_zero(&self) -> bool {
        self.values.iter().zip(0..).all(|(&value, expected)| value == expected)
    }
}

/// Outcome of one host run.
#[derive(Debug)]
pub struct HostReport {
    /// Values produced before the sentinel
    pub produced: usize,
    /// Consumer report, when the consumer ran in this process
    pub consumer: Option<ConsumerReport>,
    /// Exit status of the consumer process
    #[cfg(target_os = "linux")]
    pub exit: Option<ExitStatus>,
    pub producer_metrics: Metrics,
}

/// Consumer loop: dequeue until the sentinel arrives.
pub fn run_consumer<const N: usize, W: Waiter>(
    consumer: &mut BlockingConsumer<'_, i32, N, W>,
) -> ConsumerReport {
    let mut state = ConsumerState::WaitingForItem;
    let mut values = Vec::new();

    while !state.is_terminated() {
        let value = consumer.dequeue();
        trace!("{:x}", consumer.handle().snapshot());
        state = state.on_item(value);
        if state.is_terminated() {
            debug!("end of stream");
        } else {
            debug!(value, "consumed");
            values.push(value);
        }
    }

    ConsumerReport {
        values,
        metrics: consumer.metrics(),
    }
}

/// Producer loop: `0..count`, then the sentinel.
///
/// Returns the number of values produced, sentinel excluded.
pub fn run_producer<const N: usize, W: Waiter>(
    producer: &mut BlockingProducer<'_, i32, N, W>,
    count: i32,
) -> usize {
    let mut produced = 0;
    for value in 0..count {
        producer.enqueue(value);
        debug!(value, "produced");
        produced += 1;
    }
    producer.enqueue(SENTINEL);
    produced
}

/// Producer loop that gives up once `peer_alive` turns false while the ring
/// is full.
///
/// Returns `None` if the sentinel never made it into the ring.
pub fn run_producer_while<const N: usize, W: Waiter>(
    producer: &mut BlockingProducer<'_, i32, N, W>,
    count: i32,
    mut peer_alive: impl FnMut() -> bool,
) -> Option<usize> {
    let mut produced = 0;
    for value in 0..count {
        producer.enqueue_while(value, &mut peer_alive).ok()?;
        debug!(value, "produced");
        produced += 1;
    }
    producer.enqueue_while(SENTINEL, &mut peer_alive).ok()?;
    Some(produced)
}

// =============================================================================
// THREAD HOST
// =============================================================================

/// Runs the consumer on a scoped thread of this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadHost {
    config: Config,
}

impl ThreadHost {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Produces `0..count` plus the sentinel and waits for the consumer thread.
    pub fn run(&self, count: i32) -> Result<HostReport, HostError> {
        let mut ring = Box::new(DemoRing::new());
        let (producer, consumer) = ring.split();

        info!(wait = ?self.config.wait, count, "starting thread host");
        match self.config.wait {
            WaitStrategy::Poll => self.drive(
                producer,
                consumer,
                Backoff::for_producer(&self.config),
                Backoff::for_consumer(&self.config),
                count,
            ),
            WaitStrategy::Park => {
                let (producer_waiter, consumer_waiter) = ParkWaiter::pair(self.config.park_timeout);
                self.drive(producer, consumer, producer_waiter, consumer_waiter, count)
            }
        }
    }

    fn drive<W: Waiter + Send>(
        &self,
        producer: Producer<'_, i32, DEMO_SLOTS>,
        consumer: Consumer<'_, i32, DEMO_SLOTS>,
        producer_waiter: W,
        consumer_waiter: W,
        count: i32,
    ) -> Result<HostReport, HostError> {
        let enable_metrics = self.config.enable_metrics;
        let mut producer = BlockingProducer::new(producer, producer_waiter, enable_metrics);
        let mut consumer = BlockingConsumer::new(consumer, consumer_waiter, enable_metrics);

        thread::scope(|s| {
            let worker = thread::Builder::new()
                .name("ring-consumer".into())
                .spawn_scoped(s, move || run_consumer(&mut consumer))
                .map_err(HostError::Spawn)?;

            let produced = run_producer(&mut producer, count);
            let report = worker.join().map_err(|_| HostError::ConsumerPanicked)?;

            info!(produced, consumed = report.values.len(), "consumer finished");
            Ok(HostReport {
                produced,
                consumer: Some(report),
                #[cfg(target_os = "linux")]
                exit: None,
                producer_metrics: producer.metrics(),
            })
        })
    }
}

// =============================================================================
// PROCESS HOST
// =============================================================================

/// Runs the consumer as `program consume --shm-fd <fd>` over a shared region.
///
/// Only [`WaitStrategy::Poll`] can cross the process boundary.
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct ProcessHost {
    program: OsString,
    config: Config,
}

#[cfg(target_os = "linux")]
impl ProcessHost {
    pub fn new(program: impl Into<OsString>, config: Config) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    /// Produces `0..count` plus the sentinel and waits for the consumer process.
    pub fn run(&self, count: i32) -> Result<HostReport, HostError> {
        if self.config.wait != WaitStrategy::Poll {
            return Err(HostError::UnsupportedWait(self.config.wait));
        }

        let region = SharedRegion::<i32, DEMO_SLOTS>::create("shmring")?;

        let mut child = self
            .consumer_command(region.raw_fd())
            .spawn()
            .map_err(HostError::Spawn)?;
        info!(pid = child.id(), fd = region.raw_fd(), count, "consumer process started");

        // SAFETY: this is the only producer for the region's ring; the child
        // attaches the only consumer.
        let producer = unsafe { Producer::attach(region.ring()) };
        let mut producer = BlockingProducer::new(
            producer,
            Backoff::for_producer(&self.config),
            self.config.enable_metrics,
        );
        // The child is only polled while the ring is full
        let mut gone: Option<io::Result<ExitStatus>> = None;
        let produced = run_producer_while(&mut producer, count, || match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                gone = Some(Ok(status));
                false
            }
            Err(err) => {
                gone = Some(Err(err));
                false
            }
        });

        let Some(produced) = produced else {
            let status = match gone {
                Some(exit) => exit.map_err(HostError::Wait)?,
                None => child.wait().map_err(HostError::Wait)?,
            };
            warn!(%status, "consumer exited before the end of stream");
            return Err(if status.success() {
                HostError::ConsumerAbandoned(status)
            } else {
                HostError::ConsumerFailed(status)
            });
        };

        let status = child.wait().map_err(HostError::Wait)?;
        if !status.success() {
            return Err(HostError::ConsumerFailed(status));
        }
        info!(produced, %status, "consumer process finished");

        Ok(HostReport {
            produced,
            consumer: None,
            exit: Some(status),
            producer_metrics: producer.metrics(),
        })
    }

    /// `program consume --shm-fd <fd> --consumer-backoff-us <us> [--metrics]`
    fn consumer_command(&self, fd: RawFd) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("consume")
            .arg("--shm-fd")
            .arg(fd.to_string())
            .arg("--consumer-backoff-us")
            .arg(self.config.consumer_backoff.as_micros().to_string());
        if self.config.enable_metrics {
            command.arg("--metrics");
        }
        command
    }
}

/// Consumer side of [`ProcessHost`]: attaches to the inherited region and
/// runs the consumer loop.
///
/// # Safety
///
/// `fd` must be the region descriptor handed over by a running
/// [`ProcessHost`], owned by the caller, and no other consumer may attach to
/// the same region.
#[cfg(target_os = "linux")]
pub unsafe fn run_consumer_process(fd: RawFd, config: &Config) -> Result<ConsumerReport, HostError> {
    // SAFETY: forwarded from the caller.
    let region = unsafe { SharedRegion::<i32, DEMO_SLOTS>::attach(fd) }?;
    // SAFETY: forwarded from the caller; the host holds the only producer.
    let consumer = unsafe { Consumer::attach(region.ring()) };
    let mut consumer =
        BlockingConsumer::new(consumer, Backoff::for_consumer(config), config.enable_metrics);

    Ok(run_consumer(&mut consumer))
}
