use crate::backoff::Waiter;
use crate::ring::{Consumer, Producer};
use crate::Metrics;

/// Producer that keeps retrying until the item is in the ring.
///
/// There is no retry bound and no timeout: this only terminates because a
/// cooperating consumer eventually makes room.
pub struct BlockingProducer<'a, T, const N: usize, W> {
    handle: Producer<'a, T, N>,
    waiter: W,
    metrics: Metrics,
    enable_metrics: bool,
}

impl<'a, T: Copy + Default, const N: usize, W: Waiter> BlockingProducer<'a, T, N, W> {
    pub fn new(handle: Producer<'a, T, N>, waiter: W, enable_metrics: bool) -> Self {
        Self {
            handle,
            waiter,
            metrics: Metrics::new(),
            enable_metrics,
        }
    }

    /// Enqueues `item`, waiting while the ring is full.
    pub fn enqueue(&mut self, item: T) {
        let mut item = item;
        while let Err(rejected) = self.attempt(item) {
            item = rejected;
            self.wait();
        }
    }

    /// Enqueues `item`, waiting while the ring is full as long as
    /// `peer_alive` holds.
    ///
    /// `peer_alive` is asked after every failed attempt. Once it returns
    /// false the item is handed back and the ring is left unchanged.
    pub fn enqueue_while(
        &mut self,
        item: T,
        mut peer_alive: impl FnMut() -> bool,
    ) -> Result<(), T> {
        let mut item = item;
        while let Err(rejected) = self.attempt(item) {
            if !peer_alive() {
                return Err(rejected);
            }
            item = rejected;
            self.wait();
        }
        Ok(())
    }

    fn attempt(&mut self, item: T) -> Result<(), T> {
        self.handle.try_enqueue(item)?;
        self.waiter.wake_peer();
        if self.enable_metrics {
            self.metrics.record_completed();
        }
        Ok(())
    }

    fn wait(&mut self) {
        let outcome = self.waiter.wait();
        if self.enable_metrics {
            self.metrics.record_wait(outcome);
        }
    }

    /// Snapshot of this side's metrics (all zero unless enabled).
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// The underlying non-blocking handle.
    pub fn handle(&self) -> &Producer<'a, T, N> {
        &self.handle
    }
}

/// Consumer that keeps retrying until an item is available.
///
/// There is no retry bound and no timeout: this only terminates because a
/// cooperating producer eventually supplies an item.
pub struct BlockingConsumer<'a, T, const N: usize, W> {
    handle: Consumer<'a, T, N>,
    waiter: W,
    metrics: Metrics,
    enable_metrics: bool,
}

impl<'a, T: Copy + Default, const N: usize, W: Waiter> BlockingConsumer<'a, T, N, W> {
    pub fn new(handle: Consumer<'a, T, N>, waiter: W, enable_metrics: bool) -> Self {
        Self {
            handle,
            waiter,
            metrics: Metrics::new(),
            enable_metrics,
        }
    }

    /// Dequeues the oldest item, waiting while the ring is empty.
    pub fn dequeue(&mut self) -> T {
        loop {
            if let Some(item) = self.handle.try_dequeue() {
                self.waiter.wake_peer();
                if self.enable_metrics {
                    self.metrics.record_completed();
                }
                return item;
            }

            let outcome = self.waiter.wait();
            if self.enable_metrics {
                self.metrics.record_wait(outcome);
            }
        }
    }

    /// Snapshot of this side's metrics (all zero unless enabled).
    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// The underlying non-blocking handle.
    pub fn handle(&self) -> &Consumer<'a, T, N> {
        &self.handle
    }
}
