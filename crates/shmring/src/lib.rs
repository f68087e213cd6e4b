//! shmring - Single-Producer Single-Consumer Circular Buffer over Shared Memory
//!
//! A fixed-capacity ring with one producer and one consumer that may live in
//! different threads or in different processes. Full and empty are told apart
//! without a counter by always leaving one slot unused, so each side writes
//! exactly one index and no read-modify-write atomics are needed.
//!
//! # Key Features
//!
//! - `#[repr(C)]`, pointer-free ring that can be placed in shared memory
//! - Single-writer discipline carried by non-`Clone` producer/consumer handles
//! - Blocking wrappers with pluggable waiting (interval polling or parking)
//! - Shared regions passed to a child process by file descriptor (Linux)
//!
//! # Example
//!
//! ```
//! use shmring::{Backoff, BlockingConsumer, BlockingProducer, Config, RingBuffer};
//! use std::thread;
//!
//! let config = Config::default();
//! let mut ring = RingBuffer::<i32, 11>::new();
//! let (producer, consumer) = ring.split();
//!
//! let mut producer = BlockingProducer::new(producer, Backoff::for_producer(&config), false);
//! let mut consumer = BlockingConsumer::new(consumer, Backoff::for_consumer(&config), false);
//!
//! thread::scope(|s| {
//!     s.spawn(move || {
//!         for i in 0..20 {
//!             producer.enqueue(i);
//!         }
//!     });
//!
//!     for i in 0..20 {
//!         assert_eq!(consumer.dequeue(), i);
//!     }
//! });
//! ```

mod backoff;
mod blocking;
mod config;
mod error;
mod host;
mod invariants;
mod metrics;
mod park;
#[cfg(target_os = "linux")]
mod region;
mod ring;

pub use backoff::{Backoff, Role, WaitOutcome, Waiter};
pub use blocking::{BlockingConsumer, BlockingProducer};
pub use config::{Config, WaitStrategy, EVENT_DRIVEN_CONFIG, LEGACY_CONFIG};
pub use error::{HostError, RegionError};
pub use host::{
    run_consumer, run_producer, run_producer_while, ConsumerReport, ConsumerState, DemoRing,
    HostReport, ThreadHost, DEMO_COUNT, DEMO_SLOTS, SENTINEL,
};
#[cfg(target_os = "linux")]
pub use host::{run_consumer_process, ProcessHost};
pub use metrics::Metrics;
pub use park::ParkWaiter;
#[cfg(target_os = "linux")]
pub use region::{SharedPayload, SharedRegion};
pub use ring::{Consumer, Producer, RingBuffer, RingSnapshot};
