//! Error types for region setup and host lifecycle.

use crate::WaitStrategy;
use std::io;
use std::process::ExitStatus;
use thiserror::Error;

/// Errors creating or attaching a shared memory region.
#[derive(Debug, Error)]
pub enum RegionError {
    /// The shared memory object could not be created.
    #[error("failed to create shared memory object: {0}")]
    Create(#[source] io::Error),

    /// The handed-over descriptor cannot refer to an open file.
    #[error("invalid shared memory descriptor {0}")]
    BadDescriptor(i32),

    /// The shared memory object could not be sized or inspected.
    #[error("failed to size shared memory object: {0}")]
    Resize(#[source] io::Error),

    /// `mmap` failed.
    #[error("failed to map shared memory: {0}")]
    Map(#[source] io::Error),

    /// The object is smaller than one ring.
    #[error("shared region is {found} bytes, expected at least {expected}")]
    TooSmall {
        /// Bytes needed for header and ring.
        expected: usize,
        /// Bytes actually present.
        found: u64,
    },

    /// The header does not start with the region magic.
    #[error("shared region has bad magic {found:#018x}")]
    BadMagic {
        /// The value found in place of the magic.
        found: u64,
    },

    /// The header describes a different ring layout.
    #[error("shared region {field} mismatch: expected {expected}, found {found}")]
    LayoutMismatch {
        /// Which header field differs.
        field: &'static str,
        /// Value for this process's ring type.
        expected: u32,
        /// Value stored in the header.
        found: u32,
    },
}

/// Fatal host errors. None of these are retried.
#[derive(Debug, Error)]
pub enum HostError {
    /// The shared region could not be set up.
    #[error("shared region: {0}")]
    Region(#[from] RegionError),

    /// The consumer worker could not be started.
    #[error("failed to start consumer: {0}")]
    Spawn(#[source] io::Error),

    /// Waiting for the consumer worker failed.
    #[error("failed waiting for consumer to exit: {0}")]
    Wait(#[source] io::Error),

    /// The consumer thread panicked.
    #[error("consumer worker panicked")]
    ConsumerPanicked,

    /// The consumer process exited unsuccessfully.
    #[error("consumer exited with {0}")]
    ConsumerFailed(ExitStatus),

    /// The consumer process exited cleanly without draining the stream.
    #[error("consumer exited with {0} before the end of stream")]
    ConsumerAbandoned(ExitStatus),

    /// The wait strategy cannot reach the other worker.
    #[error("{0:?} waiting needs both workers in one process")]
    UnsupportedWait(WaitStrategy),
}

impl HostError {
    /// Returns `true` if the failure happened before the consumer started.
    #[inline]
    pub fn is_setup(&self) -> bool {
        matches!(self, Self::Region(_) | Self::Spawn(_) | Self::UnsupportedWait(_))
    }
}
