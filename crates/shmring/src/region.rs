//! A memory region shared by two processes, holding exactly one ring.
//!
//! The region is an anonymous memory file (`memfd_create`) mapped
//! `MAP_SHARED`. The creating process passes the file descriptor to the other
//! process, which maps the same pages with [`SharedRegion::attach`]. Nothing is
//! global: the descriptor is the handle.
//!
//! ```text
//! ┌─────────────────────────────┬──────────────────────────────┐
//! │ RegionHeader                │ RingBuffer<T, N>             │
//! │ magic, version, slots, size │ front, back, slots[N]        │
//! └─────────────────────────────┴──────────────────────────────┘
//! ```

use crate::error::RegionError;
use crate::RingBuffer;
use memmap2::{MmapMut, MmapOptions};
use std::ffi::CString;
use std::fmt;
use std::fs::File;
use std::io;
use std::marker::PhantomData;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, RawFd};

/// Payload types that may live in memory shared with another process.
///
/// # Safety
///
/// Implementors must be plain data: no pointers, references or handles, no
/// `Drop`, and every bit pattern written by a value of the type must read
/// back as a valid value in the other process.
pub unsafe trait SharedPayload: Copy + Default + Send + 'static {}

macro_rules! impl_shared_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            // SAFETY: fixed-width integers are plain data valid for every bit pattern.
            unsafe impl SharedPayload for $ty {}
        )*
    };
}

impl_shared_payload!(i8, i16, i32, i64, u8, u16, u32, u64, isize, usize);

const MAGIC: u64 = 0x5348_4D52_494E_4731; // "SHMRING1"
const VERSION: u32 = 1;

#[repr(C)]
struct RegionHeader {
    magic: u64,
    version: u32,
    slots: u32,
    slot_size: u32,
}

impl RegionHeader {
    fn describe<T, const N: usize>() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            slots: N as u32,
            slot_size: mem::size_of::<T>() as u32,
        }
    }

    fn validate<T, const N: usize>(&self) -> Result<(), RegionError> {
        if self.magic != MAGIC {
            return Err(RegionError::BadMagic { found: self.magic });
        }

        let expected = Self::describe::<T, N>();
        for (field, want, got) in [
            ("version", expected.version, self.version),
            ("slot count", expected.slots, self.slots),
            ("slot size", expected.slot_size, self.slot_size),
        ] {
            if want != got {
                return Err(RegionError::LayoutMismatch {
                    field,
                    expected: want,
                    found: got,
                });
            }
        }
        Ok(())
    }
}

#[repr(C)]
struct RegionLayout<T, const N: usize> {
    header: RegionHeader,
    ring: RingBuffer<T, N>,
}

/// Owner of one mapping of a shared region.
///
/// Each process holds its own `SharedRegion`; the mapping is released when it
/// is dropped. The creator must keep it alive until the other process is done.
pub struct SharedRegion<T, const N: usize> {
    map: MmapMut,
    file: File,
    _payload: PhantomData<T>,
}

impl<T: SharedPayload, const N: usize> SharedRegion<T, N> {
    /// Bytes needed for the header and one ring.
    pub const SIZE: usize = mem::size_of::<RegionLayout<T, N>>();

    /// Creates a new region and initializes an empty ring in it.
    ///
    /// The descriptor is created without close-on-exec so that a spawned
    /// consumer process inherits it.
    pub fn create(name: &str) -> Result<Self, RegionError> {
        let name = CString::new(name)
            .map_err(|err| RegionError::Create(io::Error::new(io::ErrorKind::InvalidInput, err)))?;

        // SAFETY: `name` is a valid NUL-terminated string.
        let fd = unsafe { libc::memfd_create(name.as_ptr(), 0) };
        if fd < 0 {
            return Err(RegionError::Create(io::Error::last_os_error()));
        }
        // SAFETY: `fd` was just returned by memfd_create and is owned by nobody else.
        let file = unsafe { File::from_raw_fd(fd) };
        file.set_len(Self::SIZE as u64).map_err(RegionError::Resize)?;

        // SAFETY: the memfd is private to this process until it is handed to
        // the consumer, and it is never truncated after this point.
        let mut map = unsafe { MmapOptions::new().len(Self::SIZE).map_mut(&file) }
            .map_err(RegionError::Map)?;

        let layout = map.as_mut_ptr().cast::<RegionLayout<T, N>>();
        // SAFETY: the mapping is page aligned, SIZE bytes long and not yet
        // visible to any other process.
        unsafe {
            layout.write(RegionLayout {
                header: RegionHeader::describe::<T, N>(),
                ring: RingBuffer::new(),
            });
        }

        tracing::debug!(fd, bytes = Self::SIZE, slots = N, "shared region created");

        Ok(Self {
            map,
            file,
            _payload: PhantomData,
        })
    }

    /// Maps a region created by another process and validates its header.
    ///
    /// # Safety
    ///
    /// `fd` must be an open descriptor owned by the caller (ownership moves to
    /// the region) that refers to a region created by [`SharedRegion::create`]
    /// and still initialized by its creator.
    pub unsafe fn attach(fd: RawFd) -> Result<Self, RegionError> {
        if fd < 0 {
            return Err(RegionError::BadDescriptor(fd));
        }
        // SAFETY: the caller transfers ownership of `fd`, which is non-negative.
        let file = unsafe { File::from_raw_fd(fd) };

        let found = file.metadata().map_err(RegionError::Resize)?.len();
        if found < Self::SIZE as u64 {
            return Err(RegionError::TooSmall {
                expected: Self::SIZE,
                found,
            });
        }

        // SAFETY: the creator never truncates the region while it is shared.
        let map = unsafe { MmapOptions::new().len(Self::SIZE).map_mut(&file) }
            .map_err(RegionError::Map)?;

        let region = Self {
            map,
            file,
            _payload: PhantomData,
        };
        region.layout().header.validate::<T, N>()?;

        tracing::debug!(fd, bytes = Self::SIZE, slots = N, "shared region attached");
        Ok(region)
    }

    fn layout(&self) -> &RegionLayout<T, N> {
        // SAFETY: the mapping is SIZE bytes, page aligned, and was initialized
        // by `create` (validated by `attach`). All shared mutation inside the
        // ring goes through atomics or `UnsafeCell`.
        unsafe { &*self.map.as_ptr().cast::<RegionLayout<T, N>>() }
    }

    /// The ring living in this region.
    pub fn ring(&self) -> &RingBuffer<T, N> {
        &self.layout().ring
    }

    /// Descriptor to hand to the other process.
    pub fn raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl<T, const N: usize> fmt::Debug for SharedRegion<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("fd", &self.file.as_raw_fd())
            .field("bytes", &self.map.len())
            .field("slots", &N)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{Consumer, Producer};

    fn dup(fd: RawFd) -> RawFd {
        // SAFETY: `fd` is open for the duration of the call.
        let copy = unsafe { libc::dup(fd) };
        assert!(copy >= 0, "dup failed: {}", io::Error::last_os_error());
        copy
    }

    #[test]
    fn test_create_starts_empty() {
        let region = SharedRegion::<i32, 11>::create("shmring-test").unwrap();

        let ring = region.ring();
        assert!(ring.is_empty());
        assert_eq!(ring.front(), 1);
        assert_eq!(ring.back(), 0);
        assert_eq!(ring.capacity(), 10);
    }

    #[test]
    fn test_two_mappings_share_the_ring() {
        let creator = SharedRegion::<i32, 11>::create("shmring-test").unwrap();
        // SAFETY: the duplicate descriptor refers to the region just created.
        let attached = unsafe { SharedRegion::<i32, 11>::attach(dup(creator.raw_fd())) }.unwrap();

        // SAFETY: one producer on one mapping, one consumer on the other.
        let mut producer = unsafe { Producer::attach(creator.ring()) };
        let mut consumer = unsafe { Consumer::attach(attached.ring()) };

        for i in 0..5 {
            producer.try_enqueue(i).unwrap();
        }
        assert_eq!(attached.ring().len(), 5);

        let received: Vec<i32> = std::iter::from_fn(|| consumer.try_dequeue()).collect();
        assert_eq!(received, vec![0, 1, 2, 3, 4]);
        assert!(creator.ring().is_empty());
    }

    #[test]
    fn test_attach_rejects_other_layout() {
        let creator = SharedRegion::<i32, 11>::create("shmring-test").unwrap();

        // Same width, same layout
        let same = unsafe { SharedRegion::<u32, 11>::attach(dup(creator.raw_fd())) };
        assert!(same.is_ok());

        let err = unsafe { SharedRegion::<i32, 7>::attach(dup(creator.raw_fd())) }.unwrap_err();
        assert!(matches!(
            err,
            RegionError::LayoutMismatch { field: "slot count", expected: 7, found: 11 }
        ));

        let err = unsafe { SharedRegion::<u8, 11>::attach(dup(creator.raw_fd())) }.unwrap_err();
        assert!(matches!(
            err,
            RegionError::LayoutMismatch { field: "slot size", expected: 1, found: 4 }
        ));
    }

    #[test]
    fn test_attach_rejects_negative_descriptor() {
        let err = unsafe { SharedRegion::<i32, 11>::attach(-1) }.unwrap_err();
        assert!(matches!(err, RegionError::BadDescriptor(-1)));
    }

    #[test]
    fn test_debug_shows_descriptor_and_size() {
        let region = SharedRegion::<i32, 11>::create("shmring-test").unwrap();

        let rendered = format!("{region:?}");
        assert!(rendered.contains(&format!("fd: {}", region.raw_fd())));
        assert!(rendered.contains(&format!("bytes: {}", SharedRegion::<i32, 11>::SIZE)));
    }

    #[test]
    fn test_attach_rejects_small_object() {
        // SAFETY: plain memfd creation for the test.
        let fd = unsafe { libc::memfd_create(c"shmring-small".as_ptr(), 0) };
        assert!(fd >= 0);

        let err = unsafe { SharedRegion::<i32, 11>::attach(fd) }.unwrap_err();
        assert!(matches!(err, RegionError::TooSmall { found: 0, .. }));
    }

    #[test]
    fn test_attach_rejects_bad_magic() {
        // SAFETY: plain memfd creation for the test.
        let fd = unsafe { libc::memfd_create(c"shmring-garbage".as_ptr(), 0) };
        assert!(fd >= 0);
        // SAFETY: fd is owned here; set_len zero-fills the object.
        let file = unsafe { File::from_raw_fd(fd) };
        file.set_len(SharedRegion::<i32, 11>::SIZE as u64).unwrap();

        let err = unsafe { SharedRegion::<i32, 11>::attach(dup(file.as_raw_fd())) }.unwrap_err();
        assert!(matches!(err, RegionError::BadMagic { found: 0 }));
    }
}
