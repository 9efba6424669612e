//! Single-producer, single-consumer lock-free byte ring.
//!
//! The write index is only stored by the producer and the read index only by
//! the consumer. Both indices grow monotonically and wrap at `usize::MAX`;
//! their difference is the unread count and never exceeds the capacity.

use alloc::vec::Vec;
use core::cell::UnsafeCell;
use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::driver::error::{ConfigError, ConfigResult};

// =============================================================================
// Ring Buffer
// =============================================================================

/// Fixed-capacity circular byte store
///
/// Capacity is a power of two so slot positions are a mask of the index.
/// Writes beyond the free space are rejected; the returned count is the
/// number of bytes actually accepted.
///
/// # Example
///
/// ```ignore
/// let mut ring = RingBuffer::new(16)?;
/// assert_eq!(ring.write(b"0123456789"), 10);
///
/// let mut out = [0u8; 5];
/// assert_eq!(ring.read(&mut out), 5);
/// assert_eq!(&out, b"01234");
/// ```
pub struct RingBuffer {
    storage: Vec<UnsafeCell<u8>>,
    mask: usize,
    /// Where the next write starts. Stored by the producer only.
    write: AtomicUsize,
    /// Where the next read starts. Stored by the consumer only.
    read: AtomicUsize,
}

impl core::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

impl RingBuffer {
    /// Allocate a ring of `capacity` bytes
    ///
    /// # Errors
    /// - `InvalidConfig` - capacity is zero or not a power of two
    /// - `OutOfMemory` - the storage could not be allocated
    pub fn new(capacity: usize) -> ConfigResult<Self> {
        if !capacity.is_power_of_two() {
            return Err(ConfigError::InvalidConfig);
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| ConfigError::OutOfMemory)?;
        storage.resize_with(capacity, || UnsafeCell::new(0));

        Ok(Self {
            storage,
            mask: capacity - 1,
            write: AtomicUsize::new(0),
            read: AtomicUsize::new(0),
        })
    }

    /// Total capacity in bytes
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of unread bytes
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Check if there is nothing to read
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes a write can still accept
    #[inline]
    pub fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Check if a write would accept nothing
    #[inline]
    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Append as much of `data` as fits, returning the accepted count
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.push(data)
    }

    /// Move up to `buf.len()` unread bytes into `buf`, returning the count
    ///
    /// Reading an empty ring returns 0 and changes nothing.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.pop(buf)
    }

    /// Discard all unread bytes
    pub fn clear(&mut self) {
        self.write.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
    }

    /// Split into a producer and a consumer that may run in different
    /// execution contexts
    pub fn split(&mut self) -> (Producer<'_>, Consumer<'_>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    #[inline(always)]
    fn slots(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }

    fn push(&self, data: &[u8]) -> usize {
        let write = self.write.load(Ordering::Relaxed);
        let read = self.read.load(Ordering::Acquire);
        let free = self.capacity() - write.wrapping_sub(read);

        let count = data.len().min(free);
        if count == 0 {
            return 0;
        }

        let start = write & self.mask;
        let first = count.min(self.capacity() - start);

        // SAFETY: slots [write, write + count) are free. The consumer does not
        // touch them until the Release store below publishes the new index,
        // and only one producer exists.
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), self.slots().add(start), first);
            ptr::copy_nonoverlapping(data.as_ptr().add(first), self.slots(), count - first);
        }

        self.write.store(write.wrapping_add(count), Ordering::Release);
        count
    }

    fn pop(&self, buf: &mut [u8]) -> usize {
        let read = self.read.load(Ordering::Relaxed);
        let write = self.write.load(Ordering::Acquire);
        let available = write.wrapping_sub(read);

        let count = buf.len().min(available);
        if count == 0 {
            return 0;
        }

        let start = read & self.mask;
        let first = count.min(self.capacity() - start);

        // SAFETY: slots [read, read + count) were published by the producer's
        // Release store, which the Acquire load above synchronizes with. The
        // producer does not reuse them until the read index moves past them.
        unsafe {
            ptr::copy_nonoverlapping(self.slots().add(start), buf.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(self.slots(), buf.as_mut_ptr().add(first), count - first);
        }

        self.read.store(read.wrapping_add(count), Ordering::Release);
        count
    }
}

// =============================================================================
// Split Handles
// =============================================================================

/// Write half of a split [`RingBuffer`]
#[derive(Debug)]
pub struct Producer<'a> {
    ring: &'a RingBuffer,
}

/// Read half of a split [`RingBuffer`]
#[derive(Debug)]
pub struct Consumer<'a> {
    ring: &'a RingBuffer,
}

// SAFETY: split() hands out exactly one Producer and one Consumer per ring,
// each only stores its own index, and slot access is ordered by the
// Acquire/Release pairs on the indices.
unsafe impl Send for Producer<'_> {}
// SAFETY: see Producer.
unsafe impl Send for Consumer<'_> {}

impl Producer<'_> {
    /// Append as much of `data` as fits, returning the accepted count
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.ring.push(data)
    }

    /// Number of bytes a write can still accept
    pub fn free(&self) -> usize {
        self.ring.free()
    }
}

impl Consumer<'_> {
    /// Move up to `buf.len()` unread bytes into `buf`, returning the count
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.ring.pop(buf)
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Check if there is nothing to read
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
