//! Receive engine: DMA staging buffer to ring buffer.

use alloc::vec::Vec;

use super::ring::RingBuffer;
use crate::driver::config::DmaMode;
use crate::driver::error::{ConfigError, ConfigResult, HwResult, IoError, IoResult};
use crate::hal::UartHardware;

/// Bytes moved by one notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Copied {
    /// Bytes the ring accepted
    pub accepted: usize,
    /// Bytes the ring rejected because it was full
    pub dropped: usize,
}

/// Receive engine for one channel
///
/// The DMA writes into the staging buffer; each notification copies the
/// bytes between `head` and the DMA's current position into the ring and
/// advances `head`. `head` always stays below the staging size.
#[derive(Debug)]
pub struct RxEngine {
    staging: Vec<u8>,
    head: usize,
    ring: RingBuffer,
    mode: DmaMode,
}

impl RxEngine {
    /// Allocate a staging buffer of `buf_size` bytes and a ring of
    /// `fifo_size` bytes
    ///
    /// # Errors
    /// - `InvalidConfig` - zero staging size or non power-of-two ring
    /// - `OutOfMemory` - allocation failed
    pub fn new(buf_size: usize, fifo_size: usize, mode: DmaMode) -> ConfigResult<Self> {
        if buf_size == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        let ring = RingBuffer::new(fifo_size)?;

        let mut staging = Vec::new();
        staging
            .try_reserve_exact(buf_size)
            .map_err(|_| ConfigError::OutOfMemory)?;
        staging.resize(buf_size, 0);

        Ok(Self {
            staging,
            head: 0,
            ring,
            mode,
        })
    }

    /// Staging buffer size
    #[inline(always)]
    pub fn buf_size(&self) -> usize {
        self.staging.len()
    }

    /// Ring capacity
    #[inline(always)]
    pub fn fifo_size(&self) -> usize {
        self.ring.capacity()
    }

    /// Offset of the next staging byte not yet copied
    #[inline(always)]
    pub fn head(&self) -> usize {
        self.head
    }

    /// DMA mode the engine was built for
    #[inline(always)]
    pub fn mode(&self) -> DmaMode {
        self.mode
    }

    /// Unread bytes in the ring
    #[inline]
    pub fn available(&self) -> usize {
        self.ring.len()
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Idle line: copy up to the DMA's current position
    ///
    /// A position at the very end of the staging buffer is left to the
    /// full-transfer notification that accompanies it.
    pub fn on_idle(&mut self, dma_remaining: usize) -> Copied {
        let size = self.buf_size();
        let position = size - dma_remaining.min(size);
        if position == size {
            return Copied::default();
        }
        self.copy_to(position)
    }

    /// Half transfer: copy up to the midpoint (rounded up)
    pub fn on_half(&mut self) -> Copied {
        let size = self.buf_size();
        self.copy_to(size / 2 + (size & 1))
    }

    /// Full transfer: copy up to the end and wrap `head` to 0
    pub fn on_full(&mut self) -> Copied {
        let size = self.buf_size();
        let copied = self.copy_to(size);
        self.head = 0;
        copied
    }

    /// Copy everything the DMA has written so far, a completed pass included
    ///
    /// Used before reception is aborted and re-armed from offset 0.
    pub fn drain(&mut self, dma_remaining: usize) -> Copied {
        let size = self.buf_size();
        self.copy_to(size - dma_remaining.min(size))
    }

    fn copy_to(&mut self, end: usize) -> Copied {
        if end <= self.head {
            return Copied::default();
        }
        let chunk = &self.staging[self.head..end];
        let accepted = self.ring.write(chunk);
        let copied = Copied {
            accepted,
            dropped: chunk.len() - accepted,
        };
        self.head = end % self.staging.len();
        copied
    }

    // =========================================================================
    // DMA Control
    // =========================================================================

    /// Start reception over the whole staging buffer and reset `head`
    pub fn arm<H: UartHardware>(&mut self, hw: &mut H) -> HwResult {
        self.head = 0;
        let len = self.staging.len();
        // SAFETY: the staging buffer is owned by this engine and is never
        // reallocated while it exists; the channel aborts RX DMA before the
        // engine is dropped.
        unsafe { hw.start_rx_dma(self.staging.as_mut_ptr(), len) }
    }

    /// Arm reception, retrying at most `retries` times
    ///
    /// # Errors
    /// - `RearmFailed` - every attempt was rejected by the hardware
    pub fn rearm<H: UartHardware>(&mut self, hw: &mut H, retries: u8) -> IoResult<()> {
        for _attempt in 0..retries {
            match self.arm(hw) {
                Ok(()) => return Ok(()),
                Err(_e) => {
                    #[cfg(feature = "defmt")]
                    defmt::debug!("RX re-arm attempt {} failed: {}", _attempt, _e);
                    hw.abort_rx_dma();
                }
            }
        }
        Err(IoError::RearmFailed)
    }

    // =========================================================================
    // Consumer Side
    // =========================================================================

    /// Move unread bytes into `buf`, returning the count
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.ring.read(buf)
    }

    /// Discard unread bytes and reset `head`
    pub fn clear(&mut self) {
        self.ring.clear();
        self.head = 0;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
