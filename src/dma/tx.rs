//! Transmit engine: two linear staging buffers flushed alternately by DMA.

use alloc::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::error::{ConfigError, ConfigResult, IoError, IoResult};
use crate::hal::UartHardware;
use crate::hal::uart::wait_until;

/// Transmit engine for one channel
///
/// `write` appends without wraparound into the fill buffer; `flush` waits for
/// the previous transfer, hands the fill buffer to the DMA in one transfer
/// and swaps. The buffer the DMA is reading is never written, so `write`
/// keeps accepting bytes while a transfer is on the wire.
#[derive(Debug)]
pub struct TxEngine {
    staging: [Vec<u8>; 2],
    /// Index of the buffer `write` fills
    fill: usize,
    len: usize,
    /// A transfer was launched and may still be reading `staging[fill ^ 1]`
    in_flight: bool,
}

impl TxEngine {
    /// Allocate two staging buffers of `capacity` bytes each
    ///
    /// # Errors
    /// - `InvalidConfig` - zero capacity
    /// - `OutOfMemory` - allocation failed
    pub fn new(capacity: usize) -> ConfigResult<Self> {
        if capacity == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(Self {
            staging: [alloc_staging(capacity)?, alloc_staging(capacity)?],
            fill: 0,
            len: 0,
            in_flight: false,
        })
    }

    /// Staging capacity of one buffer
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.staging[self.fill].len()
    }

    /// Bytes staged and not yet flushed
    #[inline(always)]
    pub fn pending(&self) -> usize {
        self.len
    }

    /// Bytes `write` can still accept
    #[inline(always)]
    pub fn free(&self) -> usize {
        self.capacity() - self.len
    }

    /// Check if the last launched transfer is still on the wire
    pub fn is_busy<H: UartHardware>(&self, hw: &H) -> bool {
        self.in_flight && !hw.transmission_complete()
    }

    /// Append as much of `data` as fits, returning the accepted count
    pub fn write(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free());
        let start = self.len;
        self.staging[self.fill][start..start + count].copy_from_slice(&data[..count]);
        self.len += count;
        count
    }

    /// Launch one DMA transfer of everything staged
    ///
    /// Waits up to `timeout_us` for the previous transfer to complete. The
    /// new transfer runs asynchronously and `write` moves on to the other
    /// buffer. Returns the number of bytes sent, 0 if nothing was staged.
    ///
    /// # Errors
    /// - `Timeout` - the previous transfer did not complete in time; the
    ///   staged bytes are kept
    /// - `Hardware` - the DMA rejected the transfer; the staged bytes are kept
    pub fn flush<H, D>(&mut self, hw: &mut H, delay: &mut D, timeout_us: u32) -> IoResult<usize>
    where
        H: UartHardware,
        D: DelayNs,
    {
        if self.len == 0 {
            return Ok(0);
        }

        if !wait_until(delay, timeout_us, || hw.transmission_complete()) {
            return Err(IoError::Timeout);
        }

        let sent = self.len;
        // SAFETY: the buffer is owned by this engine and not written again
        // until the next flush has seen this transfer complete. The channel
        // aborts TX DMA before the engine is dropped.
        unsafe { hw.start_tx_dma(self.staging[self.fill].as_ptr(), sent) }
            .map_err(|_| IoError::Hardware)?;
        self.fill ^= 1;
        self.len = 0;
        self.in_flight = true;
        Ok(sent)
    }

    /// Drop everything staged
    pub fn clear(&mut self) {
        self.len = 0;
    }
}

fn alloc_staging(capacity: usize) -> ConfigResult<Vec<u8>> {
    let mut staging = Vec::new();
    staging
        .try_reserve_exact(capacity)
        .map_err(|_| ConfigError::OutOfMemory)?;
    staging.resize(capacity, 0);
    Ok(staging)
}

// =============================================================================
// Unit Tests
// =============================================================================
