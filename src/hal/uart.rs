//! UART hardware backend trait
//!
//! A [`UartHardware`] implementation owns one serial port and its DMA
//! channels. The transport engine drives it through this trait only, so the
//! same engine runs on the STM32F1 register backend and on host mocks.

use embedded_hal::delay::DelayNs;

use crate::driver::config::DmaMode;
use crate::driver::error::HwResult;
use crate::driver::interrupt::LineErrors;
use crate::internal::constants::POLL_INTERVAL_US;

// =============================================================================
// Hardware Trait
// =============================================================================

/// Register-level operations on one serial port and its DMA channels
///
/// # Safety contract of the DMA methods
///
/// `start_rx_dma` and `start_tx_dma` hand a raw buffer to the DMA engine.
/// The caller keeps the buffer alive and unmoved until the matching abort,
/// the next start, or deinit. The engine's owned staging buffers satisfy
/// this because they are only reallocated while the channel is
/// uninitialized.
pub trait UartHardware {
    /// Check if the port is already enabled
    fn is_enabled(&self) -> bool;

    /// Enable clocks and program line parameters
    fn init(&mut self, baud_rate: u32) -> HwResult;

    /// Disable the port and gate its clock
    fn deinit(&mut self) -> HwResult;

    /// Claim and configure the RX DMA channel
    fn init_rx_dma(&mut self, mode: DmaMode) -> HwResult;

    /// Release the RX DMA channel
    fn deinit_rx_dma(&mut self) -> HwResult;

    /// Claim and configure the TX DMA channel
    fn init_tx_dma(&mut self) -> HwResult;

    /// Release the TX DMA channel
    fn deinit_tx_dma(&mut self) -> HwResult;

    /// Enable or disable the idle-line interrupt
    fn enable_idle_interrupt(&mut self, enabled: bool);

    /// Start reception into `len` bytes at `buf`
    ///
    /// # Safety
    /// `buf..buf+len` must stay valid and unaliased for DMA writes until the
    /// transfer is aborted or restarted.
    unsafe fn start_rx_dma(&mut self, buf: *mut u8, len: usize) -> HwResult;

    /// Bytes the RX DMA has not yet written in the current pass
    fn rx_dma_remaining(&self) -> usize;

    /// Stop RX DMA
    fn abort_rx_dma(&mut self);

    /// Start transmission of `len` bytes at `buf`
    ///
    /// # Safety
    /// `buf..buf+len` must stay valid and unmodified until the transfer
    /// completes or is aborted.
    unsafe fn start_tx_dma(&mut self, buf: *const u8, len: usize) -> HwResult;

    /// Stop TX DMA
    fn abort_tx_dma(&mut self);

    /// Check if the last transmission has fully left the line
    fn transmission_complete(&self) -> bool;

    /// Clear the given line error flags
    fn clear_line_errors(&mut self, errors: LineErrors);

    /// Check if the transmit data register can take a byte
    fn tx_ready(&self) -> bool;

    /// Write one byte to the transmit data register
    fn write_byte(&mut self, byte: u8);

    /// Check if the receive data register holds a byte
    fn rx_ready(&self) -> bool;

    /// Read one byte from the receive data register
    fn read_byte(&mut self) -> u8;

    /// Check and clear the idle-line flag
    fn take_idle(&mut self) -> bool;
}

// =============================================================================
// Bounded Waits
// =============================================================================

/// Poll `ready` every [`POLL_INTERVAL_US`] until it returns true or
/// `timeout_us` elapses
///
/// Returns `true` if the condition was met.
pub(crate) fn wait_until<D, F>(delay: &mut D, timeout_us: u32, mut ready: F) -> bool
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    let mut elapsed: u32 = 0;
    loop {
        if ready() {
            return true;
        }
        if elapsed >= timeout_us {
            return false;
        }
        delay.delay_us(POLL_INTERVAL_US);
        elapsed = elapsed.saturating_add(POLL_INTERVAL_US);
    }
}
