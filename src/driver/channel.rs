//! UART transport channel
//!
//! A [`Channel`] is one physical serial port's combined receive and transmit
//! engine state: its hardware backend, a delay provider for bounded waits,
//! the configuration, and the DMA engines and scratch buffer it owns while
//! initialized.

use alloc::vec::Vec;
use core::fmt;

use embedded_hal::delay::DelayNs;

use super::config::{ChannelConfig, DmaMode, PortId, State};
use super::error::{ConfigError, ConfigResult, DeinitError, IoError, IoResult, ResizeError};
use super::interrupt::{LineErrors, UartEvents};
use crate::dma::{Copied, RxEngine, TxEngine};
use crate::format::{ScanArg, render, scan};
use crate::hal::UartHardware;
use crate::hal::uart::wait_until;
use crate::internal::constants::{MAX_DMA_TRANSFER, POLL_INTERVAL_US};

// =============================================================================
// Statistics
// =============================================================================

/// Counters kept by a channel across its lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelStats {
    /// Received bytes the ring rejected because it was full
    pub rx_dropped: u32,
    /// Parity errors recovered
    pub parity_errors: u32,
    /// Noise errors recovered
    pub noise_errors: u32,
    /// Framing errors recovered
    pub framing_errors: u32,
    /// Overrun errors recovered
    pub overrun_errors: u32,
    /// RX DMA transfer errors recovered
    pub dma_errors: u32,
    /// Times RX DMA could not be re-armed within the retry bound
    pub rearm_failures: u32,
}

impl ChannelStats {
    /// All-zero counters
    pub const fn new() -> Self {
        Self {
            rx_dropped: 0,
            parity_errors: 0,
            noise_errors: 0,
            framing_errors: 0,
            overrun_errors: 0,
            dma_errors: 0,
            rearm_failures: 0,
        }
    }

    /// Total line errors of every kind
    pub fn line_errors(&self) -> u32 {
        self.parity_errors
            .saturating_add(self.noise_errors)
            .saturating_add(self.framing_errors)
            .saturating_add(self.overrun_errors)
    }

    fn count_line_errors(&mut self, errors: LineErrors) {
        if errors.parity {
            self.parity_errors = self.parity_errors.saturating_add(1);
        }
        if errors.noise {
            self.noise_errors = self.noise_errors.saturating_add(1);
        }
        if errors.framing {
            self.framing_errors = self.framing_errors.saturating_add(1);
        }
        if errors.overrun {
            self.overrun_errors = self.overrun_errors.saturating_add(1);
        }
    }
}

// =============================================================================
// Channel
// =============================================================================

/// One serial port's transport engine
///
/// # Type Parameters
/// * `H` - Hardware backend for the port
/// * `D` - Delay provider pacing every bounded wait
///
/// # Execution contexts
///
/// The interrupt entry points ([`on_interrupt`](Self::on_interrupt) and the
/// `on_rx_*` handlers) are the RX producer; [`read`](Self::read),
/// [`write`](Self::write) and [`flush`](Self::flush) belong to the task
/// side. All of them take `&mut self`: put the channel in a
/// [`SharedChannel`](crate::sync::SharedChannel) or a framework resource
/// to reach it from both.
///
/// # Example
///
/// ```ignore
/// let uart = unsafe { Stm32f1Uart::new(PortId::Usart1, 72_000_000) };
/// let mut channel = Channel::new(PortId::Usart1, uart, delay, ChannelConfig::new());
/// channel.init(115_200)?;
///
/// channel.write(b"hello\r\n");
/// channel.flush()?;
///
/// let mut buf = [0u8; 64];
/// let n = channel.read(&mut buf);
/// ```
pub struct Channel<H: UartHardware, D: DelayNs> {
    port: PortId,
    hw: H,
    delay: D,
    config: ChannelConfig,
    state: State,
    rx: Option<RxEngine>,
    tx: Option<TxEngine>,
    scratch: Vec<u8>,
    stats: ChannelStats,
    rx_stalled: bool,
}

impl<H: UartHardware, D: DelayNs> Channel<H, D> {
    /// Create an uninitialized channel
    ///
    /// This is a const function suitable for static initialization. No
    /// buffer is allocated until [`init`](Self::init).
    pub const fn new(port: PortId, hw: H, delay: D, config: ChannelConfig) -> Self {
        Self {
            port,
            hw,
            delay,
            config,
            state: State::Uninitialized,
            rx: None,
            tx: None,
            scratch: Vec::new(),
            stats: ChannelStats::new(),
            rx_stalled: false,
        }
    }

    // =========================================================================
    // State Accessors
    // =========================================================================

    /// Port this channel drives
    #[inline(always)]
    pub fn port(&self) -> PortId {
        self.port
    }

    /// Current lifecycle state
    #[inline(always)]
    pub fn state(&self) -> State {
        self.state
    }

    /// Check if the channel is initialized
    #[inline(always)]
    pub fn is_initialized(&self) -> bool {
        self.state == State::Initialized
    }

    /// Active configuration
    #[inline(always)]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Lifetime counters
    #[inline(always)]
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Check if RX DMA could not be re-armed and reception has stopped
    ///
    /// Cleared by a successful [`restart_rx`](Self::restart_rx) or re-init.
    #[inline(always)]
    pub fn rx_stalled(&self) -> bool {
        self.rx_stalled
    }

    /// Shared access to the hardware backend
    #[inline(always)]
    pub fn hardware(&self) -> &H {
        &self.hw
    }

    /// Exclusive access to the hardware backend
    #[inline(always)]
    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Configured RX staging buffer size
    pub fn rx_buffer_size(&self) -> usize {
        self.config.rx_buf_size
    }

    /// Configured RX ring capacity
    pub fn rx_fifo_size(&self) -> usize {
        self.config.rx_fifo_size
    }

    /// Configured TX staging buffer size
    pub fn tx_buffer_size(&self) -> usize {
        self.config.tx_buf_size
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Initialize the port at `baud_rate`
    ///
    /// Buffers are allocated first, then the port and its DMA channels are
    /// brought up and reception is armed. Any failure releases everything
    /// acquired so far.
    ///
    /// # Errors
    /// - `AlreadyInitialized` - the channel or the port hardware is already enabled
    /// - `InvalidConfig` - the configuration failed validation
    /// - `OutOfMemory` - a buffer could not be allocated
    /// - `HardwareInitFailed` - the port rejected initialization
    /// - `DmaInitFailed` - a DMA channel could not be set up or armed
    pub fn init(&mut self, baud_rate: u32) -> ConfigResult<()> {
        if self.state != State::Uninitialized || self.hw.is_enabled() {
            return Err(ConfigError::AlreadyInitialized);
        }

        let config = self.config.clone().with_baud_rate(baud_rate);
        config.validate()?;

        let mut rx = if config.rx_dma {
            Some(RxEngine::new(config.rx_buf_size, config.rx_fifo_size, config.rx_mode)?)
        } else {
            None
        };
        let tx = if config.tx_dma {
            Some(TxEngine::new(config.tx_buf_size)?)
        } else {
            None
        };
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(config.scratch_size)
            .map_err(|_| ConfigError::OutOfMemory)?;
        scratch.resize(config.scratch_size, 0);

        self.hw
            .init(baud_rate)
            .map_err(|_| ConfigError::HardwareInitFailed)?;

        if let Err(e) = self.init_dma(&config, rx.as_mut(), tx.is_some()) {
            self.release_hardware(&config);
            return Err(e);
        }

        self.config = config;
        self.rx = rx;
        self.tx = tx;
        self.scratch = scratch;
        self.rx_stalled = false;
        self.state = State::Initialized;

        #[cfg(feature = "defmt")]
        defmt::info!(
            "{} initialized: baud={} rx_dma={} tx_dma={}",
            self.port,
            baud_rate,
            self.config.rx_dma,
            self.config.tx_dma
        );

        Ok(())
    }

    fn init_dma(
        &mut self,
        config: &ChannelConfig,
        rx: Option<&mut RxEngine>,
        tx_dma: bool,
    ) -> ConfigResult<()> {
        if let Some(rx) = rx {
            self.hw
                .init_rx_dma(config.rx_mode)
                .map_err(|_| ConfigError::DmaInitFailed)?;
            rx.arm(&mut self.hw)
                .map_err(|_| ConfigError::DmaInitFailed)?;
            self.hw.enable_idle_interrupt(true);
        }
        if tx_dma {
            self.hw
                .init_tx_dma()
                .map_err(|_| ConfigError::DmaInitFailed)?;
        }
        Ok(())
    }

    /// Best-effort teardown after a failed init
    fn release_hardware(&mut self, config: &ChannelConfig) {
        if config.rx_dma {
            self.hw.enable_idle_interrupt(false);
            self.hw.abort_rx_dma();
            let _ = self.hw.deinit_rx_dma();
        }
        if config.tx_dma {
            let _ = self.hw.deinit_tx_dma();
        }
        let _ = self.hw.deinit();
    }

    /// Deinitialize the port
    ///
    /// In-flight transfers are aborted without draining and all buffers are
    /// released. The channel ends up uninitialized even when a teardown step
    /// reports failure.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel was not initialized
    /// - `Failed` - the port rejected deinitialization
    /// - `DmaFailed` - a DMA channel could not be released
    pub fn deinit(&mut self) -> Result<(), DeinitError> {
        if self.state != State::Initialized {
            return Err(DeinitError::NotInitialized);
        }

        let mut dma_ok = true;
        if self.rx.is_some() {
            self.hw.enable_idle_interrupt(false);
            self.hw.abort_rx_dma();
            dma_ok &= self.hw.deinit_rx_dma().is_ok();
        }
        if self.tx.is_some() {
            self.hw.abort_tx_dma();
            dma_ok &= self.hw.deinit_tx_dma().is_ok();
        }
        let hw_ok = self.hw.deinit().is_ok();

        self.rx = None;
        self.tx = None;
        self.scratch = Vec::new();
        self.state = State::Uninitialized;

        #[cfg(feature = "defmt")]
        defmt::info!("{} deinitialized", self.port);

        if !hw_ok {
            return Err(DeinitError::Failed);
        }
        if !dma_ok {
            return Err(DeinitError::DmaFailed);
        }
        Ok(())
    }

    /// Change the RX staging and ring sizes used by the next init
    ///
    /// # Errors
    /// - `DmaNotEnabled` - the channel has no RX DMA
    /// - `ChannelBusy` - the channel is initialized
    /// - `InvalidSize` - zero size, staging larger than a DMA transfer, or a
    ///   ring capacity that is not a power of two
    pub fn resize(&mut self, buf_size: usize, fifo_size: usize) -> Result<(), ResizeError> {
        if !self.config.rx_dma {
            return Err(ResizeError::DmaNotEnabled);
        }
        if self.state != State::Uninitialized {
            return Err(ResizeError::ChannelBusy);
        }
        if buf_size == 0 || buf_size > MAX_DMA_TRANSFER || !fifo_size.is_power_of_two() {
            return Err(ResizeError::InvalidSize);
        }
        self.config.rx_buf_size = buf_size;
        self.config.rx_fifo_size = fifo_size;
        Ok(())
    }

    /// Change the TX staging size used by the next init
    ///
    /// # Errors
    /// - `DmaNotEnabled` - the channel has no TX DMA
    /// - `ChannelBusy` - the channel is initialized
    /// - `InvalidSize` - zero size or larger than a DMA transfer
    pub fn resize_tx(&mut self, size: usize) -> Result<(), ResizeError> {
        if !self.config.tx_dma {
            return Err(ResizeError::DmaNotEnabled);
        }
        if self.state != State::Uninitialized {
            return Err(ResizeError::ChannelBusy);
        }
        if size == 0 || size > MAX_DMA_TRANSFER {
            return Err(ResizeError::InvalidSize);
        }
        self.config.tx_buf_size = size;
        Ok(())
    }

    // =========================================================================
    // Receive
    // =========================================================================

    /// Move received bytes into `buf`, returning the count
    ///
    /// Only the ring is consulted; 0 means nothing is waiting.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.rx.as_mut().map_or(0, |rx| rx.read(buf))
    }

    /// Received bytes waiting in the ring
    pub fn available(&self) -> usize {
        self.rx.as_ref().map_or(0, RxEngine::available)
    }

    /// Copy whatever the DMA has produced so far into the ring
    ///
    /// Lets a caller make progress without waiting for the idle notification,
    /// e.g. when polling with interrupts masked. Returns the bytes accepted.
    pub fn poll_rx(&mut self) -> usize {
        let Some(rx) = self.rx.as_mut() else {
            return 0;
        };
        let copied = rx.on_idle(self.hw.rx_dma_remaining());
        Self::account(&mut self.stats, copied)
    }

    /// Blocking receive until the line goes idle, `buf` is full or the
    /// blocking timeout expires
    ///
    /// Used on ports without RX DMA.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - no byte arrived within the blocking timeout
    pub fn receive_to_idle(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }

        let timeout_us = self.config.blocking_timeout_us;
        let mut elapsed: u32 = 0;
        let mut count = 0;
        while count < buf.len() {
            if self.hw.rx_ready() {
                buf[count] = self.hw.read_byte();
                count += 1;
                continue;
            }
            if count > 0 && self.hw.take_idle() {
                break;
            }
            if elapsed >= timeout_us {
                if count == 0 {
                    return Err(IoError::Timeout);
                }
                break;
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            elapsed = elapsed.saturating_add(POLL_INTERVAL_US);
        }
        Ok(count)
    }

    // =========================================================================
    // Transmit
    // =========================================================================

    /// Stage bytes for the next [`flush`](Self::flush), returning the
    /// accepted count
    ///
    /// Accepts up to the remaining staging capacity, also while a previous
    /// transfer is on the wire. Accepts nothing when the channel has no TX
    /// DMA.
    pub fn write(&mut self, data: &[u8]) -> usize {
        self.tx.as_mut().map_or(0, |tx| tx.write(data))
    }

    /// Check if a launched TX transfer has not completed yet
    pub fn tx_busy(&self) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.is_busy(&self.hw))
    }

    /// Send everything staged as one DMA transfer
    ///
    /// Waits for the previous transfer only; the new one runs in the
    /// background. Returns the bytes sent, 0 if nothing was staged.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - the previous transfer did not complete; staged bytes are kept
    /// - `Hardware` - the DMA rejected the transfer; staged bytes are kept
    pub fn flush(&mut self) -> IoResult<usize> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }
        match self.tx.as_mut() {
            Some(tx) => tx.flush(&mut self.hw, &mut self.delay, self.config.tx_timeout_us),
            None => Ok(0),
        }
    }

    /// Bytes staged and not yet flushed
    pub fn pending(&self) -> usize {
        self.tx.as_ref().map_or(0, TxEngine::pending)
    }

    /// Byte-by-byte send through the data register
    ///
    /// The whole call is bounded by the blocking timeout. Returns the bytes
    /// sent.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - the transmitter stopped accepting bytes
    pub fn send_blocking(&mut self, data: &[u8]) -> IoResult<usize> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }

        let timeout_us = self.config.blocking_timeout_us;
        let mut elapsed: u32 = 0;
        for &byte in data {
            while !self.hw.tx_ready() {
                if elapsed >= timeout_us {
                    return Err(IoError::Timeout);
                }
                self.delay.delay_us(POLL_INTERVAL_US);
                elapsed = elapsed.saturating_add(POLL_INTERVAL_US);
            }
            self.hw.write_byte(byte);
        }
        Ok(data.len())
    }

    /// Push all of `data` out, flushing as the staging fills
    ///
    /// The final chunk stays staged; call [`flush`](Self::flush) to send it.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - a previous transfer did not complete, or a blocking
    ///   send stalled
    /// - `Hardware` - the DMA rejected a transfer
    pub fn write_all(&mut self, data: &[u8]) -> IoResult<()> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }
        if self.tx.is_none() {
            return self.send_blocking(data).map(|_| ());
        }

        let mut offset = 0;
        loop {
            offset += self.write(&data[offset..]);
            if offset == data.len() {
                return Ok(());
            }
            // Staging is full; flush always frees a whole buffer
            self.flush()?;
        }
    }

    fn wait_tx_idle(&mut self) -> bool {
        let hw = &self.hw;
        wait_until(&mut self.delay, self.config.tx_timeout_us, || {
            hw.transmission_complete()
        })
    }

    // =========================================================================
    // Formatted I/O
    // =========================================================================

    /// Formatted output
    ///
    /// Renders into the channel's scratch buffer (cut at its size), waits for
    /// the transmitter to be idle, then sends through TX DMA if enabled or
    /// byte-by-byte otherwise. Returns the length the full output would have
    /// had. See also [`uart_printf!`](crate::uart_printf).
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - the transmitter did not become idle, or a blocking send stalled
    pub fn printf(&mut self, args: fmt::Arguments<'_>) -> IoResult<usize> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }
        if !self.wait_tx_idle() {
            return Err(IoError::Timeout);
        }

        let mut scratch = core::mem::take(&mut self.scratch);
        let rendered = render(&mut scratch, args);
        let result = self
            .write_all(&scratch[..rendered.written])
            .and_then(|()| self.flush());
        self.scratch = scratch;

        result.map(|_| rendered.total)
    }

    /// Formatted input
    ///
    /// Waits until received bytes are available (RX DMA) or performs a
    /// blocking receive-to-idle (no RX DMA), takes up to the scratch size of
    /// input, and parses it against `format`. Returns the number of
    /// arguments assigned.
    ///
    /// # Errors
    /// - `NotInitialized` - the channel is not initialized
    /// - `Timeout` - no input arrived in time
    /// - `Format` - input ended before the first conversion, or `format` and
    ///   `args` disagree
    pub fn scanf(&mut self, format: &str, args: &mut [ScanArg<'_>]) -> IoResult<usize> {
        if !self.is_initialized() {
            return Err(IoError::NotInitialized);
        }

        let mut scratch = core::mem::take(&mut self.scratch);
        let received = if self.rx.is_some() {
            self.wait_rx_data().map(|()| self.read(&mut scratch))
        } else {
            self.receive_to_idle(&mut scratch)
        };
        let result = received.and_then(|len| scan(&scratch[..len], format, args));
        self.scratch = scratch;

        result
    }

    fn wait_rx_data(&mut self) -> IoResult<()> {
        let timeout_us = self.config.rx_timeout_us;
        let mut elapsed: u32 = 0;
        loop {
            self.poll_rx();
            if self.available() > 0 {
                return Ok(());
            }
            if elapsed >= timeout_us {
                return Err(IoError::Timeout);
            }
            self.delay.delay_us(POLL_INTERVAL_US);
            elapsed = elapsed.saturating_add(POLL_INTERVAL_US);
        }
    }

    // =========================================================================
    // Interrupt Handling
    // =========================================================================

    /// Dispatch pending events
    ///
    /// Line errors and DMA transfer errors take precedence: recovery drains
    /// and re-arms reception, which covers any half, full or idle event
    /// raised alongside.
    ///
    /// # Errors
    /// - `RearmFailed` - RX DMA could not be re-armed; see [`rx_stalled`](Self::rx_stalled)
    pub fn on_interrupt(&mut self, events: UartEvents) -> IoResult<()> {
        if events.dma_error {
            self.count_dma_error();
        }
        if events.has_error() {
            return self.on_line_error(events.errors);
        }
        if events.dma_error {
            return self.recover_rx();
        }
        if events.rx_half {
            self.on_rx_half();
        }
        if events.rx_full {
            self.on_rx_full()?;
        }
        if events.idle {
            self.on_rx_idle();
        }
        Ok(())
    }

    /// Idle line: copy up to the DMA's current position
    pub fn on_rx_idle(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        let copied = rx.on_idle(self.hw.rx_dma_remaining());
        Self::account(&mut self.stats, copied);

        #[cfg(feature = "defmt")]
        defmt::trace!("{} rx idle: {} bytes, head={}", self.port, copied.accepted, rx.head());
    }

    /// Half transfer: copy up to the middle of the staging buffer
    pub fn on_rx_half(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return;
        };
        let copied = rx.on_half();
        Self::account(&mut self.stats, copied);

        #[cfg(feature = "defmt")]
        defmt::trace!("{} rx half: {} bytes", self.port, copied.accepted);
    }

    /// Full transfer: copy up to the end; re-arm when running one-shot
    ///
    /// # Errors
    /// - `RearmFailed` - the retry bound was exhausted
    pub fn on_rx_full(&mut self) -> IoResult<()> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(());
        };
        let copied = rx.on_full();
        Self::account(&mut self.stats, copied);

        #[cfg(feature = "defmt")]
        defmt::trace!("{} rx full: {} bytes", self.port, copied.accepted);

        if rx.mode() == DmaMode::OneShot {
            return self.rearm_rx();
        }
        Ok(())
    }

    /// Recover from receive line errors
    ///
    /// Clears the flags, keeps every byte already landed, then restarts
    /// reception from the start of the staging buffer.
    ///
    /// # Errors
    /// - `RearmFailed` - the retry bound was exhausted
    pub fn on_line_error(&mut self, errors: LineErrors) -> IoResult<()> {
        self.stats.count_line_errors(errors);
        self.hw.clear_line_errors(errors);

        #[cfg(feature = "defmt")]
        defmt::warn!("{} line error: {}", self.port, errors);

        self.recover_rx()
    }

    /// Recover from an RX DMA transfer error
    ///
    /// The controller stops the channel on a bus error. Bytes it wrote before
    /// stopping are kept and reception restarts from the start of the staging
    /// buffer.
    ///
    /// # Errors
    /// - `RearmFailed` - the retry bound was exhausted
    pub fn on_rx_dma_error(&mut self) -> IoResult<()> {
        self.count_dma_error();
        self.recover_rx()
    }

    fn count_dma_error(&mut self) {
        self.stats.dma_errors = self.stats.dma_errors.saturating_add(1);

        #[cfg(feature = "defmt")]
        defmt::warn!("{} RX DMA transfer error", self.port);
    }

    /// Drain up to the DMA position, stop the channel and re-arm it
    fn recover_rx(&mut self) -> IoResult<()> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(());
        };
        let copied = rx.drain(self.hw.rx_dma_remaining());
        Self::account(&mut self.stats, copied);
        self.hw.abort_rx_dma();
        self.rearm_rx()
    }

    /// Re-arm a stalled receiver
    ///
    /// # Errors
    /// - `NotInitialized` - the channel has no active RX DMA
    /// - `RearmFailed` - the retry bound was exhausted
    pub fn restart_rx(&mut self) -> IoResult<()> {
        if !self.is_initialized() || self.rx.is_none() {
            return Err(IoError::NotInitialized);
        }
        self.hw.abort_rx_dma();
        self.rearm_rx()
    }

    fn rearm_rx(&mut self) -> IoResult<()> {
        let Some(rx) = self.rx.as_mut() else {
            return Ok(());
        };
        match rx.rearm(&mut self.hw, self.config.rearm_retries) {
            Ok(()) => {
                self.rx_stalled = false;
                Ok(())
            }
            Err(e) => {
                self.rx_stalled = true;
                self.stats.rearm_failures = self.stats.rearm_failures.saturating_add(1);

                #[cfg(feature = "defmt")]
                defmt::error!(
                    "{} RX DMA re-arm failed after {} attempts",
                    self.port,
                    self.config.rearm_retries
                );

                Err(e)
            }
        }
    }

    fn account(stats: &mut ChannelStats, copied: Copied) -> usize {
        if copied.dropped > 0 {
            let dropped = u32::try_from(copied.dropped).unwrap_or(u32::MAX);
            stats.rx_dropped = stats.rx_dropped.saturating_add(dropped);
        }
        copied.accepted
    }
}

impl<H: UartHardware, D: DelayNs> Drop for Channel<H, D> {
    fn drop(&mut self) {
        // DMA must stop before the buffers it points into are freed
        if self.state == State::Initialized {
            self.hw.abort_rx_dma();
            self.hw.abort_tx_dma();
        }
    }
}

impl<H: UartHardware, D: DelayNs> fmt::Write for Channel<H, D> {
    /// Stage `s` for TX DMA (flushing as the staging fills), or send it
    /// byte-by-byte on ports without TX DMA
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}

impl<H: UartHardware, D: DelayNs> fmt::Debug for Channel<H, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("port", &self.port)
            .field("state", &self.state)
            .field("available", &self.available())
            .field("pending", &self.pending())
            .field("rx_stalled", &self.rx_stalled)
            .field("stats", &self.stats)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use core::fmt::Write as _;

    use super::*;
    use crate::test_utils::{MockDelay, MockUart};

    type TestChannel = Channel<MockUart, MockDelay>;

    fn channel(config: ChannelConfig) -> TestChannel {
        Channel::new(PortId::Usart1, MockUart::new(), MockDelay::new(), config)
    }

    fn ready(config: ChannelConfig) -> TestChannel {
        let mut ch = channel(config);
        ch.init(115_200).unwrap();
        ch
    }

    fn small() -> ChannelConfig {
        ChannelConfig::new()
            .with_rx_sizes(10, 16)
            .with_tx_buf_size(8)
            .with_scratch_size(32)
    }

    // --- lifecycle ---

    #[test]
    fn init_brings_up_port_and_arms_rx() {
        let ch = ready(small());

        assert!(ch.is_initialized());
        assert!(ch.hardware().is_initialized());
        assert_eq!(ch.hardware().baud_rate(), 115_200);
        assert!(ch.hardware().rx_dma_initialized());
        assert!(ch.hardware().tx_dma_initialized());
        assert!(ch.hardware().rx_armed());
        assert!(ch.hardware().idle_interrupt_enabled());
        assert_eq!(ch.config().baud_rate, 115_200);
    }

    #[test]
    fn init_twice_is_already_initialized() {
        let mut ch = ready(small());
        assert_eq!(ch.init(9600), Err(ConfigError::AlreadyInitialized));
    }

    #[test]
    fn init_on_enabled_hardware_is_already_initialized() {
        let mut ch = channel(small());
        ch.hardware_mut().set_enabled(true);
        assert_eq!(ch.init(9600), Err(ConfigError::AlreadyInitialized));
        assert!(!ch.is_initialized());
    }

    #[test]
    fn init_reports_distinct_failures() {
        let mut ch = channel(small());
        ch.hardware_mut().fail_init();
        assert_eq!(ch.init(9600), Err(ConfigError::HardwareInitFailed));

        let mut ch = channel(small());
        ch.hardware_mut().fail_rx_dma_init();
        assert_eq!(ch.init(9600), Err(ConfigError::DmaInitFailed));
        assert!(!ch.hardware().is_initialized());

        let mut ch = channel(small());
        ch.hardware_mut().fail_tx_dma_init();
        assert_eq!(ch.init(9600), Err(ConfigError::DmaInitFailed));
        assert!(!ch.hardware().rx_dma_initialized());

        let mut ch = channel(small().with_rx_sizes(10, 12));
        assert_eq!(ch.init(9600), Err(ConfigError::InvalidConfig));
        assert!(!ch.hardware().is_initialized());
    }

    #[test]
    fn init_fails_when_rx_cannot_be_armed() {
        let mut ch = channel(small());
        ch.hardware_mut().fail_rx_starts(1);
        assert_eq!(ch.init(9600), Err(ConfigError::DmaInitFailed));
        assert_eq!(ch.state(), State::Uninitialized);
    }

    #[test]
    fn deinit_releases_everything() {
        let mut ch = ready(small());
        ch.write(b"abc");

        assert_eq!(ch.deinit(), Ok(()));
        assert_eq!(ch.state(), State::Uninitialized);
        assert!(!ch.hardware().is_initialized());
        assert!(!ch.hardware().rx_armed());
        assert_eq!(ch.hardware().tx_aborts(), 1);
        assert_eq!(ch.pending(), 0);
        assert_eq!(ch.available(), 0);

        assert_eq!(ch.deinit(), Err(DeinitError::NotInitialized));
    }

    #[test]
    fn deinit_reports_failures_but_still_tears_down() {
        let mut ch = ready(small());
        ch.hardware_mut().fail_deinit();
        assert_eq!(ch.deinit(), Err(DeinitError::Failed));
        assert_eq!(ch.state(), State::Uninitialized);

        let mut ch = ready(small());
        ch.hardware_mut().fail_dma_deinit();
        assert_eq!(ch.deinit(), Err(DeinitError::DmaFailed));
        assert_eq!(ch.state(), State::Uninitialized);
    }

    #[test]
    fn resize_rejected_while_initialized_accepted_after() {
        let mut ch = ready(small());
        assert_eq!(ch.resize(64, 64), Err(ResizeError::ChannelBusy));
        assert_eq!(ch.resize_tx(64), Err(ResizeError::ChannelBusy));

        ch.deinit().unwrap();
        assert_eq!(ch.resize(64, 128), Ok(()));
        assert_eq!(ch.resize_tx(32), Ok(()));
        assert_eq!(ch.rx_buffer_size(), 64);
        assert_eq!(ch.rx_fifo_size(), 128);
        assert_eq!(ch.tx_buffer_size(), 32);

        ch.init(115_200).unwrap();
        ch.hardware_mut().receive(&[7u8; 40]);
        ch.on_rx_idle();
        assert_eq!(ch.available(), 40);
    }

    #[test]
    fn resize_validates_arguments() {
        let mut ch = channel(small());
        assert_eq!(ch.resize(0, 64), Err(ResizeError::InvalidSize));
        assert_eq!(ch.resize(64, 0), Err(ResizeError::InvalidSize));
        assert_eq!(ch.resize(64, 100), Err(ResizeError::InvalidSize));
        assert_eq!(ch.resize(MAX_DMA_TRANSFER + 1, 64), Err(ResizeError::InvalidSize));
        assert_eq!(ch.resize_tx(0), Err(ResizeError::InvalidSize));
    }

    #[test]
    fn resize_without_dma_is_rejected() {
        let mut ch = channel(ChannelConfig::blocking());
        assert_eq!(ch.resize(64, 64), Err(ResizeError::DmaNotEnabled));
        assert_eq!(ch.resize_tx(64), Err(ResizeError::DmaNotEnabled));
    }

    // --- receive ---

    #[test]
    fn idle_notification_moves_bytes_to_read() {
        let mut ch = ready(small());
        let mut buf = [0u8; 16];

        assert_eq!(ch.read(&mut buf), 0);

        let events = ch.hardware_mut().receive(b"abc");
        ch.on_interrupt(events).unwrap();

        assert_eq!(ch.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
        assert_eq!(ch.read(&mut buf), 0);
    }

    #[test]
    fn circular_reception_across_wraps() {
        let mut ch = ready(small());
        let mut out = alloc::vec::Vec::new();
        let mut buf = [0u8; 16];

        for chunk in [&b"01234"[..], &b"5678"[..], &b"9abcd"[..], &b"efg"[..]] {
            let events = ch.hardware_mut().receive(chunk);
            ch.on_interrupt(events).unwrap();
            let n = ch.read(&mut buf);
            out.extend_from_slice(&buf[..n]);
        }

        assert_eq!(out, b"0123456789abcdefg");
        assert_eq!(ch.stats().rx_dropped, 0);
    }

    #[test]
    fn one_shot_full_rearms_and_keeps_receiving() {
        let mut ch = ready(small().with_rx_mode(DmaMode::OneShot).with_rx_sizes(4, 16));
        let mut buf = [0u8; 16];

        let events = ch.hardware_mut().receive(b"wxyz");
        assert!(events.rx_full);
        ch.on_interrupt(events).unwrap();
        assert!(ch.hardware().rx_armed());

        let events = ch.hardware_mut().receive(b"!");
        ch.on_interrupt(events).unwrap();

        let n = ch.read(&mut buf);
        assert_eq!(&buf[..n], b"wxyz!");
        assert_eq!(ch.hardware().rx_lost(), 0);
    }

    #[test]
    fn one_shot_rearm_failure_escalates() {
        let mut ch = ready(
            small()
                .with_rx_mode(DmaMode::OneShot)
                .with_rx_sizes(4, 16)
                .with_rearm_retries(2),
        );
        ch.hardware_mut().fail_rx_starts(10);

        let events = ch.hardware_mut().receive(b"wxyz");
        assert_eq!(ch.on_interrupt(events), Err(IoError::RearmFailed));
        assert!(ch.rx_stalled());
        assert_eq!(ch.stats().rearm_failures, 1);
        // Bytes landed before the failure are still delivered
        assert_eq!(ch.available(), 4);

        ch.hardware_mut().fail_rx_starts(0);
        assert_eq!(ch.restart_rx(), Ok(()));
        assert!(!ch.rx_stalled());
    }

    #[test]
    fn line_error_recovery_resyncs_head() {
        let mut ch = ready(small());
        let mut buf = [0u8; 16];

        let events = ch.hardware_mut().receive(b"abc");
        ch.on_interrupt(events).unwrap();
        ch.hardware_mut().receive(b"de");

        let events = UartEvents {
            errors: LineErrors {
                overrun: true,
                framing: true,
                ..LineErrors::default()
            },
            ..UartEvents::default()
        };
        ch.on_interrupt(events).unwrap();

        assert_eq!(ch.hardware().cleared_errors(), &[events.errors]);
        assert_eq!(ch.stats().overrun_errors, 1);
        assert_eq!(ch.stats().framing_errors, 1);
        assert_eq!(ch.stats().line_errors(), 2);
        assert_eq!(ch.hardware().rx_aborts(), 1);
        assert!(ch.hardware().rx_armed());
        assert_eq!(ch.hardware().rx_dma_remaining(), 10);

        let events = ch.hardware_mut().receive(b"fg");
        ch.on_interrupt(events).unwrap();

        let n = ch.read(&mut buf);
        assert_eq!(&buf[..n], b"abcdefg");
    }

    #[test]
    fn dma_transfer_error_rearms_reception() {
        let mut ch = ready(small());
        let mut buf = [0u8; 16];

        let events = ch.hardware_mut().receive(b"abc");
        ch.on_interrupt(events).unwrap();
        ch.hardware_mut().receive(b"de");

        let events = ch.hardware_mut().dma_error();
        ch.hardware_mut().receive(b"xy");
        assert!(!ch.hardware().rx_armed());
        assert_eq!(ch.hardware().rx_lost(), 2);

        ch.on_interrupt(events).unwrap();

        assert_eq!(ch.stats().dma_errors, 1);
        assert_eq!(ch.stats().line_errors(), 0);
        assert_eq!(ch.hardware().rx_aborts(), 1);
        assert!(ch.hardware().rx_armed());
        assert!(!ch.rx_stalled());
        assert_eq!(ch.hardware().rx_dma_remaining(), 10);

        let events = ch.hardware_mut().receive(b"fg");
        ch.on_interrupt(events).unwrap();

        let n = ch.read(&mut buf);
        assert_eq!(&buf[..n], b"abcdefg");
    }

    #[test]
    fn dma_transfer_error_rearm_failure_stalls() {
        let mut ch = ready(small().with_rearm_retries(2));
        ch.hardware_mut().fail_rx_starts(10);

        assert_eq!(ch.on_rx_dma_error(), Err(IoError::RearmFailed));
        assert_eq!(ch.stats().dma_errors, 1);
        assert_eq!(ch.stats().rearm_failures, 1);
        assert!(ch.rx_stalled());
    }

    #[test]
    fn ring_overflow_counts_dropped_bytes() {
        let mut ch = ready(small().with_rx_sizes(10, 4));

        let events = ch.hardware_mut().receive(b"abcdef");
        ch.on_interrupt(events).unwrap();

        assert_eq!(ch.available(), 4);
        assert_eq!(ch.stats().rx_dropped, 2);
    }

    #[test]
    fn poll_rx_copies_without_notification() {
        let mut ch = ready(small());
        ch.hardware_mut().receive(b"xy");

        assert_eq!(ch.poll_rx(), 2);
        assert_eq!(ch.available(), 2);
    }

    #[test]
    fn receive_to_idle_blocking() {
        let mut ch = ready(ChannelConfig::blocking().with_blocking_timeout_us(100));
        let mut buf = [0u8; 8];

        ch.hardware_mut().queue_rx(b"ping");
        assert_eq!(ch.receive_to_idle(&mut buf), Ok(4));
        assert_eq!(&buf[..4], b"ping");

        assert_eq!(ch.receive_to_idle(&mut buf), Err(IoError::Timeout));
    }

    // --- transmit ---

    #[test]
    fn write_then_flush_scenario() {
        let mut ch = ready(small());

        assert_eq!(ch.write(b"abcd"), 4);
        assert_eq!(ch.write(b"efghij"), 4);
        assert_eq!(ch.flush(), Ok(8));
        assert_eq!(ch.pending(), 0);
        assert_eq!(ch.hardware().tx_log(), b"abcdefgh");
        assert_eq!(ch.flush(), Ok(0));
    }

    #[test]
    fn write_accepted_while_transfer_in_flight() {
        let mut ch = ready(small());
        ch.hardware_mut().set_tx_auto_complete(false);

        assert_eq!(ch.write(b"hello"), 5);
        assert_eq!(ch.flush(), Ok(5));
        assert!(ch.tx_busy());

        assert_eq!(ch.write(b"world"), 5);
        assert_eq!(ch.pending(), 5);

        ch.hardware_mut().complete_tx();
        assert_eq!(ch.flush(), Ok(5));
        assert_eq!(ch.hardware().tx_log(), b"helloworld");
    }

    #[test]
    fn flush_waits_for_prior_transfer_and_keeps_staged_bytes() {
        let mut ch = ready(small().with_tx_timeout_us(50));
        ch.hardware_mut().set_tx_auto_complete(false);

        ch.write(b"one");
        ch.flush().unwrap();
        ch.write(b"two");

        assert_eq!(ch.flush(), Err(IoError::Timeout));
        assert_eq!(ch.pending(), 3);
        assert!(ch.delay.total_us() >= 50);
    }

    #[test]
    fn stuck_transfer_bounds_long_writes() {
        let mut ch = ready(small().with_tx_timeout_us(50));
        ch.hardware_mut().set_tx_auto_complete(false);

        assert!(write!(ch, "{}", "0123456789abcdefghij").is_err());
        assert_eq!(ch.hardware().tx_log(), b"01234567");
        assert_eq!(ch.pending(), 8);
        assert!(ch.delay.total_us() >= 50);
    }

    #[test]
    fn write_all_pushes_everything_through_small_staging() {
        let mut ch = ready(small());

        assert_eq!(ch.write_all(b"0123456789abcdefghij"), Ok(()));
        ch.flush().unwrap();

        assert_eq!(ch.hardware().tx_log(), b"0123456789abcdefghij");
        assert_eq!(ch.hardware().tx_transfers(), 3);
        assert_eq!(channel(small()).write_all(b"x"), Err(IoError::NotInitialized));
    }

    #[test]
    fn flush_requires_init() {
        let mut ch = channel(small());
        assert_eq!(ch.flush(), Err(IoError::NotInitialized));
        assert_eq!(ch.write(b"x"), 0);
    }

    #[test]
    fn fmt_write_splits_across_flushes() {
        let mut ch = ready(small());

        write!(ch, "{}", "0123456789ab").unwrap();
        ch.flush().unwrap();

        assert_eq!(ch.hardware().tx_log(), b"0123456789ab");
        assert_eq!(ch.hardware().tx_transfers(), 2);
    }

    #[test]
    fn fmt_write_without_dma_sends_blocking() {
        let mut ch = ready(ChannelConfig::blocking());
        write!(ch, "v={}", 3).unwrap();
        assert_eq!(ch.hardware().blocking_tx(), b"v=3");
    }

    // --- formatted I/O ---

    #[test]
    fn printf_over_dma() {
        let mut ch = ready(small());

        let n = crate::uart_printf!(ch, "rpm={} err={}\r\n", 1500, -3).unwrap();

        assert_eq!(n, 17);
        assert_eq!(ch.hardware().tx_log(), b"rpm=1500 err=-3\r\n");
    }

    #[test]
    fn printf_truncates_to_scratch_and_reports_full_length() {
        let mut ch = ready(small().with_scratch_size(4));

        let n = ch.printf(format_args!("{}", "abcdefgh")).unwrap();

        assert_eq!(n, 8);
        assert_eq!(ch.hardware().tx_log(), b"abcd");
    }

    #[test]
    fn printf_without_dma_is_blocking() {
        let mut ch = ready(ChannelConfig::blocking());
        ch.printf(format_args!("ok")).unwrap();
        assert_eq!(ch.hardware().blocking_tx(), b"ok");
    }

    #[test]
    fn printf_blocking_send_times_out() {
        let mut ch = ready(ChannelConfig::blocking().with_blocking_timeout_us(100));
        ch.hardware_mut().set_tx_ready(false);
        assert_eq!(ch.printf(format_args!("x")), Err(IoError::Timeout));
    }

    #[test]
    fn printf_waits_for_idle_transmitter() {
        let mut ch = ready(small().with_tx_timeout_us(100));
        ch.hardware_mut().set_tx_auto_complete(false);
        ch.write(b"a");
        ch.flush().unwrap();

        assert_eq!(ch.printf(format_args!("b")), Err(IoError::Timeout));
        assert!(ch.delay.total_us() >= 100);
    }

    #[test]
    fn printf_requires_init() {
        let mut ch = channel(small());
        assert_eq!(ch.printf(format_args!("x")), Err(IoError::NotInitialized));
    }

    #[test]
    fn scanf_over_dma() {
        let mut ch = ready(small());
        let events = ch.hardware_mut().receive(b"12 0x1f");
        ch.on_interrupt(events).unwrap();

        let (mut a, mut b) = (0i32, 0u32);
        let n = ch.scanf("%d %x", &mut [ScanArg::Int(&mut a), ScanArg::Uint(&mut b)]);

        assert_eq!(n, Ok(2));
        assert_eq!((a, b), (12, 0x1f));
        assert_eq!(ch.available(), 0);
    }

    #[test]
    fn scanf_polls_dma_without_notification() {
        let mut ch = ready(small());
        ch.hardware_mut().receive(b"7");

        let mut v = 0u32;
        assert_eq!(ch.scanf("%u", &mut [ScanArg::Uint(&mut v)]), Ok(1));
        assert_eq!(v, 7);
    }

    #[test]
    fn scanf_times_out_without_input() {
        let mut ch = ready(small().with_rx_timeout_us(50));
        let mut v = 0u32;
        assert_eq!(ch.scanf("%u", &mut [ScanArg::Uint(&mut v)]), Err(IoError::Timeout));
    }

    #[test]
    fn scanf_without_dma_receives_to_idle() {
        let mut ch = ready(ChannelConfig::blocking());
        ch.hardware_mut().queue_rx(b"3.5\r\n");

        let mut f = 0.0f32;
        assert_eq!(ch.scanf("%f", &mut [ScanArg::Float(&mut f)]), Ok(1));
        assert!((f - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn drop_aborts_in_flight_dma() {
        let ch = ready(small());
        drop(ch);
    }
}
