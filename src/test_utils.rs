//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the transport
//! engine on the host without hardware access.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::RefCell;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::driver::config::DmaMode;
use crate::driver::error::{HwError, HwResult};
use crate::driver::interrupt::{LineErrors, UartEvents};
use crate::hal::UartHardware;

// =============================================================================
// Mock UART
// =============================================================================

/// Simulated USART with RX and TX DMA channels
///
/// RX DMA writes received bytes straight into the armed staging buffer, the
/// same way the hardware does, and reports the notifications a real port
/// would raise.
///
/// # Example
///
/// ```ignore
/// let mut hw = MockUart::new();
/// rx.arm(&mut hw)?;
///
/// let events = hw.receive(b"abc");
/// assert!(events.idle);
/// rx.on_idle(hw.rx_dma_remaining());
/// ```
#[derive(Debug)]
pub struct MockUart {
    enabled: bool,
    baud_rate: u32,
    fail_init: bool,
    fail_deinit: bool,
    fail_rx_dma_init: bool,
    fail_tx_dma_init: bool,
    fail_dma_deinit: bool,
    idle_interrupt: bool,

    // RX DMA
    rx_dma: bool,
    rx_mode: DmaMode,
    rx_buf: *mut u8,
    rx_len: usize,
    rx_pos: usize,
    rx_armed: bool,
    /// Stopped by a transfer error; the position is kept
    rx_faulted: bool,
    rx_start_attempts: usize,
    rx_start_failures: usize,
    rx_aborts: usize,
    rx_lost: usize,

    // TX DMA
    tx_dma: bool,
    tx_log: Vec<u8>,
    tx_transfers: usize,
    tx_busy: bool,
    tx_auto_complete: bool,
    tx_start_failures: usize,
    tx_aborts: usize,

    // Blocking I/O
    tx_ready: bool,
    blocking_tx: Vec<u8>,
    blocking_rx: VecDeque<u8>,
    idle_pending: bool,

    cleared_errors: Vec<LineErrors>,
}

impl Default for MockUart {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUart {
    /// Create a mock port: disabled, transfers complete instantly
    pub fn new() -> Self {
        Self {
            enabled: false,
            baud_rate: 0,
            fail_init: false,
            fail_deinit: false,
            fail_rx_dma_init: false,
            fail_tx_dma_init: false,
            fail_dma_deinit: false,
            idle_interrupt: false,
            rx_dma: false,
            rx_mode: DmaMode::Circular,
            rx_buf: core::ptr::null_mut(),
            rx_len: 0,
            rx_pos: 0,
            rx_armed: false,
            rx_faulted: false,
            rx_start_attempts: 0,
            rx_start_failures: 0,
            rx_aborts: 0,
            rx_lost: 0,
            tx_dma: false,
            tx_log: Vec::new(),
            tx_transfers: 0,
            tx_busy: false,
            tx_auto_complete: true,
            tx_start_failures: 0,
            tx_aborts: 0,
            tx_ready: true,
            blocking_tx: Vec::new(),
            blocking_rx: VecDeque::new(),
            idle_pending: false,
            cleared_errors: Vec::new(),
        }
    }

    // =========================================================================
    // Fault Injection
    // =========================================================================

    /// Pretend the port was enabled by someone else
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn fail_init(&mut self) {
        self.fail_init = true;
    }

    pub fn fail_deinit(&mut self) {
        self.fail_deinit = true;
    }

    pub fn fail_rx_dma_init(&mut self) {
        self.fail_rx_dma_init = true;
    }

    pub fn fail_tx_dma_init(&mut self) {
        self.fail_tx_dma_init = true;
    }

    pub fn fail_dma_deinit(&mut self) {
        self.fail_dma_deinit = true;
    }

    /// Reject the next `count` RX DMA starts
    pub fn fail_rx_starts(&mut self, count: usize) {
        self.rx_start_failures = count;
    }

    /// Reject the next `count` TX DMA starts
    pub fn fail_tx_starts(&mut self, count: usize) {
        self.tx_start_failures = count;
    }

    /// When false, a TX transfer stays in flight until [`complete_tx`](Self::complete_tx)
    pub fn set_tx_auto_complete(&mut self, auto: bool) {
        self.tx_auto_complete = auto;
    }

    /// Finish the in-flight TX transfer
    pub fn complete_tx(&mut self) {
        self.tx_busy = false;
    }

    /// Stall or release the blocking transmit data register
    pub fn set_tx_ready(&mut self, ready: bool) {
        self.tx_ready = ready;
    }

    // =========================================================================
    // Simulated Line Activity
    // =========================================================================

    /// Receive bytes through RX DMA and report the raised events
    ///
    /// Bytes arriving while RX DMA is not armed are lost.
    pub fn receive(&mut self, data: &[u8]) -> UartEvents {
        let mut events = UartEvents::default();
        if data.is_empty() {
            return events;
        }

        let mid = self.rx_len / 2 + (self.rx_len & 1);
        for &byte in data {
            if !self.rx_armed {
                self.rx_lost += 1;
                continue;
            }
            // SAFETY: start_rx_dma's contract keeps rx_buf..rx_buf+rx_len valid while armed
            unsafe { self.rx_buf.add(self.rx_pos).write(byte) };
            self.rx_pos += 1;

            if self.rx_pos == mid {
                events.rx_half = true;
            }
            if self.rx_pos == self.rx_len {
                events.rx_full = true;
                match self.rx_mode {
                    DmaMode::Circular => self.rx_pos = 0,
                    DmaMode::OneShot => self.rx_armed = false,
                }
            }
        }

        events.idle = true;
        events
    }

    /// Raise an RX DMA transfer error
    ///
    /// Like the hardware, the channel stops where it is: later bytes are lost
    /// until RX DMA is started again.
    pub fn dma_error(&mut self) -> UartEvents {
        if self.rx_armed {
            self.rx_armed = false;
            self.rx_faulted = true;
        }
        UartEvents {
            dma_error: true,
            ..UartEvents::default()
        }
    }

    /// Queue bytes for blocking reception, followed by an idle line
    pub fn queue_rx(&mut self, data: &[u8]) {
        self.blocking_rx.extend(data.iter().copied());
        self.idle_pending = true;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    pub fn is_initialized(&self) -> bool {
        self.enabled
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn idle_interrupt_enabled(&self) -> bool {
        self.idle_interrupt
    }

    pub fn rx_dma_initialized(&self) -> bool {
        self.rx_dma
    }

    pub fn tx_dma_initialized(&self) -> bool {
        self.tx_dma
    }

    pub fn rx_armed(&self) -> bool {
        self.rx_armed
    }

    pub fn rx_start_attempts(&self) -> usize {
        self.rx_start_attempts
    }

    pub fn rx_aborts(&self) -> usize {
        self.rx_aborts
    }

    pub fn rx_lost(&self) -> usize {
        self.rx_lost
    }

    /// Everything transmitted through TX DMA
    pub fn tx_log(&self) -> &[u8] {
        &self.tx_log
    }

    pub fn tx_transfers(&self) -> usize {
        self.tx_transfers
    }

    pub fn tx_aborts(&self) -> usize {
        self.tx_aborts
    }

    /// Everything transmitted byte by byte
    pub fn blocking_tx(&self) -> &[u8] {
        &self.blocking_tx
    }

    pub fn cleared_errors(&self) -> &[LineErrors] {
        &self.cleared_errors
    }
}

impl UartHardware for MockUart {
    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn init(&mut self, baud_rate: u32) -> HwResult {
        if self.fail_init {
            return Err(HwError::Fault);
        }
        self.enabled = true;
        self.baud_rate = baud_rate;
        Ok(())
    }

    fn deinit(&mut self) -> HwResult {
        if self.fail_deinit {
            return Err(HwError::Fault);
        }
        self.enabled = false;
        Ok(())
    }

    fn init_rx_dma(&mut self, mode: DmaMode) -> HwResult {
        if self.fail_rx_dma_init {
            return Err(HwError::Busy);
        }
        self.rx_dma = true;
        self.rx_mode = mode;
        Ok(())
    }

    fn deinit_rx_dma(&mut self) -> HwResult {
        if self.fail_dma_deinit {
            return Err(HwError::Fault);
        }
        self.rx_dma = false;
        Ok(())
    }

    fn init_tx_dma(&mut self) -> HwResult {
        if self.fail_tx_dma_init {
            return Err(HwError::Busy);
        }
        self.tx_dma = true;
        Ok(())
    }

    fn deinit_tx_dma(&mut self) -> HwResult {
        if self.fail_dma_deinit {
            return Err(HwError::Fault);
        }
        self.tx_dma = false;
        Ok(())
    }

    fn enable_idle_interrupt(&mut self, enabled: bool) {
        self.idle_interrupt = enabled;
    }

    unsafe fn start_rx_dma(&mut self, buf: *mut u8, len: usize) -> HwResult {
        self.rx_start_attempts += 1;
        if self.rx_start_failures > 0 {
            self.rx_start_failures -= 1;
            return Err(HwError::Busy);
        }
        self.rx_buf = buf;
        self.rx_len = len;
        self.rx_pos = 0;
        self.rx_armed = true;
        self.rx_faulted = false;
        Ok(())
    }

    fn rx_dma_remaining(&self) -> usize {
        if self.rx_armed || self.rx_faulted {
            self.rx_len - self.rx_pos
        } else {
            0
        }
    }

    fn abort_rx_dma(&mut self) {
        self.rx_armed = false;
        self.rx_faulted = false;
        self.rx_aborts += 1;
    }

    unsafe fn start_tx_dma(&mut self, buf: *const u8, len: usize) -> HwResult {
        if self.tx_start_failures > 0 {
            self.tx_start_failures -= 1;
            return Err(HwError::Busy);
        }
        // SAFETY: start_tx_dma's contract keeps buf..buf+len valid for the transfer
        let data = unsafe { core::slice::from_raw_parts(buf, len) };
        self.tx_log.extend_from_slice(data);
        self.tx_transfers += 1;
        self.tx_busy = !self.tx_auto_complete;
        Ok(())
    }

    fn abort_tx_dma(&mut self) {
        self.tx_busy = false;
        self.tx_aborts += 1;
    }

    fn transmission_complete(&self) -> bool {
        !self.tx_busy
    }

    fn clear_line_errors(&mut self, errors: LineErrors) {
        self.cleared_errors.push(errors);
    }

    fn tx_ready(&self) -> bool {
        self.tx_ready
    }

    fn write_byte(&mut self, byte: u8) {
        self.blocking_tx.push(byte);
    }

    fn rx_ready(&self) -> bool {
        !self.blocking_rx.is_empty()
    }

    fn read_byte(&mut self) -> u8 {
        self.blocking_rx.pop_front().unwrap_or(0)
    }

    fn take_idle(&mut self) -> bool {
        if self.idle_pending && self.blocking_rx.is_empty() {
            self.idle_pending = false;
            true
        } else {
            false
        }
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing without actual timing
///
/// Records delays for verification without actually waiting.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total nanoseconds delayed
    total_ns: RefCell<u64>,
}

impl MockDelay {
    /// Create a new mock delay
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        *self.total_ns.borrow()
    }

    /// Get total microseconds that were "delayed"
    pub fn total_us(&self) -> u64 {
        self.total_ns() / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        *self.total_ns.borrow_mut() += u64::from(ns);
    }
}

// =============================================================================
// Tests for the mocks themselves
// =============================================================================

#[cfg(test)]
mod tests {
    use embedded_hal::delay::DelayNs;

    use super::*;

    #[test]
    fn mock_delay_tracking() {
        let mut delay = MockDelay::new();
        delay.delay_us(10);
        delay.delay_ms(1);
        assert_eq!(delay.total_us(), 1_010);
    }

    #[test]
    fn mock_uart_circular_wraps_and_flags() {
        let mut hw = MockUart::new();
        let mut buf = [0u8; 4];
        unsafe { hw.start_rx_dma(buf.as_mut_ptr(), buf.len()) }.unwrap();

        let events = hw.receive(b"ab");
        assert!(events.rx_half);
        assert!(!events.rx_full);
        assert_eq!(hw.rx_dma_remaining(), 2);

        let events = hw.receive(b"cde");
        assert!(events.rx_full);
        assert!(events.idle);
        assert_eq!(hw.rx_dma_remaining(), 3);
        assert_eq!(&buf, b"ebcd");
    }

    #[test]
    fn mock_uart_one_shot_stops_at_end() {
        let mut hw = MockUart::new();
        hw.init_rx_dma(DmaMode::OneShot).unwrap();
        let mut buf = [0u8; 2];
        unsafe { hw.start_rx_dma(buf.as_mut_ptr(), buf.len()) }.unwrap();

        let events = hw.receive(b"xyz");
        assert!(events.rx_full);
        assert!(!hw.rx_armed());
        assert_eq!(hw.rx_lost(), 1);
        assert_eq!(&buf, b"xy");
    }

    #[test]
    fn mock_uart_blocking_idle_after_drain() {
        let mut hw = MockUart::new();
        hw.queue_rx(b"a");
        assert!(!hw.take_idle());
        assert_eq!(hw.read_byte(), b'a');
        assert!(hw.take_idle());
        assert!(!hw.take_idle());
    }
}
