//! USART Register Definitions
//!
//! Layout shared by USART1..3 and UART4/5 on STM32F1xx.

use super::{clear_bits, read_reg, set_bits, write_reg};

// =============================================================================
// Base Addresses
// =============================================================================

/// USART1 base address (APB2)
pub const USART1_BASE: usize = 0x4001_3800;
/// USART2 base address (APB1)
pub const USART2_BASE: usize = 0x4000_4400;
/// USART3 base address (APB1)
pub const USART3_BASE: usize = 0x4000_4800;
/// UART4 base address (APB1)
pub const UART4_BASE: usize = 0x4000_4C00;
/// UART5 base address (APB1)
pub const UART5_BASE: usize = 0x4000_5000;

// =============================================================================
// Register Offsets
// =============================================================================

/// Status register offset
pub const SR_OFFSET: usize = 0x00;
/// Data register offset
pub const DR_OFFSET: usize = 0x04;
/// Baud rate register offset
pub const BRR_OFFSET: usize = 0x08;
/// Control register 1 offset
pub const CR1_OFFSET: usize = 0x0C;
/// Control register 2 offset
pub const CR2_OFFSET: usize = 0x10;
/// Control register 3 offset
pub const CR3_OFFSET: usize = 0x14;

// =============================================================================
// Status Register (SR) Bits
// =============================================================================

/// Parity error
pub const SR_PE: u32 = 1 << 0;
/// Framing error
pub const SR_FE: u32 = 1 << 1;
/// Noise error
pub const SR_NE: u32 = 1 << 2;
/// Overrun error
pub const SR_ORE: u32 = 1 << 3;
/// Idle line detected
pub const SR_IDLE: u32 = 1 << 4;
/// Read data register not empty
pub const SR_RXNE: u32 = 1 << 5;
/// Transmission complete
pub const SR_TC: u32 = 1 << 6;
/// Transmit data register empty
pub const SR_TXE: u32 = 1 << 7;

/// All line error flags
pub const SR_ERRORS: u32 = SR_PE | SR_FE | SR_NE | SR_ORE;

// =============================================================================
// Control Register Bits
// =============================================================================

/// Receiver enable
pub const CR1_RE: u32 = 1 << 2;
/// Transmitter enable
pub const CR1_TE: u32 = 1 << 3;
/// Idle interrupt enable
pub const CR1_IDLEIE: u32 = 1 << 4;
/// Parity error interrupt enable
pub const CR1_PEIE: u32 = 1 << 8;
/// USART enable
pub const CR1_UE: u32 = 1 << 13;

/// Error interrupt enable (framing, overrun, noise in DMA mode)
pub const CR3_EIE: u32 = 1 << 0;
/// DMA enable receiver
pub const CR3_DMAR: u32 = 1 << 6;
/// DMA enable transmitter
pub const CR3_DMAT: u32 = 1 << 7;

/// Compute the BRR value for a peripheral clock and baud rate
///
/// USARTDIV in 12.4 fixed point, rounded to nearest.
#[must_use]
pub const fn brr_for(pclk_hz: u32, baud_rate: u32) -> u32 {
    (pclk_hz + baud_rate / 2) / baud_rate
}

/// Register block of one USART instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsartRegs {
    base: usize,
}

impl UsartRegs {
    /// Wrap the register block at `base`
    pub const fn at(base: usize) -> Self {
        Self { base }
    }

    /// Base address of the block
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Address of the data register (DMA peripheral address)
    pub const fn dr_addr(&self) -> usize {
        self.base + DR_OFFSET
    }

    /// Read the status register
    #[inline(always)]
    pub fn status(&self) -> u32 {
        unsafe { read_reg(self.base + SR_OFFSET) }
    }

    /// Read the data register
    #[inline(always)]
    pub fn data(&self) -> u32 {
        unsafe { read_reg(self.base + DR_OFFSET) }
    }

    /// Write the data register
    #[inline(always)]
    pub fn set_data(&self, value: u32) {
        unsafe { write_reg(self.base + DR_OFFSET, value) }
    }

    /// Write the baud rate register
    #[inline(always)]
    pub fn set_brr(&self, value: u32) {
        unsafe { write_reg(self.base + BRR_OFFSET, value) }
    }

    /// Read control register 1
    #[inline(always)]
    pub fn cr1(&self) -> u32 {
        unsafe { read_reg(self.base + CR1_OFFSET) }
    }

    /// Write control register 1
    #[inline(always)]
    pub fn set_cr1(&self, value: u32) {
        unsafe { write_reg(self.base + CR1_OFFSET, value) }
    }

    /// Write control register 2
    #[inline(always)]
    pub fn set_cr2(&self, value: u32) {
        unsafe { write_reg(self.base + CR2_OFFSET, value) }
    }

    /// Write control register 3
    #[inline(always)]
    pub fn set_cr3(&self, value: u32) {
        unsafe { write_reg(self.base + CR3_OFFSET, value) }
    }

    /// Set bits in control register 1
    #[inline(always)]
    pub fn set_cr1_bits(&self, bits: u32) {
        unsafe { set_bits(self.base + CR1_OFFSET, bits) }
    }

    /// Clear bits in control register 1
    #[inline(always)]
    pub fn clear_cr1_bits(&self, bits: u32) {
        unsafe { clear_bits(self.base + CR1_OFFSET, bits) }
    }

    /// Set bits in control register 3
    #[inline(always)]
    pub fn set_cr3_bits(&self, bits: u32) {
        unsafe { set_bits(self.base + CR3_OFFSET, bits) }
    }

    /// Clear bits in control register 3
    #[inline(always)]
    pub fn clear_cr3_bits(&self, bits: u32) {
        unsafe { clear_bits(self.base + CR3_OFFSET, bits) }
    }

    /// Clear the transmission complete flag
    ///
    /// TC is cleared by writing 0 to it; the other SR bits ignore writes of 1.
    #[inline(always)]
    pub fn clear_tc(&self) {
        unsafe { write_reg(self.base + SR_OFFSET, !SR_TC) }
    }

    /// Clear IDLE and the line error flags
    ///
    /// These flags clear on an SR read followed by a DR read.
    #[inline(always)]
    pub fn clear_idle_and_errors(&self) {
        let _ = self.status();
        let _ = self.data();
    }
}
