//! DMA Controller Register Definitions
//!
//! STM32F1xx general-purpose DMA: DMA1 has seven channels, DMA2 five.
//! Channel numbers are 1-based as in the reference manual.

use super::{clear_bits, read_reg, set_bits, write_reg};

// =============================================================================
// Base Addresses
// =============================================================================

/// DMA1 base address
pub const DMA1_BASE: usize = 0x4002_0000;
/// DMA2 base address
pub const DMA2_BASE: usize = 0x4002_0400;

// =============================================================================
// Register Offsets
// =============================================================================

/// Interrupt status register offset
pub const ISR_OFFSET: usize = 0x00;
/// Interrupt flag clear register offset
pub const IFCR_OFFSET: usize = 0x04;

/// Offset of channel 1 CCR; later channels follow at [`CHANNEL_STRIDE`]
pub const CCR1_OFFSET: usize = 0x08;
/// Distance between consecutive channel register groups
pub const CHANNEL_STRIDE: usize = 0x14;

/// CNDTR offset relative to CCR
pub const CNDTR_REL: usize = 0x04;
/// CPAR offset relative to CCR
pub const CPAR_REL: usize = 0x08;
/// CMAR offset relative to CCR
pub const CMAR_REL: usize = 0x0C;

// =============================================================================
// Channel Configuration Register (CCR) Bits
// =============================================================================

/// Channel enable
pub const CCR_EN: u32 = 1 << 0;
/// Transfer complete interrupt enable
pub const CCR_TCIE: u32 = 1 << 1;
/// Half transfer interrupt enable
pub const CCR_HTIE: u32 = 1 << 2;
/// Transfer error interrupt enable
pub const CCR_TEIE: u32 = 1 << 3;
/// Direction: read from memory
pub const CCR_DIR: u32 = 1 << 4;
/// Circular mode
pub const CCR_CIRC: u32 = 1 << 5;
/// Memory increment
pub const CCR_MINC: u32 = 1 << 7;
/// Priority level shift
pub const CCR_PL_SHIFT: u32 = 12;
/// Priority level: high
pub const CCR_PL_HIGH: u32 = 0b10 << CCR_PL_SHIFT;
/// Priority level: medium
pub const CCR_PL_MEDIUM: u32 = 0b01 << CCR_PL_SHIFT;

// =============================================================================
// Interrupt Flags (per channel, 4 bits each)
// =============================================================================

/// Global interrupt flag
pub const FLAG_GIF: u32 = 1 << 0;
/// Transfer complete flag
pub const FLAG_TCIF: u32 = 1 << 1;
/// Half transfer flag
pub const FLAG_HTIF: u32 = 1 << 2;
/// Transfer error flag
pub const FLAG_TEIF: u32 = 1 << 3;
/// All four channel flags
pub const FLAG_ALL: u32 = FLAG_GIF | FLAG_TCIF | FLAG_HTIF | FLAG_TEIF;

/// Shift a channel flag group into position for ISR/IFCR
#[must_use]
pub const fn channel_flags(channel: u8, flags: u32) -> u32 {
    flags << (4 * (channel as u32 - 1))
}

/// Offset of a channel's CCR from the controller base
#[must_use]
pub const fn ccr_offset(channel: u8) -> usize {
    CCR1_OFFSET + CHANNEL_STRIDE * (channel as usize - 1)
}

/// One channel of a DMA controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaChannelRegs {
    base: usize,
    channel: u8,
}

impl DmaChannelRegs {
    /// Channel `channel` (1-based) of the controller at `base`
    pub const fn new(base: usize, channel: u8) -> Self {
        Self { base, channel }
    }

    /// Controller base address
    pub const fn base(&self) -> usize {
        self.base
    }

    /// 1-based channel number
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    const fn ccr_addr(&self) -> usize {
        self.base + ccr_offset(self.channel)
    }

    /// Read the channel configuration register
    #[inline(always)]
    pub fn ccr(&self) -> u32 {
        unsafe { read_reg(self.ccr_addr()) }
    }

    /// Write the channel configuration register
    #[inline(always)]
    pub fn set_ccr(&self, value: u32) {
        unsafe { write_reg(self.ccr_addr(), value) }
    }

    /// Enable the channel
    #[inline(always)]
    pub fn enable(&self) {
        unsafe { set_bits(self.ccr_addr(), CCR_EN) }
    }

    /// Disable the channel
    #[inline(always)]
    pub fn disable(&self) {
        unsafe { clear_bits(self.ccr_addr(), CCR_EN) }
    }

    /// Whether the channel is enabled
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        self.ccr() & CCR_EN != 0
    }

    /// Remaining transfer count
    #[inline(always)]
    pub fn remaining(&self) -> u32 {
        unsafe { read_reg(self.ccr_addr() + CNDTR_REL) & 0xFFFF }
    }

    /// Program peripheral address, memory address and count
    #[inline(always)]
    pub fn set_transfer(&self, peripheral: usize, memory: usize, count: u16) {
        let ccr = self.ccr_addr();
        unsafe {
            write_reg(ccr + CPAR_REL, peripheral as u32);
            write_reg(ccr + CMAR_REL, memory as u32);
            write_reg(ccr + CNDTR_REL, count as u32);
        }
    }

    /// Read this channel's flags from ISR, shifted down to bits 0..3
    #[inline(always)]
    pub fn flags(&self) -> u32 {
        let isr = unsafe { read_reg(self.base + ISR_OFFSET) };
        (isr >> (4 * (self.channel as u32 - 1))) & FLAG_ALL
    }

    /// Clear this channel's flags
    #[inline(always)]
    pub fn clear_flags(&self, flags: u32) {
        unsafe { write_reg(self.base + IFCR_OFFSET, channel_flags(self.channel, flags)) }
    }
}
