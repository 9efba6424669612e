//! Reset and Clock Control Register Definitions
//!
//! Only the clock-enable registers the UART backend touches.

use super::{clear_bits, read_reg, set_bits};

/// RCC base address
pub const RCC_BASE: usize = 0x4002_1000;

/// AHB peripheral clock enable register offset
pub const AHBENR_OFFSET: usize = 0x14;
/// APB2 peripheral clock enable register offset
pub const APB2ENR_OFFSET: usize = 0x18;
/// APB1 peripheral clock enable register offset
pub const APB1ENR_OFFSET: usize = 0x1C;

/// DMA1 clock enable (AHBENR)
pub const AHBENR_DMA1EN: u32 = 1 << 0;
/// DMA2 clock enable (AHBENR)
pub const AHBENR_DMA2EN: u32 = 1 << 1;

/// USART1 clock enable (APB2ENR)
pub const APB2ENR_USART1EN: u32 = 1 << 14;

/// USART2 clock enable (APB1ENR)
pub const APB1ENR_USART2EN: u32 = 1 << 17;
/// USART3 clock enable (APB1ENR)
pub const APB1ENR_USART3EN: u32 = 1 << 18;
/// UART4 clock enable (APB1ENR)
pub const APB1ENR_UART4EN: u32 = 1 << 19;
/// UART5 clock enable (APB1ENR)
pub const APB1ENR_UART5EN: u32 = 1 << 20;

/// A clock gate: enable register offset and bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockGate {
    /// Register offset from [`RCC_BASE`]
    pub offset: usize,
    /// Enable bit
    pub bit: u32,
}

impl ClockGate {
    /// Open the gate
    #[inline(always)]
    pub fn enable(&self) {
        unsafe { set_bits(RCC_BASE + self.offset, self.bit) }
    }

    /// Close the gate
    #[inline(always)]
    pub fn disable(&self) {
        unsafe { clear_bits(RCC_BASE + self.offset, self.bit) }
    }

    /// Whether the gate is open
    #[inline(always)]
    pub fn is_enabled(&self) -> bool {
        unsafe { read_reg(RCC_BASE + self.offset) & self.bit != 0 }
    }
}
