//! Interrupt event parsing for a UART channel.
//!
//! This module provides [`UartEvents`] and [`LineErrors`] for turning the
//! USART status register and the RX DMA channel flags into the notifications
//! the channel dispatches on.

use crate::internal::register::dma::{FLAG_HTIF, FLAG_TCIF, FLAG_TEIF};
use crate::internal::register::usart::{SR_FE, SR_IDLE, SR_NE, SR_ORE, SR_PE, SR_TC};

// =============================================================================
// Line Errors
// =============================================================================

/// Receive line error flags.
///
/// Each flag is cleared by the backend through
/// [`UartHardware::clear_line_errors`](crate::hal::UartHardware::clear_line_errors).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineErrors {
    /// Parity error
    pub parity: bool,
    /// Noise detected on a received bit
    pub noise: bool,
    /// Framing error (missing stop bit)
    pub framing: bool,
    /// Overrun - a byte arrived before the previous one was taken
    pub overrun: bool,
}

impl LineErrors {
    /// All four error kinds set
    pub const ALL: Self = Self {
        parity: true,
        noise: true,
        framing: true,
        overrun: true,
    };

    /// Create from raw status register value
    #[inline]
    pub const fn from_raw(status: u32) -> Self {
        Self {
            parity: (status & SR_PE) != 0,
            noise: (status & SR_NE) != 0,
            framing: (status & SR_FE) != 0,
            overrun: (status & SR_ORE) != 0,
        }
    }

    /// Convert back to status register bits
    #[inline]
    pub const fn to_raw(&self) -> u32 {
        let mut val = 0u32;
        if self.parity {
            val |= SR_PE;
        }
        if self.noise {
            val |= SR_NE;
        }
        if self.framing {
            val |= SR_FE;
        }
        if self.overrun {
            val |= SR_ORE;
        }
        val
    }

    /// Check if any error is flagged
    #[inline]
    pub const fn any(&self) -> bool {
        self.parity || self.noise || self.framing || self.overrun
    }
}

// =============================================================================
// UART Events
// =============================================================================

/// Events pending on a UART channel.
///
/// # Example
///
/// ```ignore
/// let events = UartEvents::from_raw(sr).with_dma_flags(rx_dma_flags);
/// channel.on_interrupt(events)?;
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UartEvents {
    /// Line went idle after activity
    pub idle: bool,
    /// RX DMA reached the middle of the staging buffer
    pub rx_half: bool,
    /// RX DMA reached the end of the staging buffer
    pub rx_full: bool,
    /// RX DMA hit a bus error; the controller has stopped the channel
    pub dma_error: bool,
    /// Last TX byte has left the shift register
    pub tx_complete: bool,
    /// Receive line errors
    pub errors: LineErrors,
}

impl UartEvents {
    /// Create from raw status register value
    ///
    /// Half, full and transfer error events live in the DMA controller; add them with
    /// [`with_dma_flags`](Self::with_dma_flags).
    #[inline]
    pub const fn from_raw(status: u32) -> Self {
        Self {
            idle: (status & SR_IDLE) != 0,
            rx_half: false,
            rx_full: false,
            dma_error: false,
            tx_complete: (status & SR_TC) != 0,
            errors: LineErrors::from_raw(status),
        }
    }

    /// Merge the RX DMA channel flags (already shifted down to bits 0..3)
    #[must_use]
    #[inline]
    pub const fn with_dma_flags(mut self, flags: u32) -> Self {
        self.rx_half = (flags & FLAG_HTIF) != 0;
        self.rx_full = (flags & FLAG_TCIF) != 0;
        self.dma_error = (flags & FLAG_TEIF) != 0;
        self
    }

    /// Status register bits of these events
    #[inline]
    pub const fn to_raw(&self) -> u32 {
        let mut val = self.errors.to_raw();
        if self.idle {
            val |= SR_IDLE;
        }
        if self.tx_complete {
            val |= SR_TC;
        }
        val
    }

    /// Check if any event requires RX handling
    #[inline]
    pub const fn any(&self) -> bool {
        self.idle || self.rx_half || self.rx_full || self.dma_error || self.errors.any()
    }

    /// Check if any line error occurred
    #[inline]
    pub const fn has_error(&self) -> bool {
        self.errors.any()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
