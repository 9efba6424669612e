//! Configuration types for a UART transport channel

use crate::internal::constants::{
    DEFAULT_BAUD_RATE, DEFAULT_BLOCKING_TIMEOUT_US, DEFAULT_REARM_RETRIES, DEFAULT_RX_BUF_SIZE,
    DEFAULT_RX_FIFO_SIZE, DEFAULT_RX_TIMEOUT_US, DEFAULT_SCRATCH_SIZE, DEFAULT_TX_BUF_SIZE,
    DEFAULT_TX_TIMEOUT_US, MAX_DMA_TRANSFER,
};

use super::error::ConfigError;

/// Physical serial port identifier
///
/// Names the five ports of the STM32F1xx family. Backends for other parts
/// reuse the identifiers as plain indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PortId {
    /// USART1
    Usart1,
    /// USART2
    Usart2,
    /// USART3
    Usart3,
    /// UART4
    Uart4,
    /// UART5
    Uart5,
}

impl PortId {
    /// All port identifiers, in index order
    pub const ALL: [PortId; 5] = [
        PortId::Usart1,
        PortId::Usart2,
        PortId::Usart3,
        PortId::Uart4,
        PortId::Uart5,
    ];

    /// Zero-based index of the port
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// RX DMA transfer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaMode {
    /// DMA wraps to the start of the staging buffer on its own
    #[default]
    Circular,
    /// DMA stops after one pass; the engine re-arms it on full-transfer
    OneShot,
}

/// Channel lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Not initialized; buffers released, resize allowed
    #[default]
    Uninitialized,
    /// Hardware enabled, buffers allocated, reception armed
    Initialized,
}

/// Complete channel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Line baud rate
    pub baud_rate: u32,
    /// Receive through DMA into a staging buffer and ring
    pub rx_dma: bool,
    /// RX staging buffer size in bytes
    pub rx_buf_size: usize,
    /// RX ring capacity in bytes (power of two)
    pub rx_fifo_size: usize,
    /// RX DMA mode
    pub rx_mode: DmaMode,
    /// Transmit through DMA from a staging buffer
    pub tx_dma: bool,
    /// TX staging buffer size in bytes
    pub tx_buf_size: usize,
    /// Formatted I/O scratch size in bytes
    pub scratch_size: usize,
    /// Bound on waiting for the previous TX transfer, in microseconds
    pub tx_timeout_us: u32,
    /// Bound on blocking sends and receive-to-idle, in microseconds
    pub blocking_timeout_us: u32,
    /// Bound on waiting for RX data in formatted input, in microseconds
    pub rx_timeout_us: u32,
    /// Attempts to re-arm RX DMA before reporting failure
    pub rearm_retries: u8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelConfig {
    /// Create a configuration with both directions on DMA and default sizes
    #[must_use]
    pub const fn new() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            rx_dma: true,
            rx_buf_size: DEFAULT_RX_BUF_SIZE,
            rx_fifo_size: DEFAULT_RX_FIFO_SIZE,
            rx_mode: DmaMode::Circular,
            tx_dma: true,
            tx_buf_size: DEFAULT_TX_BUF_SIZE,
            scratch_size: DEFAULT_SCRATCH_SIZE,
            tx_timeout_us: DEFAULT_TX_TIMEOUT_US,
            blocking_timeout_us: DEFAULT_BLOCKING_TIMEOUT_US,
            rx_timeout_us: DEFAULT_RX_TIMEOUT_US,
            rearm_retries: DEFAULT_REARM_RETRIES,
        }
    }

    /// Create a configuration for a port without DMA (blocking I/O only)
    #[must_use]
    pub const fn blocking() -> Self {
        Self::new().with_rx_dma(false).with_tx_dma(false)
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the baud rate
    #[must_use]
    pub const fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Enable or disable RX DMA
    #[must_use]
    pub const fn with_rx_dma(mut self, enabled: bool) -> Self {
        self.rx_dma = enabled;
        self
    }

    /// Set the RX staging buffer and ring sizes
    #[must_use]
    pub const fn with_rx_sizes(mut self, buf_size: usize, fifo_size: usize) -> Self {
        self.rx_buf_size = buf_size;
        self.rx_fifo_size = fifo_size;
        self
    }

    /// Set the RX DMA mode
    #[must_use]
    pub const fn with_rx_mode(mut self, mode: DmaMode) -> Self {
        self.rx_mode = mode;
        self
    }

    /// Enable or disable TX DMA
    #[must_use]
    pub const fn with_tx_dma(mut self, enabled: bool) -> Self {
        self.tx_dma = enabled;
        self
    }

    /// Set the TX staging buffer size
    #[must_use]
    pub const fn with_tx_buf_size(mut self, size: usize) -> Self {
        self.tx_buf_size = size;
        self
    }

    /// Set the formatted I/O scratch size
    #[must_use]
    pub const fn with_scratch_size(mut self, size: usize) -> Self {
        self.scratch_size = size;
        self
    }

    /// Set the TX completion timeout
    #[must_use]
    pub const fn with_tx_timeout_us(mut self, timeout_us: u32) -> Self {
        self.tx_timeout_us = timeout_us;
        self
    }

    /// Set the blocking send / receive-to-idle timeout
    #[must_use]
    pub const fn with_blocking_timeout_us(mut self, timeout_us: u32) -> Self {
        self.blocking_timeout_us = timeout_us;
        self
    }

    /// Set the formatted input data timeout
    #[must_use]
    pub const fn with_rx_timeout_us(mut self, timeout_us: u32) -> Self {
        self.rx_timeout_us = timeout_us;
        self
    }

    /// Set the RX DMA re-arm retry bound
    #[must_use]
    pub const fn with_rearm_retries(mut self, retries: u8) -> Self {
        self.rearm_retries = retries;
        self
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check the configuration for values the engine cannot run with
    ///
    /// # Errors
    /// - `InvalidConfig` - zero baud rate, zero buffer size, ring capacity that
    ///   is not a power of two, DMA staging larger than the DMA counter, or
    ///   zero re-arm retries
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 || self.scratch_size == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        if self.rx_dma {
            if self.rx_buf_size == 0 || self.rx_buf_size > MAX_DMA_TRANSFER {
                return Err(ConfigError::InvalidConfig);
            }
            if !self.rx_fifo_size.is_power_of_two() {
                return Err(ConfigError::InvalidConfig);
            }
            if self.rearm_retries == 0 {
                return Err(ConfigError::InvalidConfig);
            }
        }
        if self.tx_dma && (self.tx_buf_size == 0 || self.tx_buf_size > MAX_DMA_TRANSFER) {
            return Err(ConfigError::InvalidConfig);
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
