//! Core transport components.
//!
//! This module contains the per-port engine and everything needed to
//! configure, address and service it:
//!
//! - [`config`] - Configuration types and builder patterns
//! - [`error`] - Error types and result aliases
//! - [`interrupt`] - Decoded status and DMA events
//! - [`channel`] - One port's RX/TX engine, lifecycle and formatted I/O
//! - [`registry`] - Port-to-channel table addressed by handles
//!
//! # Example
//!
//! ```ignore
//! use uart_dma::driver::{Channel, ChannelConfig, PortId};
//!
//! let config = ChannelConfig::new()
//!     .with_rx_sizes(128, 256)
//!     .with_tx_buf_size(128);
//! let mut console = Channel::new(PortId::Usart1, uart, delay, config);
//! console.init(115_200)?;
//! ```

// Submodules
pub mod channel;
pub mod config;
pub mod error;
pub mod interrupt;
pub mod registry;

// Re-exports for convenience
pub use channel::{Channel, ChannelStats};
pub use config::{ChannelConfig, DmaMode, PortId, State};
pub use error::{
    ConfigError, ConfigResult, DeinitError, Error, HwError, HwResult, IoError, IoResult,
    RegistryError, ResizeError, Result,
};
pub use interrupt::{LineErrors, UartEvents};
pub use registry::{ChannelEntry, ChannelHandle, Registry};
