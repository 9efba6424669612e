//! UART DMA Transport
//!
//! A `no_std` serial transport engine: DMA-fed reception with idle-line frame
//! detection feeding a lock-free ring buffer, and buffered, flush-on-demand
//! DMA transmission. One generic engine serves every serial port.
//!
//! # Architecture
//!
//! The crate is organized into four layers:
//!
//! 1. **Engine Layer** ([`dma`]): Ring buffer, receive engine, transmit engine
//! 2. **Channel Layer** ([`driver`]): Per-port lifecycle, interrupt dispatch,
//!    line-error recovery, and the port registry
//! 3. **Formatted I/O** ([`format`]): printf/scanf-style helpers
//! 4. **HAL Layer** ([`hal`]): The [`UartHardware`] backend trait and the
//!    STM32F1xx register backend
//!
//! ## Data Flow
//!
//! ```text
//! line -> DMA staging -> (interrupt copy) -> ring -> read()
//! write() -> TX staging -> flush() -> DMA -> line
//! ```
//!
//! # Features
//!
//! - `defmt`: Enable defmt logging and formatting for public types
//! - `critical-section`: Enable ISR-safe [`SharedChannel`] and [`SharedRegistry`]
//! - `stm32f1`: Enable the STM32F1xx register backend
//!
//! # Example
//!
//! ```ignore
//! use uart_dma::{Channel, ChannelConfig, PortId, uart_printf};
//! use uart_dma::hal::Stm32f1Uart;
//!
//! let uart = unsafe { Stm32f1Uart::new(PortId::Usart1, 72_000_000) };
//! let mut console = Channel::new(PortId::Usart1, uart, delay, ChannelConfig::new());
//! console.init(115_200).unwrap();
//!
//! uart_printf!(console, "boot ok, rpm={}\r\n", rpm).ok();
//!
//! // From the USART1 interrupt vector
//! let events = console.hardware_mut().take_events();
//! console.on_interrupt(events).ok();
//!
//! // From the main loop
//! let mut buf = [0u8; 64];
//! let n = console.read(&mut buf);
//! ```
//!
//! # Memory Requirements
//!
//! Buffers are allocated from the global allocator during
//! [`Channel::init`] and released on deinit. With the default configuration
//! each channel holds 256 bytes each of RX staging, RX ring and formatted I/O
//! scratch, plus two 256-byte TX staging buffers.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in clippy.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]

extern crate alloc;

// =============================================================================
// Modules
// =============================================================================

pub mod dma;
pub mod driver;
pub mod format;
pub mod hal;

// Internal implementation details (pub(crate) only)
mod internal;

#[cfg(feature = "critical-section")]
#[cfg_attr(docsrs, doc(cfg(feature = "critical-section")))]
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub(crate) mod test_utils;

// =============================================================================
// Re-exports
// =============================================================================

pub use dma::{Consumer, Producer, RingBuffer};
pub use driver::channel::{Channel, ChannelStats};
pub use driver::config::{ChannelConfig, DmaMode, PortId, State};
pub use driver::error::{
    ConfigError, ConfigResult, DeinitError, Error, HwError, HwResult, IoError, IoResult,
    RegistryError, ResizeError, Result,
};
pub use driver::interrupt::{LineErrors, UartEvents};
pub use driver::registry::{ChannelEntry, ChannelHandle, Registry};
pub use format::ScanArg;
pub use hal::UartHardware;

/// Low-level register accessors for advanced use.
///
/// These are intentionally separated from the primary facade. Most users should
/// prefer the channel APIs instead of touching registers directly.
///
/// # Safety
///
/// Direct register access bypasses driver invariants. Use only if you fully
/// understand the STM32F1xx USART and DMA hardware and accept responsibility
/// for correct sequencing and synchronization.
#[cfg(feature = "stm32f1")]
#[cfg_attr(docsrs, doc(cfg(feature = "stm32f1")))]
pub mod unsafe_registers {
    pub use crate::internal::register::dma::DmaChannelRegs;
    pub use crate::internal::register::rcc::ClockGate;
    pub use crate::internal::register::usart::UsartRegs;
}

// Re-export sync types when critical-section is enabled
#[cfg(feature = "critical-section")]
pub use sync::{CriticalSectionCell, SharedChannel, SharedRegistry};

/// Shared transport constants.
///
/// These are grouped into a dedicated module to keep the top-level facade
/// focused on channel types.
pub mod constants {
    pub use crate::internal::constants::{
        // Line
        DEFAULT_BAUD_RATE,
        // Timing
        DEFAULT_BLOCKING_TIMEOUT_US,
        // Retry bounds
        DEFAULT_REARM_RETRIES,
        // Buffer sizes
        DEFAULT_RX_BUF_SIZE,
        DEFAULT_RX_FIFO_SIZE,
        DEFAULT_RX_TIMEOUT_US,
        DEFAULT_SCRATCH_SIZE,
        DEFAULT_TX_BUF_SIZE,
        DEFAULT_TX_TIMEOUT_US,
        MAX_DMA_TRANSFER,
        POLL_INTERVAL_US,
    };
}

// =============================================================================
// Macro Helpers
// =============================================================================

/// Declare a static, ISR-safe channel slot.
///
/// The channel itself is installed at runtime, once its hardware backend and
/// delay provider exist.
///
/// # Examples
///
/// ```ignore
/// uart_dma::uart_static_sync!(CONSOLE, Stm32f1Uart, Delay);
///
/// CONSOLE.install(Channel::new(PortId::Usart1, uart, delay, ChannelConfig::new()));
/// CONSOLE.with(|ch| ch.init(115_200));
/// ```
#[cfg(feature = "critical-section")]
#[macro_export]
macro_rules! uart_static_sync {
    ($name:ident, $hw:ty, $delay:ty) => {
        static $name: $crate::sync::SharedChannel<$hw, $delay> = $crate::sync::SharedChannel::new();
    };
}
