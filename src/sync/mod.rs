//! Synchronization and Concurrency Support
//!
//! A [`Channel`](crate::driver::channel::Channel) is one owned value driven
//! from two contexts: its interrupt vector (RX producer, line-error
//! recovery) and application tasks (reads, writes, formatted I/O). This
//! module provides the wrappers that let it live in a `static`:
//!
//! - **Primitives** (`primitives`): Low-level synchronization types
//!   - [`CriticalSectionCell`] - ISR-safe interior mutability
//!
//! - **Shared Wrappers** (`shared`): ISR-safe channel wrappers
//!   - [`SharedChannel`] - One critical-section protected channel
//!   - [`SharedRegistry`] - A critical-section protected channel table
//!
//! # Feature Flags
//!
//! - `critical-section`: Enables this module
//!
//! # Example
//!
//! ```ignore
//! use uart_dma::sync::SharedRegistry;
//!
//! static PORTS: SharedRegistry<Stm32f1Uart, Delay, 5> = SharedRegistry::new();
//!
//! #[interrupt]
//! fn USART1() {
//!     PORTS.dispatch(PortId::Usart1, events).ok();
//! }
//! ```

mod primitives;

pub use primitives::CriticalSectionCell;

mod shared;

pub use shared::{SharedChannel, SharedRegistry};
