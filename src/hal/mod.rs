//! Hardware Abstraction Layer
//!
//! The transport engine never touches registers directly; it drives a
//! [`UartHardware`] backend that owns one serial port and its DMA channels.
//!
//! # Modules
//!
//! - [`uart`]: The backend trait
//! - `stm32f1`: Register-level backend for STM32F1xx (feature `stm32f1`)
//!
//! # Delay Integration
//!
//! Bounded waits use `embedded_hal::delay::DelayNs` directly.
//! Pass any delay implementation from your HAL.

pub mod uart;

#[cfg(feature = "stm32f1")]
#[cfg_attr(docsrs, doc(cfg(feature = "stm32f1")))]
pub mod stm32f1;

pub use uart::UartHardware;

#[cfg(feature = "stm32f1")]
pub use stm32f1::Stm32f1Uart;
