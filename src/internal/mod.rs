//! Internal Implementation Details
//!
//! This module contains implementation details that are not part of the public API.
//! Types in this module may change without notice between minor versions.
//!
//! # Contents
//!
//! - [`constants`]: Default sizes, timeouts and retry bounds
//! - [`register`]: STM32F1xx USART, DMA and RCC register definitions
//!
//! # Stability
//!
//! **WARNING:** This module is `pub(crate)` only. Do not depend on any types
//! or functions in this module from external code. They are subject to change
//! without notice.

pub(crate) mod constants;

// Only the status bit layout is used without the register backend
#[cfg_attr(not(feature = "stm32f1"), allow(dead_code))]
pub(crate) mod register;
