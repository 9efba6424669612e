//! Centralized Constants
//!
//! This module provides a single source of truth for buffer sizes, timing
//! bounds and other defaults used throughout the transport engine.
//!
//! # Organization
//!
//! Constants are grouped by category:
//! - **Line defaults**: baud rate
//! - **Buffer sizes**: RX staging, RX ring, TX staging, formatted I/O scratch
//! - **Timing**: bounded waits and the polling step used while waiting
//! - **Retry bounds**: DMA re-arm attempts
//!
//! # Note
//!
//! Register bit definitions remain in `internal::register` as they are
//! specific to the hardware backend.

// =============================================================================
// Line Defaults
// =============================================================================

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

// =============================================================================
// Buffer Sizes
// =============================================================================

/// Default RX DMA staging buffer size in bytes
pub const DEFAULT_RX_BUF_SIZE: usize = 256;

/// Default RX ring buffer capacity in bytes (must be a power of two)
pub const DEFAULT_RX_FIFO_SIZE: usize = 256;

/// Default TX DMA staging buffer size in bytes
pub const DEFAULT_TX_BUF_SIZE: usize = 256;

/// Default per-channel scratch size for formatted I/O
pub const DEFAULT_SCRATCH_SIZE: usize = 256;

/// Largest transfer a 16-bit DMA counter can describe
pub const MAX_DMA_TRANSFER: usize = 0xFFFF;

// =============================================================================
// Timing Constants
// =============================================================================

/// Default bound on waiting for the previous TX transfer to complete
pub const DEFAULT_TX_TIMEOUT_US: u32 = 1_000_000;

/// Default bound on blocking (non-DMA) sends, per call
pub const DEFAULT_BLOCKING_TIMEOUT_US: u32 = 1_000_000;

/// Default bound on waiting for received data in formatted input
pub const DEFAULT_RX_TIMEOUT_US: u32 = 65_535_000;

/// Polling step used by every bounded wait
pub const POLL_INTERVAL_US: u32 = 10;

// =============================================================================
// Retry Bounds
// =============================================================================

/// Default number of attempts to re-arm RX DMA before escalating
pub const DEFAULT_REARM_RETRIES: u8 = 3;
