//! DMA-fed transport engines
//!
//! Data flow per channel:
//!
//! ```text
//! hardware -> RX staging -> (interrupt copy) -> RingBuffer -> read()
//! write() -> TX staging -> flush() -> DMA -> hardware
//! ```
//!
//! - [`RingBuffer`]: SPSC lock-free byte ring with [`Producer`]/[`Consumer`] halves
//! - [`RxEngine`]: copies DMA-produced bytes into the ring on idle, half and full notifications
//! - [`TxEngine`]: linear staging buffer flushed as one DMA transfer
//!
//! All buffers are heap allocated with fallible reservation and released on drop.

mod ring;
mod rx;
mod tx;

pub use ring::{Consumer, Producer, RingBuffer};
pub use rx::{Copied, RxEngine};
pub use tx::TxEngine;
