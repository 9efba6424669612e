//! Formatted I/O helpers
//!
//! - [`print`]: bounded rendering of `core::fmt::Arguments` (truncating like `vsnprintf`)
//! - [`scan`]: `sscanf`-style parsing of received bytes into [`ScanArg`]s
//!
//! The channel-level entry points are
//! [`Channel::printf`](crate::driver::channel::Channel::printf),
//! [`Channel::scanf`](crate::driver::channel::Channel::scanf) and the
//! [`uart_printf!`](crate::uart_printf) macro.

pub mod print;
pub mod scan;

pub use print::{BoundedWriter, Rendered, render};
pub use scan::{ScanArg, scan};

/// Formatted output on a channel
///
/// Expands to [`Channel::printf`](crate::driver::channel::Channel::printf)
/// with `format_args!`, returning the untruncated length.
///
/// ```ignore
/// uart_printf!(channel, "rpm={} err={}\r\n", rpm, err)?;
/// ```
#[macro_export]
macro_rules! uart_printf {
    ($channel:expr, $($arg:tt)*) => {
        $channel.printf(core::format_args!($($arg)*))
    };
}
