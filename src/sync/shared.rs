//! ISR-safe channel wrappers using critical sections.
//!
//! Provides [`SharedChannel`] for one port shared between its interrupt
//! vector and tasks, and [`SharedRegistry`] for a whole channel table.

use embedded_hal::delay::DelayNs;

use super::primitives::CriticalSectionCell;
use crate::driver::channel::Channel;
use crate::driver::config::PortId;
use crate::driver::error::{IoError, IoResult};
use crate::driver::interrupt::UartEvents;
use crate::driver::registry::Registry;
use crate::hal::UartHardware;

/// ISR-safe channel slot using critical sections.
///
/// Starts empty so it can be declared `static`; the channel is installed once
/// its hardware handle exists. All access goes through
/// `critical_section::with()`, disabling interrupts for the duration of the
/// closure. Keep the closures short, and do not call blocking helpers
/// (`printf`, `scanf`, `send_blocking`) inside them when they wait on
/// interrupt-driven state.
///
/// # Example
///
/// ```ignore
/// static CONSOLE: SharedChannel<Stm32f1Uart, Delay> = SharedChannel::new();
///
/// CONSOLE.install(Channel::new(PortId::Usart1, uart, delay, ChannelConfig::new()));
/// CONSOLE.with(|ch| ch.init(115_200));
///
/// #[interrupt]
/// fn USART1() {
///     let events = /* read and clear status */;
///     CONSOLE.on_interrupt(events).ok();
/// }
/// ```
pub struct SharedChannel<H: UartHardware, D: DelayNs> {
    inner: CriticalSectionCell<Option<Channel<H, D>>>,
}

impl<H: UartHardware, D: DelayNs> SharedChannel<H, D> {
    /// Create an empty slot (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionCell::new(None),
        }
    }

    /// Place `channel` in the slot, returning the one it replaces.
    pub fn install(&self, channel: Channel<H, D>) -> Option<Channel<H, D>> {
        self.inner.replace(Some(channel))
    }

    /// Take the channel out of the slot.
    pub fn take(&self) -> Option<Channel<H, D>> {
        self.inner.replace(None)
    }

    /// Check if a channel is installed.
    pub fn is_installed(&self) -> bool {
        self.inner.with_ref(Option::is_some)
    }

    /// Execute a closure with exclusive access to the channel.
    ///
    /// Returns `None` if no channel is installed.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Channel<H, D>) -> R,
    {
        self.inner.with(|slot| slot.as_mut().map(f))
    }

    /// Try to execute a closure, returning `None` if already borrowed or
    /// nothing is installed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Channel<H, D>) -> R,
    {
        self.inner.try_with(|slot| slot.as_mut().map(f)).flatten()
    }

    /// Dispatch interrupt events to the installed channel.
    ///
    /// # Errors
    /// - `NotInitialized` - nothing installed
    /// - `RearmFailed` - see [`Channel::on_interrupt`]
    pub fn on_interrupt(&self, events: UartEvents) -> IoResult<()> {
        self.with(|ch| ch.on_interrupt(events))
            .unwrap_or(Err(IoError::NotInitialized))
    }

    /// Move received bytes into `buf`.
    pub fn read(&self, buf: &mut [u8]) -> usize {
        self.with(|ch| ch.read(buf)).unwrap_or(0)
    }

    /// Stage all of `data` and flush it in one critical section.
    ///
    /// Returns `data.len()` once every byte is handed to the transmitter.
    ///
    /// # Errors
    /// - `NotInitialized` - nothing installed or the channel is not initialized
    /// - `Timeout` / `Hardware` - see [`Channel::write_all`]; bytes not yet
    ///   handed to the DMA stay staged
    pub fn send(&self, data: &[u8]) -> IoResult<usize> {
        self.with(|ch| {
            ch.write_all(data)?;
            ch.flush()?;
            Ok(data.len())
        })
        .unwrap_or(Err(IoError::NotInitialized))
    }
}

impl<H: UartHardware, D: DelayNs> Default for SharedChannel<H, D> {
    fn default() -> Self {
        Self::new()
    }
}

/// ISR-safe channel registry using critical sections.
///
/// # Example
///
/// ```ignore
/// static PORTS: SharedRegistry<Stm32f1Uart, Delay, 5> = SharedRegistry::new();
///
/// #[interrupt]
/// fn USART2() {
///     PORTS.dispatch(PortId::Usart2, events).ok();
/// }
/// ```
pub struct SharedRegistry<H: UartHardware, D: DelayNs, const N: usize> {
    inner: CriticalSectionCell<Registry<H, D, N>>,
}

impl<H: UartHardware, D: DelayNs, const N: usize> SharedRegistry<H, D, N> {
    /// Create an empty registry (const, suitable for static initialization).
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionCell::new(Registry::new()),
        }
    }

    /// Execute a closure with exclusive access to the registry.
    ///
    /// Interrupts are disabled for the duration of the closure.
    #[inline]
    pub fn with<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Registry<H, D, N>) -> R,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<R, F>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut Registry<H, D, N>) -> R,
    {
        self.inner.try_with(f)
    }

    /// Route interrupt events to the channel driving `port`.
    ///
    /// # Errors
    /// See [`Registry::dispatch`].
    pub fn dispatch(&self, port: PortId, events: UartEvents) -> IoResult<()> {
        self.inner.with(|registry| registry.dispatch(port, events))
    }
}

impl<H: UartHardware, D: DelayNs, const N: usize> Default for SharedRegistry<H, D, N> {
    fn default() -> Self {
        Self::new()
    }
}
