//! Channel registry
//!
//! Maps physical ports to their [`Channel`]s. Slots are filled by
//! [`Registry::register`] (or all at once from a configuration table) and
//! addressed afterwards through the [`ChannelHandle`] each registration
//! returns, or looked up by [`PortId`] from an interrupt vector.

use embedded_hal::delay::DelayNs;

use super::channel::Channel;
use super::config::{ChannelConfig, PortId};
use super::error::{IoError, IoResult, RegistryError};
use super::interrupt::UartEvents;
use crate::hal::UartHardware;

/// Index of a registered channel
///
/// Only [`Registry::register`] mints handles. A handle stays valid until the
/// channel is [removed](Registry::remove).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelHandle(usize);

impl ChannelHandle {
    /// Slot index behind the handle
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// One row of a channel configuration table
#[derive(Debug)]
pub struct ChannelEntry<H, D> {
    /// Port the channel drives
    pub port: PortId,
    /// Hardware backend for the port
    pub hw: H,
    /// Delay provider for the channel's bounded waits
    pub delay: D,
    /// Channel configuration
    pub config: ChannelConfig,
}

impl<H, D> ChannelEntry<H, D> {
    /// Create a table row
    pub const fn new(port: PortId, hw: H, delay: D, config: ChannelConfig) -> Self {
        Self {
            port,
            hw,
            delay,
            config,
        }
    }
}

/// Fixed-size set of channels, at most one per port
///
/// # Type Parameters
/// * `N` - Number of slots
pub struct Registry<H: UartHardware, D: DelayNs, const N: usize> {
    slots: [Option<Channel<H, D>>; N],
}

impl<H: UartHardware, D: DelayNs, const N: usize> Default for Registry<H, D, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: UartHardware, D: DelayNs, const N: usize> Registry<H, D, N> {
    /// Create an empty registry
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
        }
    }

    /// Build a registry from a configuration table
    ///
    /// Rows are registered in order; the first rejected row aborts the build.
    ///
    /// # Errors
    /// Same as [`register`](Self::register).
    pub fn from_table<I>(table: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = ChannelEntry<H, D>>,
    {
        let mut registry = Self::new();
        for entry in table {
            registry.register(entry.port, entry.hw, entry.delay, entry.config)?;
        }
        Ok(registry)
    }

    /// Add an uninitialized channel for `port`
    ///
    /// # Errors
    /// - `InvalidConfig` - `config` failed validation
    /// - `Duplicate` - `port` already has a channel
    /// - `Full` - every slot is occupied
    pub fn register(
        &mut self,
        port: PortId,
        hw: H,
        delay: D,
        config: ChannelConfig,
    ) -> Result<ChannelHandle, RegistryError> {
        if config.validate().is_err() {
            return Err(RegistryError::InvalidConfig);
        }
        if self.handle_of(port).is_some() {
            return Err(RegistryError::Duplicate);
        }
        let index = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(RegistryError::Full)?;

        self.slots[index] = Some(Channel::new(port, hw, delay, config));

        #[cfg(feature = "defmt")]
        defmt::debug!("registered {} in slot {}", port, index);

        Ok(ChannelHandle(index))
    }

    /// Take a channel out of the registry
    ///
    /// An initialized channel aborts its transfers when dropped; call
    /// [`Channel::deinit`] first to release the hardware cleanly.
    pub fn remove(&mut self, handle: ChannelHandle) -> Option<Channel<H, D>> {
        self.slots.get_mut(handle.0)?.take()
    }

    /// Channel behind `handle`
    pub fn channel(&self, handle: ChannelHandle) -> Option<&Channel<H, D>> {
        self.slots.get(handle.0)?.as_ref()
    }

    /// Mutable channel behind `handle`
    pub fn channel_mut(&mut self, handle: ChannelHandle) -> Option<&mut Channel<H, D>> {
        self.slots.get_mut(handle.0)?.as_mut()
    }

    /// Handle of the channel driving `port`
    pub fn handle_of(&self, port: PortId) -> Option<ChannelHandle> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|ch| ch.port() == port))
            .map(ChannelHandle)
    }

    /// Number of registered channels
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Check if no channel is registered
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Registered channels with their handles, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ChannelHandle, &Channel<H, D>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|ch| (ChannelHandle(i), ch)))
    }

    /// Mutable registered channels with their handles, in slot order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChannelHandle, &mut Channel<H, D>)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|ch| (ChannelHandle(i), ch)))
    }

    /// Route interrupt events to the channel driving `port`
    ///
    /// Intended to be called from each port's interrupt vector.
    ///
    /// # Errors
    /// - `NotInitialized` - no initialized channel drives `port`
    /// - `RearmFailed` - see [`Channel::on_interrupt`]
    pub fn dispatch(&mut self, port: PortId, events: UartEvents) -> IoResult<()> {
        let handle = self.handle_of(port).ok_or(IoError::NotInitialized)?;
        match self.channel_mut(handle) {
            Some(ch) if ch.is_initialized() => ch.on_interrupt(events),
            _ => Err(IoError::NotInitialized),
        }
    }
}

impl<H: UartHardware, D: DelayNs, const N: usize> core::fmt::Debug for Registry<H, D, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|(_, ch)| ch.port()))
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use super::*;
    use crate::test_utils::{MockDelay, MockUart};

    type TestRegistry<const N: usize> = Registry<MockUart, MockDelay, N>;

    fn small() -> ChannelConfig {
        ChannelConfig::new().with_rx_sizes(16, 32).with_tx_buf_size(16)
    }

    fn entry(port: PortId) -> ChannelEntry<MockUart, MockDelay> {
        ChannelEntry::new(port, MockUart::new(), MockDelay::new(), small())
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = TestRegistry::<4>::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert_eq!(registry.handle_of(PortId::Usart1), None);
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = TestRegistry::<4>::new();
        let h1 = registry
            .register(PortId::Usart1, MockUart::new(), MockDelay::new(), small())
            .unwrap();
        let h3 = registry
            .register(PortId::Usart3, MockUart::new(), MockDelay::new(), small())
            .unwrap();

        assert_ne!(h1, h3);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.handle_of(PortId::Usart3), Some(h3));
        assert_eq!(registry.handle_of(PortId::Usart2), None);
        assert_eq!(registry.channel(h1).map(Channel::port), Some(PortId::Usart1));
    }

    #[test]
    fn register_rejects_duplicate_port() {
        let mut registry = TestRegistry::<4>::new();
        registry
            .register(PortId::Uart4, MockUart::new(), MockDelay::new(), small())
            .unwrap();
        let result = registry.register(PortId::Uart4, MockUart::new(), MockDelay::new(), small());
        assert_eq!(result.err(), Some(RegistryError::Duplicate));
    }

    #[test]
    fn register_rejects_when_full() {
        let mut registry = TestRegistry::<2>::new();
        registry
            .register(PortId::Usart1, MockUart::new(), MockDelay::new(), small())
            .unwrap();
        registry
            .register(PortId::Usart2, MockUart::new(), MockDelay::new(), small())
            .unwrap();
        let result = registry.register(PortId::Usart3, MockUart::new(), MockDelay::new(), small());
        assert_eq!(result.err(), Some(RegistryError::Full));
    }

    #[test]
    fn register_rejects_invalid_config() {
        let mut registry = TestRegistry::<2>::new();
        let config = small().with_rx_sizes(16, 24);
        let result = registry.register(PortId::Usart1, MockUart::new(), MockDelay::new(), config);
        assert_eq!(result.err(), Some(RegistryError::InvalidConfig));
        assert!(registry.is_empty());
    }

    #[test]
    fn from_table_builds_sparse_registry() {
        let registry = TestRegistry::<5>::from_table([
            entry(PortId::Usart1),
            entry(PortId::Uart4),
        ])
        .unwrap();

        let ports: Vec<PortId> = registry.iter().map(|(_, ch)| ch.port()).collect();
        assert_eq!(ports, [PortId::Usart1, PortId::Uart4]);
        assert_eq!(registry.handle_of(PortId::Uart5), None);
    }

    #[test]
    fn from_table_stops_at_first_rejected_row() {
        let result = TestRegistry::<4>::from_table([entry(PortId::Usart2), entry(PortId::Usart2)]);
        assert_eq!(result.err(), Some(RegistryError::Duplicate));
    }

    #[test]
    fn remove_frees_slot_and_invalidates_handle() {
        let mut registry = TestRegistry::<1>::new();
        let handle = registry
            .register(PortId::Usart1, MockUart::new(), MockDelay::new(), small())
            .unwrap();

        let channel = registry.remove(handle);
        assert_eq!(channel.map(|ch| ch.port()), Some(PortId::Usart1));
        assert!(registry.channel(handle).is_none());
        assert!(registry.remove(handle).is_none());

        assert!(
            registry
                .register(PortId::Usart2, MockUart::new(), MockDelay::new(), small())
                .is_ok()
        );
    }

    #[test]
    fn dispatch_routes_events_by_port() {
        let mut registry = TestRegistry::<4>::from_table([
            entry(PortId::Usart1),
            entry(PortId::Usart2),
        ])
        .unwrap();
        for (_, ch) in registry.iter_mut() {
            ch.init(115_200).unwrap();
        }

        let h2 = registry.handle_of(PortId::Usart2).unwrap();
        let events = registry
            .channel_mut(h2)
            .unwrap()
            .hardware_mut()
            .receive(b"hi");
        registry.dispatch(PortId::Usart2, events).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(registry.channel_mut(h2).unwrap().read(&mut buf), 2);
        assert_eq!(&buf[..2], b"hi");

        let h1 = registry.handle_of(PortId::Usart1).unwrap();
        assert_eq!(registry.channel(h1).unwrap().available(), 0);
    }

    #[test]
    fn dispatch_to_unknown_or_idle_port_is_rejected() {
        let mut registry = TestRegistry::<2>::from_table([entry(PortId::Usart1)]).unwrap();
        let events = UartEvents {
            idle: true,
            ..UartEvents::default()
        };

        assert_eq!(registry.dispatch(PortId::Usart3, events), Err(IoError::NotInitialized));
        assert_eq!(registry.dispatch(PortId::Usart1, events), Err(IoError::NotInitialized));
    }
}
