//! STM32F1xx register backend
//!
//! Drives USART1..3, UART4 and UART5 with the DMA channel assignment fixed by
//! the reference manual:
//!
//! | Port   | Controller | TX channel | RX channel |
//! |--------|------------|------------|------------|
//! | USART1 | DMA1       | 4          | 5          |
//! | USART2 | DMA1       | 7          | 6          |
//! | USART3 | DMA1       | 2          | 3          |
//! | UART4  | DMA2       | 5          | 3          |
//! | UART5  | none       |            |            |
//!
//! UART5 has no DMA request line; configure it with
//! [`ChannelConfig::blocking`](crate::driver::config::ChannelConfig::blocking).
//! Pin muxing and the system clock tree are left to the application.

use crate::driver::config::{DmaMode, PortId};
use crate::driver::error::{HwError, HwResult};
use crate::driver::interrupt::{LineErrors, UartEvents};
use crate::internal::register::dma::{
    CCR_CIRC, CCR_DIR, CCR_HTIE, CCR_MINC, CCR_PL_HIGH, CCR_PL_MEDIUM, CCR_TCIE, CCR_TEIE,
    DMA1_BASE, DMA2_BASE, DmaChannelRegs, FLAG_ALL,
};
use crate::internal::register::rcc::{
    AHBENR_DMA1EN, AHBENR_DMA2EN, AHBENR_OFFSET, APB1ENR_OFFSET, APB1ENR_UART4EN,
    APB1ENR_UART5EN, APB1ENR_USART2EN, APB1ENR_USART3EN, APB2ENR_OFFSET, APB2ENR_USART1EN,
    ClockGate,
};
use crate::internal::register::usart::{
    CR1_IDLEIE, CR1_PEIE, CR1_RE, CR1_TE, CR1_UE, CR3_DMAR, CR3_DMAT, CR3_EIE, SR_ERRORS, SR_IDLE,
    SR_RXNE, SR_TC, SR_TXE, UART4_BASE, UART5_BASE, USART1_BASE, USART2_BASE, USART3_BASE,
    UsartRegs, brr_for,
};

use super::uart::UartHardware;

// =============================================================================
// Port Map
// =============================================================================

/// DMA resources of one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaRoute {
    /// Controller base address
    pub controller: usize,
    /// Controller clock gate
    pub clock: ClockGate,
    /// TX channel (1-based)
    pub tx_channel: u8,
    /// RX channel (1-based)
    pub rx_channel: u8,
}

/// USART register block base of `port`
#[must_use]
pub const fn usart_base(port: PortId) -> usize {
    match port {
        PortId::Usart1 => USART1_BASE,
        PortId::Usart2 => USART2_BASE,
        PortId::Usart3 => USART3_BASE,
        PortId::Uart4 => UART4_BASE,
        PortId::Uart5 => UART5_BASE,
    }
}

/// Clock gate of `port`
#[must_use]
pub const fn usart_clock(port: PortId) -> ClockGate {
    match port {
        PortId::Usart1 => ClockGate {
            offset: APB2ENR_OFFSET,
            bit: APB2ENR_USART1EN,
        },
        PortId::Usart2 => ClockGate {
            offset: APB1ENR_OFFSET,
            bit: APB1ENR_USART2EN,
        },
        PortId::Usart3 => ClockGate {
            offset: APB1ENR_OFFSET,
            bit: APB1ENR_USART3EN,
        },
        PortId::Uart4 => ClockGate {
            offset: APB1ENR_OFFSET,
            bit: APB1ENR_UART4EN,
        },
        PortId::Uart5 => ClockGate {
            offset: APB1ENR_OFFSET,
            bit: APB1ENR_UART5EN,
        },
    }
}

/// DMA resources of `port`, `None` for UART5
#[must_use]
pub const fn dma_route(port: PortId) -> Option<DmaRoute> {
    const DMA1: ClockGate = ClockGate {
        offset: AHBENR_OFFSET,
        bit: AHBENR_DMA1EN,
    };
    const DMA2: ClockGate = ClockGate {
        offset: AHBENR_OFFSET,
        bit: AHBENR_DMA2EN,
    };
    match port {
        PortId::Usart1 => Some(DmaRoute {
            controller: DMA1_BASE,
            clock: DMA1,
            tx_channel: 4,
            rx_channel: 5,
        }),
        PortId::Usart2 => Some(DmaRoute {
            controller: DMA1_BASE,
            clock: DMA1,
            tx_channel: 7,
            rx_channel: 6,
        }),
        PortId::Usart3 => Some(DmaRoute {
            controller: DMA1_BASE,
            clock: DMA1,
            tx_channel: 2,
            rx_channel: 3,
        }),
        PortId::Uart4 => Some(DmaRoute {
            controller: DMA2_BASE,
            clock: DMA2,
            tx_channel: 5,
            rx_channel: 3,
        }),
        PortId::Uart5 => None,
    }
}

/// CCR value for RX (peripheral to memory)
#[must_use]
pub const fn rx_ccr(mode: DmaMode) -> u32 {
    let ccr = CCR_MINC | CCR_PL_HIGH | CCR_TCIE | CCR_HTIE | CCR_TEIE;
    match mode {
        DmaMode::Circular => ccr | CCR_CIRC,
        DmaMode::OneShot => ccr,
    }
}

/// CCR value for TX (memory to peripheral)
#[must_use]
pub const fn tx_ccr() -> u32 {
    CCR_MINC | CCR_DIR | CCR_PL_MEDIUM | CCR_TEIE
}

// =============================================================================
// Backend
// =============================================================================

/// Register-level backend for one STM32F1xx serial port
///
/// Line format is fixed at 8N1; the baud rate comes from
/// [`Channel::init`](crate::driver::channel::Channel::init).
#[derive(Debug)]
pub struct Stm32f1Uart {
    port: PortId,
    regs: UsartRegs,
    clock: ClockGate,
    pclk_hz: u32,
    route: Option<DmaRoute>,
}

impl Stm32f1Uart {
    /// Backend for `port`, clocked from an APB bus running at `pclk_hz`
    ///
    /// USART1 sits on APB2; the others on APB1.
    ///
    /// # Safety
    /// The caller hands over exclusive use of the port's USART registers and
    /// of its DMA channels. No other code may drive them while this backend
    /// exists.
    pub const unsafe fn new(port: PortId, pclk_hz: u32) -> Self {
        Self {
            port,
            regs: UsartRegs::at(usart_base(port)),
            clock: usart_clock(port),
            pclk_hz,
            route: dma_route(port),
        }
    }

    /// Port this backend drives
    pub fn port(&self) -> PortId {
        self.port
    }

    fn rx_channel(&self) -> HwResult<DmaChannelRegs> {
        self.route
            .map(|r| DmaChannelRegs::new(r.controller, r.rx_channel))
            .ok_or(HwError::Unsupported)
    }

    fn tx_channel(&self) -> HwResult<DmaChannelRegs> {
        self.route
            .map(|r| DmaChannelRegs::new(r.controller, r.tx_channel))
            .ok_or(HwError::Unsupported)
    }

    /// Collect pending events for the interrupt handler
    ///
    /// Reads the status register and the RX DMA channel flags (including a
    /// transfer error), clears the DMA flags and the idle flag. Line error flags are left for
    /// [`Channel::on_line_error`](crate::driver::channel::Channel::on_line_error).
    pub fn take_events(&mut self) -> UartEvents {
        let status = self.regs.status();
        let mut events = UartEvents::from_raw(status);
        if let Ok(rx) = self.rx_channel() {
            let flags = rx.flags();
            rx.clear_flags(flags);
            events = events.with_dma_flags(flags);
        }
        // The SR-then-DR clear would also wipe pending line errors
        if status & (SR_IDLE | SR_ERRORS) == SR_IDLE {
            self.regs.clear_idle_and_errors();
        }
        events
    }
}

impl UartHardware for Stm32f1Uart {
    fn is_enabled(&self) -> bool {
        self.clock.is_enabled() && self.regs.cr1() & CR1_UE != 0
    }

    fn init(&mut self, baud_rate: u32) -> HwResult {
        if baud_rate == 0 || self.pclk_hz < baud_rate.saturating_mul(16) {
            return Err(HwError::Fault);
        }

        self.clock.enable();
        self.regs.set_cr1(0);
        self.regs.set_brr(brr_for(self.pclk_hz, baud_rate));
        self.regs.set_cr2(0);
        self.regs.set_cr3(CR3_EIE);
        self.regs.set_cr1(CR1_UE | CR1_TE | CR1_RE | CR1_PEIE);

        if self.regs.cr1() & CR1_UE == 0 {
            return Err(HwError::Fault);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("{} BRR={}", self.port, brr_for(self.pclk_hz, baud_rate));

        Ok(())
    }

    fn deinit(&mut self) -> HwResult {
        self.regs.set_cr1(0);
        self.regs.set_cr3(0);
        self.clock.disable();
        Ok(())
    }

    fn init_rx_dma(&mut self, mode: DmaMode) -> HwResult {
        let ch = self.rx_channel()?;
        if let Some(route) = self.route {
            route.clock.enable();
        }
        ch.disable();
        ch.clear_flags(FLAG_ALL);
        ch.set_ccr(rx_ccr(mode));
        self.regs.set_cr3_bits(CR3_DMAR);
        Ok(())
    }

    fn deinit_rx_dma(&mut self) -> HwResult {
        let ch = self.rx_channel()?;
        self.regs.clear_cr3_bits(CR3_DMAR);
        ch.set_ccr(0);
        ch.clear_flags(FLAG_ALL);
        Ok(())
    }

    fn init_tx_dma(&mut self) -> HwResult {
        let ch = self.tx_channel()?;
        if let Some(route) = self.route {
            route.clock.enable();
        }
        ch.disable();
        ch.clear_flags(FLAG_ALL);
        ch.set_ccr(tx_ccr());
        self.regs.set_cr3_bits(CR3_DMAT);
        Ok(())
    }

    fn deinit_tx_dma(&mut self) -> HwResult {
        let ch = self.tx_channel()?;
        self.regs.clear_cr3_bits(CR3_DMAT);
        ch.set_ccr(0);
        ch.clear_flags(FLAG_ALL);
        Ok(())
    }

    fn enable_idle_interrupt(&mut self, enabled: bool) {
        if enabled {
            self.regs.clear_idle_and_errors();
            self.regs.set_cr1_bits(CR1_IDLEIE);
        } else {
            self.regs.clear_cr1_bits(CR1_IDLEIE);
        }
    }

    unsafe fn start_rx_dma(&mut self, buf: *mut u8, len: usize) -> HwResult {
        let ch = self.rx_channel()?;
        let count = u16::try_from(len).map_err(|_| HwError::Fault)?;
        if count == 0 {
            return Err(HwError::Fault);
        }
        if ch.is_enabled() {
            ch.disable();
        }
        ch.clear_flags(FLAG_ALL);
        ch.set_transfer(self.regs.dr_addr(), buf as usize, count);
        ch.enable();
        if !ch.is_enabled() {
            return Err(HwError::Busy);
        }
        Ok(())
    }

    fn rx_dma_remaining(&self) -> usize {
        self.rx_channel().map_or(0, |ch| ch.remaining() as usize)
    }

    fn abort_rx_dma(&mut self) {
        if let Ok(ch) = self.rx_channel() {
            ch.disable();
            ch.clear_flags(FLAG_ALL);
        }
    }

    unsafe fn start_tx_dma(&mut self, buf: *const u8, len: usize) -> HwResult {
        let ch = self.tx_channel()?;
        let count = u16::try_from(len).map_err(|_| HwError::Fault)?;
        if count == 0 {
            return Err(HwError::Fault);
        }
        ch.disable();
        ch.clear_flags(FLAG_ALL);
        self.regs.clear_tc();
        ch.set_transfer(self.regs.dr_addr(), buf as usize, count);
        ch.enable();
        if !ch.is_enabled() {
            return Err(HwError::Busy);
        }
        Ok(())
    }

    fn abort_tx_dma(&mut self) {
        if let Ok(ch) = self.tx_channel() {
            ch.disable();
            ch.clear_flags(FLAG_ALL);
        }
    }

    fn transmission_complete(&self) -> bool {
        self.regs.status() & SR_TC != 0
    }

    fn clear_line_errors(&mut self, _errors: LineErrors) {
        // PE, FE, NE and ORE clear together on the SR-then-DR read sequence
        self.regs.clear_idle_and_errors();
    }

    fn tx_ready(&self) -> bool {
        self.regs.status() & SR_TXE != 0
    }

    fn write_byte(&mut self, byte: u8) {
        self.regs.set_data(u32::from(byte));
    }

    fn rx_ready(&self) -> bool {
        self.regs.status() & SR_RXNE != 0
    }

    fn read_byte(&mut self) -> u8 {
        (self.regs.data() & 0xFF) as u8
    }

    fn take_idle(&mut self) -> bool {
        if self.regs.status() & SR_IDLE == 0 {
            return false;
        }
        self.regs.clear_idle_and_errors();
        true
    }
}
