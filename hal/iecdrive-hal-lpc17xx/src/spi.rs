//! SSP master and card selects
//!
//! The SSP runs 8-bit SPI frames in mode 0. The bit rate is PCLK / CPSR with
//! an even CPSR of at least 2 (`SCR` stays 0). Card selects are plain GPIO
//! pins driven through `FIOSET`/`FIOCLR`, so no read-modify-write is needed.

use iecdrive_core::config::{BoardConfig, Family, PinConfig};
use iecdrive_core::{ConfigError, SpiSpeed};
use iecdrive_hal::{ChipSelect, SpiController};

use crate::regs::{bits, GpioReg, LpcIo, LpcReg, SspReg};

/// Even SSP clock prescaler giving at most `max_hz` from `pclk_hz`
pub const fn prescaler(pclk_hz: u32, max_hz: u32) -> u32 {
    let div = pclk_hz.div_ceil(max_hz);
    let even = div + (div & 1);
    if even < 2 {
        2
    } else if even > 254 {
        254
    } else {
        even
    }
}

pub struct LpcSsp<'a, IO> {
    io: &'a IO,
    ssp: u8,
    pclk_hz: u32,
}

impl<'a, IO: LpcIo> LpcSsp<'a, IO> {
    /// SSP controller of `config`
    pub fn new(io: &'a IO, config: &BoardConfig) -> Result<Self, ConfigError> {
        if config.family != Family::Lpc17xx {
            return Err(ConfigError::WrongFamily);
        }
        if config.spi.controller > 1 {
            return Err(ConfigError::NoSuchSpiController);
        }
        Ok(Self {
            io,
            ssp: config.spi.controller,
            pclk_hz: config.pclk_hz,
        })
    }

    fn reg(&self, reg: SspReg) -> LpcReg {
        LpcReg::Ssp(self.ssp, reg)
    }
}

impl<IO: LpcIo> SpiController for LpcSsp<'_, IO> {
    fn configure(&mut self, speed: SpiSpeed) {
        critical_section::with(|_| {
            self.io.set_bits(LpcReg::Pconp, bits::PCONP_SSP[self.ssp as usize]);
        });
        self.io.write(self.reg(SspReg::Cr1), 0);
        self.io.write(self.reg(SspReg::Cr0), bits::CR0_SPI8);
        self.set_speed(speed);
        self.io.write(self.reg(SspReg::Cr1), bits::CR1_SSE);
        // Drop anything left in the receive FIFO
        while self.io.read(self.reg(SspReg::Sr)) & bits::SR_RNE != 0 {
            self.io.read(self.reg(SspReg::Dr));
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("spi: ssp{} cpsr {}", self.ssp, self.io.read(self.reg(SspReg::Cpsr)));
    }

    fn set_speed(&mut self, speed: SpiSpeed) {
        let cpsr = prescaler(self.pclk_hz, speed.max_hz());
        self.io.write(self.reg(SspReg::Cpsr), cpsr);
    }

    #[inline]
    fn exchange(&mut self, byte: u8) -> u8 {
        self.io.write(self.reg(SspReg::Dr), byte as u32);
        while self.io.read(self.reg(SspReg::Sr)) & bits::SR_RNE == 0 {}
        self.io.read(self.reg(SspReg::Dr)) as u8
    }
}

/// Active-low card selects on GPIO pins
pub struct LpcChipSelect<'a, IO> {
    io: &'a IO,
    slots: [Option<PinConfig>; 2],
}

impl<'a, IO: LpcIo> LpcChipSelect<'a, IO> {
    pub fn new(io: &'a IO, config: &BoardConfig) -> Result<Self, ConfigError> {
        if config.family != Family::Lpc17xx {
            return Err(ConfigError::WrongFamily);
        }
        Ok(Self {
            io,
            slots: [Some(config.spi.card0), config.spi.card1],
        })
    }
}

impl<IO: LpcIo> ChipSelect for LpcChipSelect<'_, IO> {
    fn init(&mut self) {
        for pin in self.slots.iter().flatten() {
            self.io.write(LpcReg::Gpio(pin.port, GpioReg::Set), pin.mask());
            critical_section::with(|_| {
                self.io.set_bits(LpcReg::Gpio(pin.port, GpioReg::Dir), pin.mask());
            });
        }
    }

    fn slots(&self) -> u8 {
        self.slots.iter().flatten().count() as u8
    }

    fn set_slot(&mut self, slot: u8, asserted: bool) {
        if let Some(Some(pin)) = self.slots.get(slot as usize) {
            let reg = if asserted { GpioReg::Clr } else { GpioReg::Set };
            self.io.write(LpcReg::Gpio(pin.port, reg), pin.mask());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLpc;
    use iecdrive_core::{Board, SpiDevice};
    use iecdrive_hal::SpiTransport;
    use proptest::prelude::*;

    type Transport<'a> = SpiTransport<LpcSsp<'a, SimLpc>, LpcChipSelect<'a, SimLpc>>;

    fn transport(sim: &SimLpc, board: Board) -> Transport<'_> {
        let ssp = LpcSsp::new(sim, board.config()).unwrap();
        let cs = LpcChipSelect::new(sim, board.config()).unwrap();
        let mut spi = SpiTransport::new(ssp, cs);
        spi.init(SpiSpeed::Slow);
        spi
    }

    #[test]
    fn test_prescaler_presets() {
        // 25 MHz: 390.6 kHz slow, 12.5 MHz fast
        assert_eq!(prescaler(25_000_000, 400_000), 64);
        assert_eq!(prescaler(25_000_000, 25_000_000), 2);
        assert_eq!(prescaler(24_000_000, 400_000), 60);
        assert_eq!(prescaler(100_000_000, 100_000), 254);
    }

    proptest! {
        #[test]
        fn prop_prescaler_never_exceeds_limit(pclk in 1_000_000u32..120_000_000, max in 200_000u32..50_000_000) {
            let cpsr = prescaler(pclk, max);
            prop_assert!(cpsr % 2 == 0);
            prop_assert!((2..=254).contains(&cpsr));
            if cpsr < 254 {
                prop_assert!(pclk / cpsr <= max);
            }
        }
    }

    #[test]
    fn test_init_enables_controller() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let _spi = transport(&sim, Board::LpcParallel);
        assert_ne!(sim.peek(LpcReg::Pconp) & (1 << 10), 0);
        assert_eq!(sim.peek(LpcReg::Ssp(1, SspReg::Cr0)), bits::CR0_SPI8);
        assert_eq!(sim.peek(LpcReg::Ssp(1, SspReg::Cr1)), bits::CR1_SSE);
        assert_eq!(sim.peek(LpcReg::Ssp(1, SspReg::Cpsr)), 60);
        assert!(sim.pin(0, 6));
    }

    #[test]
    fn test_select_exclusive() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut spi = transport(&sim, Board::LpcDevboard);
        spi.select_device(SpiDevice::Card0);
        assert!(!sim.pin(0, 16));
        assert!(sim.pin(0, 22));
        spi.select_device(SpiDevice::Card1);
        assert!(sim.pin(0, 16));
        assert!(!sim.pin(0, 22));
        spi.select_device(SpiDevice::None);
        assert!(sim.pin(0, 16));
        assert!(sim.pin(0, 22));
    }

    #[test]
    fn test_speed_switch_keeps_selection() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut spi = transport(&sim, Board::LpcDevboard);
        spi.select_device(SpiDevice::Card1);
        spi.set_speed(SpiSpeed::Fast);
        assert_eq!(sim.peek(LpcReg::Ssp(0, SspReg::Cpsr)), 2);
        assert!(!sim.pin(0, 22));
        assert_eq!(spi.device(), SpiDevice::Card1);
    }

    #[test]
    fn test_block_transfer() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut spi = transport(&sim, Board::LpcDevboard);
        sim.queue_spi_rx(&[0x00, 0xfe, 0x12, 0x34]);
        spi.tx_block(&[0x51, 0x00]);
        let mut buf = [0u8; 2];
        spi.rx_block(&mut buf);
        assert_eq!(buf, [0x12, 0x34]);
        assert_eq!(sim.spi_sent().as_slice(), &[0x51, 0x00, 0xff, 0xff]);
    }

    #[test]
    fn test_avr_board_rejected() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        assert!(matches!(
            LpcSsp::new(&sim, Board::Uiec.config()),
            Err(ConfigError::WrongFamily)
        ));
    }
}
