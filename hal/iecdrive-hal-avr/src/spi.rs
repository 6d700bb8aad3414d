//! Hardware SPI master and card selects
//!
//! The SPI block runs mode 0, MSB first. Slow is F_CPU/128 (62.5 kHz at
//! 8 MHz, well under the 400 kHz identification limit), fast is F_CPU/2.

use iecdrive_core::config::{AvrChip, AvrSpiPins, BoardConfig, Family, PinConfig};
use iecdrive_core::{ConfigError, SpiSpeed};
use iecdrive_hal::{ChipSelect, SpiController};

use crate::regs::{bits, AvrIo, AvrReg};

/// SPI controller
pub struct AvrSpi<'a, IO> {
    io: &'a IO,
    pins: AvrSpiPins,
}

impl<'a, IO: AvrIo> AvrSpi<'a, IO> {
    pub fn new(io: &'a IO, chip: AvrChip) -> Self {
        Self {
            io,
            pins: chip.spi_pins(),
        }
    }

    fn write_speed(&self, speed: SpiSpeed) {
        let (spr, spi2x) = match speed {
            SpiSpeed::Slow => (bits::SPR1 | bits::SPR0, 0),
            SpiSpeed::Fast => (0, bits::SPI2X),
        };
        self.io.write(AvrReg::Spcr, bits::SPE | bits::MSTR | spr);
        self.io.write(AvrReg::Spsr, spi2x);
    }
}

impl<IO: AvrIo> SpiController for AvrSpi<'_, IO> {
    fn configure(&mut self, speed: SpiSpeed) {
        let p = self.pins;
        critical_section::with(|_| {
            // SS must be an output or a low level would drop master mode
            let outputs = (1 << p.ss) | (1 << p.sck) | (1 << p.mosi);
            self.io.set_bits(AvrReg::Ddr(p.port), outputs);
            self.io.clear_bits(AvrReg::Ddr(p.port), 1 << p.miso);
            self.io.set_bits(AvrReg::Port(p.port), 1 << p.miso);
        });
        self.write_speed(speed);
    }

    fn set_speed(&mut self, speed: SpiSpeed) {
        self.write_speed(speed);
    }

    #[inline]
    fn exchange(&mut self, byte: u8) -> u8 {
        self.io.write(AvrReg::Spdr, byte);
        while self.io.read(AvrReg::Spsr) & bits::SPIF == 0 {}
        self.io.read(AvrReg::Spdr)
    }
}

/// Active-low card selects on port pins
pub struct AvrChipSelect<'a, IO> {
    io: &'a IO,
    slots: [Option<PinConfig>; 2],
}

impl<'a, IO: AvrIo> AvrChipSelect<'a, IO> {
    pub fn new(io: &'a IO, config: &BoardConfig) -> Result<Self, ConfigError> {
        if !matches!(config.family, Family::Avr(_)) {
            return Err(ConfigError::WrongFamily);
        }
        Ok(Self {
            io,
            slots: [Some(config.spi.card0), config.spi.card1],
        })
    }
}

impl<IO: AvrIo> ChipSelect for AvrChipSelect<'_, IO> {
    fn init(&mut self) {
        critical_section::with(|_| {
            for pin in self.slots.iter().flatten() {
                let mask = pin.mask() as u8;
                self.io.set_bits(AvrReg::Port(pin.port), mask);
                self.io.set_bits(AvrReg::Ddr(pin.port), mask);
            }
        });
    }

    fn slots(&self) -> u8 {
        self.slots.iter().flatten().count() as u8
    }

    fn set_slot(&mut self, slot: u8, asserted: bool) {
        if let Some(Some(pin)) = self.slots.get(slot as usize) {
            let mask = pin.mask() as u8;
            critical_section::with(|_| self.io.put_bits(AvrReg::Port(pin.port), mask, !asserted));
        }
    }
}
