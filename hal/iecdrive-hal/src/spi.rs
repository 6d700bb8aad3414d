//! SPI transport
//!
//! Chip HALs provide two seams: an [`SpiController`] that shifts bytes and
//! a [`ChipSelect`] that drives the card select lines. [`SpiTransport`]
//! combines them into the byte/block transport used by the storage layer.
//!
//! The transport performs no retries and reports no errors; corrupted or
//! missing responses are detected above it through CRCs and timeouts.

use core::convert::Infallible;

use iecdrive_core::{SpiDevice, SpiSpeed};

/// SPI bus master
pub trait SpiController {
    /// Power up and configure the controller as mode 0 master at `speed`
    fn configure(&mut self, speed: SpiSpeed);

    /// Switch the clock preset without reconfiguring anything else
    fn set_speed(&mut self, speed: SpiSpeed);

    /// Shift one byte out and return the byte shifted in
    fn exchange(&mut self, byte: u8) -> u8;
}

/// Card select lines (active low)
pub trait ChipSelect {
    /// Configure every select line as an output, deasserted
    fn init(&mut self);

    /// Number of card slots on the board
    fn slots(&self) -> u8;

    /// Assert or deassert the select line of `slot`
    fn set_slot(&mut self, slot: u8, asserted: bool);
}

/// Byte and block SPI transport with device multiplexing
pub struct SpiTransport<C, S> {
    ctrl: C,
    cs: S,
    device: SpiDevice,
    speed: SpiSpeed,
}

impl<C: SpiController, S: ChipSelect> SpiTransport<C, S> {
    /// Create a transport; nothing is touched until [`init`](Self::init)
    pub fn new(ctrl: C, cs: S) -> Self {
        Self {
            ctrl,
            cs,
            device: SpiDevice::None,
            speed: SpiSpeed::Slow,
        }
    }

    /// Configure the controller and idle with no device selected
    pub fn init(&mut self, speed: SpiSpeed) {
        self.cs.init();
        self.device = SpiDevice::None;
        self.ctrl.configure(speed);
        self.speed = speed;

        #[cfg(feature = "defmt")]
        defmt::debug!("spi: init {} with {} slots", speed, self.cs.slots());
    }

    /// Change which select lines are asserted
    ///
    /// Lines that must drop are deasserted before any line is asserted, so
    /// two cards are never selected together except by
    /// [`SpiDevice::AllCards`]. A card the board has no slot for selects
    /// nothing and is recorded as [`SpiDevice::None`].
    pub fn select_device(&mut self, device: SpiDevice) {
        let slots = self.cs.slots();
        let device = if (0..slots).any(|slot| device.selects(slot)) {
            device
        } else {
            SpiDevice::None
        };
        for slot in 0..slots {
            if !device.selects(slot) {
                self.cs.set_slot(slot, false);
            }
        }
        for slot in 0..slots {
            if device.selects(slot) {
                self.cs.set_slot(slot, true);
            }
        }
        self.device = device;
    }

    /// Switch between the clock presets, keeping the selection
    pub fn set_speed(&mut self, speed: SpiSpeed) {
        self.ctrl.set_speed(speed);
        self.speed = speed;
    }

    /// Currently selected device
    pub fn device(&self) -> SpiDevice {
        self.device
    }

    /// Current clock preset
    pub fn speed(&self) -> SpiSpeed {
        self.speed
    }

    /// Full-duplex single byte exchange
    #[inline]
    pub fn exchange_byte(&mut self, byte: u8) -> u8 {
        self.ctrl.exchange(byte)
    }

    /// Send one byte, discarding the byte received
    #[inline]
    pub fn tx_byte(&mut self, byte: u8) {
        self.ctrl.exchange(byte);
    }

    /// Receive one byte, sending 0xFF
    #[inline]
    pub fn rx_byte(&mut self) -> u8 {
        self.ctrl.exchange(0xff)
    }

    /// Send a block of bytes
    pub fn tx_block(&mut self, data: &[u8]) {
        for &byte in data {
            self.tx_byte(byte);
        }
    }

    /// Fill a block with received bytes
    pub fn rx_block(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.rx_byte();
        }
    }

    /// Give back the controller and select lines
    pub fn release(self) -> (C, S) {
        (self.ctrl, self.cs)
    }
}

impl<C, S> embedded_hal::spi::ErrorType for SpiTransport<C, S> {
    type Error = Infallible;
}

impl<C: SpiController, S: ChipSelect> embedded_hal::spi::SpiBus<u8> for SpiTransport<C, S> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        self.rx_block(words);
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        self.tx_block(words);
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let len = read.len().max(write.len());
        for i in 0..len {
            let rx = self.exchange_byte(write.get(i).copied().unwrap_or(0xff));
            if let Some(slot) = read.get_mut(i) {
                *slot = rx;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        for word in words.iter_mut() {
            *word = self.exchange_byte(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
