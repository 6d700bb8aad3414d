//! Parallel port with handshake
//!
//! Eight data bits on one whole port. The handshake output is open drain:
//! `PORT` stays low and the pin is pulled low by turning it into an output.
//! A falling edge on the handshake input latches the received flag.
//!
//! A pin-change group fires on both edges. The handler remembers the level
//! it last saw, so a low pulse that is already over when the handler runs
//! still counts, while the rising edge closing a counted pulse does not.

use embedded_hal::delay::DelayNs;
use iecdrive_core::config::{EdgeSource, ParallelConfig};
use iecdrive_core::{ConfigError, Vector};
use iecdrive_hal::parallel::HANDSHAKE_PULSE_US;
use iecdrive_hal::{Direction, HandshakeFlag, ParallelPort};
use portable_atomic::{AtomicBool, Ordering};

use crate::regs::{AvrIo, AvrReg};

pub struct AvrParallel<'a, IO> {
    io: &'a IO,
    config: ParallelConfig,
    flag: &'a HandshakeFlag,
    /// Handshake input level seen by the last interrupt
    last_high: AtomicBool,
}

impl<'a, IO: AvrIo> AvrParallel<'a, IO> {
    pub fn new(
        io: &'a IO,
        config: ParallelConfig,
        flag: &'a HandshakeFlag,
    ) -> Result<Self, ConfigError> {
        match config.hsk_edge {
            EdgeSource::ExtInt(_) | EdgeSource::PinChange { .. } => {}
            _ => return Err(ConfigError::WrongFamily),
        }
        if config.data_shift != 0 {
            return Err(ConfigError::ParallelDataRange);
        }
        Ok(Self {
            io,
            config,
            flag,
            last_high: AtomicBool::new(true),
        })
    }

    fn hsk_in_low(&self) -> bool {
        let pin = self.config.hsk_in;
        self.io.read(AvrReg::Pin(pin.port)) & pin.mask() as u8 == 0
    }
}

impl<IO: AvrIo> ParallelPort for AvrParallel<'_, IO> {
    fn init(&mut self) {
        let out = self.config.hsk_out;
        let inp = self.config.hsk_in;
        critical_section::with(|_| {
            self.io.write(AvrReg::Ddr(self.config.data_port), 0);
            self.io.write(AvrReg::Port(self.config.data_port), 0xff);

            self.io.clear_bits(AvrReg::Port(out.port), out.mask() as u8);
            self.io.clear_bits(AvrReg::Ddr(out.port), out.mask() as u8);

            self.io.clear_bits(AvrReg::Ddr(inp.port), inp.mask() as u8);
            self.io.put_bits(AvrReg::Port(inp.port), inp.mask() as u8, inp.pull_up);

            match self.config.hsk_edge {
                EdgeSource::ExtInt(n) => {
                    // ISCn1:0 = 10, falling edge
                    let shift = 2 * n;
                    self.io
                        .modify(AvrReg::Eicra, |v| (v & !(0b11 << shift)) | (0b10 << shift));
                    self.io.write(AvrReg::Eifr, 1 << n);
                    self.io.set_bits(AvrReg::Eimsk, 1 << n);
                }
                EdgeSource::PinChange { group, bit } => {
                    self.io.set_bits(AvrReg::Pcmsk(group), 1 << bit);
                    self.io.write(AvrReg::Pcifr, 1 << group);
                    self.io.set_bits(AvrReg::Pcicr, 1 << group);
                }
                _ => {}
            }
        });
        self.last_high.store(!self.hsk_in_low(), Ordering::Relaxed);
        self.flag.take();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "parallel: data port {}, handshake {}",
            self.config.data_port,
            self.config.hsk_edge
        );
    }

    fn set_direction(&mut self, dir: Direction) {
        let port = self.config.data_port;
        match dir {
            Direction::Output => self.io.write(AvrReg::Ddr(port), 0xff),
            Direction::Input => {
                self.io.write(AvrReg::Ddr(port), 0);
                self.io.write(AvrReg::Port(port), 0xff);
            }
        }
    }

    #[inline]
    fn read(&self) -> u8 {
        self.io.read(AvrReg::Pin(self.config.data_port))
    }

    #[inline]
    fn write(&mut self, byte: u8) {
        self.io.write(AvrReg::Port(self.config.data_port), byte);
    }

    fn send_handshake<D: DelayNs>(&mut self, delay: &mut D) {
        let out = self.config.hsk_out;
        let mask = out.mask() as u8;
        critical_section::with(|_| self.io.set_bits(AvrReg::Ddr(out.port), mask));
        delay.delay_us(HANDSHAKE_PULSE_US);
        critical_section::with(|_| self.io.clear_bits(AvrReg::Ddr(out.port), mask));
    }

    fn on_interrupt(&self, vector: Vector) -> bool {
        let handshake = match (self.config.hsk_edge, vector) {
            (EdgeSource::ExtInt(n), Vector::ExtInt(v)) if n == v => {
                // Falling-edge sense: every interrupt is a handshake
                self.io.write(AvrReg::Eifr, 1 << n);
                self.last_high.store(!self.hsk_in_low(), Ordering::Relaxed);
                true
            }
            (EdgeSource::PinChange { group, .. }, Vector::PinChange(g)) if group == g => {
                self.io.write(AvrReg::Pcifr, 1 << g);
                let high = !self.hsk_in_low();
                let was_high = self.last_high.swap(high, Ordering::Relaxed);
                // Low now, or high again after a pulse nobody saw
                !high || was_high
            }
            _ => false,
        };
        if handshake {
            self.flag.raise();
        }
        handshake
    }

    fn take_handshake(&self) -> bool {
        self.flag.take()
    }
}
