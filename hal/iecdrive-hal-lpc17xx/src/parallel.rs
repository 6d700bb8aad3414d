//! Parallel port with handshake
//!
//! Data bits and the handshake output are switched to open-drain mode, so
//! a high bit is a released pin. The handshake input uses the falling-edge
//! GPIO interrupt of its port, which shares the EINT3 vector.

use embedded_hal::delay::DelayNs;
use iecdrive_core::config::{EdgeSource, ParallelConfig};
use iecdrive_core::{ConfigError, Vector};
use iecdrive_hal::parallel::HANDSHAKE_PULSE_US;
use iecdrive_hal::{Direction, HandshakeFlag, ParallelPort};

use crate::regs::{irq, GpioIntReg, GpioReg, LpcIo, LpcReg};

pub struct LpcParallel<'a, IO> {
    io: &'a IO,
    config: ParallelConfig,
    flag: &'a HandshakeFlag,
}

impl<'a, IO: LpcIo> LpcParallel<'a, IO> {
    pub fn new(
        io: &'a IO,
        config: ParallelConfig,
        flag: &'a HandshakeFlag,
    ) -> Result<Self, ConfigError> {
        if config.hsk_edge != EdgeSource::GpioInt {
            return Err(ConfigError::WrongFamily);
        }
        // Only ports 0 and 2 have GPIO interrupts
        let port = config.hsk_in.port;
        if port != 0 && port != 2 {
            return Err(ConfigError::NoGpioInterrupt { port });
        }
        if config.data_shift > 24 {
            return Err(ConfigError::ParallelDataRange);
        }
        Ok(Self { io, config, flag })
    }

    fn data(&self, reg: GpioReg) -> LpcReg {
        LpcReg::Gpio(self.config.data_port, reg)
    }
}

impl<IO: LpcIo> ParallelPort for LpcParallel<'_, IO> {
    fn init(&mut self) {
        let mask = self.config.data_mask();
        let out = self.config.hsk_out;
        let inp = self.config.hsk_in;
        critical_section::with(|_| {
            self.io.set_bits(LpcReg::PinModeOd(self.config.data_port), mask);
            self.io.write(self.data(GpioReg::Set), mask);
            self.io.clear_bits(self.data(GpioReg::Dir), mask);

            self.io.set_bits(LpcReg::PinModeOd(out.port), out.mask());
            self.io.write(LpcReg::Gpio(out.port, GpioReg::Set), out.mask());
            self.io.set_bits(LpcReg::Gpio(out.port, GpioReg::Dir), out.mask());

            self.io.clear_bits(LpcReg::Gpio(inp.port, GpioReg::Dir), inp.mask());
            self.io.set_bits(LpcReg::GpioInt(inp.port, GpioIntReg::EnF), inp.mask());
            self.io.write(LpcReg::GpioInt(inp.port, GpioIntReg::Clr), inp.mask());
        });
        self.io.write(LpcReg::NvicIser0, 1 << irq::EINT3);
        self.flag.take();

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "parallel: data port {} shift {}, handshake in P{}.{}",
            self.config.data_port,
            self.config.data_shift,
            inp.port,
            inp.pin
        );
    }

    fn set_direction(&mut self, dir: Direction) {
        let mask = self.config.data_mask();
        critical_section::with(|_| {
            self.io.put_bits(self.data(GpioReg::Dir), mask, dir == Direction::Output);
        });
    }

    #[inline]
    fn read(&self) -> u8 {
        (self.io.read(self.data(GpioReg::Pin)) >> self.config.data_shift) as u8
    }

    fn write(&mut self, byte: u8) {
        // FIOMASK limits the FIOPIN write to the data bits
        critical_section::with(|_| {
            self.io.write(self.data(GpioReg::Mask), !self.config.data_mask());
            self.io.write(self.data(GpioReg::Pin), (byte as u32) << self.config.data_shift);
            self.io.write(self.data(GpioReg::Mask), 0);
        });
    }

    fn send_handshake<D: DelayNs>(&mut self, delay: &mut D) {
        let out = self.config.hsk_out;
        self.io.write(LpcReg::Gpio(out.port, GpioReg::Clr), out.mask());
        delay.delay_us(HANDSHAKE_PULSE_US);
        self.io.write(LpcReg::Gpio(out.port, GpioReg::Set), out.mask());
    }

    fn on_interrupt(&self, vector: Vector) -> bool {
        if vector != Vector::GpioInt {
            return false;
        }
        let inp = self.config.hsk_in;
        let fell = self.io.read(LpcReg::GpioInt(inp.port, GpioIntReg::StatF)) & inp.mask();
        if fell == 0 {
            return false;
        }
        self.io.write(LpcReg::GpioInt(inp.port, GpioIntReg::Clr), fell);
        self.flag.raise();
        true
    }

    fn take_handshake(&self) -> bool {
        self.flag.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLpc;
    use iecdrive_core::config::PinConfig;
    use iecdrive_core::Board;

    struct PulseWatch<'a> {
        sim: &'a SimLpc,
        seen_low: Option<bool>,
    }

    impl DelayNs for PulseWatch<'_> {
        fn delay_ns(&mut self, _ns: u32) {
            self.seen_low = Some(!self.sim.pin(2, 8));
        }
    }

    fn config() -> ParallelConfig {
        Board::LpcParallel.config().parallel.unwrap()
    }

    fn port<'a>(sim: &'a SimLpc, flag: &'a HandshakeFlag) -> LpcParallel<'a, SimLpc> {
        let mut port = LpcParallel::new(sim, config(), flag).unwrap();
        port.init();
        port
    }

    #[test]
    fn test_init_releases_everything() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let port = port(&sim, &flag);
        assert_eq!(port.read(), 0xff);
        assert!(sim.pin(2, 8));
        assert!(sim.pin(2, 11));
        assert_eq!(sim.peek(LpcReg::PinModeOd(2)) & 0x1ff, 0x1ff);
        assert_eq!(sim.peek(LpcReg::GpioInt(2, GpioIntReg::EnF)), 1 << 11);
        assert_ne!(sim.peek(LpcReg::NvicIser0) & (1 << irq::EINT3), 0);
    }

    #[test]
    fn test_write_masks_other_pins() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let mut port = port(&sim, &flag);
        port.set_direction(Direction::Output);
        port.write(0x5a);
        assert_eq!(port.read(), 0x5a);
        // Handshake output on the same port stays released
        assert!(sim.pin(2, 8));
        assert_eq!(sim.peek(LpcReg::Gpio(2, GpioReg::Mask)), 0);

        port.set_direction(Direction::Input);
        assert_eq!(port.read(), 0xff);
        sim.pull_pin(2, 3, true);
        assert_eq!(port.read(), 0xf7);
    }

    #[test]
    fn test_shifted_data() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let shifted = ParallelConfig {
            data_port: 0,
            data_shift: 4,
            ..config()
        };
        let mut port = LpcParallel::new(&sim, shifted, &flag).unwrap();
        port.init();
        port.set_direction(Direction::Output);
        port.write(0x81);
        assert!(sim.pin(0, 4));
        assert!(!sim.pin(0, 5));
        assert!(sim.pin(0, 11));
        assert_eq!(port.read(), 0x81);
    }

    #[test]
    fn test_send_handshake_pulses_low() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let mut port = port(&sim, &flag);
        let mut delay = PulseWatch {
            sim: &sim,
            seen_low: None,
        };
        port.send_handshake(&mut delay);
        assert_eq!(delay.seen_low, Some(true));
        assert!(sim.pin(2, 8));
    }

    #[test]
    fn test_falling_handshake_latches_flag() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let port = port(&sim, &flag);

        sim.pull_pin(2, 11, true);
        assert!(port.on_interrupt(Vector::GpioInt));
        assert_eq!(sim.peek(LpcReg::GpioInt(2, GpioIntReg::StatF)), 0);
        sim.pull_pin(2, 11, false);
        assert!(!port.on_interrupt(Vector::GpioInt));

        assert!(port.take_handshake());
        assert!(!port.take_handshake());
    }

    #[test]
    fn test_foreign_vector_ignored() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let port = port(&sim, &flag);
        sim.pull_pin(2, 11, true);
        assert!(!port.on_interrupt(Vector::Timer(0)));
        assert!(!flag.is_raised());
    }

    #[test]
    fn test_port_without_gpio_interrupt_rejected() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let flag = HandshakeFlag::new();
        let bad = ParallelConfig {
            hsk_in: PinConfig::new(1, 4),
            ..config()
        };
        assert!(matches!(
            LpcParallel::new(&sim, bad, &flag),
            Err(ConfigError::NoGpioInterrupt { port: 1 })
        ));
        let avr = Board::Uiec.config().parallel.unwrap();
        assert!(matches!(
            LpcParallel::new(&sim, avr, &flag),
            Err(ConfigError::WrongFamily)
        ));
    }
}
