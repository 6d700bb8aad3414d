//! Timer 2 bus timeout
//!
//! The timer counts microseconds and stops itself when it reaches `MR0`.
//! A stopped counter is the expired state; it stays stopped until the next
//! arm resets and restarts it.

use iecdrive_core::config::LPC_TIMEOUT_TIMER;
use iecdrive_hal::Timeout;

use crate::regs::{bits, LpcIo, LpcReg, TimReg};
use crate::timer::us_prescale;

const T: u8 = LPC_TIMEOUT_TIMER;

/// Non-blocking timeout on timer 2
pub struct HwTimeout<'a, IO> {
    io: &'a IO,
}

impl<'a, IO: LpcIo> HwTimeout<'a, IO> {
    pub fn new(io: &'a IO) -> Self {
        Self { io }
    }

    /// Power the timer and set a 1 µs tick at `pclk_hz`, stopped
    pub fn init(&mut self, pclk_hz: u32) {
        critical_section::with(|_| {
            self.io.set_bits(LpcReg::Pconp, bits::PCONP_TIMER[T as usize]);
        });
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), bits::TCR_RESET);
        self.io.write(LpcReg::Timer(T, TimReg::Ctcr), 0);
        self.io.write(LpcReg::Timer(T, TimReg::Pr), us_prescale(pclk_hz));
        self.io.write(LpcReg::Timer(T, TimReg::Mcr), bits::mcr_stop(0));
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), 0);

        #[cfg(feature = "defmt")]
        defmt::debug!("timeout: timer {} prescale {}", T, pclk_hz / 1_000_000);
    }
}

impl<IO: LpcIo> Timeout for HwTimeout<'_, IO> {
    fn start_us(&mut self, usecs: u32) {
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), bits::TCR_RESET);
        self.io.write(LpcReg::Timer(T, TimReg::Mr(0)), usecs.max(1));
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), bits::TCR_ENABLE);
    }

    #[inline(always)]
    fn has_timed_out(&self) -> bool {
        self.io.read(LpcReg::Timer(T, TimReg::Tcr)) & bits::TCR_ENABLE == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLpc;
    use iecdrive_core::Board;

    fn timeout(sim: &SimLpc) -> HwTimeout<'_, SimLpc> {
        let mut t = HwTimeout::new(sim);
        t.init(Board::LpcDevboard.config().pclk_hz);
        t
    }

    #[test]
    fn test_prescaler_gives_microseconds() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let _t = timeout(&sim);
        assert_eq!(sim.peek(LpcReg::Timer(2, TimReg::Pr)), 24);
        assert_ne!(sim.peek(LpcReg::Pconp) & (1 << 22), 0);
    }

    #[test]
    fn test_sub_megahertz_pclk_does_not_wrap() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut t = HwTimeout::new(&sim);
        t.init(500_000);
        assert_eq!(sim.peek(LpcReg::Timer(2, TimReg::Pr)), 0);
        t.init(0);
        assert_eq!(sim.peek(LpcReg::Timer(2, TimReg::Pr)), 0);
    }

    #[test]
    fn test_expires_and_stays_expired() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut t = timeout(&sim);
        t.start_us(1000);
        sim.advance_us(999);
        assert!(!t.has_timed_out());
        sim.advance_us(1);
        assert!(t.has_timed_out());
        sim.advance_us(50_000);
        assert!(t.has_timed_out());
        assert!(t.has_timed_out());
    }

    #[test]
    fn test_rearm_resets_deadline() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut t = timeout(&sim);
        t.start_us(400);
        sim.advance_us(200);
        t.start_us(400);
        sim.advance_us(200);
        assert!(!t.has_timed_out());
        sim.advance_us(200);
        assert!(t.has_timed_out());
    }

    #[test]
    fn test_long_timeouts_fit() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut t = timeout(&sim);
        t.start_us(2_000_000);
        sim.advance_us(1_999_999);
        assert!(!t.has_timed_out());
        t.start_us(0);
        sim.advance_us(1);
        assert!(t.has_timed_out());
    }
}
