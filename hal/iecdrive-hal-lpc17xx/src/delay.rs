//! Timer 3 busy-wait delays
//!
//! Timer 3 runs free at 1 MHz; a delay spins until the counter has moved
//! far enough. These block the caller and are kept apart from the timeout
//! timer so a delay never disturbs a pending timeout.

use embedded_hal::delay::DelayNs;
use iecdrive_core::config::LPC_DELAY_TIMER;

use crate::regs::{bits, LpcIo, LpcReg, TimReg};
use crate::timer::us_prescale;

const T: u8 = LPC_DELAY_TIMER;

pub struct Delay<'a, IO> {
    io: &'a IO,
}

impl<'a, IO: LpcIo> Delay<'a, IO> {
    pub fn new(io: &'a IO) -> Self {
        Self { io }
    }

    /// Power the timer and start it at 1 MHz from `pclk_hz`
    pub fn init(&mut self, pclk_hz: u32) {
        critical_section::with(|_| {
            self.io.set_bits(LpcReg::Pconp, bits::PCONP_TIMER[T as usize]);
        });
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), bits::TCR_RESET);
        self.io.write(LpcReg::Timer(T, TimReg::Ctcr), 0);
        self.io.write(LpcReg::Timer(T, TimReg::Pr), us_prescale(pclk_hz));
        self.io.write(LpcReg::Timer(T, TimReg::Mcr), 0);
        self.io.write(LpcReg::Timer(T, TimReg::Tcr), bits::TCR_ENABLE);
    }

    /// Spin for at least `usecs` microseconds
    pub fn delay_us(&mut self, usecs: u32) {
        let tc = LpcReg::Timer(T, TimReg::Tc);
        let start = self.io.read(tc);
        while self.io.read(tc).wrapping_sub(start) < usecs {}
    }

    /// Spin for at least `msecs` milliseconds
    pub fn delay_ms(&mut self, msecs: u32) {
        for _ in 0..msecs {
            self.delay_us(1000);
        }
    }
}

impl<IO: LpcIo> DelayNs for Delay<'_, IO> {
    fn delay_ns(&mut self, ns: u32) {
        Delay::delay_us(self, ns.div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        Delay::delay_us(self, us);
    }

    fn delay_ms(&mut self, ms: u32) {
        Delay::delay_ms(self, ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimLpc;
    use iecdrive_core::Board;

    fn delay(sim: &SimLpc) -> Delay<'_, SimLpc> {
        let mut d = Delay::new(sim);
        d.init(Board::LpcParallel.config().pclk_hz);
        sim.set_auto_advance_us(1);
        d
    }

    fn elapsed(sim: &SimLpc, f: impl FnOnce()) -> u32 {
        let tc = LpcReg::Timer(3, TimReg::Tc);
        let start = sim.peek(tc);
        f();
        sim.peek(tc).wrapping_sub(start)
    }

    #[test]
    fn test_delay_us_waits_at_least() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let mut d = delay(&sim);
        let spent = elapsed(&sim, || d.delay_us(50));
        assert!((50..=52).contains(&spent), "{}", spent);
    }

    #[test]
    fn test_delay_ms() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let mut d = delay(&sim);
        let spent = elapsed(&sim, || d.delay_ms(3));
        assert!(spent >= 3000, "{}", spent);
    }

    #[test]
    fn test_delay_ns_rounds_up() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let mut d = delay(&sim);
        let spent = elapsed(&sim, || DelayNs::delay_ns(&mut d, 1));
        assert!(spent >= 1);
    }

    #[test]
    fn test_delay_leaves_timeout_timer_alone() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let mut d = delay(&sim);
        sim.clear_writes();
        d.delay_us(10);
        assert!(sim.writes().is_empty());
        assert_eq!(sim.peek(LpcReg::Timer(2, TimReg::Tcr)), 0);
    }
}
