//! Timer1 system tick
//!
//! Timer1 runs in CTC mode at F_CPU/64 and interrupts on compare A at
//! [`HZ`]. The handler calls [`TickTimer::on_interrupt`].

use iecdrive_core::tick::{SystemTick, HZ};

use crate::regs::{bits, AvrIo, AvrReg};

/// Timer1 prescaler
const PRESCALE: u32 = 64;

/// Compare value for a [`HZ`] interrupt at `f_cpu`
pub const fn compare_value(f_cpu: u32) -> u16 {
    let top = f_cpu / PRESCALE / HZ - 1;
    assert!(top <= u16::MAX as u32, "tick period exceeds Timer1");
    top as u16
}

pub struct TickTimer<'a, IO, const F_CPU: u32> {
    io: &'a IO,
}

impl<'a, IO: AvrIo, const F_CPU: u32> TickTimer<'a, IO, F_CPU> {
    const TOP: u16 = compare_value(F_CPU);

    pub fn new(io: &'a IO) -> Self {
        Self { io }
    }

    /// Start Timer1 and enable its compare A interrupt
    pub fn init(&mut self) {
        let [hi, lo] = Self::TOP.to_be_bytes();
        self.io.write(AvrReg::Tccr1a, 0);
        // 16-bit register: high byte goes to the temp latch first
        self.io.write(AvrReg::Ocr1ah, hi);
        self.io.write(AvrReg::Ocr1al, lo);
        self.io.write(AvrReg::Tccr1b, bits::WGM12 | bits::CS11_CS10);
        self.io.write(AvrReg::Timsk1, bits::OCIE1A);
    }

    /// Compare A handler
    #[inline(always)]
    pub fn on_interrupt(&self, tick: &SystemTick) {
        tick.advance();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAvr;
    use iecdrive_core::Board;

    #[test]
    fn test_compare_value() {
        assert_eq!(compare_value(8_000_000), 1249);
        assert_eq!(compare_value(16_000_000), 2499);
    }

    #[test]
    fn test_init_programs_ctc() {
        let sim = SimAvr::new(Board::Larsp.config());
        let mut timer = TickTimer::<_, 8_000_000>::new(&sim);
        timer.init();
        let writes = sim.writes();
        let hi = writes.iter().position(|w| w.0 == AvrReg::Ocr1ah);
        let lo = writes.iter().position(|w| w.0 == AvrReg::Ocr1al);
        assert!(hi < lo);
        assert_eq!(sim.peek(AvrReg::Ocr1ah), 0x04);
        assert_eq!(sim.peek(AvrReg::Ocr1al), 0xe1);
        assert_eq!(sim.peek(AvrReg::Tccr1b), 0x0b);
        assert_eq!(sim.peek(AvrReg::Timsk1), bits::OCIE1A);
    }

    #[test]
    fn test_interrupt_advances_tick() {
        let sim = SimAvr::new(Board::Larsp.config());
        let timer = TickTimer::<_, 8_000_000>::new(&sim);
        let tick = SystemTick::new();
        let start = tick.now();
        timer.on_interrupt(&tick);
        timer.on_interrupt(&tick);
        assert_eq!(tick.now(), start.wrapping_add(2));
    }
}
