//! SysTick system tick
//!
//! The core SysTick counts CPU clocks and interrupts at [`HZ`].

use iecdrive_core::tick::{SystemTick, HZ};

use crate::regs::{bits, LpcIo, LpcReg, SysTickReg};

/// SysTick reload value for [`HZ`] at `cpu_hz`
pub const fn reload_value(cpu_hz: u32) -> u32 {
    let reload = cpu_hz / HZ - 1;
    assert!(reload < 1 << 24, "tick period exceeds SysTick");
    reload
}

pub struct TickTimer<'a, IO> {
    io: &'a IO,
}

impl<'a, IO: LpcIo> TickTimer<'a, IO> {
    pub fn new(io: &'a IO) -> Self {
        Self { io }
    }

    pub fn init(&mut self, cpu_hz: u32) {
        self.io.write(LpcReg::SysTick(SysTickReg::Load), reload_value(cpu_hz));
        self.io.write(LpcReg::SysTick(SysTickReg::Val), 0);
        self.io.write(
            LpcReg::SysTick(SysTickReg::Ctrl),
            bits::SYST_CLKSOURCE | bits::SYST_TICKINT | bits::SYST_ENABLE,
        );
    }

    #[inline(always)]
    pub fn on_interrupt(&self, tick: &SystemTick) {
        tick.advance();
    }
}
