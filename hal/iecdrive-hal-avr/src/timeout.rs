//! Timer2 bus timeout
//!
//! Timer2 runs free at F_CPU/8. Arming preloads `TCNT2` so the counter
//! overflows after the requested time and clears `TOV2`; the timeout has
//! expired once `TOV2` is set again. The flag stays set until the next arm.
//!
//! The preload is computed at compile time from the board clock, so the
//! timed paths carry no arithmetic. At 8 MHz one arm covers up to 256 µs.

use iecdrive_hal::Timeout;

use crate::regs::{bits, AvrIo, AvrReg};

/// Timer2 prescaler
pub const PRESCALE: u32 = 8;

/// Timer2 counts needed for `usecs` at `f_cpu`, rounded up
pub const fn ticks(f_cpu: u32, usecs: u32) -> u32 {
    let div = PRESCALE as u64 * 1_000_000;
    ((usecs as u64 * f_cpu as u64 + div - 1) / div) as u32
}

/// Longest timeout one arm covers at `f_cpu`
pub const fn max_us(f_cpu: u32) -> u32 {
    (256 * PRESCALE as u64 * 1_000_000 / f_cpu as u64) as u32
}

/// `TCNT2` preload for a timeout of `US` microseconds at `F_CPU`
///
/// Referencing [`VALUE`](Self::VALUE) with a duration Timer2 cannot cover
/// fails to compile.
pub struct Preload<const F_CPU: u32, const US: u32>;

impl<const F_CPU: u32, const US: u32> Preload<F_CPU, US> {
    pub const TICKS: u32 = {
        let ticks = ticks(F_CPU, US);
        assert!(ticks >= 1 && ticks <= 256, "timeout outside the Timer2 range");
        ticks
    };

    pub const VALUE: u8 = (256 - Self::TICKS) as u8;
}

/// Non-blocking timeout on Timer2
pub struct HwTimeout<'a, IO, const F_CPU: u32> {
    io: &'a IO,
}

impl<'a, IO: AvrIo, const F_CPU: u32> HwTimeout<'a, IO, F_CPU> {
    pub fn new(io: &'a IO) -> Self {
        Self { io }
    }

    /// Start Timer2 in normal mode at F_CPU/8 with its interrupt off
    pub fn init(&mut self) {
        self.io.write(AvrReg::Tccr2a, 0);
        self.io.write(AvrReg::Tccr2b, bits::CS21);
        self.io.write(AvrReg::Timsk2, 0);

        #[cfg(feature = "defmt")]
        defmt::debug!("timeout: timer2 at {} Hz, max {} us", F_CPU / PRESCALE, max_us(F_CPU));
    }

    /// Arm the timeout `US` microseconds from now
    #[inline(always)]
    pub fn start_timeout<const US: u32>(&mut self) {
        self.load(Preload::<F_CPU, US>::VALUE);
    }

    #[inline(always)]
    fn load(&mut self, preload: u8) {
        self.io.write(AvrReg::Tcnt2, preload);
        self.io.write(AvrReg::Tifr2, bits::TOV2);
    }

    /// Whether the armed timeout has expired
    #[inline(always)]
    pub fn has_timed_out(&self) -> bool {
        self.io.read(AvrReg::Tifr2) & bits::TOV2 != 0
    }
}

impl<IO: AvrIo, const F_CPU: u32> Timeout for HwTimeout<'_, IO, F_CPU> {
    fn start_us(&mut self, usecs: u32) {
        let ticks = ticks(F_CPU, usecs);
        debug_assert!(usecs <= max_us(F_CPU), "timeout outside the Timer2 range");
        let ticks = ticks.clamp(1, 256);
        self.load((256 - ticks) as u8);
    }

    fn has_timed_out(&self) -> bool {
        HwTimeout::has_timed_out(self)
    }
}
