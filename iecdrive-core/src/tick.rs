//! Wraparound-safe tick arithmetic and the system tick
//!
//! Hardware counters and the system tick wrap. Comparing two samples is only
//! meaningful through their signed wrapping difference, which is correct as
//! long as the samples are less than half the counter range apart.

use portable_atomic::{AtomicU32, Ordering};

/// System tick rate in Hz
pub const HZ: u32 = 100;

/// Unsigned wrapping counter sample
pub trait Tick: Copy + Eq {
    /// Signed difference type of the same width
    type Delta: Copy + Ord + Default;

    /// `self - earlier` with wraparound, reinterpreted as signed
    fn delta(self, earlier: Self) -> Self::Delta;

    /// `self + ticks` with wraparound
    fn offset(self, ticks: Self) -> Self;
}

macro_rules! impl_tick {
    ($($t:ty => $d:ty),*) => {
        $(
            impl Tick for $t {
                type Delta = $d;

                #[inline(always)]
                fn delta(self, earlier: Self) -> $d {
                    self.wrapping_sub(earlier) as $d
                }

                #[inline(always)]
                fn offset(self, ticks: Self) -> Self {
                    self.wrapping_add(ticks)
                }
            }
        )*
    };
}

impl_tick!(u8 => i8, u16 => i16, u32 => i32);

/// True if `a` is later than `b`
#[inline(always)]
pub fn time_after<T: Tick>(a: T, b: T) -> bool {
    a.delta(b) > T::Delta::default()
}

/// True if `a` is earlier than `b`
#[inline(always)]
pub fn time_before<T: Tick>(a: T, b: T) -> bool {
    time_after(b, a)
}

/// Convert milliseconds to system ticks, rounding up
pub const fn ms_to_ticks(ms: u32) -> u32 {
    // u32::MAX ms is under 2^29 ticks, the narrowing cannot truncate
    (ms as u64 * HZ as u64).div_ceil(1000) as u32
}

/// Process-wide 100 Hz tick counter
///
/// Advanced from the periodic timer interrupt, read from the main path.
pub struct SystemTick {
    ticks: AtomicU32,
}

impl Default for SystemTick {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemTick {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU32::new(0),
        }
    }

    /// Current tick count
    #[inline]
    pub fn now(&self) -> u32 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Advance by one tick; called from the tick interrupt
    #[inline]
    pub fn advance(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    /// Tick value `ms` milliseconds from now
    pub fn deadline_ms(&self, ms: u32) -> u32 {
        self.now().offset(ms_to_ticks(ms))
    }

    /// Whether `deadline` has passed
    pub fn reached(&self, deadline: u32) -> bool {
        time_after(self.now(), deadline)
    }

    #[cfg(test)]
    fn set(&self, ticks: u32) {
        self.ticks.store(ticks, Ordering::Relaxed);
    }
}
