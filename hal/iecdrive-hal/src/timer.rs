//! Timeout abstraction
//!
//! A timeout is a single hardware deadline polled from the main path. There
//! is one per chip: arming again replaces the pending deadline, and expiry
//! is a level that stays set until the next arm.
//!
//! Blocking delays are a separate primitive, see
//! [`embedded_hal::delay::DelayNs`].

/// Non-blocking hardware timeout
pub trait Timeout {
    /// Arm the deadline `usecs` microseconds from now
    fn start_us(&mut self, usecs: u32);

    /// Whether the armed deadline has passed
    fn has_timed_out(&self) -> bool;
}
