//! Parallel handshake port
//!
//! Eight data bits plus two handshake lines, all open-drain. The driven
//! handshake line idles high; a transition on the sensed one raises an
//! interrupt that latches a received flag. Byte framing is done above.

use embedded_hal::delay::DelayNs;
use portable_atomic::{AtomicBool, Ordering};

use iecdrive_core::Vector;

/// Direction of the data port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

/// Handshake received flag, raised from interrupt context
pub struct HandshakeFlag {
    raised: AtomicBool,
}

impl Default for HandshakeFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeFlag {
    pub const fn new() -> Self {
        Self {
            raised: AtomicBool::new(false),
        }
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consume the flag
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

/// Width of the handshake pulse in microseconds
pub const HANDSHAKE_PULSE_US: u32 = 1;

/// Parallel port with handshake
pub trait ParallelPort {
    /// Configure data port, handshake lines and the handshake interrupt
    fn init(&mut self);

    fn set_direction(&mut self, dir: Direction);

    /// Sample the data port
    fn read(&self) -> u8;

    /// Drive the data port (takes effect while the direction is output)
    fn write(&mut self, byte: u8);

    /// Pulse the driven handshake line low
    fn send_handshake<D: DelayNs>(&mut self, delay: &mut D);

    /// Acknowledge the interrupt `vector`; true if it was a handshake
    fn on_interrupt(&self, vector: Vector) -> bool;

    /// Consume the received-handshake flag
    fn take_handshake(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_consumed_once() {
        let flag = HandshakeFlag::new();
        assert!(!flag.take());
        flag.raise();
        flag.raise();
        assert!(flag.is_raised());
        assert!(flag.take());
        assert!(!flag.take());
    }
}
