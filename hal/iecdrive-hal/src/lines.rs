//! Bus line abstractions
//!
//! Implementations undo any board-level inversion: callers always see
//! `true` for a released (high) line and `false` for a line pulled low.

use iecdrive_core::{BusSnapshot, EdgeLine, EdgeSet, Line, Vector};

/// Bus line driver and sampler
pub trait BusLines {
    /// Sample all four lines at once
    fn read(&self) -> BusSnapshot;

    /// Release (`true`) or pull low (`false`) one line
    ///
    /// Takes effect immediately and touches no other line.
    fn set_line(&mut self, line: Line, high: bool);

    #[inline(always)]
    fn set_atn(&mut self, high: bool) {
        self.set_line(Line::Atn, high);
    }

    #[inline(always)]
    fn set_clock(&mut self, high: bool) {
        self.set_line(Line::Clock, high);
    }

    #[inline(always)]
    fn set_data(&mut self, high: bool) {
        self.set_line(Line::Data, high);
    }

    #[inline(always)]
    fn set_srq(&mut self, high: bool) {
        self.set_line(Line::Srq, high);
    }

    /// Release every line
    fn release_all(&mut self) {
        for line in Line::ALL {
            self.set_line(line, true);
        }
    }
}

/// Transition interrupts for the lines the protocol layer waits on
///
/// Methods take `&self` because they run both on the main path and inside
/// interrupt handlers; implementations guard shared registers with critical
/// sections.
pub trait EdgeIrq {
    /// Arm or disarm the both-edge interrupt of one line
    ///
    /// Disarming never affects sampling through [`BusLines::read`].
    fn set_irq(&self, line: EdgeLine, enable: bool);

    /// Whether the interrupt of `line` is armed
    fn irq_enabled(&self, line: EdgeLine) -> bool;

    #[inline(always)]
    fn set_atn_irq(&self, enable: bool) {
        self.set_irq(EdgeLine::Atn, enable);
    }

    #[inline(always)]
    fn set_clock_irq(&self, enable: bool) {
        self.set_irq(EdgeLine::Clock, enable);
    }

    /// Acknowledge the interrupt `vector` and report which lines fired
    ///
    /// Called from the handler of `vector`. Lines whose interrupt is
    /// disarmed are never reported.
    fn on_interrupt(&self, vector: Vector) -> EdgeSet;
}
