//! Bus line types
//!
//! The serial bus has four open-collector lines. Every participant can pull
//! a line low; a line reads high only while nobody does. Throughout this
//! workspace a line state of `true` means electrically high (released) and
//! `false` means pulled low, after any board-level inversion has been undone.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One of the four bus lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Line {
    /// Attention: the host is sending a command
    Atn,
    /// Clock
    Clock,
    /// Data
    Data,
    /// Service request (fast serial clock on later hosts)
    Srq,
}

impl Line {
    /// All lines, in snapshot bit order
    pub const ALL: [Line; 4] = [Line::Atn, Line::Clock, Line::Data, Line::Srq];

    /// Bit of this line in a [`BusSnapshot`]
    #[inline(always)]
    pub const fn mask(self) -> u8 {
        match self {
            Line::Atn => 0x01,
            Line::Clock => 0x02,
            Line::Data => 0x04,
            Line::Srq => 0x08,
        }
    }

    /// Position of this line in per-line tables
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Point-in-time sample of all four lines
///
/// A set bit means the line is high (released).
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusSnapshot(u8);

impl BusSnapshot {
    /// All lines released
    pub const IDLE: Self = Self(0x0f);

    /// Build a snapshot from raw line bits (see [`Line::mask`])
    #[inline(always)]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0x0f)
    }

    /// Raw line bits
    #[inline(always)]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// State of one line
    #[inline(always)]
    pub const fn get(self, line: Line) -> bool {
        self.0 & line.mask() != 0
    }

    /// Copy of this snapshot with one line changed
    #[inline(always)]
    pub const fn with(self, line: Line, high: bool) -> Self {
        if high {
            Self(self.0 | line.mask())
        } else {
            Self(self.0 & !line.mask())
        }
    }

    pub const fn atn(self) -> bool {
        self.get(Line::Atn)
    }

    pub const fn clock(self) -> bool {
        self.get(Line::Clock)
    }

    pub const fn data(self) -> bool {
        self.get(Line::Data)
    }

    pub const fn srq(self) -> bool {
        self.get(Line::Srq)
    }
}

impl core::fmt::Debug for BusSnapshot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BusSnapshot")
            .field("atn", &self.atn())
            .field("clock", &self.clock())
            .field("data", &self.data())
            .field("srq", &self.srq())
            .finish()
    }
}

/// Lines that can wake the protocol layer on a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EdgeLine {
    Atn,
    Clock,
}

impl From<EdgeLine> for Line {
    fn from(line: EdgeLine) -> Self {
        match line {
            EdgeLine::Atn => Line::Atn,
            EdgeLine::Clock => Line::Clock,
        }
    }
}

/// Set of lines reported by an edge interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EdgeSet(u8);

impl EdgeSet {
    pub const EMPTY: Self = Self(0);

    const fn bit(line: EdgeLine) -> u8 {
        match line {
            EdgeLine::Atn => 0x01,
            EdgeLine::Clock => 0x02,
        }
    }

    pub const fn insert(self, line: EdgeLine) -> Self {
        Self(self.0 | Self::bit(line))
    }

    pub const fn contains(self, line: EdgeLine) -> bool {
        self.0 & Self::bit(line) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Interrupt vector that delivered a line or handshake event
///
/// The chip HAL's interrupt handlers pass the vector they serve so the
/// edge controller can tell which lines it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Vector {
    /// AVR external interrupt INTn
    ExtInt(u8),
    /// AVR pin-change group PCINTn
    PinChange(u8),
    /// LPC17xx timer n (capture/match)
    Timer(u8),
    /// LPC17xx GPIO interrupt (shared with EINT3)
    GpioInt,
}
