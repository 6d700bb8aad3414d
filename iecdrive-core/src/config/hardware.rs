//! Hardware configuration types
//!
//! These types bind the logical roles of the core (bus lines, edge sources,
//! card selects, LEDs, parallel port) to physical pins and timer channels.

#[cfg(feature = "serde")]
use serde::Serialize;

/// Pin configuration with optional inversion
///
/// `port` is the AVR port index (A = 0, B = 1, ...) or the LPC17xx GPIO
/// port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct PinConfig {
    /// GPIO port
    pub port: u8,
    /// Pin within the port
    pub pin: u8,
    /// Electrical level is the inverse of the logical level
    pub inverted: bool,
    /// Enable internal pull-up
    pub pull_up: bool,
}

impl PinConfig {
    /// Create a new pin config
    pub const fn new(port: u8, pin: u8) -> Self {
        Self {
            port,
            pin,
            inverted: false,
            pull_up: false,
        }
    }

    /// Create an inverted (active-low) pin
    pub const fn inverted(port: u8, pin: u8) -> Self {
        Self {
            port,
            pin,
            inverted: true,
            pull_up: false,
        }
    }

    /// Create a pin with pull-up enabled
    pub const fn with_pullup(port: u8, pin: u8) -> Self {
        Self {
            port,
            pin,
            inverted: false,
            pull_up: true,
        }
    }

    /// Bit of this pin within its port register
    #[inline(always)]
    pub const fn mask(&self) -> u32 {
        1 << self.pin
    }
}

/// AVR port indices
pub mod port {
    pub const A: u8 = 0;
    pub const B: u8 = 1;
    pub const C: u8 = 2;
    pub const D: u8 = 3;
    pub const E: u8 = 4;
    pub const F: u8 = 5;
    pub const G: u8 = 6;
}

/// Chip family of a board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Family {
    /// 8-bit AVR ATmega
    Avr(AvrChip),
    /// 32-bit NXP LPC175x/6x
    Lpc17xx,
}

/// Supported AVR parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum AvrChip {
    Atmega644,
    Atmega1281,
}

/// Fixed SPI pins of an AVR part, all on one port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AvrSpiPins {
    pub port: u8,
    pub ss: u8,
    pub sck: u8,
    pub mosi: u8,
    pub miso: u8,
}

impl AvrChip {
    /// Hardware SPI pins
    pub const fn spi_pins(self) -> AvrSpiPins {
        match self {
            AvrChip::Atmega644 => AvrSpiPins {
                port: port::B,
                ss: 4,
                mosi: 5,
                miso: 6,
                sck: 7,
            },
            AvrChip::Atmega1281 => AvrSpiPins {
                port: port::B,
                ss: 0,
                sck: 1,
                mosi: 2,
                miso: 3,
            },
        }
    }

    /// Pin carrying external interrupt INTn
    pub const fn ext_int_pin(self, n: u8) -> Option<(u8, u8)> {
        match (self, n) {
            (AvrChip::Atmega644, 0) => Some((port::D, 2)),
            (AvrChip::Atmega644, 1) => Some((port::D, 3)),
            (AvrChip::Atmega644, 2) => Some((port::B, 2)),
            (AvrChip::Atmega1281, 0..=3) => Some((port::D, n)),
            _ => None,
        }
    }

    /// Pin-change group covering a whole port, if any
    pub const fn pin_change_group(self, port_index: u8) -> Option<u8> {
        match self {
            AvrChip::Atmega644 if port_index <= port::D => Some(port_index),
            AvrChip::Atmega1281 if port_index == port::B => Some(0),
            _ => None,
        }
    }

    /// Number of pin-change groups (PCMSKn registers)
    pub const fn pin_change_groups(self) -> u8 {
        match self {
            AvrChip::Atmega644 => 4,
            AvrChip::Atmega1281 => 3,
        }
    }
}

/// How a bus line is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum LineOutput {
    /// AVR: the input pin itself, pulled low by switching it to output
    OpenCollector,
    /// AVR: a separate output pin driving the line through a transistor
    Pin(PinConfig),
    /// LPC17xx: timer match output MATt.c, level set through the EMR bit
    Match { timer: u8, channel: u8, inverted: bool },
}

/// Interrupt source raising an event on a line transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum EdgeSource {
    /// AVR external interrupt INTn, any-change sense
    ExtInt(u8),
    /// AVR pin-change interrupt, group PCINTg, mask bit b
    PinChange { group: u8, bit: u8 },
    /// LPC17xx timer capture input CAPt.c, both edges
    Capture { timer: u8, channel: u8 },
    /// LPC17xx GPIO interrupt on the line's own pin (ports 0 and 2 only)
    GpioInt,
}

/// Pin carrying LPC17xx capture input CAPt.c
pub const fn lpc_capture_pin(timer: u8, channel: u8) -> Option<(u8, u8)> {
    match (timer, channel) {
        (0, 0) => Some((1, 26)),
        (0, 1) => Some((1, 27)),
        (1, 0) => Some((1, 18)),
        (1, 1) => Some((1, 19)),
        (2, 0) => Some((0, 4)),
        (2, 1) => Some((0, 5)),
        (3, 0) => Some((0, 23)),
        (3, 1) => Some((0, 24)),
        _ => None,
    }
}

/// One bus line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LineConfig {
    /// Pin the line is sampled on; `inverted` if an inverting buffer sits
    /// between the bus and the pin
    pub input: PinConfig,
    /// How the line is pulled low
    pub output: LineOutput,
}

impl LineConfig {
    /// AVR line sampled and driven on one pin
    pub const fn open_collector(port: u8, pin: u8) -> Self {
        Self {
            input: PinConfig::new(port, pin),
            output: LineOutput::OpenCollector,
        }
    }
}

/// Bus line assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IecConfig {
    pub atn: LineConfig,
    pub clock: LineConfig,
    pub data: LineConfig,
    pub srq: LineConfig,
    /// Source of ATN transition interrupts
    pub atn_edge: EdgeSource,
    /// Source of CLOCK transition interrupts
    pub clock_edge: EdgeSource,
}

impl IecConfig {
    /// Lines in snapshot order (ATN, CLOCK, DATA, SRQ)
    pub const fn lines(&self) -> [LineConfig; 4] {
        [self.atn, self.clock, self.data, self.srq]
    }
}

/// SPI controller and card selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SpiConfig {
    /// LPC17xx SSP controller index; ignored on AVR
    pub controller: u8,
    /// Chip select of card slot 0 (active low)
    pub card0: PinConfig,
    /// Chip select of card slot 1, if the board has a second slot
    pub card1: Option<PinConfig>,
}

/// Status LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct LedConfig {
    pub busy: Option<PinConfig>,
    pub dirty: Option<PinConfig>,
}

/// Parallel handshake port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ParallelConfig {
    /// Port carrying the eight data bits
    pub data_port: u8,
    /// Bit position of data bit 0 within the port
    pub data_shift: u8,
    /// Handshake output, idles high
    pub hsk_out: PinConfig,
    /// Handshake input
    pub hsk_in: PinConfig,
    /// Interrupt source of the handshake input
    pub hsk_edge: EdgeSource,
}

impl ParallelConfig {
    /// Mask of the data bits within their port
    pub const fn data_mask(&self) -> u32 {
        0xff << self.data_shift
    }
}
