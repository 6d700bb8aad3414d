//! Board catalog
//!
//! Every supported board is one `const` [`BoardConfig`] record. Records are
//! validated while compiling: a pin used twice, an edge source that does not
//! sit on its line's pin, or a timer channel claimed by two lines stops the
//! build instead of misbehaving on the device.

#[cfg(feature = "serde")]
use serde::Serialize;

use super::hardware::{
    lpc_capture_pin, port, AvrChip, EdgeSource, Family, IecConfig, LedConfig, LineConfig,
    LineOutput, ParallelConfig, PinConfig, SpiConfig,
};

/// Timer reserved for the non-blocking timeout on LPC17xx
pub const LPC_TIMEOUT_TIMER: u8 = 2;

/// Timer reserved for busy-wait delays on LPC17xx
pub const LPC_DELAY_TIMER: u8 = 3;

/// Number of LPC17xx timers that may carry bus lines (timers 0 and 1)
pub const LPC_LINE_TIMERS: u8 = 2;

/// Errors found while validating a board record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Port or pin number outside the register width
    PinOutOfRange { port: u8, pin: u8 },
    /// Pin assigned to two roles
    PinConflict { port: u8, pin: u8 },
    /// Bus line inputs must share one port so a read is a single sample
    InputsSplitAcrossPorts,
    /// Output or edge source kind not available on the chip family
    WrongFamily,
    /// Edge source does not sit on the pin of its line
    EdgeSourceMismatch,
    /// Timer reserved for timeout or delay
    ReservedTimer { timer: u8 },
    /// Match channel above 3 or capture channel above 1
    ChannelOutOfRange { timer: u8, channel: u8 },
    /// Timer channel claimed twice
    ChannelConflict { timer: u8, channel: u8 },
    /// GPIO interrupts exist only on LPC17xx ports 0 and 2
    NoGpioInterrupt { port: u8 },
    /// Parallel data bits do not fit the port
    ParallelDataRange,
    /// SPI controller index not present on the chip
    NoSuchSpiController,
    /// Peripheral clock too slow for the microsecond timers
    PclkTooSlow,
}

impl ConfigError {
    /// Human readable description, usable in `const` panics
    pub const fn message(self) -> &'static str {
        match self {
            ConfigError::PinOutOfRange { .. } => "board pin outside port range",
            ConfigError::PinConflict { .. } => "board pin assigned twice",
            ConfigError::InputsSplitAcrossPorts => "bus line inputs split across ports",
            ConfigError::WrongFamily => "output or edge source not available on this chip",
            ConfigError::EdgeSourceMismatch => "edge source not on its line's pin",
            ConfigError::ReservedTimer { .. } => "bus line on a reserved timer",
            ConfigError::ChannelOutOfRange { .. } => "timer channel out of range",
            ConfigError::ChannelConflict { .. } => "timer channel assigned twice",
            ConfigError::NoGpioInterrupt { .. } => "GPIO interrupt on a port without one",
            ConfigError::ParallelDataRange => "parallel data bits exceed the port",
            ConfigError::NoSuchSpiController => "SPI controller does not exist",
            ConfigError::PclkTooSlow => "peripheral clock below 1 MHz",
        }
    }
}

/// Front panel buttons, all on one port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ButtonConfig {
    pub port: u8,
    pub mask: u32,
}

/// Supported boards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum Board {
    /// ATmega644, open-collector lines on one port, pin-change edges
    Larsp,
    /// ATmega644, transistor-driven outputs, external-interrupt edges, two slots
    Shadowolf,
    /// ATmega1281, open-collector lines, parallel port
    Uiec,
    /// LPC1768 development board, lines on timers 0 and 1
    LpcDevboard,
    /// LPC1768 with inverting input buffers and a parallel port
    LpcParallel,
}

impl Board {
    pub const ALL: [Board; 5] = [
        Board::Larsp,
        Board::Shadowolf,
        Board::Uiec,
        Board::LpcDevboard,
        Board::LpcParallel,
    ];

    /// Configuration record of this board
    pub const fn config(self) -> &'static BoardConfig {
        match self {
            Board::Larsp => &LARSP,
            Board::Shadowolf => &SHADOWOLF,
            Board::Uiec => &UIEC,
            Board::LpcDevboard => &LPC_DEVBOARD,
            Board::LpcParallel => &LPC_PARALLEL,
        }
    }
}

/// Complete hardware description of one board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct BoardConfig {
    pub board: Board,
    pub name: &'static str,
    pub family: Family,
    /// CPU clock (F_CPU on AVR, CCLK on LPC17xx)
    pub cpu_hz: u32,
    /// Peripheral clock feeding timers and SPI
    pub pclk_hz: u32,
    pub iec: IecConfig,
    pub spi: SpiConfig,
    pub leds: LedConfig,
    pub buttons: ButtonConfig,
    /// Parallel handshake port, on boards that have one
    pub parallel: Option<ParallelConfig>,
}

macro_rules! tri {
    ($e:expr) => {
        match $e {
            Ok(v) => v,
            Err(e) => return Err(e),
        }
    };
}

/// Per-port bitmap of claimed pins
type PinMap = [u32; 8];

const fn claim_mask(mut used: PinMap, port: u8, mask: u32) -> Result<PinMap, ConfigError> {
    if port as usize >= used.len() {
        return Err(ConfigError::PinOutOfRange { port, pin: 0 });
    }
    let clash = used[port as usize] & mask;
    if clash != 0 {
        return Err(ConfigError::PinConflict {
            port,
            pin: clash.trailing_zeros() as u8,
        });
    }
    used[port as usize] |= mask;
    Ok(used)
}

const fn claim(used: PinMap, pin: PinConfig) -> Result<PinMap, ConfigError> {
    if pin.pin >= 32 {
        return Err(ConfigError::PinOutOfRange {
            port: pin.port,
            pin: pin.pin,
        });
    }
    claim_mask(used, pin.port, pin.mask())
}

const fn claim_opt(used: PinMap, pin: Option<PinConfig>) -> Result<PinMap, ConfigError> {
    match pin {
        Some(pin) => claim(used, pin),
        None => Ok(used),
    }
}

/// Claim a timer channel; `used` has one bit per timer/channel pair
const fn claim_channel(used: u8, timer: u8, channel: u8, channels: u8) -> Result<u8, ConfigError> {
    if timer >= LPC_LINE_TIMERS {
        return Err(ConfigError::ReservedTimer { timer });
    }
    if channel >= channels {
        return Err(ConfigError::ChannelOutOfRange { timer, channel });
    }
    let bit = 1 << (timer * 4 + channel);
    if used & bit != 0 {
        return Err(ConfigError::ChannelConflict { timer, channel });
    }
    Ok(used | bit)
}

/// Check an edge source against the pin it must watch
///
/// On LPC17xx the ATN/CLOCK edges come from timer captures and the
/// parallel handshake from a GPIO interrupt; `line` selects which applies.
const fn check_edge(
    family: Family,
    edge: EdgeSource,
    input: PinConfig,
    captures: u8,
    line: bool,
) -> Result<u8, ConfigError> {
    match (family, edge) {
        (Family::Avr(chip), EdgeSource::ExtInt(n)) => match chip.ext_int_pin(n) {
            Some((port, pin)) if port == input.port && pin == input.pin => Ok(captures),
            _ => Err(ConfigError::EdgeSourceMismatch),
        },
        (Family::Avr(chip), EdgeSource::PinChange { group, bit }) => {
            match chip.pin_change_group(input.port) {
                Some(g) if g == group && bit == input.pin => Ok(captures),
                _ => Err(ConfigError::EdgeSourceMismatch),
            }
        }
        (Family::Lpc17xx, EdgeSource::Capture { timer, channel }) if line => {
            let captures = tri!(claim_channel(captures, timer, channel, 2));
            match lpc_capture_pin(timer, channel) {
                Some((port, pin)) if port == input.port && pin == input.pin => Ok(captures),
                _ => Err(ConfigError::EdgeSourceMismatch),
            }
        }
        (Family::Lpc17xx, EdgeSource::GpioInt) if !line => {
            if input.port == 0 || input.port == 2 {
                Ok(captures)
            } else {
                Err(ConfigError::NoGpioInterrupt { port: input.port })
            }
        }
        _ => Err(ConfigError::WrongFamily),
    }
}

impl BoardConfig {
    /// Check the record for conflicts the hardware cannot resolve
    pub const fn validate(&self) -> Result<(), ConfigError> {
        let mut used: PinMap = [0; 8];
        let mut matches = 0u8;
        let mut captures = 0u8;

        let lines = self.iec.lines();
        let input_port = lines[0].input.port;
        let mut i = 0;
        while i < lines.len() {
            let line: LineConfig = lines[i];
            if line.input.port != input_port {
                return Err(ConfigError::InputsSplitAcrossPorts);
            }
            used = tri!(claim(used, line.input));
            match (self.family, line.output) {
                (Family::Avr(_), LineOutput::OpenCollector) => {}
                (Family::Avr(_), LineOutput::Pin(pin)) => used = tri!(claim(used, pin)),
                (Family::Lpc17xx, LineOutput::Match { timer, channel, .. }) => {
                    matches = tri!(claim_channel(matches, timer, channel, 4))
                }
                _ => return Err(ConfigError::WrongFamily),
            }
            i += 1;
        }

        let iec = &self.iec;
        captures = tri!(check_edge(self.family, iec.atn_edge, iec.atn.input, captures, true));
        captures = tri!(check_edge(self.family, iec.clock_edge, iec.clock.input, captures, true));

        match self.family {
            Family::Avr(chip) => {
                let spi = chip.spi_pins();
                let bus = (1 << spi.sck) | (1 << spi.mosi) | (1 << spi.miso);
                used = tri!(claim_mask(used, spi.port, bus));
            }
            Family::Lpc17xx => {
                if self.spi.controller > 1 {
                    return Err(ConfigError::NoSuchSpiController);
                }
                if self.pclk_hz < 1_000_000 {
                    return Err(ConfigError::PclkTooSlow);
                }
            }
        }
        used = tri!(claim(used, self.spi.card0));
        used = tri!(claim_opt(used, self.spi.card1));
        used = tri!(claim_opt(used, self.leds.busy));
        used = tri!(claim_opt(used, self.leds.dirty));
        if self.buttons.mask != 0 {
            used = tri!(claim_mask(used, self.buttons.port, self.buttons.mask));
        }

        if let Some(par) = self.parallel {
            let fits = match self.family {
                Family::Avr(_) => par.data_shift == 0,
                Family::Lpc17xx => par.data_shift <= 24,
            };
            if !fits {
                return Err(ConfigError::ParallelDataRange);
            }
            used = tri!(claim_mask(used, par.data_port, par.data_mask()));
            used = tri!(claim(used, par.hsk_out));
            used = tri!(claim(used, par.hsk_in));
            captures = tri!(check_edge(self.family, par.hsk_edge, par.hsk_in, captures, false));
        }

        let _ = (used, captures);
        Ok(())
    }
}

const fn checked(config: BoardConfig) -> BoardConfig {
    match config.validate() {
        Ok(()) => config,
        Err(e) => panic!("{}", e.message()),
    }
}

const AVR_8MHZ: u32 = 8_000_000;

pub const LARSP: BoardConfig = checked(BoardConfig {
    board: Board::Larsp,
    name: "larsp",
    family: Family::Avr(AvrChip::Atmega644),
    cpu_hz: AVR_8MHZ,
    pclk_hz: AVR_8MHZ,
    iec: IecConfig {
        atn: LineConfig::open_collector(port::C, 0),
        clock: LineConfig::open_collector(port::C, 1),
        data: LineConfig::open_collector(port::C, 2),
        srq: LineConfig::open_collector(port::C, 3),
        atn_edge: EdgeSource::PinChange { group: 2, bit: 0 },
        clock_edge: EdgeSource::PinChange { group: 2, bit: 1 },
    },
    spi: SpiConfig {
        controller: 0,
        card0: PinConfig::new(port::B, 4),
        card1: None,
    },
    leds: LedConfig {
        busy: Some(PinConfig::new(port::A, 0)),
        dirty: Some(PinConfig::new(port::A, 1)),
    },
    buttons: ButtonConfig {
        port: port::A,
        mask: 0b1100,
    },
    parallel: None,
});

pub const SHADOWOLF: BoardConfig = checked(BoardConfig {
    board: Board::Shadowolf,
    name: "shadowolf",
    family: Family::Avr(AvrChip::Atmega644),
    cpu_hz: AVR_8MHZ,
    pclk_hz: AVR_8MHZ,
    iec: IecConfig {
        atn: LineConfig {
            input: PinConfig::new(port::D, 2),
            output: LineOutput::Pin(PinConfig::inverted(port::C, 4)),
        },
        clock: LineConfig {
            input: PinConfig::new(port::D, 3),
            output: LineOutput::Pin(PinConfig::inverted(port::C, 5)),
        },
        data: LineConfig {
            input: PinConfig::new(port::D, 4),
            output: LineOutput::Pin(PinConfig::inverted(port::C, 6)),
        },
        srq: LineConfig {
            input: PinConfig::new(port::D, 5),
            output: LineOutput::Pin(PinConfig::inverted(port::C, 7)),
        },
        atn_edge: EdgeSource::ExtInt(0),
        clock_edge: EdgeSource::ExtInt(1),
    },
    spi: SpiConfig {
        controller: 0,
        card0: PinConfig::new(port::B, 4),
        card1: Some(PinConfig::new(port::B, 3)),
    },
    leds: LedConfig {
        busy: Some(PinConfig::new(port::C, 0)),
        dirty: Some(PinConfig::new(port::C, 1)),
    },
    buttons: ButtonConfig {
        port: port::A,
        mask: 0b0011,
    },
    parallel: None,
});

pub const UIEC: BoardConfig = checked(BoardConfig {
    board: Board::Uiec,
    name: "uiec",
    family: Family::Avr(AvrChip::Atmega1281),
    cpu_hz: AVR_8MHZ,
    pclk_hz: AVR_8MHZ,
    iec: IecConfig {
        atn: LineConfig::open_collector(port::D, 0),
        clock: LineConfig::open_collector(port::D, 1),
        data: LineConfig::open_collector(port::D, 2),
        srq: LineConfig::open_collector(port::D, 3),
        atn_edge: EdgeSource::ExtInt(0),
        clock_edge: EdgeSource::ExtInt(1),
    },
    spi: SpiConfig {
        controller: 0,
        card0: PinConfig::new(port::B, 0),
        card1: None,
    },
    leds: LedConfig {
        busy: Some(PinConfig::new(port::G, 0)),
        dirty: Some(PinConfig::new(port::G, 1)),
    },
    buttons: ButtonConfig {
        port: port::G,
        mask: 0b1100,
    },
    parallel: Some(ParallelConfig {
        data_port: port::A,
        data_shift: 0,
        hsk_out: PinConfig::new(port::B, 5),
        hsk_in: PinConfig::with_pullup(port::B, 4),
        hsk_edge: EdgeSource::PinChange { group: 0, bit: 4 },
    }),
});

pub const LPC_DEVBOARD: BoardConfig = checked(BoardConfig {
    board: Board::LpcDevboard,
    name: "lpc-devboard",
    family: Family::Lpc17xx,
    cpu_hz: 100_000_000,
    pclk_hz: 25_000_000,
    iec: IecConfig {
        atn: LineConfig {
            input: PinConfig::new(1, 26),
            output: LineOutput::Match { timer: 0, channel: 0, inverted: true },
        },
        clock: LineConfig {
            input: PinConfig::new(1, 27),
            output: LineOutput::Match { timer: 0, channel: 1, inverted: true },
        },
        data: LineConfig {
            input: PinConfig::new(1, 18),
            output: LineOutput::Match { timer: 1, channel: 0, inverted: true },
        },
        srq: LineConfig {
            input: PinConfig::new(1, 19),
            output: LineOutput::Match { timer: 1, channel: 1, inverted: true },
        },
        atn_edge: EdgeSource::Capture { timer: 0, channel: 0 },
        clock_edge: EdgeSource::Capture { timer: 0, channel: 1 },
    },
    spi: SpiConfig {
        controller: 0,
        card0: PinConfig::new(0, 16),
        card1: Some(PinConfig::new(0, 22)),
    },
    leds: LedConfig {
        busy: Some(PinConfig::new(1, 20)),
        dirty: Some(PinConfig::new(1, 21)),
    },
    buttons: ButtonConfig {
        port: 2,
        mask: (1 << 10) | (1 << 11),
    },
    parallel: None,
});

pub const LPC_PARALLEL: BoardConfig = checked(BoardConfig {
    board: Board::LpcParallel,
    name: "lpc-parallel",
    family: Family::Lpc17xx,
    cpu_hz: 96_000_000,
    pclk_hz: 24_000_000,
    iec: IecConfig {
        atn: LineConfig {
            input: PinConfig::inverted(1, 18),
            output: LineOutput::Match { timer: 1, channel: 0, inverted: true },
        },
        clock: LineConfig {
            input: PinConfig::inverted(1, 19),
            output: LineOutput::Match { timer: 1, channel: 1, inverted: true },
        },
        data: LineConfig {
            input: PinConfig::inverted(1, 26),
            output: LineOutput::Match { timer: 0, channel: 0, inverted: true },
        },
        srq: LineConfig {
            input: PinConfig::inverted(1, 27),
            output: LineOutput::Match { timer: 0, channel: 1, inverted: true },
        },
        atn_edge: EdgeSource::Capture { timer: 1, channel: 0 },
        clock_edge: EdgeSource::Capture { timer: 1, channel: 1 },
    },
    spi: SpiConfig {
        controller: 1,
        card0: PinConfig::new(0, 6),
        card1: None,
    },
    leds: LedConfig {
        busy: Some(PinConfig::new(1, 20)),
        dirty: None,
    },
    buttons: ButtonConfig {
        port: 2,
        mask: (1 << 12) | (1 << 13),
    },
    parallel: Some(ParallelConfig {
        data_port: 2,
        data_shift: 0,
        hsk_out: PinConfig::new(2, 8),
        hsk_in: PinConfig::new(2, 11),
        hsk_edge: EdgeSource::GpioInt,
    }),
});

// Evaluated on every build, whether or not a board is selected.
const _: () = {
    let mut i = 0;
    while i < Board::ALL.len() {
        if let Err(e) = Board::ALL[i].config().validate() {
            panic!("{}", e.message());
        }
        i += 1;
    }
};

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> BoardConfig {
        *Board::LpcDevboard.config()
    }

    #[test]
    fn test_catalog_validates() {
        for board in Board::ALL {
            assert_eq!(board.config().validate(), Ok(()), "{:?}", board);
            assert_eq!(board.config().board, board);
        }
    }

    #[test]
    fn test_pin_conflict_detected() {
        let mut config = base();
        config.leds.busy = Some(PinConfig::new(0, 16));
        assert_eq!(
            config.validate(),
            Err(ConfigError::PinConflict { port: 0, pin: 16 })
        );
    }

    #[test]
    fn test_inputs_must_share_port() {
        let mut config = base();
        config.iec.srq.input = PinConfig::new(0, 3);
        assert_eq!(config.validate(), Err(ConfigError::InputsSplitAcrossPorts));
    }

    #[test]
    fn test_match_channel_conflict() {
        let mut config = base();
        config.iec.srq.output = LineOutput::Match {
            timer: 0,
            channel: 0,
            inverted: true,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ChannelConflict { timer: 0, channel: 0 })
        );
    }

    #[test]
    fn test_reserved_timer_rejected() {
        let mut config = base();
        config.iec.atn_edge = EdgeSource::Capture {
            timer: LPC_TIMEOUT_TIMER,
            channel: 0,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ReservedTimer { timer: 2 })
        );
    }

    #[test]
    fn test_edge_source_family_mismatch() {
        let mut config = base();
        config.iec.clock_edge = EdgeSource::ExtInt(1);
        assert_eq!(config.validate(), Err(ConfigError::WrongFamily));
    }

    #[test]
    fn test_lpc_pclk_below_one_mhz() {
        let mut config = base();
        config.pclk_hz = 999_999;
        assert_eq!(config.validate(), Err(ConfigError::PclkTooSlow));
        config.pclk_hz = 1_000_000;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_avr_ext_int_must_sit_on_line() {
        let mut config = *Board::Shadowolf.config();
        config.iec.atn_edge = EdgeSource::ExtInt(2);
        assert_eq!(config.validate(), Err(ConfigError::EdgeSourceMismatch));
    }

    #[test]
    fn test_avr_pin_change_group_must_match_port() {
        let mut config = *Board::Larsp.config();
        config.iec.clock_edge = EdgeSource::PinChange { group: 3, bit: 1 };
        assert_eq!(config.validate(), Err(ConfigError::EdgeSourceMismatch));
    }

    #[test]
    fn test_capture_must_sit_on_line() {
        // CAP1.0 is P1.18, the DATA input of this board
        let mut config = base();
        config.iec.atn_edge = EdgeSource::Capture { timer: 1, channel: 0 };
        assert_eq!(config.validate(), Err(ConfigError::EdgeSourceMismatch));
    }

    #[test]
    fn test_capture_pins() {
        assert_eq!(lpc_capture_pin(0, 0), Some((1, 26)));
        assert_eq!(lpc_capture_pin(1, 1), Some((1, 19)));
        assert_eq!(lpc_capture_pin(0, 2), None);
        assert_eq!(lpc_capture_pin(4, 0), None);
    }

    #[test]
    fn test_gpio_interrupt_not_a_line_edge() {
        let mut config = base();
        for (i, line) in [
            &mut config.iec.atn,
            &mut config.iec.clock,
            &mut config.iec.data,
            &mut config.iec.srq,
        ]
        .into_iter()
        .enumerate()
        {
            line.input = PinConfig::new(0, i as u8);
        }
        config.iec.atn_edge = EdgeSource::GpioInt;
        assert_eq!(config.validate(), Err(ConfigError::WrongFamily));
    }

    #[test]
    fn test_capture_not_a_handshake_edge() {
        let mut config = *Board::LpcParallel.config();
        if let Some(par) = config.parallel.as_mut() {
            par.hsk_edge = EdgeSource::Capture { timer: 0, channel: 0 };
        }
        assert_eq!(config.validate(), Err(ConfigError::WrongFamily));
    }

    #[test]
    fn test_gpio_interrupt_port() {
        let mut config = *Board::LpcParallel.config();
        if let Some(par) = config.parallel.as_mut() {
            par.hsk_in = PinConfig::new(1, 0);
        }
        assert_eq!(
            config.validate(),
            Err(ConfigError::NoGpioInterrupt { port: 1 })
        );
    }

    #[test]
    fn test_spi_bus_pins_are_claimed_on_avr() {
        let mut config = *Board::Uiec.config();
        config.leds.busy = Some(PinConfig::new(port::B, 1));
        assert_eq!(
            config.validate(),
            Err(ConfigError::PinConflict { port: port::B, pin: 1 })
        );
    }
}
