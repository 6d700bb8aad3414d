//! Bus lines and edge interrupts
//!
//! The four line inputs share one port, so [`AvrIecBus::read`] is a single
//! `PIN` read. Outputs come in two wirings:
//!
//! - open collector: the input pin itself, pulled low by setting its `DDR`
//!   bit with `PORT` low, released by turning it back into an input
//! - driver transistor: a separate output pin; an inverting stage pulls the
//!   bus low while the pin is high
//!
//! ATN and CLOCK transitions arrive on an external interrupt (any-change
//! sense) or a pin-change group.

use iecdrive_core::config::{BoardConfig, EdgeSource, Family, LineOutput};
use iecdrive_core::{BusSnapshot, ConfigError, EdgeLine, EdgeSet, Line, Vector};
use iecdrive_hal::{BusLines, EdgeIrq};

use crate::regs::{AvrIo, AvrReg};

/// How one line is pulled low
#[derive(Debug, Clone, Copy)]
struct Drive {
    reg: AvrReg,
    mask: u8,
    /// Setting `mask` in `reg` pulls the line low
    low_sets: bool,
}

/// How one line is sampled
#[derive(Debug, Clone, Copy)]
struct Sample {
    mask: u8,
    inverted: bool,
}

/// Bus line driver and sampler
pub struct AvrIecBus<'a, IO> {
    io: &'a IO,
    input_port: u8,
    sample: [Sample; 4],
    drive: [Drive; 4],
}

impl<'a, IO: AvrIo> AvrIecBus<'a, IO> {
    /// Bind the line pins of `config`; the pins are untouched until
    /// [`init`](Self::init)
    pub fn new(io: &'a IO, config: &BoardConfig) -> Result<Self, ConfigError> {
        if !matches!(config.family, Family::Avr(_)) {
            return Err(ConfigError::WrongFamily);
        }
        let lines = config.iec.lines();
        let input_port = lines[0].input.port;
        let mut sample = [Sample { mask: 0, inverted: false }; 4];
        let mut drive = [Drive {
            reg: AvrReg::Ddr(input_port),
            mask: 0,
            low_sets: true,
        }; 4];

        for line in Line::ALL {
            let cfg = lines[line.index()];
            if cfg.input.port != input_port {
                return Err(ConfigError::InputsSplitAcrossPorts);
            }
            sample[line.index()] = Sample {
                mask: cfg.input.mask() as u8,
                inverted: cfg.input.inverted,
            };
            drive[line.index()] = match cfg.output {
                LineOutput::OpenCollector => Drive {
                    reg: AvrReg::Ddr(cfg.input.port),
                    mask: cfg.input.mask() as u8,
                    low_sets: true,
                },
                LineOutput::Pin(out) => Drive {
                    reg: AvrReg::Port(out.port),
                    mask: out.mask() as u8,
                    low_sets: out.inverted,
                },
                LineOutput::Match { .. } => return Err(ConfigError::WrongFamily),
            };
        }

        Ok(Self {
            io,
            input_port,
            sample,
            drive,
        })
    }

    /// Configure the line pins and release every line
    pub fn init(&mut self) {
        critical_section::with(|_| {
            for (drive, sample) in self.drive.iter().zip(self.sample.iter()) {
                // Inputs without pull-up: the bus carries its own
                self.io.clear_bits(AvrReg::Port(self.input_port), sample.mask);
                match drive.reg {
                    AvrReg::Port(port) => {
                        let released = !drive.low_sets;
                        self.io.put_bits(drive.reg, drive.mask, released);
                        self.io.set_bits(AvrReg::Ddr(port), drive.mask);
                    }
                    _ => self.io.clear_bits(drive.reg, drive.mask),
                }
            }
        });

        #[cfg(feature = "defmt")]
        defmt::debug!("iec: lines on port {}, released", self.input_port);
    }
}

impl<IO: AvrIo> BusLines for AvrIecBus<'_, IO> {
    #[inline(always)]
    fn read(&self) -> BusSnapshot {
        let pins = self.io.read(AvrReg::Pin(self.input_port));
        let mut snap = BusSnapshot::IDLE;
        for line in Line::ALL {
            let s = self.sample[line.index()];
            snap = snap.with(line, (pins & s.mask != 0) != s.inverted);
        }
        snap
    }

    #[inline(always)]
    fn set_line(&mut self, line: Line, high: bool) {
        let d = self.drive[line.index()];
        critical_section::with(|_| self.io.put_bits(d.reg, d.mask, high != d.low_sets));
    }
}

/// Where the interrupt of one edge line lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Ext(u8),
    PinChange { group: u8, mask: u8 },
}

impl Source {
    fn from_config(source: EdgeSource) -> Result<Self, ConfigError> {
        match source {
            EdgeSource::ExtInt(n) => Ok(Source::Ext(n)),
            EdgeSource::PinChange { group, bit } => Ok(Source::PinChange {
                group,
                mask: 1 << bit,
            }),
            _ => Err(ConfigError::WrongFamily),
        }
    }

    /// Register and bit that arm the interrupt
    fn enable_bit(self) -> (AvrReg, u8) {
        match self {
            Source::Ext(n) => (AvrReg::Eimsk, 1 << n),
            Source::PinChange { group, mask } => (AvrReg::Pcmsk(group), mask),
        }
    }

    fn vector(self) -> Vector {
        match self {
            Source::Ext(n) => Vector::ExtInt(n),
            Source::PinChange { group, .. } => Vector::PinChange(group),
        }
    }
}

/// ATN and CLOCK transition interrupts
///
/// Lines sharing one pin-change group share its flag, so an interrupt of
/// that group reports every armed line of the group.
pub struct AvrEdgeIrq<'a, IO> {
    io: &'a IO,
    sources: [Source; 2],
}

const EDGE_LINES: [EdgeLine; 2] = [EdgeLine::Atn, EdgeLine::Clock];

fn slot(line: EdgeLine) -> usize {
    match line {
        EdgeLine::Atn => 0,
        EdgeLine::Clock => 1,
    }
}

impl<'a, IO: AvrIo> AvrEdgeIrq<'a, IO> {
    pub fn new(io: &'a IO, config: &BoardConfig) -> Result<Self, ConfigError> {
        if !matches!(config.family, Family::Avr(_)) {
            return Err(ConfigError::WrongFamily);
        }
        Ok(Self {
            io,
            sources: [
                Source::from_config(config.iec.atn_edge)?,
                Source::from_config(config.iec.clock_edge)?,
            ],
        })
    }

    /// Select both-edge sensing and enable the interrupt groups, with every
    /// line disarmed
    pub fn init(&self) {
        critical_section::with(|_| {
            for source in self.sources {
                match source {
                    Source::Ext(n) => {
                        self.io.clear_bits(AvrReg::Eimsk, 1 << n);
                        // ISCn1:0 = 01, any logical change
                        let shift = 2 * n;
                        self.io
                            .modify(AvrReg::Eicra, |v| (v & !(0b11 << shift)) | (0b01 << shift));
                        self.io.write(AvrReg::Eifr, 1 << n);
                    }
                    Source::PinChange { group, mask } => {
                        self.io.clear_bits(AvrReg::Pcmsk(group), mask);
                        self.io.set_bits(AvrReg::Pcicr, 1 << group);
                        self.io.write(AvrReg::Pcifr, 1 << group);
                    }
                }
            }
        });

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "iec: atn irq {}, clock irq {}",
            self.sources[0].vector(),
            self.sources[1].vector()
        );
    }
}

impl<IO: AvrIo> EdgeIrq for AvrEdgeIrq<'_, IO> {
    fn set_irq(&self, line: EdgeLine, enable: bool) {
        let source = self.sources[slot(line)];
        let (reg, mask) = source.enable_bit();
        critical_section::with(|_| {
            let armed = self.io.read(reg) & mask != 0;
            if enable && !armed {
                // Drop edges latched before arming. A pin-change flag is only
                // stale while no line of its group is armed.
                match source {
                    Source::Ext(n) => self.io.write(AvrReg::Eifr, 1 << n),
                    Source::PinChange { group, .. } => {
                        if self.io.read(AvrReg::Pcmsk(group)) == 0 {
                            self.io.write(AvrReg::Pcifr, 1 << group);
                        }
                    }
                }
            }
            self.io.put_bits(reg, mask, enable);
        });
    }

    fn irq_enabled(&self, line: EdgeLine) -> bool {
        let (reg, mask) = self.sources[slot(line)].enable_bit();
        self.io.read(reg) & mask != 0
    }

    fn on_interrupt(&self, vector: Vector) -> EdgeSet {
        let mut fired = EdgeSet::EMPTY;
        for line in EDGE_LINES {
            let source = self.sources[slot(line)];
            if source.vector() == vector && self.irq_enabled(line) {
                fired = fired.insert(line);
            }
        }
        match vector {
            Vector::ExtInt(n) => self.io.write(AvrReg::Eifr, 1 << n),
            Vector::PinChange(g) => self.io.write(AvrReg::Pcifr, 1 << g),
            _ => {}
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimAvr;
    use iecdrive_core::Board;

    const AVR_BOARDS: [Board; 3] = [Board::Larsp, Board::Shadowolf, Board::Uiec];

    #[test]
    fn test_init_releases_all_lines() {
        for board in AVR_BOARDS {
            let sim = SimAvr::new(board.config());
            let mut bus = AvrIecBus::new(&sim, board.config()).unwrap();
            bus.init();
            assert_eq!(bus.read(), BusSnapshot::IDLE, "{:?}", board);
            for line in Line::ALL {
                assert!(sim.wire(line));
            }
        }
    }

    #[test]
    fn test_write_then_read_every_line() {
        for board in AVR_BOARDS {
            let sim = SimAvr::new(board.config());
            let mut bus = AvrIecBus::new(&sim, board.config()).unwrap();
            bus.init();
            for line in Line::ALL {
                bus.set_line(line, false);
                assert!(!bus.read().get(line), "{:?} {:?}", board, line);
                assert!(!sim.wire(line));
                assert_eq!(bus.read(), BusSnapshot::IDLE.with(line, false));

                bus.set_line(line, true);
                assert!(bus.read().get(line), "{:?} {:?}", board, line);
                assert!(sim.wire(line));
            }
        }
    }

    #[test]
    fn test_writes_are_idempotent() {
        let sim = SimAvr::new(Board::Shadowolf.config());
        let mut bus = AvrIecBus::new(&sim, Board::Shadowolf.config()).unwrap();
        bus.init();
        bus.set_data(false);
        bus.set_data(false);
        assert!(!bus.read().data());
        bus.set_data(true);
        assert_eq!(bus.read(), BusSnapshot::IDLE);
    }

    #[test]
    fn test_released_line_follows_other_devices() {
        let sim = SimAvr::new(Board::Larsp.config());
        let mut bus = AvrIecBus::new(&sim, Board::Larsp.config()).unwrap();
        bus.init();
        sim.pull_line(Line::Atn, true);
        assert!(!bus.read().atn());
        // Releasing our side does not override another device
        bus.set_atn(true);
        assert!(!bus.read().atn());
        sim.pull_line(Line::Atn, false);
        assert!(bus.read().atn());
    }

    #[test]
    fn test_write_touches_only_its_bit() {
        let sim = SimAvr::new(Board::Shadowolf.config());
        let mut bus = AvrIecBus::new(&sim, Board::Shadowolf.config()).unwrap();
        bus.init();
        // LED pins share port C with the line outputs
        sim.write(AvrReg::Port(2), sim.peek(AvrReg::Port(2)) | 0x03);
        bus.set_clock(false);
        assert_eq!(sim.peek(AvrReg::Port(2)), 0x03 | 0x20);
        bus.set_clock(true);
        assert_eq!(sim.peek(AvrReg::Port(2)), 0x03);
    }

    #[test]
    fn test_lpc_board_rejected() {
        let sim = SimAvr::new(Board::Larsp.config());
        assert!(matches!(
            AvrIecBus::new(&sim, Board::LpcDevboard.config()),
            Err(ConfigError::WrongFamily)
        ));
        assert!(matches!(
            AvrEdgeIrq::new(&sim, Board::LpcDevboard.config()),
            Err(ConfigError::WrongFamily)
        ));
    }

    #[test]
    fn test_ext_int_edges_reported_while_armed() {
        let sim = SimAvr::new(Board::Shadowolf.config());
        let irq = AvrEdgeIrq::new(&sim, Board::Shadowolf.config()).unwrap();
        irq.init();
        assert_eq!(sim.peek(AvrReg::Eicra) & 0x0f, 0b0101);
        assert!(!irq.irq_enabled(EdgeLine::Atn));

        irq.set_atn_irq(true);
        assert_eq!(sim.peek(AvrReg::Eimsk), 0x01);
        sim.pull_line(Line::Atn, true);
        let fired = irq.on_interrupt(Vector::ExtInt(0));
        assert!(fired.contains(EdgeLine::Atn));
        assert!(!fired.contains(EdgeLine::Clock));
        assert_eq!(sim.peek(AvrReg::Eifr) & 0x01, 0);

        // CLOCK is disarmed: its vector reports nothing
        sim.pull_line(Line::Clock, true);
        assert!(irq.on_interrupt(Vector::ExtInt(1)).is_empty());
    }

    #[test]
    fn test_edges_while_disarmed_are_dropped() {
        let sim = SimAvr::new(Board::Uiec.config());
        let irq = AvrEdgeIrq::new(&sim, Board::Uiec.config()).unwrap();
        irq.init();
        sim.pull_line(Line::Clock, true);
        assert_ne!(sim.peek(AvrReg::Eifr) & 0x02, 0);
        irq.set_clock_irq(true);
        assert_eq!(sim.peek(AvrReg::Eifr) & 0x02, 0);
    }

    #[test]
    fn test_pin_change_group_shared_by_lines() {
        let sim = SimAvr::new(Board::Larsp.config());
        let irq = AvrEdgeIrq::new(&sim, Board::Larsp.config()).unwrap();
        irq.init();
        assert_eq!(sim.peek(AvrReg::Pcicr), 0x04);

        irq.set_atn_irq(true);
        irq.set_clock_irq(true);
        assert_eq!(sim.peek(AvrReg::Pcmsk(2)), 0x03);
        sim.pull_line(Line::Clock, true);
        assert_eq!(sim.peek(AvrReg::Pcifr), 0x04);
        let fired = irq.on_interrupt(Vector::PinChange(2));
        assert!(fired.contains(EdgeLine::Atn));
        assert!(fired.contains(EdgeLine::Clock));
        assert_eq!(sim.peek(AvrReg::Pcifr), 0);

        irq.set_atn_irq(false);
        let fired = irq.on_interrupt(Vector::PinChange(2));
        assert!(!fired.contains(EdgeLine::Atn));
        assert!(irq.on_interrupt(Vector::ExtInt(0)).is_empty());
    }

    #[test]
    fn test_stale_pin_change_flag_dropped_on_arm() {
        let sim = SimAvr::new(Board::Larsp.config());
        let irq = AvrEdgeIrq::new(&sim, Board::Larsp.config()).unwrap();
        irq.init();
        irq.set_atn_irq(true);
        sim.pull_line(Line::Atn, true);
        irq.set_atn_irq(false);
        assert_eq!(sim.peek(AvrReg::Pcifr), 0x04);

        irq.set_clock_irq(true);
        assert_eq!(sim.peek(AvrReg::Pcifr), 0);
        assert!(irq.on_interrupt(Vector::PinChange(2)).is_empty());
    }

    #[test]
    fn test_arming_second_line_keeps_pending_edge() {
        let sim = SimAvr::new(Board::Larsp.config());
        let irq = AvrEdgeIrq::new(&sim, Board::Larsp.config()).unwrap();
        irq.init();
        irq.set_atn_irq(true);
        sim.pull_line(Line::Atn, true);
        irq.set_clock_irq(true);
        assert_eq!(sim.peek(AvrReg::Pcifr), 0x04);
        // Re-arming an armed line keeps it too
        irq.set_atn_irq(true);
        assert!(irq.on_interrupt(Vector::PinChange(2)).contains(EdgeLine::Atn));
    }

    #[test]
    fn test_irq_toggle_keeps_reads() {
        for board in AVR_BOARDS {
            let sim = SimAvr::new(board.config());
            let mut bus = AvrIecBus::new(&sim, board.config()).unwrap();
            let irq = AvrEdgeIrq::new(&sim, board.config()).unwrap();
            bus.init();
            irq.init();
            bus.set_clock(false);
            sim.pull_line(Line::Atn, true);
            let before = bus.read();
            irq.set_atn_irq(true);
            irq.set_clock_irq(true);
            assert_eq!(bus.read(), before);
            irq.set_atn_irq(false);
            irq.set_clock_irq(false);
            assert_eq!(bus.read(), before);
            assert!(!before.atn());
            assert!(!before.clock());
        }
    }
}
