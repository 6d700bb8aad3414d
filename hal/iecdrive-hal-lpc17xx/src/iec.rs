//! Bus lines and edge captures
//!
//! Line outputs are timer match pins driving the bus through transistors;
//! the level of a line is set through the `EMR` bit of its channel. Line
//! inputs sit on one GPIO port and are sampled with a single `FIOPIN` read.
//! ATN and CLOCK inputs double as capture pins for the transition interrupt.

use iecdrive_core::config::{BoardConfig, EdgeSource, Family, LineOutput};
use iecdrive_core::{BusSnapshot, ConfigError, EdgeLine, EdgeSet, Line, Vector};
use iecdrive_hal::{BusLines, EdgeIrq};

use crate::regs::{GpioReg, LpcIo, LpcReg};
use crate::timer::{CaptureChannel, IecTimers, MatchChannel};

struct Output<'a, IO> {
    channel: MatchChannel<'a, IO>,
    inverted: bool,
}

/// Bus line driver and sampler
pub struct LpcIecBus<'a, IO> {
    io: &'a IO,
    input_port: u8,
    /// Input pin mask and inversion per line
    sample: [(u32, bool); 4],
    outputs: [Output<'a, IO>; 4],
}

impl<'a, IO: LpcIo> LpcIecBus<'a, IO> {
    /// Claim the match channels of the four lines
    pub fn new(
        io: &'a IO,
        config: &BoardConfig,
        timers: &mut IecTimers<'a, IO>,
    ) -> Result<Self, ConfigError> {
        if config.family != Family::Lpc17xx {
            return Err(ConfigError::WrongFamily);
        }
        let lines = config.iec.lines();
        let input_port = lines[0].input.port;
        let mut sample = [(0, false); 4];
        for line in Line::ALL {
            let input = lines[line.index()].input;
            if input.port != input_port {
                return Err(ConfigError::InputsSplitAcrossPorts);
            }
            sample[line.index()] = (input.mask(), input.inverted);
        }

        let outputs = timers.claim_all(|timers| {
            let mut output = |line: Line| -> Result<Output<'a, IO>, ConfigError> {
                match lines[line.index()].output {
                    LineOutput::Match {
                        timer,
                        channel,
                        inverted,
                    } => Ok(Output {
                        channel: timers.match_channel(timer, channel)?,
                        inverted,
                    }),
                    _ => Err(ConfigError::WrongFamily),
                }
            };
            Ok([
                output(Line::Atn)?,
                output(Line::Clock)?,
                output(Line::Data)?,
                output(Line::Srq)?,
            ])
        })?;

        Ok(Self {
            io,
            input_port,
            sample,
            outputs,
        })
    }

    /// Make the inputs GPIO inputs and release every line
    pub fn init(&mut self) {
        let inputs = self.sample.iter().fold(0, |acc, s| acc | s.0);
        critical_section::with(|_| {
            self.io.clear_bits(LpcReg::Gpio(self.input_port, GpioReg::Dir), inputs);
        });
        for out in &self.outputs {
            out.channel.init(!out.inverted);
        }

        #[cfg(feature = "defmt")]
        defmt::debug!("iec: inputs on port {} mask {=u32:#x}", self.input_port, inputs);
    }
}

impl<IO: LpcIo> BusLines for LpcIecBus<'_, IO> {
    #[inline(always)]
    fn read(&self) -> BusSnapshot {
        let pins = self.io.read(LpcReg::Gpio(self.input_port, GpioReg::Pin));
        let mut snap = BusSnapshot::IDLE;
        for line in Line::ALL {
            let (mask, inverted) = self.sample[line.index()];
            snap = snap.with(line, (pins & mask != 0) != inverted);
        }
        snap
    }

    #[inline(always)]
    fn set_line(&mut self, line: Line, high: bool) {
        let out = &self.outputs[line.index()];
        out.channel.set(high != out.inverted);
    }
}

/// ATN and CLOCK transition interrupts on timer capture channels
pub struct LpcEdgeIrq<'a, IO> {
    captures: [CaptureChannel<'a, IO>; 2],
}

const EDGE_LINES: [EdgeLine; 2] = [EdgeLine::Atn, EdgeLine::Clock];

impl<'a, IO: LpcIo> LpcEdgeIrq<'a, IO> {
    /// Claim the capture channels of ATN and CLOCK
    pub fn new(
        config: &BoardConfig,
        timers: &mut IecTimers<'a, IO>,
    ) -> Result<Self, ConfigError> {
        let captures = timers.claim_all(|timers| {
            let mut capture = |edge: EdgeSource| match edge {
                EdgeSource::Capture { timer, channel } => timers.capture_channel(timer, channel),
                _ => Err(ConfigError::WrongFamily),
            };
            Ok([capture(config.iec.atn_edge)?, capture(config.iec.clock_edge)?])
        })?;
        Ok(Self { captures })
    }

    /// Capture both edges with every line disarmed
    pub fn init(&self) {
        for cap in &self.captures {
            cap.init();
        }

        #[cfg(feature = "defmt")]
        defmt::debug!(
            "iec: atn on timer {}, clock on timer {}",
            self.captures[0].timer(),
            self.captures[1].timer()
        );
    }

    fn capture(&self, line: EdgeLine) -> &CaptureChannel<'a, IO> {
        match line {
            EdgeLine::Atn => &self.captures[0],
            EdgeLine::Clock => &self.captures[1],
        }
    }
}

impl<IO: LpcIo> EdgeIrq for LpcEdgeIrq<'_, IO> {
    fn set_irq(&self, line: EdgeLine, enable: bool) {
        self.capture(line).set_irq(enable);
    }

    fn irq_enabled(&self, line: EdgeLine) -> bool {
        self.capture(line).irq_enabled()
    }

    fn on_interrupt(&self, vector: Vector) -> EdgeSet {
        let Vector::Timer(n) = vector else {
            return EdgeSet::EMPTY;
        };
        let mut fired = EdgeSet::EMPTY;
        for line in EDGE_LINES {
            let cap = self.capture(line);
            if cap.timer() == n && cap.take_flag() && cap.irq_enabled() {
                fired = fired.insert(line);
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::{bits, TimReg};
    use crate::sim::SimLpc;
    use iecdrive_core::Board;

    const LPC_BOARDS: [Board; 2] = [Board::LpcDevboard, Board::LpcParallel];

    struct Rig<'a> {
        bus: LpcIecBus<'a, SimLpc>,
        irq: LpcEdgeIrq<'a, SimLpc>,
    }

    fn rig<'a>(sim: &'a SimLpc, board: Board) -> Rig<'a> {
        let mut timers = IecTimers::new(sim);
        timers.init();
        let mut bus = LpcIecBus::new(sim, board.config(), &mut timers).unwrap();
        let irq = LpcEdgeIrq::new(board.config(), &mut timers).unwrap();
        bus.init();
        irq.init();
        Rig { bus, irq }
    }

    #[test]
    fn test_init_releases_all_lines() {
        for board in LPC_BOARDS {
            let sim = SimLpc::new(board.config());
            let r = rig(&sim, board);
            assert_eq!(r.bus.read(), BusSnapshot::IDLE, "{:?}", board);
            for line in Line::ALL {
                assert!(sim.wire(line));
            }
        }
    }

    #[test]
    fn test_write_then_read_every_line() {
        for board in LPC_BOARDS {
            let sim = SimLpc::new(board.config());
            let mut r = rig(&sim, board);
            for line in Line::ALL {
                r.bus.set_line(line, false);
                assert!(!r.bus.read().get(line), "{:?} {:?}", board, line);
                assert!(!sim.wire(line));
                assert_eq!(r.bus.read(), BusSnapshot::IDLE.with(line, false));
                r.bus.set_line(line, true);
                assert!(r.bus.read().get(line), "{:?} {:?}", board, line);
            }
        }
    }

    #[test]
    fn test_line_write_keeps_other_registers() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut r = rig(&sim, Board::LpcDevboard);
        r.irq.set_atn_irq(true);
        let ccr = sim.peek(LpcReg::Timer(0, TimReg::Ccr));
        let emr1 = sim.peek(LpcReg::Timer(1, TimReg::Emr));
        r.bus.set_clock(false);
        assert_eq!(sim.peek(LpcReg::Timer(0, TimReg::Ccr)), ccr);
        assert_eq!(sim.peek(LpcReg::Timer(1, TimReg::Emr)), emr1);
        // Clock is MAT0.1, inverted: pulling low drives the pin high
        assert_eq!(sim.peek(LpcReg::Timer(0, TimReg::Emr)), bits::emr_level(1));
    }

    #[test]
    fn test_capture_reports_armed_line() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let r = rig(&sim, Board::LpcDevboard);
        r.irq.set_clock_irq(true);
        sim.pull_line(Line::Clock, true);
        sim.pull_line(Line::Atn, true);
        let fired = r.irq.on_interrupt(Vector::Timer(0));
        assert!(fired.contains(EdgeLine::Clock));
        assert!(!fired.contains(EdgeLine::Atn));
        assert!(r.irq.on_interrupt(Vector::Timer(0)).is_empty());
        assert!(r.irq.on_interrupt(Vector::Timer(1)).is_empty());
    }

    #[test]
    fn test_captures_on_second_timer() {
        let sim = SimLpc::new(Board::LpcParallel.config());
        let r = rig(&sim, Board::LpcParallel);
        r.irq.set_atn_irq(true);
        sim.pull_line(Line::Atn, true);
        assert!(r.irq.on_interrupt(Vector::Timer(0)).is_empty());
        assert!(r.irq.on_interrupt(Vector::Timer(1)).contains(EdgeLine::Atn));
    }

    #[test]
    fn test_stale_edge_dropped_on_arm() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let r = rig(&sim, Board::LpcDevboard);
        r.irq.set_atn_irq(true);
        sim.pull_line(Line::Atn, true);
        r.irq.set_atn_irq(false);
        r.irq.set_atn_irq(true);
        assert!(r.irq.on_interrupt(Vector::Timer(0)).is_empty());
    }

    #[test]
    fn test_irq_toggle_keeps_reads() {
        for board in LPC_BOARDS {
            let sim = SimLpc::new(board.config());
            let mut r = rig(&sim, board);
            r.bus.set_data(false);
            sim.pull_line(Line::Clock, true);
            let before = r.bus.read();
            r.irq.set_atn_irq(true);
            r.irq.set_clock_irq(true);
            assert_eq!(r.bus.read(), before);
            r.irq.set_atn_irq(false);
            r.irq.set_clock_irq(false);
            assert_eq!(r.bus.read(), before);
            assert!(!before.data());
            assert!(!before.clock());
        }
    }

    #[test]
    fn test_failed_bus_gives_channels_back() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut timers = IecTimers::new(&sim);
        let mut config = *Board::LpcDevboard.config();
        config.iec.srq.output = LineOutput::Match {
            timer: 1,
            channel: 0,
            inverted: true,
        };
        assert!(matches!(
            LpcIecBus::new(&sim, &config, &mut timers),
            Err(ConfigError::ChannelConflict { timer: 1, channel: 0 })
        ));
        assert!(LpcIecBus::new(&sim, Board::LpcDevboard.config(), &mut timers).is_ok());
    }

    #[test]
    fn test_failed_edge_irq_gives_channels_back() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut timers = IecTimers::new(&sim);
        let mut config = *Board::LpcDevboard.config();
        config.iec.clock_edge = EdgeSource::GpioInt;
        assert!(matches!(
            LpcEdgeIrq::new(&config, &mut timers),
            Err(ConfigError::WrongFamily)
        ));
        assert!(timers.capture_channel(0, 0).is_ok());
    }

    #[test]
    fn test_avr_board_rejected() {
        let sim = SimLpc::new(Board::LpcDevboard.config());
        let mut timers = IecTimers::new(&sim);
        assert!(matches!(
            LpcIecBus::new(&sim, Board::Larsp.config(), &mut timers),
            Err(ConfigError::WrongFamily)
        ));
        assert!(matches!(
            LpcEdgeIrq::new(Board::Larsp.config(), &mut timers),
            Err(ConfigError::WrongFamily)
        ));
    }
}
