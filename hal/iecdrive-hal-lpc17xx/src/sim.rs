//! Simulated LPC17xx register file
//!
//! [`SimLpc`] implements [`LpcIo`] over a sparse register map and models:
//!
//! - GPIO levels including open-drain mode, `FIOMASK` and `FIOSET/FIOCLR`
//! - the four bus wires, pulled low by match outputs (through the `EMR`
//!   level bits) or by other devices through [`SimLpc::pull_line`]
//! - capture events on the ATN/CLOCK capture pins per `CCR`
//! - GPIO rising/falling interrupt status of ports 0 and 2
//! - timers counting in microseconds of simulated time, with stop on match
//! - SSP transfers completing at once with scripted receive bytes
//!
//! Reads of a timer's `TC` can advance time on their own (see
//! [`SimLpc::set_auto_advance_us`]) so busy-wait loops terminate.

use core::cell::{Cell, RefCell};

use heapless::{Deque, FnvIndexMap, Vec};
use iecdrive_core::config::{BoardConfig, EdgeSource, Family, LineOutput};
use iecdrive_core::Line;

use crate::regs::{bits, GpioIntReg, GpioReg, LpcIo, LpcReg, SspReg, TimReg};

/// GPIO ports 0 to 4
pub const PORTS: usize = 5;

/// Capacity of the write log
pub const WRITE_LOG: usize = 256;

const SR_TFE: u32 = 1 << 0;

/// Host-side stand-in for an LPC175x/6x
pub struct SimLpc {
    config: BoardConfig,
    mem: RefCell<FnvIndexMap<u32, u32, 256>>,
    out: [Cell<u32>; PORTS],
    ext_low: [Cell<u32>; PORTS],
    levels: [Cell<u32>; PORTS],
    bus_low: Cell<u8>,
    wire_low: Cell<u8>,
    residue: [Cell<u32>; 4],
    auto_us: Cell<u32>,
    ssp_script: RefCell<Deque<u8, 64>>,
    ssp_fifo: RefCell<Deque<u8, 8>>,
    ssp_tx: RefCell<Vec<u8, 256>>,
    writes: RefCell<Vec<(LpcReg, u32), WRITE_LOG>>,
}

impl SimLpc {
    /// Reset state of the chip, wired as `config` describes
    ///
    /// # Panics
    ///
    /// If `config` is not an LPC17xx board.
    pub fn new(config: &BoardConfig) -> Self {
        assert!(
            config.family == Family::Lpc17xx,
            "{} is not an LPC17xx board",
            config.name
        );
        let sim = Self {
            config: *config,
            mem: RefCell::new(FnvIndexMap::new()),
            out: core::array::from_fn(|_| Cell::new(0)),
            ext_low: core::array::from_fn(|_| Cell::new(0)),
            levels: core::array::from_fn(|_| Cell::new(0)),
            bus_low: Cell::new(0),
            wire_low: Cell::new(0),
            residue: core::array::from_fn(|_| Cell::new(0)),
            auto_us: Cell::new(0),
            ssp_script: RefCell::new(Deque::new()),
            ssp_fifo: RefCell::new(Deque::new()),
            ssp_tx: RefCell::new(Vec::new()),
            writes: RefCell::new(Vec::new()),
        };
        let levels = sim.compute_levels();
        for (cell, level) in sim.levels.iter().zip(levels) {
            cell.set(level);
        }
        sim
    }

    /// Another bus device pulls `line` low (`true`) or lets go (`false`)
    pub fn pull_line(&self, line: Line, low: bool) {
        let mask = line.mask();
        let v = self.bus_low.get();
        self.bus_low.set(if low { v | mask } else { v & !mask });
        self.settle();
    }

    /// Electrical level of a bus wire (`true` = high)
    pub fn wire(&self, line: Line) -> bool {
        self.wire_low.get() & line.mask() == 0
    }

    /// Pull a non-bus pin low from outside (`true`) or release it
    pub fn pull_pin(&self, port: u8, pin: u8, low: bool) {
        let cell = &self.ext_low[port as usize];
        let mask = 1u32 << pin;
        cell.set(if low { cell.get() | mask } else { cell.get() & !mask });
        self.settle();
    }

    /// Level of a pin
    pub fn pin(&self, port: u8, pin: u8) -> bool {
        self.levels[port as usize].get() & (1 << pin) != 0
    }

    /// Register content without read side effects
    pub fn peek(&self, reg: LpcReg) -> u32 {
        self.mem.borrow().get(&reg.addr()).copied().unwrap_or(0)
    }

    /// Advance time by `usecs` on every read of a timer counter
    pub fn set_auto_advance_us(&self, usecs: u32) {
        self.auto_us.set(usecs);
    }

    /// Let `usecs` microseconds pass on every running timer
    pub fn advance_us(&self, usecs: u32) {
        let cycles = usecs.saturating_mul(self.config.pclk_hz / 1_000_000);
        for t in 0..4u8 {
            let tcr = self.peek(LpcReg::Timer(t, TimReg::Tcr));
            if tcr & bits::TCR_ENABLE == 0 || tcr & bits::TCR_RESET != 0 {
                continue;
            }
            let prescale = self.peek(LpcReg::Timer(t, TimReg::Pr)).saturating_add(1);
            let total = self.residue[t as usize].get() + cycles;
            self.residue[t as usize].set(total % prescale);
            self.count(t, total / prescale);
        }
    }

    /// Advance TC of timer `t` by `inc`, applying the first match hit
    fn count(&self, t: u8, inc: u32) {
        let tc = self.peek(LpcReg::Timer(t, TimReg::Tc));
        let mcr = self.peek(LpcReg::Timer(t, TimReg::Mcr));
        let end = tc as u64 + inc as u64;

        let mut first: Option<(u8, u32)> = None;
        for c in 0..4u8 {
            if mcr & bits::mcr_mask(c) == 0 {
                continue;
            }
            let mr = self.peek(LpcReg::Timer(t, TimReg::Mr(c)));
            let hit = (mr as u64) > tc as u64 && (mr as u64) <= end;
            if hit && first.map_or(true, |(_, m)| mr < m) {
                first = Some((c, mr));
            }
        }

        let Some((c, mr)) = first else {
            self.poke(LpcReg::Timer(t, TimReg::Tc), end as u32);
            return;
        };
        let action = mcr >> (3 * c);
        if action & 0b001 != 0 {
            self.or(LpcReg::Timer(t, TimReg::Ir), 1 << c);
        }
        if action & 0b100 != 0 {
            self.poke(LpcReg::Timer(t, TimReg::Tc), mr);
            self.and_not(LpcReg::Timer(t, TimReg::Tcr), bits::TCR_ENABLE);
        } else if action & 0b010 != 0 {
            self.poke(LpcReg::Timer(t, TimReg::Tc), 0);
        } else {
            self.poke(LpcReg::Timer(t, TimReg::Tc), end as u32);
        }
    }

    /// Queue bytes the SPI slave answers with
    pub fn queue_spi_rx(&self, bytes: &[u8]) {
        let mut script = self.ssp_script.borrow_mut();
        for &byte in bytes {
            let _ = script.push_back(byte);
        }
    }

    /// Bytes shifted out over SSP so far
    pub fn spi_sent(&self) -> Vec<u8, 256> {
        self.ssp_tx.borrow().clone()
    }

    /// Register writes so far, oldest first
    pub fn writes(&self) -> Vec<(LpcReg, u32), WRITE_LOG> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    fn poke(&self, reg: LpcReg, value: u32) {
        // The map covers every register the drivers touch
        let _ = self.mem.borrow_mut().insert(reg.addr(), value);
    }

    fn or(&self, reg: LpcReg, mask: u32) {
        self.poke(reg, self.peek(reg) | mask);
    }

    fn and_not(&self, reg: LpcReg, mask: u32) {
        self.poke(reg, self.peek(reg) & !mask);
    }

    fn compute_levels(&self) -> [u32; PORTS] {
        let mut levels = [0u32; PORTS];
        for (p, level) in levels.iter_mut().enumerate() {
            let dir = self.peek(LpcReg::Gpio(p as u8, GpioReg::Dir));
            let od = self.peek(LpcReg::PinModeOd(p as u8));
            let out = self.out[p].get();
            let driven_high = dir & out & !od;
            let driven_low = dir & !out;
            *level = driven_high | (!driven_low & !self.ext_low[p].get());
        }

        let lines = self.config.iec.lines();
        let mut wire_low = self.bus_low.get();
        for line in Line::ALL {
            if let LineOutput::Match {
                timer,
                channel,
                inverted,
            } = lines[line.index()].output
            {
                let emr = self.peek(LpcReg::Timer(timer, TimReg::Emr));
                let pin_high = emr & bits::emr_level(channel) != 0;
                if pin_high == inverted {
                    wire_low |= line.mask();
                }
            }
        }
        self.wire_low.set(wire_low);

        for line in Line::ALL {
            let input = lines[line.index()].input;
            let high = (wire_low & line.mask() == 0) != input.inverted;
            let level = &mut levels[input.port as usize];
            *level = if high { *level | input.mask() } else { *level & !input.mask() };
        }
        levels
    }

    /// Recompute pin levels and raise capture and GPIO interrupt events
    fn settle(&self) {
        let new = self.compute_levels();
        let mut old = [0u32; PORTS];
        for (p, level) in new.iter().enumerate() {
            old[p] = self.levels[p].get();
            self.levels[p].set(*level);
        }

        for port in [0u8, 2] {
            let p = port as usize;
            let rose = !old[p] & new[p] & self.peek(LpcReg::GpioInt(port, GpioIntReg::EnR));
            let fell = old[p] & !new[p] & self.peek(LpcReg::GpioInt(port, GpioIntReg::EnF));
            self.or(LpcReg::GpioInt(port, GpioIntReg::StatR), rose);
            self.or(LpcReg::GpioInt(port, GpioIntReg::StatF), fell);
        }

        let edges = [
            (self.config.iec.atn_edge, self.config.iec.atn.input),
            (self.config.iec.clock_edge, self.config.iec.clock.input),
        ];
        for (edge, input) in edges {
            let EdgeSource::Capture { timer, channel } = edge else {
                continue;
            };
            let p = input.port as usize;
            let was = old[p] & input.mask() != 0;
            let now = new[p] & input.mask() != 0;
            let ccr = self.peek(LpcReg::Timer(timer, TimReg::Ccr)) >> (3 * channel);
            let captured = (!was && now && ccr & 0b001 != 0) || (was && !now && ccr & 0b010 != 0);
            if captured {
                let tc = self.peek(LpcReg::Timer(timer, TimReg::Tc));
                self.poke(LpcReg::Timer(timer, TimReg::Cr(channel)), tc);
                if ccr & 0b100 != 0 {
                    self.or(LpcReg::Timer(timer, TimReg::Ir), bits::ir_capture(channel));
                }
            }
        }
    }
}

impl LpcIo for SimLpc {
    fn read(&self, reg: LpcReg) -> u32 {
        match reg {
            LpcReg::Gpio(p, GpioReg::Pin) => {
                self.levels[p as usize].get() & !self.peek(LpcReg::Gpio(p, GpioReg::Mask))
            }
            LpcReg::Gpio(p, GpioReg::Set) => self.out[p as usize].get(),
            LpcReg::IntStatus => {
                let pending = |port| {
                    self.peek(LpcReg::GpioInt(port, GpioIntReg::StatR))
                        | self.peek(LpcReg::GpioInt(port, GpioIntReg::StatF))
                        != 0
                };
                (pending(0) as u32) | ((pending(2) as u32) << 2)
            }
            LpcReg::Ssp(_, SspReg::Dr) => self.ssp_fifo.borrow_mut().pop_front().unwrap_or(0) as u32,
            LpcReg::Ssp(_, SspReg::Sr) => {
                let rne = if self.ssp_fifo.borrow().is_empty() { 0 } else { bits::SR_RNE };
                SR_TFE | bits::SR_TNF | rne
            }
            LpcReg::Timer(_, TimReg::Tc) => {
                let auto = self.auto_us.get();
                if auto > 0 {
                    self.advance_us(auto);
                }
                self.peek(reg)
            }
            _ => self.peek(reg),
        }
    }

    fn write(&self, reg: LpcReg, value: u32) {
        let _ = self.writes.borrow_mut().push((reg, value));
        match reg {
            LpcReg::Timer(_, TimReg::Ir) => self.and_not(reg, value),
            LpcReg::Timer(t, TimReg::Tcr) => {
                self.poke(reg, value);
                if value & bits::TCR_RESET != 0 {
                    self.poke(LpcReg::Timer(t, TimReg::Tc), 0);
                    self.poke(LpcReg::Timer(t, TimReg::Pc), 0);
                    self.residue[t as usize].set(0);
                }
            }
            LpcReg::Gpio(p, GpioReg::Set | GpioReg::Clr | GpioReg::Pin) => {
                let cell = &self.out[p as usize];
                let value = value & !self.peek(LpcReg::Gpio(p, GpioReg::Mask));
                let out = cell.get();
                cell.set(match reg {
                    LpcReg::Gpio(_, GpioReg::Set) => out | value,
                    LpcReg::Gpio(_, GpioReg::Clr) => out & !value,
                    _ => {
                        let mask = self.peek(LpcReg::Gpio(p, GpioReg::Mask));
                        (out & mask) | value
                    }
                });
            }
            LpcReg::GpioInt(p, GpioIntReg::Clr) => {
                self.and_not(LpcReg::GpioInt(p, GpioIntReg::StatR), value);
                self.and_not(LpcReg::GpioInt(p, GpioIntReg::StatF), value);
            }
            LpcReg::NvicIser0 => self.or(reg, value),
            LpcReg::Ssp(_, SspReg::Dr) => {
                let _ = self.ssp_tx.borrow_mut().push(value as u8);
                let rx = self.ssp_script.borrow_mut().pop_front().unwrap_or(0xff);
                let _ = self.ssp_fifo.borrow_mut().push_back(rx);
            }
            _ => self.poke(reg, value),
        }
        self.settle();
    }
}
