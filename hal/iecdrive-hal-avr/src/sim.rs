//! Simulated ATmega register file
//!
//! [`SimAvr`] implements [`AvrIo`] on top of a plain byte array and adds
//! just enough electrical and peripheral behavior to exercise the drivers
//! on the host:
//!
//! - PINx reflects the pin levels, including the four bus wires. A wire is
//!   low while any participant pulls it: this chip through its configured
//!   outputs, or another bus device through [`SimAvr::pull_line`].
//! - Pin changes set EIFR (INTn pins) and PCIFR (pins enabled in PCMSKn).
//! - TIFRn, EIFR and PCIFR are cleared by writing ones.
//! - Timer2 counts with its selected prescaler when time is advanced.
//! - A write to SPDR completes a transfer at once and sets SPIF; the byte
//!   shifted in comes from a script and defaults to 0xFF.

use core::cell::{Cell, RefCell};

use heapless::{Deque, Vec};
use iecdrive_core::config::{AvrChip, BoardConfig, Family, LineOutput};
use iecdrive_core::Line;

use crate::regs::{bits, AvrIo, AvrReg};

/// Ports A to G
pub const PORTS: usize = 7;

/// Capacity of the write log
pub const WRITE_LOG: usize = 256;

/// Host-side stand-in for an ATmega
pub struct SimAvr {
    config: BoardConfig,
    chip: AvrChip,
    mem: [Cell<u8>; 0x100],
    levels: [Cell<u8>; PORTS],
    ext_low: [Cell<u8>; PORTS],
    bus_low: Cell<u8>,
    wire_low: Cell<u8>,
    timer2_residue: Cell<u32>,
    spi_rx: RefCell<Deque<u8, 64>>,
    spi_tx: RefCell<Vec<u8, 256>>,
    writes: RefCell<Vec<(AvrReg, u8), WRITE_LOG>>,
}

impl SimAvr {
    /// Power-on state of the chip of `config`, wired as `config` describes
    ///
    /// # Panics
    ///
    /// If `config` is not an AVR board.
    pub fn new(config: &BoardConfig) -> Self {
        let Family::Avr(chip) = config.family else {
            panic!("{} is not an AVR board", config.name);
        };
        let sim = Self {
            config: *config,
            chip,
            mem: core::array::from_fn(|_| Cell::new(0)),
            levels: core::array::from_fn(|_| Cell::new(0)),
            ext_low: core::array::from_fn(|_| Cell::new(0)),
            bus_low: Cell::new(0),
            wire_low: Cell::new(0),
            timer2_residue: Cell::new(0),
            spi_rx: RefCell::new(Deque::new()),
            spi_tx: RefCell::new(Vec::new()),
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
        update(&self.bus_low, |v| if low { v | mask } else { v & !mask });
        self.settle();
    }

    /// Electrical level of a bus wire (`true` = high)
    pub fn wire(&self, line: Line) -> bool {
        self.wire_low.get() & line.mask() == 0
    }

    /// Pull a non-bus pin low from outside (`true`) or release it
    pub fn pull_pin(&self, port: u8, pin: u8, low: bool) {
        let mask = 1u8 << pin;
        update(&self.ext_low[port as usize], |v| if low { v | mask } else { v & !mask });
        self.settle();
    }

    /// Level of a pin as seen in PINx
    pub fn pin(&self, port: u8, pin: u8) -> bool {
        self.levels[port as usize].get() & (1 << pin) != 0
    }

    /// Register content without read side effects
    pub fn peek(&self, reg: AvrReg) -> u8 {
        self.mem[reg.addr() as usize].get()
    }

    /// Let `usecs` microseconds of CPU time pass
    pub fn advance_us(&self, usecs: u32) {
        self.advance_cycles(usecs.saturating_mul(self.config.cpu_hz / 1_000_000));
    }

    /// Let `cycles` CPU clocks pass
    pub fn advance_cycles(&self, cycles: u32) {
        let prescale = match self.peek(AvrReg::Tccr2b) & 0x07 {
            0 => return,
            1 => 1,
            2 => 8,
            3 => 32,
            4 => 64,
            5 => 128,
            6 => 256,
            _ => 1024,
        };
        let total = self.timer2_residue.get() + cycles;
        self.timer2_residue.set(total % prescale);
        let count = self.peek(AvrReg::Tcnt2) as u32 + total / prescale;
        if count > 0xff {
            update(self.raw(AvrReg::Tifr2), |v| v | bits::TOV2);
        }
        self.raw(AvrReg::Tcnt2).set(count as u8);
    }

    /// Queue bytes the SPI slave answers with
    pub fn queue_spi_rx(&self, bytes: &[u8]) {
        let mut rx = self.spi_rx.borrow_mut();
        for &byte in bytes {
            let _ = rx.push_back(byte);
        }
    }

    /// Bytes shifted out over SPI so far
    pub fn spi_sent(&self) -> Vec<u8, 256> {
        self.spi_tx.borrow().clone()
    }

    /// Register writes so far, oldest first
    pub fn writes(&self) -> Vec<(AvrReg, u8), WRITE_LOG> {
        self.writes.borrow().clone()
    }

    pub fn clear_writes(&self) {
        self.writes.borrow_mut().clear();
    }

    fn raw(&self, reg: AvrReg) -> &Cell<u8> {
        &self.mem[reg.addr() as usize]
    }

    fn compute_levels(&self) -> [u8; PORTS] {
        let mut levels = [0u8; PORTS];
        for (p, level) in levels.iter_mut().enumerate() {
            let ddr = self.peek(AvrReg::Ddr(p as u8));
            let port = self.peek(AvrReg::Port(p as u8));
            *level = (ddr & port) | (!ddr & !self.ext_low[p].get());
        }

        let lines = self.config.iec.lines();
        let mut wire_low = self.bus_low.get();
        for line in Line::ALL {
            let cfg = lines[line.index()];
            let pulling = match cfg.output {
                LineOutput::OpenCollector => {
                    let mask = cfg.input.mask() as u8;
                    let ddr = self.peek(AvrReg::Ddr(cfg.input.port));
                    let port = self.peek(AvrReg::Port(cfg.input.port));
                    ddr & mask != 0 && port & mask == 0
                }
                LineOutput::Pin(out) => {
                    let mask = out.mask() as u8;
                    let driven = self.peek(AvrReg::Ddr(out.port)) & mask != 0;
                    let high = levels[out.port as usize] & mask != 0;
                    driven && high == out.inverted
                }
                LineOutput::Match { .. } => false,
            };
            if pulling {
                wire_low |= line.mask();
            }
        }
        self.wire_low.set(wire_low);

        for line in Line::ALL {
            let input = lines[line.index()].input;
            let mask = input.mask() as u8;
            let high = (wire_low & line.mask() == 0) != input.inverted;
            let level = &mut levels[input.port as usize];
            *level = if high { *level | mask } else { *level & !mask };
        }
        levels
    }

    fn group_port(&self, group: u8) -> Option<u8> {
        (0..PORTS as u8).find(|&p| self.chip.pin_change_group(p) == Some(group))
    }

    /// Recompute pin levels and latch the edge flags of changed pins
    fn settle(&self) {
        let levels = self.compute_levels();
        let mut changed = [0u8; PORTS];
        for (p, level) in levels.iter().enumerate() {
            changed[p] = self.levels[p].get() ^ level;
            self.levels[p].set(*level);
        }

        for n in 0..4 {
            if let Some((port, pin)) = self.chip.ext_int_pin(n) {
                if changed[port as usize] & (1 << pin) != 0 {
                    update(self.raw(AvrReg::Eifr), |v| v | (1 << n));
                }
            }
        }
        for group in 0..self.chip.pin_change_groups() {
            if let Some(port) = self.group_port(group) {
                if changed[port as usize] & self.peek(AvrReg::Pcmsk(group)) != 0 {
                    update(self.raw(AvrReg::Pcifr), |v| v | (1 << group));
                }
            }
        }
    }
}

impl AvrIo for SimAvr {
    fn read(&self, reg: AvrReg) -> u8 {
        match reg {
            AvrReg::Pin(p) => self.levels[p as usize].get(),
            AvrReg::Spdr => {
                update(self.raw(AvrReg::Spsr), |v| v & !bits::SPIF);
                self.peek(reg)
            }
            _ => self.peek(reg),
        }
    }

    fn write(&self, reg: AvrReg, value: u8) {
        let _ = self.writes.borrow_mut().push((reg, value));
        match reg {
            AvrReg::Tifr1 | AvrReg::Tifr2 | AvrReg::Eifr | AvrReg::Pcifr => {
                update(self.raw(reg), |v| v & !value);
            }
            AvrReg::Spdr => {
                let _ = self.spi_tx.borrow_mut().push(value);
                let rx = self.spi_rx.borrow_mut().pop_front().unwrap_or(0xff);
                self.raw(reg).set(rx);
                update(self.raw(AvrReg::Spsr), |v| v | bits::SPIF);
            }
            _ => self.raw(reg).set(value),
        }
        self.settle();
    }
}

fn update(cell: &Cell<u8>, f: impl FnOnce(u8) -> u8) {
    cell.set(f(cell.get()));
}
