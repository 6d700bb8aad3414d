//! LPC17xx register access
//!
//! Registers are named by peripheral instance and register; [`LpcReg::addr`]
//! resolves them to their 32-bit memory-mapped address. [`Mcu`] performs the
//! volatile accesses on the device, the simulator implements [`LpcIo`] for
//! host tests.

/// Timer/counter registers (TIMER0..3)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimReg {
    /// Interrupt flags, write one to clear
    Ir,
    /// Counter enable (bit 0) and reset (bit 1)
    Tcr,
    /// Timer counter
    Tc,
    /// Prescale register
    Pr,
    /// Prescale counter
    Pc,
    /// Match control, three bits per channel
    Mcr,
    /// Match register n
    Mr(u8),
    /// Capture control, three bits per channel
    Ccr,
    /// Capture register n
    Cr(u8),
    /// External match: pin levels and match actions
    Emr,
    /// Count control
    Ctcr,
}

impl TimReg {
    const fn offset(self) -> u32 {
        match self {
            TimReg::Ir => 0x00,
            TimReg::Tcr => 0x04,
            TimReg::Tc => 0x08,
            TimReg::Pr => 0x0C,
            TimReg::Pc => 0x10,
            TimReg::Mcr => 0x14,
            TimReg::Mr(n) => 0x18 + 4 * n as u32,
            TimReg::Ccr => 0x28,
            TimReg::Cr(n) => 0x2C + 4 * n as u32,
            TimReg::Emr => 0x3C,
            TimReg::Ctcr => 0x70,
        }
    }
}

/// Fast GPIO registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioReg {
    Dir,
    Mask,
    Pin,
    Set,
    Clr,
}

/// GPIO interrupt registers of port 0 or 2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioIntReg {
    StatR,
    StatF,
    Clr,
    EnR,
    EnF,
}

/// SSP registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SspReg {
    Cr0,
    Cr1,
    Dr,
    Sr,
    Cpsr,
}

/// SysTick registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysTickReg {
    Ctrl,
    Load,
    Val,
}

/// Memory-mapped register of the LPC175x/6x
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LpcReg {
    Timer(u8, TimReg),
    Gpio(u8, GpioReg),
    /// Overall GPIO interrupt status (bit 0: port 0, bit 2: port 2)
    IntStatus,
    GpioInt(u8, GpioIntReg),
    Ssp(u8, SspReg),
    /// Open-drain mode of port n
    PinModeOd(u8),
    /// Peripheral power control
    Pconp,
    /// NVIC interrupt set-enable, write one to enable
    NvicIser0,
    SysTick(SysTickReg),
}

const TIMER_BASE: [u32; 4] = [0x4000_4000, 0x4000_8000, 0x4009_0000, 0x4009_4000];
const SSP_BASE: [u32; 2] = [0x4008_8000, 0x4003_0000];

impl LpcReg {
    pub const fn addr(self) -> u32 {
        match self {
            LpcReg::Timer(t, reg) => TIMER_BASE[t as usize] + reg.offset(),
            LpcReg::Gpio(port, reg) => {
                let base = 0x2009_C000 + 0x20 * port as u32;
                base + match reg {
                    GpioReg::Dir => 0x00,
                    GpioReg::Mask => 0x10,
                    GpioReg::Pin => 0x14,
                    GpioReg::Set => 0x18,
                    GpioReg::Clr => 0x1C,
                }
            }
            LpcReg::IntStatus => 0x4002_8080,
            LpcReg::GpioInt(port, reg) => {
                // IO0 registers at 0x84, IO2 at 0xA4
                let base = 0x4002_8084 + 0x10 * port as u32;
                base + match reg {
                    GpioIntReg::StatR => 0x00,
                    GpioIntReg::StatF => 0x04,
                    GpioIntReg::Clr => 0x08,
                    GpioIntReg::EnR => 0x0C,
                    GpioIntReg::EnF => 0x10,
                }
            }
            LpcReg::Ssp(n, reg) => {
                SSP_BASE[n as usize]
                    + match reg {
                        SspReg::Cr0 => 0x00,
                        SspReg::Cr1 => 0x04,
                        SspReg::Dr => 0x08,
                        SspReg::Sr => 0x0C,
                        SspReg::Cpsr => 0x10,
                    }
            }
            LpcReg::PinModeOd(port) => 0x4002_C068 + 4 * port as u32,
            LpcReg::Pconp => 0x400F_C0C4,
            LpcReg::NvicIser0 => 0xE000_E100,
            LpcReg::SysTick(reg) => match reg {
                SysTickReg::Ctrl => 0xE000_E010,
                SysTickReg::Load => 0xE000_E014,
                SysTickReg::Val => 0xE000_E018,
            },
        }
    }
}

/// Register bits used by the drivers
pub mod bits {
    /// TCR
    pub const TCR_ENABLE: u32 = 1 << 0;
    pub const TCR_RESET: u32 = 1 << 1;

    /// MCR: stop on match of channel `c`
    pub const fn mcr_stop(c: u8) -> u32 {
        1 << (3 * c + 2)
    }

    /// MCR: all three bits of channel `c`
    pub const fn mcr_mask(c: u8) -> u32 {
        0b111 << (3 * c)
    }

    /// CCR: capture on rising and falling edge of channel `c`
    pub const fn ccr_both_edges(c: u8) -> u32 {
        0b011 << (3 * c)
    }

    /// CCR: interrupt on capture of channel `c`
    pub const fn ccr_irq(c: u8) -> u32 {
        1 << (3 * c + 2)
    }

    /// IR: capture flag of channel `c`
    pub const fn ir_capture(c: u8) -> u32 {
        1 << (4 + c)
    }

    /// EMR: pin level of match channel `c`
    pub const fn emr_level(c: u8) -> u32 {
        1 << c
    }

    /// EMR: match action field of channel `c`
    pub const fn emr_action(c: u8) -> u32 {
        0b11 << (4 + 2 * c)
    }

    /// SSP SR
    pub const SR_TNF: u32 = 1 << 1;
    pub const SR_RNE: u32 = 1 << 2;
    pub const SR_BSY: u32 = 1 << 4;

    /// SSP CR0: 8-bit frames, SPI format, mode 0
    pub const CR0_SPI8: u32 = 0x07;
    /// SSP CR1: enable
    pub const CR1_SSE: u32 = 1 << 1;

    /// PCONP bits
    pub const PCONP_TIMER: [u32; 4] = [1 << 1, 1 << 2, 1 << 22, 1 << 23];
    pub const PCONP_SSP: [u32; 2] = [1 << 21, 1 << 10];

    /// SysTick CTRL: enable, interrupt, core clock
    pub const SYST_ENABLE: u32 = 1 << 0;
    pub const SYST_TICKINT: u32 = 1 << 1;
    pub const SYST_CLKSOURCE: u32 = 1 << 2;
}

/// NVIC interrupt numbers
pub mod irq {
    pub const TIMER: [u8; 4] = [1, 2, 3, 4];
    /// Shared with the GPIO interrupts
    pub const EINT3: u8 = 21;
}

/// Register access, see the AVR counterpart for the sharing rules
pub trait LpcIo {
    fn read(&self, reg: LpcReg) -> u32;

    fn write(&self, reg: LpcReg, value: u32);

    #[inline(always)]
    fn modify<F: FnOnce(u32) -> u32>(&self, reg: LpcReg, f: F) {
        self.write(reg, f(self.read(reg)));
    }

    #[inline(always)]
    fn set_bits(&self, reg: LpcReg, mask: u32) {
        self.modify(reg, |v| v | mask);
    }

    #[inline(always)]
    fn clear_bits(&self, reg: LpcReg, mask: u32) {
        self.modify(reg, |v| v & !mask);
    }

    #[inline(always)]
    fn put_bits(&self, reg: LpcReg, mask: u32, set: bool) {
        if set {
            self.set_bits(reg, mask);
        } else {
            self.clear_bits(reg, mask);
        }
    }
}

/// The microcontroller's own register file
pub struct Mcu {
    _private: (),
}

impl Mcu {
    /// Access the register file
    ///
    /// # Safety
    ///
    /// Must only be called on an LPC175x/6x, and the drivers built on the
    /// returned value must be the only code touching their registers.
    #[allow(unsafe_code)]
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

#[allow(unsafe_code)]
impl LpcIo for Mcu {
    #[inline(always)]
    fn read(&self, reg: LpcReg) -> u32 {
        // SAFETY: `reg` resolves to a word-aligned peripheral register
        unsafe { core::ptr::read_volatile(reg.addr() as usize as *const u32) }
    }

    #[inline(always)]
    fn write(&self, reg: LpcReg, value: u32) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile(reg.addr() as usize as *mut u32, value) }
    }
}
