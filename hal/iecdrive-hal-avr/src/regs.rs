//! ATmega register access
//!
//! Drivers name registers through [`AvrReg`] and reach them through the
//! [`AvrIo`] trait. [`Mcu`] is the production implementation doing volatile
//! accesses to the data space; the simulator implements the same trait for
//! host tests.
//!
//! Addresses are data-space addresses, identical on the ATmega644 and the
//! ATmega1281 for every register listed here.

/// Memory-mapped register of the ATmega644 / ATmega1281
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvrReg {
    /// PINx of port n (A = 0)
    Pin(u8),
    /// DDRx of port n
    Ddr(u8),
    /// PORTx of port n
    Port(u8),
    Tifr1,
    Tifr2,
    Pcifr,
    Eifr,
    Eimsk,
    Spcr,
    Spsr,
    Spdr,
    Pcicr,
    Eicra,
    /// PCMSKn of pin-change group n
    Pcmsk(u8),
    Timsk1,
    Timsk2,
    Tccr1a,
    Tccr1b,
    Ocr1al,
    Ocr1ah,
    Tccr2a,
    Tccr2b,
    Tcnt2,
}

impl AvrReg {
    /// Data-space address
    pub const fn addr(self) -> u16 {
        match self {
            AvrReg::Pin(n) => 0x20 + 3 * n as u16,
            AvrReg::Ddr(n) => 0x21 + 3 * n as u16,
            AvrReg::Port(n) => 0x22 + 3 * n as u16,
            AvrReg::Tifr1 => 0x36,
            AvrReg::Tifr2 => 0x37,
            AvrReg::Pcifr => 0x3B,
            AvrReg::Eifr => 0x3C,
            AvrReg::Eimsk => 0x3D,
            AvrReg::Spcr => 0x4C,
            AvrReg::Spsr => 0x4D,
            AvrReg::Spdr => 0x4E,
            AvrReg::Pcicr => 0x68,
            AvrReg::Eicra => 0x69,
            AvrReg::Pcmsk(3) => 0x73,
            AvrReg::Pcmsk(n) => 0x6B + n as u16,
            AvrReg::Timsk1 => 0x6F,
            AvrReg::Timsk2 => 0x70,
            AvrReg::Tccr1a => 0x80,
            AvrReg::Tccr1b => 0x81,
            AvrReg::Ocr1al => 0x88,
            AvrReg::Ocr1ah => 0x89,
            AvrReg::Tccr2a => 0xB0,
            AvrReg::Tccr2b => 0xB1,
            AvrReg::Tcnt2 => 0xB2,
        }
    }
}

/// Register bits used by the drivers
pub mod bits {
    /// TIFR2: Timer2 overflow flag
    pub const TOV2: u8 = 1 << 0;
    /// TCCR2B: clk/8
    pub const CS21: u8 = 1 << 1;
    /// TCCR1B: CTC mode on OCR1A
    pub const WGM12: u8 = 1 << 3;
    /// TCCR1B: clk/64
    pub const CS11_CS10: u8 = (1 << 1) | (1 << 0);
    /// TIMSK1: compare A interrupt
    pub const OCIE1A: u8 = 1 << 1;
    /// SPCR
    pub const SPE: u8 = 1 << 6;
    pub const MSTR: u8 = 1 << 4;
    pub const SPR1: u8 = 1 << 1;
    pub const SPR0: u8 = 1 << 0;
    /// SPSR
    pub const SPIF: u8 = 1 << 7;
    pub const SPI2X: u8 = 1 << 0;
}

/// Register access
///
/// Accesses take `&self`: peripheral registers are shared between the main
/// path and interrupt handlers, and callers guard read-modify-write
/// sequences with a critical section.
pub trait AvrIo {
    fn read(&self, reg: AvrReg) -> u8;

    fn write(&self, reg: AvrReg, value: u8);

    #[inline(always)]
    fn modify<F: FnOnce(u8) -> u8>(&self, reg: AvrReg, f: F) {
        self.write(reg, f(self.read(reg)));
    }

    #[inline(always)]
    fn set_bits(&self, reg: AvrReg, mask: u8) {
        self.modify(reg, |v| v | mask);
    }

    #[inline(always)]
    fn clear_bits(&self, reg: AvrReg, mask: u8) {
        self.modify(reg, |v| v & !mask);
    }

    /// Set or clear `mask` depending on `set`
    #[inline(always)]
    fn put_bits(&self, reg: AvrReg, mask: u8, set: bool) {
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
    /// Must only be called when running on an ATmega644 or ATmega1281, and
    /// the drivers built on the returned value must be the only code
    /// touching the registers they use.
    #[allow(unsafe_code)]
    pub const unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

#[allow(unsafe_code)]
impl AvrIo for Mcu {
    #[inline(always)]
    fn read(&self, reg: AvrReg) -> u8 {
        // SAFETY: `reg` names a register present on every supported part
        unsafe { core::ptr::read_volatile(reg.addr() as usize as *const u8) }
    }

    #[inline(always)]
    fn write(&self, reg: AvrReg, value: u8) {
        // SAFETY: as above
        unsafe { core::ptr::write_volatile(reg.addr() as usize as *mut u8, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_addresses() {
        assert_eq!(AvrReg::Pin(0).addr(), 0x20);
        assert_eq!(AvrReg::Ddr(1).addr(), 0x24);
        assert_eq!(AvrReg::Port(3).addr(), 0x2B);
        assert_eq!(AvrReg::Port(6).addr(), 0x34);
    }

    #[test]
    fn test_pin_change_masks() {
        assert_eq!(AvrReg::Pcmsk(0).addr(), 0x6B);
        assert_eq!(AvrReg::Pcmsk(2).addr(), 0x6D);
        assert_eq!(AvrReg::Pcmsk(3).addr(), 0x73);
    }
}
