//! AVR ATmega HAL for iecdrive
//!
//! Implements the [`iecdrive_hal`] traits for the ATmega644 and ATmega1281.
//! Every driver reaches the chip through the [`regs::AvrIo`] trait, so the
//! same code runs against [`regs::Mcu`] on the device and against the
//! simulated register file in host tests.
//!
//! # Resources
//!
//! - Timer2 (8-bit, clk/8): the non-blocking bus timeout
//! - Timer1 (16-bit, CTC): the 100 Hz system tick
//! - INTn / PCINTn: ATN and CLOCK transition interrupts
//! - SPI: card transport, chip selects on plain port pins

#![no_std]
#![deny(unsafe_code)]

pub mod iec;
pub mod parallel;
pub mod regs;
pub mod spi;
pub mod tick;
pub mod timeout;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use iec::{AvrEdgeIrq, AvrIecBus};
pub use parallel::AvrParallel;
pub use regs::{AvrIo, AvrReg, Mcu};
pub use spi::{AvrChipSelect, AvrSpi};
pub use tick::TickTimer;
pub use timeout::{HwTimeout, Preload};
