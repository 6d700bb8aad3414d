//! NXP LPC17xx HAL for iecdrive
//!
//! Implements the [`iecdrive_hal`] traits for the LPC1768/LPC1769. Drivers
//! reach the chip through [`regs::LpcIo`]; [`regs::Mcu`] is the device
//! implementation and `sim::SimLpc` the host-test one.
//!
//! # Resources
//!
//! - Timers 0/1: bus line outputs (match) and ATN/CLOCK captures, shared
//!   channel by channel through [`timer::IecTimers`]
//! - Timer 2: the non-blocking bus timeout (stop on match)
//! - Timer 3: free-running microsecond delays
//! - SysTick: the 100 Hz system tick
//! - SSP0/SSP1: card transport
//! - GPIO interrupt (EINT3): parallel handshake
//!
//! Pin function selection (`PINSEL`) is part of board bring-up and is
//! expected to be done before any driver here is initialised.

#![no_std]
#![deny(unsafe_code)]

pub mod delay;
pub mod iec;
pub mod parallel;
pub mod regs;
pub mod spi;
pub mod tick;
pub mod timeout;
pub mod timer;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use delay::Delay;
pub use iec::{LpcEdgeIrq, LpcIecBus};
pub use parallel::LpcParallel;
pub use regs::{LpcIo, LpcReg, Mcu};
pub use spi::{LpcChipSelect, LpcSsp};
pub use tick::TickTimer;
pub use timeout::HwTimeout;
pub use timer::{CaptureChannel, IecTimers, MatchChannel};
