//! iecdrive Hardware Abstraction Layer
//!
//! This crate defines the behavioral contract every chip HAL implements, so
//! the bus protocol layer above is written once for both chip families.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Bus protocol / storage layers          │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  iecdrive-hal (this crate - traits)     │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ iecdrive-hal- │       │ iecdrive-hal- │
//! │      avr      │       │    lpc17xx    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`lines::BusLines`] - Bus line sampling and driving
//! - [`lines::EdgeIrq`] - Per-line transition interrupts
//! - [`timer::Timeout`] - Non-blocking hardware timeout
//! - [`spi::SpiController`], [`spi::ChipSelect`] - SPI seams, combined by
//!   the generic [`spi::SpiTransport`]
//! - [`parallel::ParallelPort`] - Handshake parallel port
//!
//! Blocking delays use [`embedded_hal::delay::DelayNs`].

#![no_std]
#![deny(unsafe_code)]

pub mod lines;
pub mod parallel;
pub mod spi;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use lines::{BusLines, EdgeIrq};
pub use parallel::{Direction, HandshakeFlag, ParallelPort};
pub use spi::{ChipSelect, SpiController, SpiTransport};
pub use timer::Timeout;

pub use iecdrive_core::{BusSnapshot, EdgeLine, EdgeSet, Line, SpiDevice, SpiSpeed, Vector};
