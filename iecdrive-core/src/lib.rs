//! Board-agnostic core for the iecdrive serial-bus storage device
//!
//! This crate contains everything that does not touch a peripheral register:
//!
//! - CRC-7 and CRC-16/XMODEM folds for card command and block integrity
//! - Wraparound-safe tick arithmetic and the 100 Hz system tick
//! - Bus line, edge and SPI selector types shared by every chip HAL
//! - The closed catalog of supported boards and its build-time validation

#![no_std]
#![deny(unsafe_code)]

pub mod config;
pub mod crc;
pub mod lines;
pub mod spi;
pub mod tick;

pub use config::{Board, BoardConfig, ConfigError};
pub use lines::{BusSnapshot, EdgeLine, EdgeSet, Line, Vector};
pub use spi::{SpiDevice, SpiSpeed};
