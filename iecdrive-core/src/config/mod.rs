//! Board configuration
//!
//! One record type describes every supported board; the catalog holds one
//! validated `const` record per board and a cargo feature picks the active
//! one at build time.

pub mod active;
pub mod board;
pub mod hardware;

pub use board::*;
pub use hardware::*;
