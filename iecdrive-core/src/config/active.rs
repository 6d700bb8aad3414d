//! Build-time board selection
//!
//! Exactly one `board-*` feature selects [`ACTIVE`]. Firmware builds for a
//! bare-metal target refuse to compile without one; host builds (tests,
//! tooling) may leave it unset.

const SELECTED: usize = cfg!(feature = "board-larsp") as usize
    + cfg!(feature = "board-shadowolf") as usize
    + cfg!(feature = "board-uiec") as usize
    + cfg!(feature = "board-lpc-devboard") as usize
    + cfg!(feature = "board-lpc-parallel") as usize;

const _: () = assert!(SELECTED <= 1, "more than one board-* feature selected");

#[cfg(all(
    target_os = "none",
    not(any(
        feature = "board-larsp",
        feature = "board-shadowolf",
        feature = "board-uiec",
        feature = "board-lpc-devboard",
        feature = "board-lpc-parallel",
    ))
))]
compile_error!("no board selected: enable exactly one board-* feature of iecdrive-core");

/// Board selected by the `board-*` feature
#[cfg(any(
    feature = "board-larsp",
    feature = "board-shadowolf",
    feature = "board-uiec",
    feature = "board-lpc-devboard",
    feature = "board-lpc-parallel",
))]
pub const ACTIVE: super::Board = if cfg!(feature = "board-larsp") {
    super::Board::Larsp
} else if cfg!(feature = "board-shadowolf") {
    super::Board::Shadowolf
} else if cfg!(feature = "board-uiec") {
    super::Board::Uiec
} else if cfg!(feature = "board-lpc-devboard") {
    super::Board::LpcDevboard
} else {
    super::Board::LpcParallel
};

/// Configuration record of the selected board
#[cfg(any(
    feature = "board-larsp",
    feature = "board-shadowolf",
    feature = "board-uiec",
    feature = "board-lpc-devboard",
    feature = "board-lpc-parallel",
))]
pub const ACTIVE_CONFIG: &super::BoardConfig = ACTIVE.config();
