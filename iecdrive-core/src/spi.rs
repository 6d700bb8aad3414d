//! SPI selector and speed presets

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Device addressed by the SPI transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpiDevice {
    /// No chip select asserted
    #[default]
    None,
    /// First card slot
    Card0,
    /// Second card slot
    Card1,
    /// Every card slot at once
    ///
    /// Only for clocking the power-up sequence into all cards; never used
    /// for data transfer.
    AllCards,
}

impl SpiDevice {
    /// Whether the select line of card slot `slot` is asserted
    pub const fn selects(self, slot: u8) -> bool {
        match self {
            SpiDevice::None => false,
            SpiDevice::Card0 => slot == 0,
            SpiDevice::Card1 => slot == 1,
            SpiDevice::AllCards => true,
        }
    }
}

/// Clock speed preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SpiSpeed {
    /// At most 400 kHz, for card identification
    #[default]
    Slow,
    /// Fastest clock the controller supports
    Fast,
}

impl SpiSpeed {
    /// Upper bound of the clock in Hz
    pub const fn max_hz(self) -> u32 {
        match self {
            SpiSpeed::Slow => 400_000,
            SpiSpeed::Fast => 25_000_000,
        }
    }
}
