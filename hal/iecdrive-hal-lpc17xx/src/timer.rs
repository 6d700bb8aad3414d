//! Timers 0 and 1, shared between bus line outputs and edge captures
//!
//! Each timer carries up to four match outputs and two capture inputs, and
//! the bus lines are spread over both timers as the board record says.
//! [`IecTimers`] owns the two timers and hands out one handle per channel.
//! A handle only ever changes the register bits of its own channel, with
//! read-modify-write inside a critical section, so configuring or toggling
//! one line leaves every sibling channel as it was.

use iecdrive_core::config::LPC_LINE_TIMERS;
use iecdrive_core::ConfigError;

use crate::regs::{bits, irq, LpcIo, LpcReg, TimReg};

/// Prescale register value for a 1 µs timer tick at `pclk_hz`
///
/// Below 1 MHz the timer counts every PCLK cycle.
pub const fn us_prescale(pclk_hz: u32) -> u32 {
    (pclk_hz / 1_000_000).saturating_sub(1)
}

const MATCH_CHANNELS: u8 = 4;
const CAPTURE_CHANNELS: u8 = 2;

/// Owner of the timers carrying bus lines
pub struct IecTimers<'a, IO> {
    io: &'a IO,
    /// Claimed channels, one bit per timer/channel (match 0-3, capture 4-5)
    claimed: [u8; LPC_LINE_TIMERS as usize],
}

impl<'a, IO: LpcIo> IecTimers<'a, IO> {
    pub fn new(io: &'a IO) -> Self {
        Self {
            io,
            claimed: [0; LPC_LINE_TIMERS as usize],
        }
    }

    /// Power both timers and let them run free from zero
    ///
    /// Channel configuration is left to the handles.
    pub fn init(&self) {
        for t in 0..LPC_LINE_TIMERS {
            critical_section::with(|_| {
                self.io.set_bits(LpcReg::Pconp, bits::PCONP_TIMER[t as usize]);
            });
            self.io.write(LpcReg::Timer(t, TimReg::Tcr), bits::TCR_RESET);
            self.io.write(LpcReg::Timer(t, TimReg::Ctcr), 0);
            self.io.write(LpcReg::Timer(t, TimReg::Pr), 0);
            self.io.write(LpcReg::Timer(t, TimReg::Tcr), bits::TCR_ENABLE);
        }
    }

    /// Run `f`, giving back every channel it claimed if it fails
    pub fn claim_all<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ConfigError>,
    ) -> Result<T, ConfigError> {
        let before = self.claimed;
        let result = f(self);
        if result.is_err() {
            self.claimed = before;
        }
        result
    }

    fn claim(&mut self, timer: u8, bit: u8, channel: u8) -> Result<(), ConfigError> {
        let Some(claimed) = self.claimed.get_mut(timer as usize) else {
            return Err(ConfigError::ReservedTimer { timer });
        };
        if *claimed & (1 << bit) != 0 {
            return Err(ConfigError::ChannelConflict { timer, channel });
        }
        *claimed |= 1 << bit;
        Ok(())
    }

    /// Take match channel `channel` of `timer`
    pub fn match_channel(
        &mut self,
        timer: u8,
        channel: u8,
    ) -> Result<MatchChannel<'a, IO>, ConfigError> {
        if channel >= MATCH_CHANNELS {
            return Err(ConfigError::ChannelOutOfRange { timer, channel });
        }
        self.claim(timer, channel, channel)?;
        Ok(MatchChannel {
            io: self.io,
            timer,
            channel,
        })
    }

    /// Take capture channel `channel` of `timer`
    pub fn capture_channel(
        &mut self,
        timer: u8,
        channel: u8,
    ) -> Result<CaptureChannel<'a, IO>, ConfigError> {
        if channel >= CAPTURE_CHANNELS {
            return Err(ConfigError::ChannelOutOfRange { timer, channel });
        }
        self.claim(timer, MATCH_CHANNELS + channel, channel)?;
        Ok(CaptureChannel {
            io: self.io,
            timer,
            channel,
        })
    }
}

/// One match output, its pin level set directly through `EMR`
pub struct MatchChannel<'a, IO> {
    io: &'a IO,
    timer: u8,
    channel: u8,
}

impl<IO: LpcIo> MatchChannel<'_, IO> {
    /// Disable match actions of this channel and set the pin level
    pub fn init(&self, high: bool) {
        let (timer, c) = (self.timer, self.channel);
        critical_section::with(|_| {
            self.io.clear_bits(LpcReg::Timer(timer, TimReg::Mcr), bits::mcr_mask(c));
            self.io.modify(LpcReg::Timer(timer, TimReg::Emr), |v| {
                let v = v & !bits::emr_action(c);
                if high {
                    v | bits::emr_level(c)
                } else {
                    v & !bits::emr_level(c)
                }
            });
        });
    }

    /// Drive the pin high or low
    #[inline(always)]
    pub fn set(&self, high: bool) {
        let reg = LpcReg::Timer(self.timer, TimReg::Emr);
        let mask = bits::emr_level(self.channel);
        critical_section::with(|_| self.io.put_bits(reg, mask, high));
    }

    /// Current pin level
    pub fn get(&self) -> bool {
        self.io.read(LpcReg::Timer(self.timer, TimReg::Emr)) & bits::emr_level(self.channel) != 0
    }
}

/// One capture input, both edges
pub struct CaptureChannel<'a, IO> {
    io: &'a IO,
    timer: u8,
    channel: u8,
}

impl<IO: LpcIo> CaptureChannel<'_, IO> {
    /// Capture on both edges with the interrupt off, and unmask the timer
    /// interrupt in the NVIC
    pub fn init(&self) {
        let (timer, c) = (self.timer, self.channel);
        critical_section::with(|_| {
            self.io.modify(LpcReg::Timer(timer, TimReg::Ccr), |v| {
                (v & !(bits::ccr_both_edges(c) | bits::ccr_irq(c))) | bits::ccr_both_edges(c)
            });
        });
        self.io.write(LpcReg::Timer(timer, TimReg::Ir), bits::ir_capture(c));
        self.io.write(LpcReg::NvicIser0, 1 << irq::TIMER[timer as usize]);
    }

    pub fn timer(&self) -> u8 {
        self.timer
    }

    /// Arm or disarm the capture interrupt
    pub fn set_irq(&self, enable: bool) {
        let (timer, c) = (self.timer, self.channel);
        critical_section::with(|_| {
            if enable {
                // Drop a stale event captured before arming
                self.io.write(LpcReg::Timer(timer, TimReg::Ir), bits::ir_capture(c));
            }
            self.io.put_bits(LpcReg::Timer(timer, TimReg::Ccr), bits::ccr_irq(c), enable);
        });
    }

    pub fn irq_enabled(&self) -> bool {
        self.io.read(LpcReg::Timer(self.timer, TimReg::Ccr)) & bits::ccr_irq(self.channel) != 0
    }

    /// Consume the capture flag; only this channel's flag is cleared
    pub fn take_flag(&self) -> bool {
        let ir = LpcReg::Timer(self.timer, TimReg::Ir);
        let flag = bits::ir_capture(self.channel);
        if self.io.read(ir) & flag == 0 {
            return false;
        }
        self.io.write(ir, flag);
        true
    }

    /// Counter value latched by the last edge
    pub fn captured(&self) -> u32 {
        self.io.read(LpcReg::Timer(self.timer, TimReg::Cr(self.channel)))
    }
}
