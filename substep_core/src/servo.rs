//! Hobby servo positioning: angle to pulse width over a fixed refresh period.

use substep_traits::PulseOutput;

use crate::error::{EncoderError, Result};
use crate::hw_error::map_hw_error;

pub const MIN_PULSE_US: u32 = 544;
pub const MAX_PULSE_US: u32 = 2400;
pub const DEFAULT_PULSE_US: u32 = 1500;
/// Pulse repetition period.
pub const REFRESH_US: u32 = 20_000;
pub const MAX_ANGLE: i32 = 180;
/// `write` values from here up are pulse widths, below are degrees.
pub const PULSE_INPUT_FROM: i32 = 200;

/// Pulse widths for 0 and 180 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoRange {
    min_us: u32,
    max_us: u32,
}

impl Default for ServoRange {
    fn default() -> Self {
        Self {
            min_us: MIN_PULSE_US,
            max_us: MAX_PULSE_US,
        }
    }
}

impl ServoRange {
    pub fn new(min_us: u32, max_us: u32) -> std::result::Result<Self, EncoderError> {
        if min_us == 0 || min_us >= max_us || max_us >= REFRESH_US {
            return Err(EncoderError::Config(format!(
                "servo pulse range {min_us}..{max_us} us must be increasing and inside the {REFRESH_US} us period"
            )));
        }
        Ok(Self { min_us, max_us })
    }

    pub fn min_us(&self) -> u32 {
        self.min_us
    }

    pub fn max_us(&self) -> u32 {
        self.max_us
    }

    pub fn clamp_us(&self, us: u32) -> u32 {
        us.clamp(self.min_us, self.max_us)
    }

    /// Linear map of `angle` (clamped to 0..=180 degrees), truncating.
    pub fn angle_to_us(&self, angle: i32) -> u32 {
        let angle = angle.clamp(0, MAX_ANGLE) as u32;
        self.min_us + angle * (self.max_us - self.min_us) / MAX_ANGLE as u32
    }

    /// Nearest angle for a pulse width (clamped to the range first).
    pub fn us_to_angle(&self, us: u32) -> i32 {
        let span = self.max_us - self.min_us;
        let above = self.clamp_us(us) - self.min_us;
        ((above * MAX_ANGLE as u32 + span / 2) / span) as i32
    }
}

/// A servo on one pulse output. Detached until [`attach`](Self::attach).
pub struct Servo<P: PulseOutput> {
    out: P,
    range: ServoRange,
    pulse_us: u32,
    attached: bool,
}

impl<P: PulseOutput> Servo<P> {
    pub fn new(out: P) -> Self {
        Self {
            out,
            range: ServoRange::default(),
            pulse_us: DEFAULT_PULSE_US,
            attached: false,
        }
    }

    /// Start pulsing with the last written width, clamped into `range`.
    pub fn attach(&mut self, range: ServoRange) -> Result<()> {
        self.range = range;
        self.pulse_us = range.clamp_us(self.pulse_us);
        self.attached = true;
        tracing::debug!(min_us = range.min_us, max_us = range.max_us, "servo attached");
        self.apply()
    }

    pub fn detach(&mut self) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        self.attached = false;
        self.out
            .release()
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
    }

    /// Degrees below 200, pulse width in microseconds from 200 up.
    pub fn write(&mut self, value: i32) -> Result<()> {
        if value < PULSE_INPUT_FROM {
            self.write_us(self.range.angle_to_us(value))
        } else {
            self.write_us(value as u32)
        }
    }

    pub fn write_us(&mut self, us: u32) -> Result<()> {
        self.pulse_us = self.range.clamp_us(us);
        tracing::trace!(pulse_us = self.pulse_us, "servo pulse set");
        self.apply()
    }

    fn apply(&mut self) -> Result<()> {
        if !self.attached {
            return Ok(());
        }
        self.out
            .set_pulse(REFRESH_US, self.pulse_us)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
    }

    /// Angle of the last written pulse.
    pub fn read(&self) -> i32 {
        self.range.us_to_angle(self.pulse_us)
    }

    pub fn read_us(&self) -> u32 {
        self.pulse_us
    }

    pub fn attached(&self) -> bool {
        self.attached
    }

    pub fn range(&self) -> ServoRange {
        self.range
    }
}

impl<P: PulseOutput> Drop for Servo<P> {
    fn drop(&mut self) {
        if self.attached {
            if let Err(e) = self.out.release() {
                tracing::warn!(error = %e, "failed to release servo on drop");
            }
        }
    }
}
