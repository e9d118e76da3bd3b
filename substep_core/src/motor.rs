//! DC motor effort driver (direction pin + 8-bit speed output).

use substep_traits::MotorOutput;

use crate::error::Result;
use crate::hw_error::map_hw_error;

/// Map a signed effort in `[-1, 1]` to a direction flag and 8-bit duty.
///
/// Out-of-range efforts are clamped and NaN is treated as zero. `inverted`
/// flips the direction for motors wired the other way round.
#[inline]
pub fn effort_to_command(effort: f64, inverted: bool) -> (bool, u8) {
    let e = if effort.is_nan() {
        0.0
    } else {
        effort.clamp(-1.0, 1.0)
    };
    let reverse = (e < 0.0) != inverted;
    let duty = (e.abs() * 255.0).round() as u8;
    (reverse, duty)
}

pub struct MotorDriver<M: MotorOutput> {
    out: M,
    inverted: bool,
    effort: f64,
}

impl<M: MotorOutput> MotorDriver<M> {
    pub fn new(out: M, inverted: bool) -> Self {
        Self {
            out,
            inverted,
            effort: 0.0,
        }
    }

    /// Drive the motor at `effort`; positive is forward.
    pub fn set_effort(&mut self, effort: f64) -> Result<()> {
        let (reverse, duty) = effort_to_command(effort, self.inverted);
        self.out
            .set_direction(reverse)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        self.out
            .set_duty(duty)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))?;
        self.effort = if effort.is_nan() { 0.0 } else { effort.clamp(-1.0, 1.0) };
        tracing::trace!(effort = self.effort, reverse, duty, "motor effort set");
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.set_effort(0.0)
    }

    /// Last effort applied (after clamping).
    pub fn effort(&self) -> f64 {
        self.effort
    }

    pub fn output(&self) -> &M {
        &self.out
    }
}

impl<M: MotorOutput> Drop for MotorDriver<M> {
    fn drop(&mut self) {
        if self.effort != 0.0 {
            if let Err(e) = self.out.set_duty(0) {
                tracing::warn!(error = %e, "failed to stop motor on drop");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_stop() {
        assert_eq!(effort_to_command(f64::NAN, false), (false, 0));
        assert_eq!(effort_to_command(f64::NAN, true), (true, 0));
    }
}
