//! `From` implementations bridging `substep_config` types to `substep_core` types.

use substep_traits::{Direction, RawSample};

use crate::config::{CalibrationCfg, CountMode, EstimatorCfg, PollCfg, UnitsCfg};
use crate::error::EncoderError;
use crate::mocks::ScriptedCapture;
use crate::servo::ServoRange;

// ── EstimatorCfg ─────────────────────────────────────────────────────────────

impl From<&substep_config::EstimatorCfg> for EstimatorCfg {
    fn from(c: &substep_config::EstimatorCfg) -> Self {
        Self {
            idle_stop_samples: c.idle_stop_samples,
            idle_stop_us: c.idle_stop_us,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&substep_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &substep_config::CalibrationCfg) -> Self {
        Self {
            window_us: c.window_ms.saturating_mul(1000),
            min_step_rate_hz: c.min_step_rate_hz,
        }
    }
}

// ── UnitsCfg ─────────────────────────────────────────────────────────────────

impl From<substep_config::CountMode> for CountMode {
    fn from(m: substep_config::CountMode) -> Self {
        match m {
            substep_config::CountMode::X1 => CountMode::X1,
            substep_config::CountMode::X2 => CountMode::X2,
            substep_config::CountMode::X4 => CountMode::X4,
        }
    }
}

impl From<&substep_config::EncoderCfg> for UnitsCfg {
    fn from(c: &substep_config::EncoderCfg) -> Self {
        Self {
            resolution: c.resolution,
            count_mode: c.count_mode.into(),
            conversion_factor: c.conversion_factor,
            reversed: c.reversed,
        }
    }
}

// ── ServoRange ───────────────────────────────────────────────────────────────

impl TryFrom<&substep_config::ServoCfg> for ServoRange {
    type Error = EncoderError;

    fn try_from(c: &substep_config::ServoCfg) -> Result<Self, Self::Error> {
        ServoRange::new(c.min_us, c.max_us)
    }
}

// ── PollCfg ──────────────────────────────────────────────────────────────────

impl From<&substep_config::PollCfg> for PollCfg {
    fn from(c: &substep_config::PollCfg) -> Self {
        Self {
            rate_hz: c.rate_hz,
            report_ms: c.report_ms,
        }
    }
}

// ── Traces ───────────────────────────────────────────────────────────────────

/// One recorded poll as the capture source would have returned it.
pub fn sample_from_row(r: &substep_config::TraceRow) -> RawSample {
    RawSample {
        step: r.step,
        step_us: r.step_us,
        transition_us: r.transition_us,
        direction: if r.forward {
            Direction::Forward
        } else {
            Direction::Reverse
        },
    }
}

impl From<&[substep_config::TraceRow]> for ScriptedCapture {
    fn from(rows: &[substep_config::TraceRow]) -> Self {
        ScriptedCapture::new(rows.iter().map(sample_from_row))
    }
}
