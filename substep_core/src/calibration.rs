//! Phase-width measurement.
//!
//! While the shaft turns at a steady moderate speed, the time spent in each
//! raw step is proportional to that step's phase width. `PhaseCalibrator`
//! accumulates those durations per phase over a fixed window of capture time
//! and turns the means into [`PhaseSizes`].

use substep_traits::{CaptureSource, RawSample};

use crate::config::CalibrationCfg;
use crate::error::CalibrationError;
use crate::fixed_point::elapsed_us;
use crate::phases::{PhaseSizes, SUBSTEPS_PER_CYCLE};

/// Accumulated per-phase timing for one measurement window.
#[derive(Debug, Clone)]
pub struct PhaseCalibrator {
    cfg: CalibrationCfg,
    start_us: u32,
    last: RawSample,
    /// Set once a transition has been seen in the current direction run.
    reference: Option<bool>,
    steps: u32,
    durations: [u64; 4],
    counts: [u32; 4],
}

impl PhaseCalibrator {
    pub fn new(first: RawSample, cfg: CalibrationCfg) -> Self {
        Self {
            cfg,
            start_us: first.step_us,
            last: first,
            reference: None,
            steps: 0,
            durations: [0; 4],
            counts: [0; 4],
        }
    }

    /// Capture time covered so far.
    pub fn elapsed_us(&self) -> u32 {
        self.last.step_us.wrapping_sub(self.start_us)
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_us() >= self.cfg.window_us
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// The latest accepted poll, with the time and direction of the latest
    /// transition seen.
    pub fn last_sample(&self) -> RawSample {
        self.last
    }

    /// Account for one poll. Fails as soon as the raw step moves by more than
    /// one between polls.
    pub fn observe(&mut self, sample: RawSample) -> Result<(), CalibrationError> {
        let delta = sample.step.wrapping_sub(self.last.step);
        if delta.unsigned_abs() > 1 {
            return Err(CalibrationError::TooFast { jump: delta });
        }
        if delta != 0 {
            self.steps = self.steps.saturating_add(1);
            let forward = delta > 0;
            if self.reference == Some(forward) {
                let phase = (self.last.step & 3) as usize;
                let dt = elapsed_us(sample.transition_us, self.last.transition_us);
                if dt > 0 {
                    self.durations[phase] += dt as u64;
                    self.counts[phase] += 1;
                    tracing::trace!(phase, dt, "phase duration");
                }
            }
            // A reversal leaves a step through the edge it came in by, which
            // says nothing about that step's width.
            self.reference = Some(forward);
            self.last.transition_us = sample.transition_us;
            self.last.direction = sample.direction;
        }
        self.last.step = sample.step;
        self.last.step_us = sample.step_us;
        Ok(())
    }

    /// Turn the accumulated window into phase sizes.
    pub fn finish(&self) -> Result<PhaseSizes, CalibrationError> {
        let elapsed = self.elapsed_us();
        let too_slow = CalibrationError::TooSlow {
            steps: self.steps,
            elapsed_us: elapsed,
        };
        if u64::from(self.steps) * 1_000_000
            < u64::from(self.cfg.min_step_rate_hz) * u64::from(elapsed)
            || self.counts.contains(&0)
        {
            return Err(too_slow);
        }

        let mut means = [0.0_f64; 4];
        for (mean, (&total, &count)) in means
            .iter_mut()
            .zip(self.durations.iter().zip(self.counts.iter()))
        {
            *mean = total as f64 / f64::from(count);
        }
        let cycle: f64 = means.iter().sum();
        let cycle_units = f64::from(SUBSTEPS_PER_CYCLE);

        let mut offsets = [0_u32; 3];
        let mut cumulative = 0.0;
        for (offset, mean) in offsets.iter_mut().zip(means) {
            cumulative += mean;
            *offset = (cumulative * cycle_units / cycle).round() as u32;
        }

        // Keep every phase at least one unit wide.
        let [mut o1, mut o2, mut o3] = offsets;
        o1 = o1.max(1);
        o2 = o2.max(o1 + 1);
        o3 = o3.max(o2 + 1).min(SUBSTEPS_PER_CYCLE - 1);
        o2 = o2.min(o3 - 1);
        o1 = o1.min(o2 - 1);

        PhaseSizes::from_offsets(o1, o2, o3).ok_or(too_slow)
    }

    /// Keep polling `source` until the window is complete, then finish.
    pub fn run<C: CaptureSource + ?Sized>(
        &mut self,
        source: &mut C,
    ) -> Result<PhaseSizes, CalibrationError> {
        while !self.is_complete() {
            self.observe(source.read_raw_sample())?;
        }
        self.finish()
    }
}

/// Poll `source` for one calibration window and return the measured sizes.
pub fn measure<C: CaptureSource + ?Sized>(
    source: &mut C,
    cfg: CalibrationCfg,
) -> Result<PhaseSizes, CalibrationError> {
    PhaseCalibrator::new(source.read_raw_sample(), cfg).run(source)
}
