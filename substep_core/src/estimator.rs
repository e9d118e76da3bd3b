//! Position/speed estimation from raw quadrature samples.
//!
//! The capture hardware reports, per poll, the current raw step, the poll time
//! and the time of the last transition. A raw step alone only says the shaft
//! is somewhere inside `[low, high)` of that step; the estimator combines
//! transition timestamps with those bounds to interpolate a substep position
//! (1/64 of a raw step) and a speed that stays consistent with both.
//!
//! All positions are wrapping `i32` substeps and all times wrapping `u32`
//! microseconds, so neither counter overflow nor clock wraparound panics.

use substep_traits::RawSample;

use crate::config::EstimatorCfg;
use crate::fixed_point::{SpeedQ20, elapsed_us, wrapping_diff};
use crate::phases::{PhaseSizes, PhaseTable, SUBSTEPS_PER_STEP};

/// Persistent estimator state for one capture channel.
#[derive(Debug, Clone)]
pub struct Estimator {
    cfg: EstimatorCfg,
    table: PhaseTable,
    sizes: PhaseSizes,

    raw_step: i32,
    /// Current position in substeps.
    position: i32,
    /// Position reported as zero.
    origin: i32,
    /// Raw step reported as count zero.
    step_origin: i32,
    /// Current speed in substeps per second.
    speed: i32,
    speed_q20: SpeedQ20,
    stopped: bool,
    /// Direction of the last transition.
    forward: bool,

    prev_trans_pos: i32,
    prev_trans_us: u32,
    /// `prev_trans_*` describe a transition actually seen, not the start.
    prev_trans_seen: bool,
    prev_step_us: u32,
    prev_low: i32,
    prev_high: i32,
    idle_stop_sample_count: u32,
    missed_steps: u32,
}

impl Estimator {
    /// Start from the first sample of a freshly bound channel.
    ///
    /// The encoder starts out stopped, positioned in the middle of its current
    /// step, and that position is the origin.
    pub fn new(initial: RawSample, cfg: EstimatorCfg, sizes: PhaseSizes) -> Self {
        let table = PhaseTable::from(sizes);
        let low = table.step_start(initial.step);
        let high = table.step_start(initial.step.wrapping_add(1));
        let position = low.wrapping_add(SUBSTEPS_PER_STEP / 2);
        Self {
            cfg,
            table,
            sizes,
            raw_step: initial.step,
            position,
            origin: position,
            step_origin: initial.step,
            speed: 0,
            speed_q20: SpeedQ20::ZERO,
            stopped: true,
            forward: initial.direction.is_forward(),
            prev_trans_pos: position,
            prev_trans_us: initial.transition_us,
            prev_trans_seen: false,
            prev_step_us: initial.step_us,
            prev_low: low,
            prev_high: high,
            idle_stop_sample_count: 0,
            missed_steps: 0,
        }
    }

    /// Fold one poll into the estimate.
    pub fn ingest(&mut self, sample: RawSample) {
        let step = sample.step;
        let step_us = sample.step_us;
        let low = self.table.step_start(step);
        let high = self.table.step_start(step.wrapping_add(1));
        let delta = step.wrapping_sub(self.raw_step);

        if delta == 0 {
            self.idle_stop_sample_count = self.idle_stop_sample_count.saturating_add(1);
        } else {
            self.idle_stop_sample_count = 0;
        }

        if !self.stopped
            && self.idle_stop_sample_count >= self.cfg.idle_stop_samples
            && step_us.wrapping_sub(self.prev_trans_us) >= self.cfg.idle_stop_us
        {
            self.speed = 0;
            self.speed_q20 = SpeedQ20::ZERO;
            self.stopped = true;
            tracing::debug!(step, idle_polls = self.idle_stop_sample_count, "encoder stopped");
        }

        if delta != 0 {
            if delta.unsigned_abs() > 1 {
                self.missed_steps = self.missed_steps.saturating_add(delta.unsigned_abs() - 1);
                tracing::debug!(step, delta, "raw step skipped between polls");
            }

            let transition_pos = if sample.direction.is_forward() {
                low
            } else {
                high
            };

            // Leaving a stop, the previous transition still gives a slope
            // as long as it is a real one and not further back than the
            // wrapping clock can express.
            let since = elapsed_us(sample.transition_us, self.prev_trans_us);
            if !self.stopped || (self.prev_trans_seen && since > 0) {
                self.speed_q20 =
                    SpeedQ20::from_slope(wrapping_diff(transition_pos, self.prev_trans_pos), since);
            }

            self.stopped = false;
            self.forward = sample.direction.is_forward();
            self.prev_trans_pos = transition_pos;
            self.prev_trans_us = sample.transition_us;
            self.prev_trans_seen = true;
        }

        if !self.stopped {
            self.refine(step_us, low, high, delta == 0);
        }

        self.prev_low = low;
        self.prev_high = high;
        self.raw_step = step;
        self.prev_step_us = step_us;
    }

    /// Bound the speed by the current step limits, then extrapolate position.
    fn refine(&mut self, step_us: u32, low: i32, high: i32, same_step: bool) {
        // Slopes to the step boundaries give the fastest and slowest speeds
        // consistent with the samples. Use whichever interval is longer: the
        // previous sample to the transition, or the transition to now.
        let before = elapsed_us(self.prev_trans_us, self.prev_step_us);
        let after = elapsed_us(step_us, self.prev_trans_us);
        let (speed_high, speed_low) = if before > 0 && before > after {
            (
                SpeedQ20::from_slope(wrapping_diff(self.prev_trans_pos, self.prev_low), before),
                SpeedQ20::from_slope(wrapping_diff(self.prev_trans_pos, self.prev_high), before),
            )
        } else {
            (
                SpeedQ20::from_slope(wrapping_diff(high, self.prev_trans_pos), after),
                SpeedQ20::from_slope(wrapping_diff(low, self.prev_trans_pos), after),
            )
        };
        self.speed_q20 = self.speed_q20.bounded(speed_low, speed_high);
        self.speed = self.speed_q20.per_second();

        // Extrapolate from the last transition, staying inside the step.
        let reach = self
            .speed_q20
            .distance_over(step_us.wrapping_sub(self.prev_trans_us));
        let to_high = wrapping_diff(high, self.prev_trans_pos);
        let to_low = wrapping_diff(low, self.prev_trans_pos);
        let offset = if reach > to_high {
            to_high
        } else if reach < to_low {
            to_low
        } else {
            reach
        };
        let mut position = self.prev_trans_pos.wrapping_add(offset);

        // Within one step the estimate never backs up against the last
        // transition's direction.
        if same_step {
            let moved = wrapping_diff(position, self.position);
            if (self.forward && moved < 0) || (!self.forward && moved > 0) {
                position = self.position;
            }
        }

        self.position = position;
    }

    /// Replace the phase-size table used for step boundaries.
    pub fn set_phase_sizes(&mut self, sizes: PhaseSizes) {
        self.sizes = sizes;
        self.table = PhaseTable::from(sizes);
    }

    pub fn phase_sizes(&self) -> PhaseSizes {
        self.sizes
    }

    /// Re-anchor on a sample read outside [`ingest`](Self::ingest), so the
    /// steps it covered are not taken as one jump by the next poll.
    ///
    /// Position and speed keep their values until the next `ingest`; a step
    /// change since the last poll becomes the previous transition.
    pub fn resync(&mut self, sample: RawSample) {
        let low = self.table.step_start(sample.step);
        let high = self.table.step_start(sample.step.wrapping_add(1));
        if sample.step != self.raw_step {
            self.forward = sample.direction.is_forward();
            self.prev_trans_pos = if self.forward { low } else { high };
            self.prev_trans_us = sample.transition_us;
            self.prev_trans_seen = true;
        }
        self.idle_stop_sample_count = 0;
        self.prev_low = low;
        self.prev_high = high;
        self.raw_step = sample.step;
        self.prev_step_us = sample.step_us;
    }

    /// Make the current position read as zero.
    pub fn reset_origin(&mut self) {
        self.reset_origin_to(0);
    }

    /// Make the current position read as `steps` raw steps from the origin.
    pub fn reset_origin_to(&mut self, steps: i32) {
        self.origin = self
            .position
            .wrapping_sub(steps.wrapping_mul(SUBSTEPS_PER_STEP));
        self.step_origin = self.raw_step.wrapping_sub(steps);
    }

    /// Raw steps since the origin.
    pub fn steps_from_origin(&self) -> i32 {
        self.raw_step.wrapping_sub(self.step_origin)
    }

    /// Position in substeps relative to the origin.
    pub fn position_substeps(&self) -> i32 {
        wrapping_diff(self.position, self.origin)
    }

    /// Speed in substeps per second.
    pub fn speed_substeps_per_sec(&self) -> i32 {
        self.speed
    }

    pub fn speed_q20(&self) -> SpeedQ20 {
        self.speed_q20
    }

    pub fn raw_step(&self) -> i32 {
        self.raw_step
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Raw steps skipped by polls too far apart (total, saturating).
    pub fn missed_steps(&self) -> u32 {
        self.missed_steps
    }
}
