//! `QuadratureEncoder`: one leased capture channel plus its estimator.

use substep_traits::{CaptureSource, ChannelId, ChannelLease};

use crate::calibration::PhaseCalibrator;
use crate::config::{CalibrationCfg, CountMode, UnitsCfg};
use crate::error::CalibrationError;
use crate::estimator::Estimator;
use crate::phases::{PhaseSizes, SUBSTEPS_PER_STEP};

/// Snapshot of the user-facing quantities after an update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Position in (converted) revolutions.
    pub position: f64,
    /// Speed in (converted) RPM.
    pub speed: f64,
    pub step: i32,
    pub stopped: bool,
}

/// Quadrature encoder reader with substep interpolation.
///
/// Call [`update`](Self::update) at a regular cadence (at least as often as
/// raw steps arrive); queries return the state as of the last update.
pub struct QuadratureEncoder<C: CaptureSource> {
    pub(crate) source: C,
    pub(crate) estimator: Estimator,
    pub(crate) units: UnitsCfg,
    pub(crate) calibration: CalibrationCfg,
    pub(crate) lease: ChannelLease,
}

impl<C: CaptureSource> core::fmt::Debug for QuadratureEncoder<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadratureEncoder")
            .field("channel", &self.lease.id())
            .field("step", &self.estimator.raw_step())
            .field("position_substeps", &self.estimator.position_substeps())
            .field("speed_substeps_per_sec", &self.estimator.speed_substeps_per_sec())
            .field("units", &self.units)
            .finish()
    }
}

impl<C: CaptureSource> QuadratureEncoder<C> {
    /// Poll the capture source once and fold the sample into the estimate.
    ///
    /// Never fails. Polling slower than raw steps arrive degrades accuracy
    /// (see [`missed_steps`](Self::missed_steps)) but not the step count.
    pub fn update(&mut self) {
        let sample = self.source.read_raw_sample();
        self.estimator.ingest(sample);
    }

    /// Measure the relative phase widths over one calibration window.
    ///
    /// The shaft must already turn at a steady, moderate speed. The result is
    /// not installed; pass it to [`set_phase_sizes`](Self::set_phase_sizes).
    /// Position and speed estimates are left as they were; the next
    /// [`update`](Self::update) continues from the last polled step.
    pub fn measure_phases(&mut self) -> Result<PhaseSizes, CalibrationError> {
        let mut cal = PhaseCalibrator::new(self.source.read_raw_sample(), self.calibration);
        let result = cal.run(&mut self.source);
        self.estimator.resync(cal.last_sample());
        match &result {
            Ok(sizes) => tracing::info!(
                channel = %self.lease.id(),
                phases = sizes.encode(),
                sizes = ?sizes.sizes(),
                "phase calibration finished"
            ),
            Err(e) => tracing::info!(channel = %self.lease.id(), error = %e, "phase calibration rejected"),
        }
        result
    }

    /// [`measure_phases`](Self::measure_phases) as a packed integer: the
    /// positive phase value, `-1` when too slow or `-2` when too fast.
    pub fn measure_phases_code(&mut self) -> i32 {
        match self.measure_phases() {
            Ok(sizes) => sizes.encode(),
            Err(e) => e.code(),
        }
    }

    /// Install a packed phase value as returned by `measure_phases_code`.
    /// Unchecked: any integer is accepted.
    pub fn set_phases(&mut self, phases: i32) {
        self.set_phase_sizes(PhaseSizes::decode(phases));
    }

    pub fn set_phase_sizes(&mut self, sizes: PhaseSizes) {
        tracing::debug!(channel = %self.lease.id(), sizes = ?sizes.sizes(), "phase table installed");
        self.estimator.set_phase_sizes(sizes);
    }

    pub fn phase_sizes(&self) -> PhaseSizes {
        self.estimator.phase_sizes()
    }

    /// Counts per revolution used by [`position`](Self::position) and
    /// [`speed`](Self::speed).
    pub fn set_resolution(&mut self, resolution: i32) {
        self.units.resolution = resolution;
    }

    pub fn set_conversion_factor(&mut self, factor: f64) {
        self.units.conversion_factor = factor;
    }

    pub fn set_reversed(&mut self, reversed: bool) {
        self.units.reversed = reversed;
    }

    /// Count on every edge, every other edge or once per quadrature cycle.
    /// `resolution` is in counts of this mode.
    pub fn set_count_mode(&mut self, mode: CountMode) {
        self.units.count_mode = mode;
    }

    pub fn units(&self) -> UnitsCfg {
        self.units
    }

    /// Make the current position read as zero.
    pub fn reset_position(&mut self) {
        self.estimator.reset_origin();
    }

    /// Make the current position read as `count` counts.
    pub fn reset_position_to(&mut self, count: i32) {
        let steps = count
            .wrapping_mul(self.units.count_mode.steps_per_count())
            .wrapping_mul(self.sign_i32());
        self.estimator.reset_origin_to(steps);
    }

    /// Whole counts since the origin, in the current count mode.
    pub fn count(&self) -> i32 {
        self.estimator
            .steps_from_origin()
            .wrapping_mul(self.sign_i32())
            .div_euclid(self.units.count_mode.steps_per_count())
    }

    /// Position in revolutions times the conversion factor.
    pub fn position(&self) -> f64 {
        self.sign() * self.scale(f64::from(self.estimator.position_substeps()))
    }

    /// Speed in RPM times the conversion factor.
    pub fn speed(&self) -> f64 {
        self.sign() * self.scale(self.estimator.speed_q20().per_second_f64()) * 60.0
    }

    fn scale(&self, substeps: f64) -> f64 {
        let per_count = SUBSTEPS_PER_STEP * self.units.count_mode.steps_per_count();
        substeps / f64::from(per_count) / f64::from(self.units.resolution)
            * self.units.conversion_factor
    }

    fn sign(&self) -> f64 {
        f64::from(self.sign_i32())
    }

    fn sign_i32(&self) -> i32 {
        if self.units.reversed { -1 } else { 1 }
    }

    /// Raw step count of the last sample.
    pub fn step(&self) -> i32 {
        self.estimator.raw_step()
    }

    pub fn position_substeps(&self) -> i32 {
        self.estimator.position_substeps()
    }

    pub fn speed_substeps_per_sec(&self) -> i32 {
        self.estimator.speed_substeps_per_sec()
    }

    pub fn is_stopped(&self) -> bool {
        self.estimator.is_stopped()
    }

    pub fn missed_steps(&self) -> u32 {
        self.estimator.missed_steps()
    }

    pub fn channel(&self) -> ChannelId {
        self.lease.id()
    }

    pub fn reading(&self) -> Reading {
        Reading {
            position: self.position(),
            speed: self.speed(),
            step: self.step(),
            stopped: self.is_stopped(),
        }
    }
}

impl<C: CaptureSource> Drop for QuadratureEncoder<C> {
    fn drop(&mut self) {
        tracing::debug!(channel = %self.lease.id(), "encoder released");
    }
}
