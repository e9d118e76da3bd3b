//! Type-state builder for `QuadratureEncoder`.
//!
//! The builder enforces at compile time that a capture source is provided
//! before `build()` is available. `try_build()` is always available for
//! dynamic checks.

use std::marker::PhantomData;

use substep_traits::{CapturePool, CaptureSource};

use crate::config::{CalibrationCfg, EstimatorCfg, UnitsCfg};
use crate::encoder::QuadratureEncoder;
use crate::error::{BuildError, EncoderError, Result};
use crate::estimator::Estimator;
use crate::phases::PhaseSizes;

impl<C: CaptureSource> QuadratureEncoder<C> {
    /// Start building an encoder.
    pub fn builder() -> EncoderBuilder<C, Missing> {
        EncoderBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `QuadratureEncoder`. All fields are validated on `build()`.
pub struct EncoderBuilder<C, S> {
    source: Option<C>,
    estimator: Option<EstimatorCfg>,
    calibration: Option<CalibrationCfg>,
    units: Option<UnitsCfg>,
    phases: Option<PhaseSizes>,
    zero_offset: i32,
    _s: PhantomData<S>,
}

impl<C> Default for EncoderBuilder<C, Missing> {
    fn default() -> Self {
        Self {
            source: None,
            estimator: None,
            calibration: None,
            units: None,
            phases: None,
            zero_offset: 0,
            _s: PhantomData,
        }
    }
}

fn validate(estimator: &EstimatorCfg, calibration: &CalibrationCfg, units: &UnitsCfg) -> Result<()> {
    if estimator.idle_stop_samples == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "idle_stop_samples must be >= 1",
        )));
    }
    if calibration.window_us == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "calibration window must be > 0",
        )));
    }
    if !units.conversion_factor.is_finite() {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "conversion_factor must be finite",
        )));
    }
    Ok(())
}

impl<C: CaptureSource, S> EncoderBuilder<C, S> {
    /// Fallible build available in any type-state.
    ///
    /// Leases a channel from `pool` and takes the first sample, which becomes
    /// the starting point (position zero, stopped).
    pub fn try_build(self, pool: &CapturePool) -> Result<QuadratureEncoder<C>> {
        let mut source = self
            .source
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSource))?;
        let estimator_cfg = self.estimator.unwrap_or_default();
        let calibration = self.calibration.unwrap_or_default();
        let units = self.units.unwrap_or_default();
        validate(&estimator_cfg, &calibration, &units)?;

        let lease = pool
            .acquire()
            .map_err(|e| eyre::Report::new(EncoderError::from(e)))?;
        let initial = source.read_raw_sample();
        let sizes = self.phases.unwrap_or_default();
        let estimator = Estimator::new(initial, estimator_cfg, sizes);

        tracing::info!(
            channel = %lease.id(),
            step = initial.step,
            phases = sizes.encode(),
            resolution = units.resolution,
            "encoder started"
        );

        let mut encoder = QuadratureEncoder {
            source,
            estimator,
            units,
            calibration,
            lease,
        };
        if self.zero_offset != 0 {
            encoder.reset_position_to(self.zero_offset);
        }
        Ok(encoder)
    }
}

/// Chainable setters that do not affect type-state.
impl<C, S> EncoderBuilder<C, S> {
    pub fn with_estimator(mut self, cfg: EstimatorCfg) -> Self {
        self.estimator = Some(cfg);
        self
    }
    pub fn with_calibration(mut self, cfg: CalibrationCfg) -> Self {
        self.calibration = Some(cfg);
        self
    }
    pub fn with_units(mut self, units: UnitsCfg) -> Self {
        self.units = Some(units);
        self
    }
    /// Start with a packed phase value instead of the uniform table.
    pub fn with_phases(mut self, phases: i32) -> Self {
        self.phases = Some(PhaseSizes::decode(phases));
        self
    }
    pub fn with_phase_sizes(mut self, sizes: PhaseSizes) -> Self {
        self.phases = Some(sizes);
        self
    }
    /// Count the starting position reads as.
    pub fn with_zero_offset(mut self, count: i32) -> Self {
        self.zero_offset = count;
        self
    }
}

// Setter that advances type-state
impl<C> EncoderBuilder<C, Missing> {
    pub fn with_source(self, source: C) -> EncoderBuilder<C, Set> {
        EncoderBuilder {
            source: Some(source),
            estimator: self.estimator,
            calibration: self.calibration,
            units: self.units,
            phases: self.phases,
            zero_offset: self.zero_offset,
            _s: PhantomData,
        }
    }
}

impl<C: CaptureSource> EncoderBuilder<C, Set> {
    /// Validate and build. Only available once a source is set.
    pub fn build(self, pool: &CapturePool) -> Result<QuadratureEncoder<C>> {
        self.try_build(pool)
    }
}
