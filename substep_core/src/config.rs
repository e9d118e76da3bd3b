//! Runtime configuration for the estimator and its drivers.
//!
//! These are the structs used by `QuadratureEncoder` and friends. They are
//! separate from the TOML-deserialized config in `substep_config`.

/// Stall detection for the estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorCfg {
    /// Consecutive polls without a step change before the encoder may be
    /// declared stopped.
    pub idle_stop_samples: u32,
    /// Minimum time since the last transition (µs) before the encoder may be
    /// declared stopped. 0 makes the sample count the only criterion.
    pub idle_stop_us: u32,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            idle_stop_samples: 3,
            idle_stop_us: 50_000,
        }
    }
}

/// Phase measurement window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationCfg {
    /// Length of the sampling window in microseconds of capture time.
    pub window_us: u32,
    /// Below this many raw steps per second the measurement is rejected.
    pub min_step_rate_hz: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            window_us: 1_000_000,
            min_step_rate_hz: 20,
        }
    }
}

/// Which quadrature edges make up one count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    /// One count per full quadrature cycle (4 raw steps).
    X1,
    /// One count per 2 raw steps.
    X2,
    /// Every edge counts.
    #[default]
    X4,
}

impl CountMode {
    /// Raw steps per count.
    pub fn steps_per_count(self) -> i32 {
        match self {
            CountMode::X1 => 4,
            CountMode::X2 => 2,
            CountMode::X4 => 1,
        }
    }
}

/// Unit conversion applied by the position/speed queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitsCfg {
    /// Counts per revolution, in `count_mode` counts. Zero is not guarded
    /// against.
    pub resolution: i32,
    pub count_mode: CountMode,
    /// Multiplier applied to revolutions (position) and RPM (speed).
    pub conversion_factor: f64,
    /// Negate reported position and speed.
    pub reversed: bool,
}

impl Default for UnitsCfg {
    fn default() -> Self {
        Self {
            resolution: 1,
            count_mode: CountMode::X4,
            conversion_factor: 1.0,
            reversed: false,
        }
    }
}

/// Host polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollCfg {
    /// `update()` calls per second.
    pub rate_hz: u32,
    /// Interval between published reports (ms).
    pub report_ms: u64,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            rate_hz: 2_000,
            report_ms: 100,
        }
    }
}
