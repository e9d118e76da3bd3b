#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and capture-trace parsing for the encoder tools.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The trace CSV loader enforces headers and basic timestamp sanity so a
//!   recorded capture can be replayed through the estimator.
//! - A persisted phase calibration is a one-line TOML file (`phases = N`).
use serde::{Deserialize, Serialize};

/// Capture trace CSV schema.
///
/// Expected headers:
/// step,step_us,transition_us,forward
///
/// Example:
/// step,step_us,transition_us,forward
/// 0,0,0,true
/// 1,1000,980,true
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TraceRow {
    pub step: i32,
    pub step_us: u32,
    pub transition_us: u32,
    pub forward: bool,
}

/// Quadrature edges per count: `"1x"`, `"2x"` or `"4x"` (every edge).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum CountMode {
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "2x")]
    X2,
    #[default]
    #[serde(rename = "4x")]
    X4,
}

#[derive(Debug, Deserialize)]
pub struct EncoderCfg {
    /// Channel A pin; channel B is `first_pin + 1`.
    pub first_pin: u8,
    #[serde(default = "default_true")]
    pub pull_up: bool,
    /// Encoder counts per revolution, in `count_mode` counts.
    #[serde(default = "default_resolution")]
    pub resolution: i32,
    #[serde(default)]
    pub count_mode: CountMode,
    /// Count reported at start-up.
    #[serde(default)]
    pub zero_offset: i32,
    #[serde(default = "default_factor")]
    pub conversion_factor: f64,
    #[serde(default)]
    pub reversed: bool,
    /// Packed phase calibration (as printed by `calibrate`).
    #[serde(default)]
    pub phases: Option<i32>,
    /// File written by `calibrate --out`; used when `phases` is absent.
    #[serde(default)]
    pub phases_file: Option<String>,
}

fn default_true() -> bool {
    true
}
fn default_resolution() -> i32 {
    1
}
fn default_factor() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstimatorCfg {
    /// Polls without a step change before the shaft may be declared stopped
    pub idle_stop_samples: u32,
    /// Minimum time since the last transition before declaring a stop (µs)
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    pub window_ms: u32,
    /// Below this raw step rate a measurement is rejected as too slow
    pub min_step_rate_hz: u32,
    /// Time to let the motor reach steady speed before measuring
    pub spin_up_ms: u64,
    /// Motor effort used while measuring, in (0, 1]
    pub effort: f64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            window_ms: 1000,
            min_step_rate_hz: 20,
            spin_up_ms: 200,
            effort: 0.5,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PoolCfg {
    pub blocks: u8,
    pub channels_per_block: u8,
}

impl Default for PoolCfg {
    fn default() -> Self {
        Self {
            blocks: 2,
            channels_per_block: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PollCfg {
    pub rate_hz: u32,
    /// Interval between printed readings (ms)
    pub report_ms: u64,
}

impl Default for PollCfg {
    fn default() -> Self {
        Self {
            rate_hz: 2000,
            report_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MotorCfg {
    pub dir_pin: Option<u8>,
    pub pwm_pin: Option<u8>,
    pub inverted: bool,
    pub pwm_hz: f64,
}

impl Default for MotorCfg {
    fn default() -> Self {
        Self {
            dir_pin: None,
            pwm_pin: None,
            inverted: false,
            pwm_hz: 1000.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    /// Shaft speed at full effort (raw steps per second)
    pub max_steps_per_sec: f64,
    /// Relative widths of the four quadrature phases
    pub phase_weights: [f64; 4],
    pub start_step: i32,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            max_steps_per_sec: 400.0,
            phase_weights: [1.0; 4],
            start_step: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServoCfg {
    /// Output pin; the sim backend ignores it
    pub pin: Option<u8>,
    /// Pulse width at 0 degrees (µs)
    pub min_us: u32,
    /// Pulse width at 180 degrees (µs)
    pub max_us: u32,
}

impl Default for ServoCfg {
    fn default() -> Self {
        Self {
            pin: None,
            min_us: 544,
            max_us: 2400,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub estimator: EstimatorCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub pool: PoolCfg,
    #[serde(default)]
    pub poll: PollCfg,
    #[serde(default)]
    pub motor: MotorCfg,
    #[serde(default)]
    pub sim: SimCfg,
    #[serde(default)]
    pub servo: ServoCfg,
    #[serde(default)]
    pub logging: Logging,
}

/// Phase calibration persisted by `calibrate --out`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct PersistedPhases {
    pub phases: i32,
}

impl PersistedPhases {
    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string(self).map_err(|e| eyre::eyre!("serialize phases: {e}"))
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// `true` when `phases` unpacks to four phases of at least one unit each.
pub fn phases_well_formed(phases: i32) -> bool {
    if phases <= 0 || phases > 0x00FF_FFFF {
        return false;
    }
    let s = [phases & 0xFF, (phases >> 8) & 0xFF, (phases >> 16) & 0xFF];
    s.iter().all(|&v| v > 0) && s.iter().sum::<i32>() < 256
}

pub fn load_phases_file(path: &std::path::Path) -> eyre::Result<PersistedPhases> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read phases file {:?}: {}", path, e))?;
    let p: PersistedPhases =
        toml::from_str(&text).map_err(|e| eyre::eyre!("parse phases file {:?}: {}", path, e))?;
    if !phases_well_formed(p.phases) {
        eyre::bail!("phases file {:?} holds an invalid value {:#x}", path, p.phases);
    }
    Ok(p)
}

pub fn load_trace_csv(path: &std::path::Path) -> eyre::Result<Vec<TraceRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open trace CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["step", "step_us", "transition_us", "forward"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "trace CSV must have headers 'step,step_us,transition_us,forward', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<TraceRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<TraceRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        // Timestamps wrap, so compare as signed differences.
        if (row.step_us.wrapping_sub(row.transition_us) as i32) < 0 {
            eyre::bail!(
                "trace row {}: transition_us is later than step_us",
                idx + 2
            );
        }
        if let Some(prev) = rows.last()
            && (row.step_us.wrapping_sub(prev.step_us) as i32) < 0
        {
            eyre::bail!("trace row {}: step_us goes backwards", idx + 2);
        }
        rows.push(row);
    }

    if rows.is_empty() {
        eyre::bail!("trace CSV {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Encoder
        if self.encoder.first_pin == u8::MAX {
            eyre::bail!("encoder.first_pin must leave room for channel B (first_pin + 1)");
        }
        if self.encoder.resolution == 0 {
            eyre::bail!("encoder.resolution must be non-zero");
        }
        if !self.encoder.conversion_factor.is_finite() || self.encoder.conversion_factor == 0.0 {
            eyre::bail!("encoder.conversion_factor must be finite and non-zero");
        }
        if let Some(p) = self.encoder.phases
            && !phases_well_formed(p)
        {
            eyre::bail!("encoder.phases {p:#x} does not describe four non-empty phases");
        }

        // Estimator
        if self.estimator.idle_stop_samples == 0 {
            eyre::bail!("estimator.idle_stop_samples must be >= 1");
        }

        // Calibration
        if self.calibration.window_ms == 0 {
            eyre::bail!("calibration.window_ms must be >= 1");
        }
        if self.calibration.window_ms > 60 * 60 * 1000 {
            eyre::bail!("calibration.window_ms is unreasonably large (>1h)");
        }
        if !(self.calibration.effort > 0.0 && self.calibration.effort <= 1.0) {
            eyre::bail!("calibration.effort must be in (0.0, 1.0]");
        }

        // Pool
        if self.pool.blocks == 0 || self.pool.channels_per_block == 0 {
            eyre::bail!("pool must have at least one block with one channel");
        }

        // Poll
        if self.poll.rate_hz == 0 {
            eyre::bail!("poll.rate_hz must be > 0");
        }
        if self.poll.report_ms == 0 {
            eyre::bail!("poll.report_ms must be >= 1");
        }

        // Motor
        if !(self.motor.pwm_hz.is_finite() && self.motor.pwm_hz > 0.0) {
            eyre::bail!("motor.pwm_hz must be > 0");
        }
        if self.motor.dir_pin.is_some() != self.motor.pwm_pin.is_some() {
            eyre::bail!("motor.dir_pin and motor.pwm_pin must be set together");
        }

        // Simulator
        if !(self.sim.max_steps_per_sec.is_finite() && self.sim.max_steps_per_sec > 0.0) {
            eyre::bail!("sim.max_steps_per_sec must be > 0");
        }
        if self
            .sim
            .phase_weights
            .iter()
            .any(|w| !(w.is_finite() && *w > 0.0))
        {
            eyre::bail!("sim.phase_weights must all be finite and > 0");
        }

        // Servo
        if self.servo.min_us == 0
            || self.servo.min_us >= self.servo.max_us
            || self.servo.max_us >= 20_000
        {
            eyre::bail!("servo.min_us must be > 0 and below servo.max_us, which must be below 20000");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}
