use substep_traits::SetupError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum EncoderError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("capture setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("phase calibration failed: {0}")]
    Calibration(#[from] CalibrationError),
}

/// Why a phase measurement window was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("speed too slow: {steps} raw steps in {elapsed_us} us")]
    TooSlow { steps: u32, elapsed_us: u32 },
    #[error("speed too high: raw step jumped by {jump} between polls")]
    TooFast { jump: i32 },
}

impl CalibrationError {
    /// Legacy integer code: -1 too slow, -2 too fast.
    pub fn code(&self) -> i32 {
        match self {
            CalibrationError::TooSlow { .. } => -1,
            CalibrationError::TooFast { .. } => -2,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing capture source")]
    MissingSource,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
