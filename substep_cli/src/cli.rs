//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "substep", version, about = "Quadrature encoder reader")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/substep.toml")]
    pub config: PathBuf,

    /// Print readings and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        if cfg!(target_os = "linux") {
            RtLock::Current
        } else {
            RtLock::None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive the motor and report position/speed while polling in the background
    Run {
        /// Stop after this many milliseconds (default: run until Ctrl-C)
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Motor effort in [-1, 1]
        #[arg(long, value_name = "E", default_value_t = 0.5, allow_hyphen_values = true)]
        effort: f64,
        /// Enable real-time mode (SCHED_FIFO, affinity, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on supported OSes.\n\nLinux: Attempts SCHED_FIFO priority, pins to one CPU, and locks memory. This reduces poll jitter but may require elevated privileges or ulimits (e.g., memlock).\n\nmacOS: Only memory locking is applied."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO on Linux (1..=max); ignored on macOS
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
        /// CPU index to pin the process to when --rt is enabled (Linux only, default 0)
        #[arg(long, value_name = "CPU")]
        rt_cpu: Option<usize>,
    },
    /// Spin the motor and measure the encoder's phase widths
    Calibrate {
        /// Motor effort during the measurement (default: calibration.effort)
        #[arg(long, value_name = "E", allow_hyphen_values = true)]
        effort: Option<f64>,
        /// Save the result as `phases = N` to this TOML file
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Feed a recorded capture trace (CSV) through the estimator
    Replay {
        /// CSV with headers step,step_us,transition_us,forward
        #[arg(long, value_name = "FILE")]
        trace: PathBuf,
    },
    /// Position a hobby servo and hold it there
    Servo {
        /// Degrees below 200, pulse width in microseconds from 200 up
        #[arg(allow_hyphen_values = true)]
        value: i32,
        /// How long to keep pulsing before releasing (ms)
        #[arg(long, default_value_t = 500)]
        hold_ms: u64,
    },
    /// Quick health check: lease a channel and read one sample
    SelfCheck,
}
