#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Quadrature position/speed estimation (hardware-agnostic).
//!
//! This crate turns raw quadrature samples into a substep-resolution position
//! and an instantaneous speed. All hardware interactions go through
//! `substep_traits::CaptureSource` and `substep_traits::MotorOutput`.
//!
//! ## Architecture
//!
//! - **Estimator**: per-poll position/speed update (`estimator` module)
//! - **Phases**: packed phase-width calibration and step boundaries (`phases`)
//! - **Calibration**: phase-width measurement over a window (`calibration`)
//! - **Encoder**: leased channel + estimator + unit conversion (`QuadratureEncoder`)
//! - **Poller**: background `update()` loop (`poller`)
//! - **Motor**: effort to direction/duty mapping (`motor`)
//! - **Servo**: angle to pulse-width mapping for hobby servos (`servo`)
//!
//! ## Fixed-Point Arithmetic
//!
//! Positions are `i32` substeps (1/64 of a raw step) and times `u32`
//! microseconds, both wrapping. Speeds are `SpeedQ20` (substeps per 2^20 µs)
//! and round toward zero, so mirrored input gives exactly mirrored output.

pub mod atomic;
pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod encoder;
pub mod error;
pub mod estimator;
pub mod fixed_point;
pub mod hw_error;
pub mod mocks;
pub mod motor;
pub mod phases;
pub mod poller;
pub mod servo;
pub mod util;

pub use builder::{EncoderBuilder, Missing, Set};
pub use config::{CalibrationCfg, CountMode, EstimatorCfg, PollCfg, UnitsCfg};
pub use encoder::{QuadratureEncoder, Reading};
pub use error::{BuildError, CalibrationError, EncoderError, Report, Result};
pub use estimator::Estimator;
pub use fixed_point::SpeedQ20;
pub use motor::{MotorDriver, effort_to_command};
pub use phases::{PhaseSizes, PhaseTable};
pub use poller::Poller;
pub use servo::{Servo, ServoRange};
