//! Capture, motor and servo backends for `substep_traits`.
//!
//! The simulator is always available. The GPIO backend needs the `hardware`
//! feature and Linux.

pub mod error;
pub mod quadrature;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use error::HwError;
pub use quadrature::QuadDecoder;
pub use sim::{SimulatedEncoder, SimulatedMotor, SimulatedServo, SpeedHandle};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use gpio::{GpioCapture, GpioMotor, GpioServo};
