//! Maps `Box<dyn Error>` from trait boundaries to typed `EncoderError`.
//!
//! The traits in `substep_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with an optional feature-gated path for `substep_hardware::HwError`
//! downcasting.

use crate::error::EncoderError;

/// Map a trait-boundary error to a typed `EncoderError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EncoderError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<substep_hardware::error::HwError>() {
            return match hw {
                substep_hardware::error::HwError::Gpio(msg) => {
                    EncoderError::HardwareFault(format!("gpio: {msg}"))
                }
                other => EncoderError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("gpio") {
        EncoderError::HardwareFault(s)
    } else {
        EncoderError::Hardware(s)
    }
}
