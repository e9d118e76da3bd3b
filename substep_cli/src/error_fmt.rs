//! Human-readable error descriptions, structured JSON errors and exit codes.

use substep_core::error::{BuildError, CalibrationError, EncoderError};
use substep_traits::SetupError;

fn calibration_error(err: &eyre::Report) -> Option<CalibrationError> {
    if let Some(c) = err.downcast_ref::<CalibrationError>() {
        return Some(*c);
    }
    match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::Calibration(c)) => Some(*c),
        _ => None,
    }
}

fn setup_error(err: &eyre::Report) -> Option<SetupError> {
    if let Some(s) = err.downcast_ref::<SetupError>() {
        return Some(*s);
    }
    match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::Setup(s)) => Some(*s),
        _ => None,
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => {
                "What happened: No capture source was provided to the encoder.\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Pass a capture source via with_source(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(c) = calibration_error(err) {
        return match c {
            CalibrationError::TooSlow { steps, elapsed_us } => format!(
                "What happened: Phase calibration saw too few steps ({steps} in {elapsed_us} us).\nLikely causes: Motor not turning, effort too low, or encoder not wired.\nHow to fix: Raise --effort or calibration.effort, check wiring, or lower calibration.min_step_rate_hz."
            ),
            CalibrationError::TooFast { jump } => format!(
                "What happened: Phase calibration missed steps (jump of {jump} between polls).\nLikely causes: Shaft turning too fast for the poll rate.\nHow to fix: Lower --effort or calibration.effort and retry."
            ),
        };
    }

    if let Some(s) = setup_error(err) {
        return format!(
            "What happened: Could not lease a capture channel ({s}).\nLikely causes: All channels are held by other encoders.\nHow to fix: Drop unused encoders or raise [pool] channels_per_block."
        );
    }

    if let Some(ee) = err.downcast_ref::<EncoderError>() {
        return match ee {
            EncoderError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nHow to fix: Edit the TOML config and try again."
            ),
            EncoderError::HardwareFault(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: GPIO not accessible or pins already in use.\nHow to fix: Check [encoder] first_pin and [motor] pins; ensure the process may access GPIO."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("trace csv must have headers") {
        return "Invalid headers in trace CSV. Expected 'step,step_us,transition_us,forward'."
            .to_string();
    }

    if lower.contains("open encoder pins")
        || lower.contains("open motor pins")
        || lower.contains("open servo pin")
    {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix [encoder] first_pin and [motor] pins in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.starts_with("read config") {
        return format!(
            "What happened: Could not read the config file ({msg}).\nHow to fix: Pass --config FILE or create etc/substep.toml."
        );
    }

    if lower.contains("parse config")
        || lower.starts_with("encoder.")
        || lower.starts_with("estimator.")
        || lower.starts_with("calibration.")
        || lower.starts_with("pool.")
        || lower.starts_with("poll.")
        || lower.starts_with("motor.")
        || lower.starts_with("sim.")
        || lower.starts_with("servo.")
        || lower.starts_with("logging.")
    {
        let mut detail = msg.clone();
        if let Some(src) = err.source() {
            detail = format!("{msg}: {src}");
        }
        return format!(
            "What happened: Configuration is invalid ({detail}).\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 too slow, 4 too fast, 5 setup, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(c) = calibration_error(err) {
        return match c {
            CalibrationError::TooSlow { .. } => 3,
            CalibrationError::TooFast { .. } => 4,
        };
    }
    if setup_error(err).is_some() {
        return 5;
    }
    1
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(c) = calibration_error(err) {
        return match c {
            CalibrationError::TooSlow { .. } => "CalibrationTooSlow",
            CalibrationError::TooFast { .. } => "CalibrationTooFast",
        };
    }
    if setup_error(err).is_some() {
        return "Setup";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let legacy = calibration_error(err)
        .map(|c| c.code())
        .or_else(|| setup_error(err).map(|s| s.code()));
    let mut obj = json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    });
    if let Some(code) = legacy {
        obj["code"] = json!(code);
    }
    obj.to_string()
}
