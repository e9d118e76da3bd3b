//! Command implementations: backend assembly, run, calibrate, replay, self-check.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use serde_json::json;
use substep_config::{Config, PersistedPhases};
use substep_core::mocks::ScriptedCapture;
use substep_core::{MotorDriver, Poller, QuadratureEncoder, Reading, Servo, ServoRange};
use substep_traits::clock::MonotonicClock;
use substep_traits::{CapturePool, CaptureSource, MotorOutput, PulseOutput};

use crate::rt::{RtRequest, setup_rt_once};

pub type DynCapture = Box<dyn CaptureSource + Send>;
pub type DynMotor = Box<dyn MotorOutput + Send>;
pub type DynPulse = Box<dyn PulseOutput + Send>;

/// Capture source plus (optional) motor for the selected backend.
pub struct Backend {
    pub name: &'static str,
    pub capture: DynCapture,
    pub motor: Option<DynMotor>,
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open_backend(cfg: &Config) -> eyre::Result<Backend> {
    use substep_hardware::{SimulatedEncoder, SimulatedMotor, SpeedHandle};

    let speed = SpeedHandle::default();
    let capture = SimulatedEncoder::new(
        MonotonicClock::new(),
        cfg.sim.start_step,
        cfg.sim.phase_weights,
    )
    .with_speed(speed.clone());
    let motor = SimulatedMotor::new(speed, cfg.sim.max_steps_per_sec);
    tracing::debug!(max_steps_per_sec = cfg.sim.max_steps_per_sec, "sim backend");
    Ok(Backend {
        name: "sim",
        capture: Box::new(capture),
        motor: Some(Box::new(motor)),
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open_backend(cfg: &Config) -> eyre::Result<Backend> {
    use substep_hardware::{GpioCapture, GpioMotor};

    let capture = GpioCapture::open(cfg.encoder.first_pin, cfg.encoder.pull_up)
        .wrap_err("open encoder pins")?;
    let motor: Option<DynMotor> = match (cfg.motor.dir_pin, cfg.motor.pwm_pin) {
        (Some(dir), Some(pwm)) => Some(Box::new(
            GpioMotor::open(dir, pwm, cfg.motor.pwm_hz).wrap_err("open motor pins")?,
        )),
        _ => {
            tracing::warn!("motor.dir_pin/motor.pwm_pin not set; the shaft must be turned by hand");
            None
        }
    };
    Ok(Backend {
        name: "gpio",
        capture: Box::new(capture),
        motor,
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_servo(_cfg: &Config) -> eyre::Result<(&'static str, DynPulse)> {
    Ok(("sim", Box::new(substep_hardware::SimulatedServo::default())))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_servo(cfg: &Config) -> eyre::Result<(&'static str, DynPulse)> {
    let Some(pin) = cfg.servo.pin else {
        eyre::bail!("servo.pin must be set to drive a servo");
    };
    let out = substep_hardware::GpioServo::open(pin).wrap_err("open servo pin")?;
    Ok(("gpio", Box::new(out)))
}

/// Phase value to start from: inline `encoder.phases`, else a saved file.
fn initial_phases(cfg: &Config) -> eyre::Result<Option<i32>> {
    if let Some(p) = cfg.encoder.phases {
        return Ok(Some(p));
    }
    match cfg.encoder.phases_file.as_deref().map(Path::new) {
        Some(path) if path.exists() => Ok(Some(substep_config::load_phases_file(path)?.phases)),
        Some(path) => {
            tracing::info!(path = %path.display(), "no saved phase calibration; using uniform phases");
            Ok(None)
        }
        None => Ok(None),
    }
}

pub fn build_encoder<C: CaptureSource>(
    cfg: &Config,
    pool: &CapturePool,
    capture: C,
) -> eyre::Result<QuadratureEncoder<C>> {
    let mut builder = QuadratureEncoder::builder()
        .with_source(capture)
        .with_estimator((&cfg.estimator).into())
        .with_calibration((&cfg.calibration).into())
        .with_units((&cfg.encoder).into())
        .with_zero_offset(cfg.encoder.zero_offset);
    if let Some(p) = initial_phases(cfg)? {
        builder = builder.with_phases(p);
    }
    builder.build(pool)
}

pub fn pool_for(cfg: &Config) -> CapturePool {
    CapturePool::new(cfg.pool.blocks, cfg.pool.channels_per_block)
}

fn check_effort(effort: f64) -> eyre::Result<()> {
    if !(-1.0..=1.0).contains(&effort) {
        eyre::bail!("effort must be within [-1, 1], got {effort}");
    }
    Ok(())
}

fn print_reading(json: bool, label: &str, at: u64, r: &Reading) {
    if json {
        let mut line = json!({
            "position": r.position,
            "speed": r.speed,
            "step": r.step,
            "stopped": r.stopped,
        });
        line[label] = json!(at);
        println!("{line}");
    } else {
        println!(
            "{label}={at:>8} step={:>7} position={:>12.4} speed={:>10.2}{}",
            r.step,
            r.position,
            r.speed,
            if r.stopped { " stopped" } else { "" }
        );
    }
}

pub struct RunParams {
    pub duration_ms: Option<u64>,
    pub effort: f64,
    pub rt: Option<RtRequest>,
    pub json: bool,
}

/// Spin the motor, poll in the background and report every `poll.report_ms`.
pub fn run(
    cfg: &Config,
    backend: Backend,
    params: RunParams,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    check_effort(params.effort)?;
    if let Some(req) = params.rt {
        setup_rt_once(req);
    }

    let pool = pool_for(cfg);
    let encoder = build_encoder(cfg, &pool, backend.capture)?;
    let mut motor = backend
        .motor
        .map(|m| MotorDriver::new(m, cfg.motor.inverted));
    if let Some(m) = motor.as_mut() {
        m.set_effort(params.effort)?;
    }

    let poller = Poller::spawn(encoder, cfg.poll.rate_hz, MonotonicClock::new());
    let report = Duration::from_millis(cfg.poll.report_ms.max(1));
    let start = Instant::now();
    tracing::info!(
        backend = backend.name,
        effort = params.effort,
        duration_ms = ?params.duration_ms,
        "run start"
    );

    loop {
        std::thread::sleep(report);
        let elapsed_ms = start.elapsed().as_millis() as u64;
        if let Some(r) = poller.latest() {
            print_reading(params.json, "t_ms", elapsed_ms, &r);
        }
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("interrupted");
            break;
        }
        if params.duration_ms.is_some_and(|d| elapsed_ms >= d) {
            break;
        }
    }

    if let Some(m) = motor.as_mut() {
        m.stop()?;
    }
    let updates = poller.updates();
    let Some(encoder) = poller.stop() else {
        eyre::bail!("poller thread panicked");
    };
    let r = encoder.reading();
    if params.json {
        println!(
            "{}",
            json!({
                "final": true,
                "position": r.position,
                "speed": r.speed,
                "step": r.step,
                "updates": updates,
                "missed_steps": encoder.missed_steps(),
            })
        );
    } else {
        println!(
            "done: step={} position={:.4} updates={updates} missed_steps={}",
            r.step,
            r.position,
            encoder.missed_steps()
        );
    }
    Ok(())
}

/// Spin up, measure the phase widths and optionally persist them.
pub fn calibrate(
    cfg: &Config,
    backend: Backend,
    effort: Option<f64>,
    out: Option<&Path>,
    json: bool,
) -> eyre::Result<()> {
    let effort = effort.unwrap_or(cfg.calibration.effort);
    check_effort(effort)?;

    let pool = pool_for(cfg);
    let mut encoder = build_encoder(cfg, &pool, backend.capture)?;
    let mut motor = backend
        .motor
        .map(|m| MotorDriver::new(m, cfg.motor.inverted));
    if let Some(m) = motor.as_mut() {
        m.set_effort(effort)?;
        std::thread::sleep(Duration::from_millis(cfg.calibration.spin_up_ms));
    }

    let measured = encoder.measure_phases();
    if let Some(m) = motor.as_mut() {
        m.stop()?;
    }
    let sizes = measured?;
    let phases = sizes.encode();

    if let Some(path) = out {
        let text = PersistedPhases { phases }.to_toml()?;
        substep_core::atomic::write_atomic(path, text.as_bytes())
            .wrap_err_with(|| format!("write phases file {}", path.display()))?;
        tracing::info!(path = %path.display(), phases, "phase calibration saved");
    }

    if json {
        println!(
            "{}",
            json!({
                "phases": phases,
                "sizes": sizes.sizes(),
                "saved": out.map(|p| p.display().to_string()),
            })
        );
    } else {
        println!("phases = {phases} ({phases:#08x}) sizes = {:?}", sizes.sizes());
    }
    Ok(())
}

/// Run a recorded trace through the estimator, one reading per row.
pub fn replay(cfg: &Config, trace: &Path, json: bool) -> eyre::Result<()> {
    let rows = substep_config::load_trace_csv(trace)?;
    let pool = pool_for(cfg);
    let mut encoder = build_encoder(cfg, &pool, ScriptedCapture::from(rows.as_slice()))?;

    // the first row was consumed by build()
    print_reading(json, "step_us", u64::from(rows[0].step_us), &encoder.reading());
    for row in &rows[1..] {
        encoder.update();
        print_reading(json, "step_us", u64::from(row.step_us), &encoder.reading());
    }
    tracing::info!(rows = rows.len(), missed_steps = encoder.missed_steps(), "replay done");
    Ok(())
}

/// Write one servo position, hold it, then release the output.
pub fn servo(cfg: &Config, value: i32, hold_ms: u64, json: bool) -> eyre::Result<()> {
    let range = ServoRange::try_from(&cfg.servo)?;
    let (backend, out) = open_servo(cfg)?;
    let mut servo = Servo::new(out);
    servo.attach(range)?;
    servo.write(value)?;
    tracing::info!(backend, pulse_us = servo.read_us(), hold_ms, "servo holding");
    std::thread::sleep(Duration::from_millis(hold_ms));
    servo.detach()?;

    if json {
        println!(
            "{}",
            json!({
                "backend": backend,
                "pulse_us": servo.read_us(),
                "angle": servo.read(),
            })
        );
    } else {
        println!(
            "servo: backend={backend} pulse_us={} angle={}",
            servo.read_us(),
            servo.read()
        );
    }
    Ok(())
}

pub fn self_check(cfg: &Config, backend: Backend, json: bool) -> eyre::Result<()> {
    let pool = pool_for(cfg);
    let mut encoder = build_encoder(cfg, &pool, backend.capture)?;
    encoder.update();
    let channel = encoder.channel().to_string();
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "backend": backend.name,
                "channel": channel,
                "step": encoder.step(),
            })
        );
    } else {
        println!(
            "ok: backend={} channel={channel} step={}",
            backend.name,
            encoder.step()
        );
    }
    Ok(())
}
