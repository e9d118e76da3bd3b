use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;

// Minimal valid TOML config for the sim backend, with short windows so runs stay quick
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let toml = format!(
        r#"
[encoder]
# pins are unused by the sim backend but must be present
first_pin = 4
resolution = 4

[calibration]
window_ms = 300
spin_up_ms = 50

[poll]
rate_hz = 2000
report_ms = 50

[sim]
max_steps_per_sec = 400.0
{extra}
"#
    );
    let path = dir.join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn substep(cfg: &Path) -> Command {
    let mut cmd = Command::cargo_bin("substep").unwrap();
    cmd.arg("--config").arg(cfg);
    cmd
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "ok: backend=sim channel=0.0", "stdout")]
#[case(&["run", "--duration-ms", "300"], 0, "done:", "stdout")]
#[case(&["servo", "90", "--hold-ms", "0"], 0, "servo: backend=sim pulse_us=1472 angle=90", "stdout")]
#[case(&["servo", "-10", "--hold-ms", "0"], 0, "pulse_us=544 angle=0", "stdout")]
#[case(&["replay"], 2, "required", "stderr")]
#[case(&["run", "--effort", "1.5", "--duration-ms", "10"], 1, "effort must be within", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let assert = substep(&cfg).args(args).assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn json_run_reports_motion() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let out = substep(&cfg)
        .args(["--json", "run", "--duration-ms", "400", "--effort", "0.5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap_or_else(|e| panic!("not JSON ({e}): {l}")))
        .collect();
    assert!(lines.len() >= 2, "stdout was: {stdout}");
    assert!(lines[0]["t_ms"].is_u64());

    let last = lines.last().unwrap();
    assert_eq!(last["final"], true);
    // about 200 raw steps per second at half effort
    let step = last["step"].as_i64().unwrap();
    assert!(step > 20, "step {step}");
    assert!(last["position"].as_f64().unwrap() > 0.0);
}

#[rstest]
fn calibrate_persists_uniform_phases() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let out = dir.path().join("phases.toml");

    substep(&cfg)
        .args(["calibrate", "--effort", "0.25", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("phases = 4210752"));

    let saved = fs::read_to_string(&out).unwrap();
    assert_eq!(saved.trim(), "phases = 4210752");
}

#[rstest]
fn calibrate_too_slow_exits_3() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    substep(&cfg)
        .args(["calibrate", "--effort", "0.02"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("too few steps"));
}

#[rstest]
fn json_errors_are_structured() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    let out = substep(&cfg)
        .args(["--json", "--log-level", "off", "calibrate", "--effort", "0.02"])
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"exit_code\""))
        .unwrap_or_else(|| panic!("no error object; stderr was: {stderr}"));
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "CalibrationTooSlow");
    assert_eq!(v["code"], -1);
}

fn write_trace(dir: &Path, header: &str) -> PathBuf {
    let path = dir.join("trace.csv");
    let body = format!(
        "{header}\n0,0,0,true\n0,500,0,true\n1,1000,1000,true\n1,1500,1000,true\n2,2000,2000,true\n"
    );
    fs::write(&path, body).unwrap();
    path
}

#[rstest]
fn replay_prints_one_reading_per_row() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let trace = write_trace(dir.path(), "step,step_us,transition_us,forward");

    let out = substep(&cfg)
        .args(["--json", "replay", "--trace"])
        .arg(&trace)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    let rows: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["stopped"], true);
    assert_eq!(rows[4]["step_us"], 2_000);
    assert_eq!(rows[4]["step"], 2);
    assert!(rows[4]["speed"].as_f64().unwrap() > 0.0);
}

#[rstest]
fn replay_reports_bad_trace_header() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let trace = write_trace(dir.path(), "step,time,transition_us,forward");

    substep(&cfg)
        .args(["replay", "--trace"])
        .arg(&trace)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid headers"));
}

#[rstest]
fn invalid_config_is_explained() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "[estimator]\nidle_stop_samples = 0");

    substep(&cfg)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration is invalid"))
        .stderr(predicate::str::contains("idle_stop_samples"));
}

#[rstest]
fn missing_config_is_explained() {
    let dir = tempdir().unwrap();
    substep(&dir.path().join("nope.toml"))
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not read the config file"));
}

#[rstest]
fn servo_uses_configured_range() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "[servo]\nmin_us = 1000\nmax_us = 2000");

    let out = substep(&cfg)
        .args(["--json", "servo", "45", "--hold-ms", "0"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["pulse_us"], 1250);
    assert_eq!(v["angle"], 45);
}

#[rstest]
fn zero_offset_shifts_reported_position() {
    let dir = tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("resolution = 4", "resolution = 4\nzero_offset = 40");
    fs::write(&cfg, text).unwrap();

    let out = substep(&cfg)
        .args(["--json", "replay", "--trace"])
        .arg(write_trace(dir.path(), "step,step_us,transition_us,forward"))
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let first: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&out).lines().next().unwrap()).unwrap();
    // 40 counts at 4 counts per revolution
    assert_eq!(first["position"], 10.0);
}
