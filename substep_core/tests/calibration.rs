use rstest::rstest;
use substep_core::calibration::measure;
use substep_core::mocks::{ScriptedCapture, oversampled_rotation, steady_rotation};
use substep_core::{CalibrationCfg, CalibrationError, PhaseSizes, QuadratureEncoder};
use substep_traits::{CapturePool, Direction, RawSample};

/// Forward rotation where raw step `i` lasts `durations[i & 3]` µs, polled at
/// every transition and once halfway through each step.
fn skewed_rotation(durations: [u32; 4], total_us: u32) -> Vec<RawSample> {
    let mut out = Vec::new();
    let (mut step, mut t) = (0i32, 0u32);
    while t <= total_us {
        let d = durations[(step & 3) as usize];
        for poll in [t, t + d / 2] {
            out.push(RawSample {
                step,
                step_us: poll,
                transition_us: t,
                direction: Direction::Forward,
            });
        }
        t += d;
        step += 1;
    }
    out
}

fn encoder(samples: Vec<RawSample>) -> QuadratureEncoder<ScriptedCapture> {
    let pool = CapturePool::new(1, 1);
    QuadratureEncoder::builder()
        .with_source(ScriptedCapture::new(samples))
        .build(&pool)
        .unwrap()
}

#[rstest]
#[case(Direction::Forward)]
#[case(Direction::Reverse)]
fn even_stream_gives_uniform_table(#[case] direction: Direction) {
    let mut enc = encoder(oversampled_rotation(0, 700, 2_000, 2, direction));
    assert_eq!(enc.measure_phases_code(), 0x0040_4040);
}

#[rstest]
fn skewed_stream_is_measured() {
    let mut src = ScriptedCapture::new(skewed_rotation([2_200, 1_800, 2_000, 2_000], 1_200_000));
    let sizes = measure(&mut src, CalibrationCfg::default()).unwrap();
    // cumulative 2200/4000/6000 of 8000 µs
    assert_eq!(sizes, PhaseSizes::new(70, 58, 64).unwrap());
    assert_eq!(sizes.sizes(), [70, 58, 64, 64]);
}

#[rstest]
fn too_slow_is_minus_one() {
    // 10 raw steps per second against a floor of 20
    let mut enc = encoder(steady_rotation(0, 15, 100_000, Direction::Forward));
    assert_eq!(enc.measure_phases_code(), -1);
}

#[rstest]
fn stalled_shaft_is_too_slow() {
    let mut src = ScriptedCapture::new([RawSample::default()]).with_idle_tick_us(10_000);
    let err = measure(&mut src, CalibrationCfg::default()).unwrap_err();
    assert!(matches!(err, CalibrationError::TooSlow { steps: 0, .. }));
    assert_eq!(err.code(), -1);
}

#[rstest]
fn two_step_jump_is_minus_two() {
    let samples = vec![
        RawSample::default(),
        RawSample {
            step: 1,
            step_us: 1_000,
            transition_us: 1_000,
            direction: Direction::Forward,
        },
        RawSample {
            step: 3,
            step_us: 2_000,
            transition_us: 1_900,
            direction: Direction::Forward,
        },
    ];
    let mut src = ScriptedCapture::new(samples.clone());
    assert_eq!(
        measure(&mut src, CalibrationCfg::default()),
        Err(CalibrationError::TooFast { jump: 2 })
    );
    let mut enc = encoder(samples);
    assert_eq!(enc.measure_phases_code(), -2);
}

#[rstest]
fn fast_enough_but_phase_never_timed_is_too_slow() {
    // back-and-forth between steps 0 and 1 never times a full phase twice in a row
    let samples: Vec<RawSample> = (0..2_000u32)
        .map(|i| RawSample {
            step: (i % 2) as i32,
            step_us: i * 1_000,
            transition_us: i * 1_000,
            direction: if i % 2 == 1 {
                Direction::Forward
            } else {
                Direction::Reverse
            },
        })
        .collect();
    let mut src = ScriptedCapture::new(samples);
    let err = measure(&mut src, CalibrationCfg::default()).unwrap_err();
    assert!(matches!(err, CalibrationError::TooSlow { .. }));
}

#[rstest]
fn shorter_window_and_floor_are_honoured() {
    let cfg = CalibrationCfg {
        window_us: 100_000,
        min_step_rate_hz: 5,
    };
    // 100 ms at 5 ms per step: 20 steps, 200 per second
    let mut src = ScriptedCapture::new(steady_rotation(0, 40, 5_000, Direction::Forward));
    assert_eq!(measure(&mut src, cfg), Ok(PhaseSizes::UNIFORM));
    assert_eq!(src.remaining(), 20);
}

#[rstest]
fn measuring_leaves_estimate_and_table_alone() {
    let mut samples = steady_rotation(0, 5, 1_000, Direction::Forward);
    // then a skewed rotation for the calibration window, well ahead in time
    samples.extend(
        skewed_rotation([2_200, 1_800, 2_000, 2_000], 1_200_000)
            .into_iter()
            .map(|s| RawSample {
                step: s.step + 5,
                step_us: s.step_us + 10_000,
                transition_us: s.transition_us + 10_000,
                ..s
            }),
    );
    let mut enc = encoder(samples);
    for _ in 0..5 {
        enc.update();
    }
    let before = (enc.position_substeps(), enc.speed_substeps_per_sec());

    let sizes = enc.measure_phases().unwrap();
    assert_ne!(sizes, PhaseSizes::UNIFORM);
    assert_eq!(
        (enc.position_substeps(), enc.speed_substeps_per_sec()),
        before
    );
    assert_eq!(enc.phase_sizes(), PhaseSizes::UNIFORM);
    assert_eq!(enc.missed_steps(), 0);

    // the window's steps are not one jump for the next poll
    let measured_to = enc.step();
    assert!(measured_to > 400, "step {measured_to}");
    enc.update();
    assert_eq!(enc.missed_steps(), 0);
    assert!(enc.step() - measured_to <= 1);
    let p = enc.position_substeps() + 32;
    assert!(
        (enc.step() * 64..=enc.step() * 64 + 64).contains(&p),
        "position {p} outside step {}",
        enc.step()
    );

    enc.set_phases(sizes.encode());
    assert_eq!(enc.phase_sizes(), sizes);
}
