use std::time::Duration;

use rstest::rstest;
use substep_hardware::{SimulatedEncoder, SimulatedMotor, SimulatedServo, SpeedHandle};
use substep_traits::clock::ManualClock;
use substep_traits::{CaptureSource, Direction, MotorOutput, PulseOutput};

fn sim(weights: [f64; 4]) -> (SimulatedEncoder<ManualClock>, ManualClock) {
    let clock = ManualClock::new();
    (SimulatedEncoder::new(clock.clone(), 0, weights), clock)
}

#[rstest]
fn resting_shaft_reports_start_step() {
    let (mut enc, clock) = sim([1.0; 4]);
    clock.advance(Duration::from_millis(5));
    let s = enc.read_raw_sample();
    assert_eq!(s.step, 0);
    assert_eq!(s.step_us, 5_000);
}

#[rstest]
fn forward_transition_time_is_solved() {
    let (mut enc, clock) = sim([1.0; 4]);
    enc.speed_handle().set(1_000.0);
    clock.advance(Duration::from_millis(1));
    let s = enc.read_raw_sample();
    // started mid step 0, half a step at 1 ms per step
    assert_eq!(s.step, 1);
    assert!((499..=500).contains(&s.transition_us), "{}", s.transition_us);
    assert_eq!(s.direction, Direction::Forward);
}

#[rstest]
fn reverse_transition_time_is_solved() {
    let (mut enc, clock) = sim([1.0; 4]);
    enc.speed_handle().set(-1_000.0);
    clock.advance(Duration::from_millis(1));
    let s = enc.read_raw_sample();
    assert_eq!(s.step, -1);
    assert!((499..=500).contains(&s.transition_us), "{}", s.transition_us);
    assert_eq!(s.direction, Direction::Reverse);
}

#[rstest]
fn weights_shape_phase_durations() {
    let (mut enc, clock) = sim([2.0, 1.0, 1.0, 4.0]);
    // one cycle (4 steps) per 8 ms
    enc.speed_handle().set(500.0);
    let mut entered = Vec::new();
    let mut last = 0;
    for _ in 0..8_000 {
        clock.advance(Duration::from_micros(1));
        let s = enc.read_raw_sample();
        if s.step != last {
            entered.push(s.transition_us);
            last = s.step;
        }
    }
    // boundaries at 2/8, 3/8, 4/8 and 8/8 of a cycle, from a start at 1/8
    let expected = [1_000u32, 2_000, 3_000, 7_000];
    assert_eq!(entered.len(), expected.len(), "{entered:?}");
    for (got, want) in entered.iter().zip(expected) {
        assert!(got.abs_diff(want) <= 1, "{entered:?}");
    }
}

#[rstest]
fn bad_weights_fall_back_to_uniform() {
    let (mut enc, clock) = sim([1.0, f64::NAN, -1.0, 1.0]);
    enc.speed_handle().set(1_000.0);
    clock.advance(Duration::from_millis(1));
    assert_eq!(enc.read_raw_sample().step, 1);
}

#[rstest]
#[case(false, 255, 400.0)]
#[case(true, 255, -400.0)]
#[case(false, 0, 0.0)]
fn motor_drives_shared_speed(#[case] reverse: bool, #[case] duty: u8, #[case] expected: f64) {
    let speed = SpeedHandle::default();
    let mut motor = SimulatedMotor::new(speed.clone(), 400.0);
    motor.set_direction(reverse).unwrap();
    motor.set_duty(duty).unwrap();
    assert_eq!(speed.get(), expected);
    assert_eq!(motor.duty(), duty);
}

#[rstest]
fn motor_spins_encoder() {
    let clock = ManualClock::new();
    let speed = SpeedHandle::default();
    let mut enc = SimulatedEncoder::new(clock.clone(), 10, [1.0; 4]).with_speed(speed.clone());
    let mut motor = SimulatedMotor::new(speed, 1_000.0);
    motor.set_duty(255).unwrap();
    for _ in 0..100 {
        clock.advance(Duration::from_millis(1));
        enc.read_raw_sample();
    }
    assert_eq!(enc.read_raw_sample().step, 110);
}

#[rstest]
fn servo_remembers_pulse_until_released() {
    let mut servo = SimulatedServo::default();
    assert_eq!(servo.pulse(), None);
    servo.set_pulse(20_000, 1_500).unwrap();
    assert_eq!(servo.pulse(), Some((20_000, 1_500)));
    servo.release().unwrap();
    assert_eq!(servo.pulse(), None);
}
