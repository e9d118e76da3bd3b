use std::cell::RefCell;
use std::error::Error;
use std::rc::Rc;

use rstest::rstest;
use substep_core::error::EncoderError;
use substep_core::servo::{DEFAULT_PULSE_US, REFRESH_US};
use substep_core::{Servo, ServoRange};
use substep_traits::PulseOutput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pulse {
    Set(u32, u32),
    Released,
}

#[derive(Clone, Default)]
struct Recording(Rc<RefCell<Vec<Pulse>>>);

impl Recording {
    fn log(&self) -> Vec<Pulse> {
        self.0.borrow().clone()
    }
}

impl PulseOutput for Recording {
    fn set_pulse(&mut self, period_us: u32, pulse_us: u32) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.0.borrow_mut().push(Pulse::Set(period_us, pulse_us));
        Ok(())
    }
    fn release(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.0.borrow_mut().push(Pulse::Released);
        Ok(())
    }
}

#[rstest]
#[case(0, 544)]
#[case(90, 1472)]
#[case(180, 2400)]
#[case(-30, 544)]
#[case(199, 2400)]
#[case(1500, 1500)]
#[case(3000, 2400)]
#[case(200, 544)]
fn write_takes_degrees_or_microseconds(#[case] value: i32, #[case] pulse_us: u32) {
    let mut servo = Servo::new(Recording::default());
    servo.write(value).unwrap();
    assert_eq!(servo.read_us(), pulse_us);
}

#[rstest]
#[case(544, 0)]
#[case(1472, 90)]
#[case(2400, 180)]
#[case(100, 0)]
fn read_reports_the_angle(#[case] pulse_us: u32, #[case] angle: i32) {
    let mut servo = Servo::new(Recording::default());
    servo.write_us(pulse_us).unwrap();
    assert_eq!(servo.read(), angle);
}

#[rstest]
fn pulses_only_while_attached() {
    let out = Recording::default();
    let mut servo = Servo::new(out.clone());
    assert!(!servo.attached());
    servo.write(45).unwrap();
    assert!(out.log().is_empty());

    servo.attach(ServoRange::new(1000, 2000).unwrap()).unwrap();
    assert!(servo.attached());
    servo.write(45).unwrap();
    servo.detach().unwrap();
    servo.write(90).unwrap();
    assert_eq!(
        out.log(),
        vec![
            // 45 degrees of the default range, written before attaching
            Pulse::Set(REFRESH_US, 1008),
            Pulse::Set(REFRESH_US, 1250),
            Pulse::Released,
        ]
    );
}

#[rstest]
fn attaching_starts_at_the_default_width() {
    let out = Recording::default();
    let mut servo = Servo::new(out.clone());
    servo.attach(ServoRange::default()).unwrap();
    assert_eq!(out.log(), vec![Pulse::Set(REFRESH_US, DEFAULT_PULSE_US)]);
}

#[rstest]
fn dropping_an_attached_servo_releases_it() {
    let out = Recording::default();
    {
        let mut servo = Servo::new(out.clone());
        servo.attach(ServoRange::default()).unwrap();
    }
    assert_eq!(out.log().last(), Some(&Pulse::Released));
}

#[rstest]
#[case(0, 2000)]
#[case(2000, 1000)]
#[case(1500, 1500)]
#[case(1000, 20_000)]
fn bad_ranges_are_config_errors(#[case] min_us: u32, #[case] max_us: u32) {
    assert!(matches!(
        ServoRange::new(min_us, max_us),
        Err(EncoderError::Config(_))
    ));
}
