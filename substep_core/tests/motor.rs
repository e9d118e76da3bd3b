use std::error::Error;

use rstest::rstest;
use substep_core::error::EncoderError;
use substep_core::{MotorDriver, effort_to_command};
use substep_traits::MotorOutput;

#[rstest]
#[case(0.0, false, (false, 0))]
#[case(1.0, false, (false, 255))]
#[case(-1.0, false, (true, 255))]
#[case(0.5, false, (false, 128))]
#[case(-0.25, false, (true, 64))]
#[case(2.0, false, (false, 255))]
#[case(-7.5, false, (true, 255))]
#[case(0.5, true, (true, 128))]
#[case(-0.5, true, (false, 128))]
fn effort_maps_to_direction_and_duty(
    #[case] effort: f64,
    #[case] inverted: bool,
    #[case] expected: (bool, u8),
) {
    assert_eq!(effort_to_command(effort, inverted), expected);
}

#[derive(Default)]
struct Recording {
    commands: Vec<(bool, u8)>,
    reverse: bool,
}

impl MotorOutput for Recording {
    fn set_direction(&mut self, reverse: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.reverse = reverse;
        Ok(())
    }
    fn set_duty(&mut self, duty: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.commands.push((self.reverse, duty));
        Ok(())
    }
}

struct Broken;

impl MotorOutput for Broken {
    fn set_direction(&mut self, _reverse: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("driver not responding".into())
    }
    fn set_duty(&mut self, _duty: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("driver not responding".into())
    }
}

#[rstest]
fn driver_forwards_commands_and_stops() {
    let mut m = MotorDriver::new(Recording::default(), false);
    m.set_effort(-0.5).unwrap();
    assert_eq!(m.effort(), -0.5);
    m.stop().unwrap();
    assert_eq!(m.output().commands, vec![(true, 128), (false, 0)]);
}

#[rstest]
fn driver_errors_are_typed() {
    let mut m = MotorDriver::new(Broken, false);
    let err = m.set_effort(0.3).expect_err("broken output");
    assert!(matches!(
        err.downcast_ref::<EncoderError>(),
        Some(EncoderError::Hardware(_))
    ));
    assert_eq!(m.effort(), 0.0);
}
