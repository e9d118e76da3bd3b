pub mod clock;
pub mod pool;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use pool::{CapturePool, ChannelId, ChannelLease, SetupError};

/// Direction of the most recent quadrature transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    #[inline]
    pub fn is_forward(self) -> bool {
        matches!(self, Direction::Forward)
    }
}

/// One poll of a capture source.
///
/// `step` is the raw quadrature step counter. `step_us` is the time of the
/// poll and `transition_us` the time of the most recent transition, both on
/// a free-running 32-bit microsecond clock that is allowed to wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawSample {
    pub step: i32,
    pub step_us: u32,
    pub transition_us: u32,
    pub direction: Direction,
}

/// Pull-based sampler of a quadrature capture peripheral.
///
/// Reads never block and never fail: the peripheral keeps decoding in the
/// background and a read returns whatever was captured last.
pub trait CaptureSource {
    fn read_raw_sample(&mut self) -> RawSample;
}

impl<T: CaptureSource + ?Sized> CaptureSource for Box<T> {
    fn read_raw_sample(&mut self) -> RawSample {
        (**self).read_raw_sample()
    }
}

/// Direction pin plus 8-bit speed output of a DC motor driver.
pub trait MotorOutput {
    fn set_direction(&mut self, reverse: bool)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn set_duty(&mut self, duty: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: MotorOutput + ?Sized> MotorOutput for Box<T> {
    fn set_direction(
        &mut self,
        reverse: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_direction(reverse)
    }
    fn set_duty(&mut self, duty: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_duty(duty)
    }
}

/// Fixed-period pulse train, as used to position a hobby servo.
pub trait PulseOutput {
    /// Drive `pulse_us` high at the start of every `period_us`.
    fn set_pulse(
        &mut self,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    /// Stop pulsing and leave the line low.
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<T: PulseOutput + ?Sized> PulseOutput for Box<T> {
    fn set_pulse(
        &mut self,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_pulse(period_us, pulse_us)
    }
    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).release()
    }
}
