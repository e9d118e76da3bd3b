use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("pin {pin} has no neighbour to use as channel B")]
    PinPair { pin: u8 },
    #[error("pwm error: {0}")]
    Pwm(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
