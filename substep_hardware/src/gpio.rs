//! Raspberry Pi GPIO backends (rppal).
//!
//! Channel A is `first_pin` and channel B the pin after it. Both lines raise
//! async interrupts on either edge; the handlers feed one shared
//! [`QuadDecoder`], so the estimator only ever sees pulled snapshots.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use substep_traits::clock::{Clock, MonotonicClock};
use substep_traits::{CaptureSource, MotorOutput, PulseOutput, RawSample};

use crate::error::{HwError, Result};
use crate::quadrature::QuadDecoder;

struct Lines {
    a: bool,
    b: bool,
    decoder: QuadDecoder,
}

fn lock(lines: &Mutex<Lines>) -> MutexGuard<'_, Lines> {
    match lines.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub struct GpioCapture {
    // Held so the interrupts stay registered.
    _pin_a: InputPin,
    _pin_b: InputPin,
    lines: Arc<Mutex<Lines>>,
    epoch: Instant,
    clock: MonotonicClock,
}

impl GpioCapture {
    pub fn open(first_pin: u8, pull_up: bool) -> Result<Self> {
        let second = first_pin
            .checked_add(1)
            .ok_or(HwError::PinPair { pin: first_pin })?;
        let gpio = Gpio::new().map_err(gpio_err)?;
        let input = |pin: u8| -> Result<InputPin> {
            let p = gpio.get(pin).map_err(gpio_err)?;
            Ok(if pull_up {
                p.into_input_pullup()
            } else {
                p.into_input()
            })
        };
        let mut pin_a = input(first_pin)?;
        let mut pin_b = input(second)?;

        let clock = MonotonicClock::new();
        let epoch = clock.now();
        let a = pin_a.is_high();
        let b = pin_b.is_high();
        let lines = Arc::new(Mutex::new(Lines {
            a,
            b,
            decoder: QuadDecoder::new(a, b, 0),
        }));

        let shared = Arc::clone(&lines);
        pin_a
            .set_async_interrupt(Trigger::Both, move |level: Level| {
                let at = clock.micros_since(epoch);
                let mut l = lock(&shared);
                l.a = level == Level::High;
                let (a, b) = (l.a, l.b);
                l.decoder.edge(a, b, at);
            })
            .map_err(gpio_err)?;

        let shared = Arc::clone(&lines);
        pin_b
            .set_async_interrupt(Trigger::Both, move |level: Level| {
                let at = clock.micros_since(epoch);
                let mut l = lock(&shared);
                l.b = level == Level::High;
                let (a, b) = (l.a, l.b);
                l.decoder.edge(a, b, at);
            })
            .map_err(gpio_err)?;

        tracing::info!(pin_a = first_pin, pin_b = second, pull_up, "gpio capture open");
        Ok(Self {
            _pin_a: pin_a,
            _pin_b: pin_b,
            lines,
            epoch,
            clock,
        })
    }

    /// Edges where both lines changed between interrupts.
    pub fn decode_errors(&self) -> u32 {
        lock(&self.lines).decoder.errors()
    }
}

impl CaptureSource for GpioCapture {
    fn read_raw_sample(&mut self) -> RawSample {
        let now = self.clock.micros_since(self.epoch);
        lock(&self.lines).decoder.sample(now)
    }
}

/// H-bridge style motor: one direction pin and one software-PWM pin.
pub struct GpioMotor {
    dir: OutputPin,
    pwm: OutputPin,
    pwm_hz: f64,
}

impl GpioMotor {
    pub fn open(dir_pin: u8, pwm_pin: u8, pwm_hz: f64) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output();
        let mut pwm = gpio.get(pwm_pin).map_err(gpio_err)?.into_output();
        dir.set_low();
        pwm.set_low();
        Ok(Self { dir, pwm, pwm_hz })
    }
}

impl MotorOutput for GpioMotor {
    fn set_direction(
        &mut self,
        reverse: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if reverse {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        Ok(())
    }

    fn set_duty(
        &mut self,
        duty: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if duty == 0 {
            self.pwm.clear_pwm().map_err(|e| HwError::Pwm(e.to_string()))?;
            self.pwm.set_low();
            return Ok(());
        }
        self.pwm
            .set_pwm_frequency(self.pwm_hz, f64::from(duty) / 255.0)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(())
    }
}

/// Hobby servo on one pin, pulsed by rppal's software PWM.
pub struct GpioServo {
    pin: OutputPin,
}

impl GpioServo {
    pub fn open(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        pin.set_low();
        Ok(Self { pin })
    }
}

impl PulseOutput for GpioServo {
    fn set_pulse(
        &mut self,
        period_us: u32,
        pulse_us: u32,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin
            .set_pwm(
                Duration::from_micros(u64::from(period_us)),
                Duration::from_micros(u64::from(pulse_us)),
            )
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        Ok(())
    }

    fn release(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pin.clear_pwm().map_err(|e| HwError::Pwm(e.to_string()))?;
        self.pin.set_low();
        Ok(())
    }
}
