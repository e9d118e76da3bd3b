//! Simulated encoder shaft and DC motor.
//!
//! The shaft angle is tracked in quadrature cycles (four raw steps). Within a
//! cycle the four phases take up space in proportion to `phase_weights`, so a
//! shaft turning at constant speed spends unequal time in each phase the way
//! a real, imperfect encoder does. Transition times are solved exactly from
//! the constant speed between two polls rather than sampled.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use substep_traits::clock::Clock;
use substep_traits::{CaptureSource, Direction, MotorOutput, PulseOutput, RawSample};

/// Shared shaft speed in raw steps per second (f64 stored as bits).
#[derive(Debug, Clone, Default)]
pub struct SpeedHandle(Arc<AtomicU64>);

impl SpeedHandle {
    pub fn set(&self, steps_per_sec: f64) {
        let v = if steps_per_sec.is_finite() {
            steps_per_sec
        } else {
            0.0
        };
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

pub struct SimulatedEncoder<K: Clock> {
    clock: K,
    epoch: Instant,
    speed: SpeedHandle,
    /// Cumulative phase starts within a cycle, normalized to [0, 1).
    bounds: [f64; 4],
    /// Shaft angle in cycles.
    angle: f64,
    last_us: u32,
    step: i32,
    transition_us: u32,
    direction: Direction,
}

impl<K: Clock> SimulatedEncoder<K> {
    /// Shaft at rest in the middle of `start_step`. Non-positive or
    /// non-finite weights fall back to equal phases.
    pub fn new(clock: K, start_step: i32, phase_weights: [f64; 4]) -> Self {
        let weights = if phase_weights.iter().all(|w| w.is_finite() && *w > 0.0) {
            phase_weights
        } else {
            [1.0; 4]
        };
        let total: f64 = weights.iter().sum();
        let mut bounds = [0.0; 4];
        let mut acc = 0.0;
        for (b, w) in bounds.iter_mut().zip(weights) {
            *b = acc / total;
            acc += w;
        }
        let epoch = clock.now();
        let mut sim = Self {
            clock,
            epoch,
            speed: SpeedHandle::default(),
            bounds,
            angle: 0.0,
            last_us: 0,
            step: start_step,
            transition_us: 0,
            direction: Direction::Forward,
        };
        let lo = sim.step_start(start_step);
        let hi = sim.step_start(start_step.wrapping_add(1));
        sim.angle = (lo + hi) / 2.0;
        sim
    }

    /// Share a speed handle, e.g. with a [`SimulatedMotor`].
    pub fn with_speed(mut self, speed: SpeedHandle) -> Self {
        self.speed = speed;
        self
    }

    pub fn speed_handle(&self) -> SpeedHandle {
        self.speed.clone()
    }

    /// Angle (in cycles) where raw step `step` begins.
    fn step_start(&self, step: i32) -> f64 {
        let cycle = f64::from(step.div_euclid(4));
        cycle + self.bounds[step.rem_euclid(4) as usize]
    }

    fn step_at(&self, angle: f64) -> i32 {
        let cycle = angle.floor();
        let frac = angle - cycle;
        let phase = self.bounds.iter().rposition(|b| *b <= frac).unwrap_or(0);
        (cycle as i32).wrapping_mul(4).wrapping_add(phase as i32)
    }

    /// Move the shaft to `now_us` at the current speed.
    fn advance(&mut self, now_us: u32) {
        let dt_us = now_us.wrapping_sub(self.last_us);
        let cycles_per_us = self.speed.get() / 4.0 / 1e6;
        let from = self.angle;
        self.angle += cycles_per_us * f64::from(dt_us);
        self.last_us = now_us;

        let step = self.step_at(self.angle);
        if step == self.step || cycles_per_us == 0.0 {
            return;
        }
        let (edge, direction) = if step > self.step {
            (self.step_start(step), Direction::Forward)
        } else {
            (self.step_start(step.wrapping_add(1)), Direction::Reverse)
        };
        let offset_us = ((edge - from) / cycles_per_us).clamp(0.0, f64::from(dt_us));
        self.transition_us = now_us.wrapping_sub(dt_us).wrapping_add(offset_us as u32);
        self.direction = direction;
        self.step = step;
    }
}

impl<K: Clock> CaptureSource for SimulatedEncoder<K> {
    fn read_raw_sample(&mut self) -> RawSample {
        let now = self.clock.micros_since(self.epoch);
        self.advance(now);
        RawSample {
            step: self.step,
            step_us: now,
            transition_us: self.transition_us,
            direction: self.direction,
        }
    }
}

/// DC motor driving a simulated shaft: duty 255 is `max_steps_per_sec`.
pub struct SimulatedMotor {
    speed: SpeedHandle,
    max_steps_per_sec: f64,
    reverse: bool,
    duty: u8,
}

impl SimulatedMotor {
    pub fn new(speed: SpeedHandle, max_steps_per_sec: f64) -> Self {
        Self {
            speed,
            max_steps_per_sec,
            reverse: false,
            duty: 0,
        }
    }

    fn apply(&self) {
        let mag = f64::from(self.duty) / 255.0 * self.max_steps_per_sec;
        self.speed.set(if self.reverse { -mag } else { mag });
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }
}

impl MotorOutput for SimulatedMotor {
    fn set_direction(
        &mut self,
        reverse: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.reverse = reverse;
        self.apply();
        Ok(())
    }

    fn set_duty(&mut self, duty: u8) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.duty = duty;
        self.apply();
        tracing::trace!(duty, reverse = self.reverse, "simulated motor");
        Ok(())
    }
}

/// Servo pulse output that only remembers the pulse train it would send.
#[derive(Debug, Clone, Default)]
pub struct SimulatedServo {
    /// `(period_us, pulse_us)` while pulsing.
    pulse: Option<(u32, u32)>,
}

impl SimulatedServo {
    pub fn pulse(&self) -> Option<(u32, u32)> {
        self.pulse
    }
}

impl PulseOutput for SimulatedServo {
    fn set_pulse(
        &mut self,
        period_us: u32,
        pulse_us: u32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pulse = Some((period_us, pulse_us));
        tracing::trace!(period_us, pulse_us, "simulated servo");
        Ok(())
    }

    fn release(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.pulse = None;
        Ok(())
    }
}
