//! Gray-code quadrature decoding.
//!
//! Channel A and B levels form a 2-bit state that walks the sequence
//! `00 -> 01 -> 11 -> 10` going forward. Each valid move is one raw step;
//! a move across two states (both lines changed between edges) cannot be
//! attributed to a direction and is counted as an error.

use substep_traits::{Direction, RawSample};

/// Position of each `a << 1 | b` state along the forward sequence.
const SEQUENCE_INDEX: [i32; 4] = [0, 1, 3, 2];

#[derive(Debug, Clone)]
pub struct QuadDecoder {
    state: u8,
    step: i32,
    transition_us: u32,
    direction: Direction,
    errors: u32,
}

impl QuadDecoder {
    /// Start from the current line levels. The step counter starts at the
    /// state's sequence index so that `step & 3` always names the phase.
    pub fn new(a: bool, b: bool, now_us: u32) -> Self {
        let state = Self::state_of(a, b);
        Self {
            state,
            step: SEQUENCE_INDEX[state as usize],
            transition_us: now_us,
            direction: Direction::Forward,
            errors: 0,
        }
    }

    #[inline]
    fn state_of(a: bool, b: bool) -> u8 {
        (u8::from(a) << 1) | u8::from(b)
    }

    /// Feed the line levels seen at an edge.
    pub fn edge(&mut self, a: bool, b: bool, at_us: u32) {
        let next = Self::state_of(a, b);
        let moved = (SEQUENCE_INDEX[next as usize] - SEQUENCE_INDEX[self.state as usize]).rem_euclid(4);
        match moved {
            0 => return,
            1 => {
                self.step = self.step.wrapping_add(1);
                self.direction = Direction::Forward;
            }
            3 => {
                self.step = self.step.wrapping_sub(1);
                self.direction = Direction::Reverse;
            }
            _ => {
                self.errors = self.errors.saturating_add(1);
                tracing::warn!(state = self.state, next, "quadrature state skipped");
                self.state = next;
                return;
            }
        }
        self.state = next;
        self.transition_us = at_us;
    }

    /// Snapshot as a capture sample polled at `now_us`.
    pub fn sample(&self, now_us: u32) -> RawSample {
        RawSample {
            step: self.step,
            step_us: now_us,
            transition_us: self.transition_us,
            direction: self.direction,
        }
    }

    pub fn step(&self) -> i32 {
        self.step
    }

    /// Edges where both lines changed at once.
    pub fn errors(&self) -> u32 {
        self.errors
    }
}
