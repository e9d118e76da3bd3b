//! Test and helper capture sources for substep_core

use std::collections::VecDeque;

use substep_traits::{CaptureSource, Direction, RawSample};

/// Plays back a fixed list of samples.
///
/// Once the script runs out the last sample is repeated with its poll time
/// advanced by `idle_tick_us` per read, so a drained script looks like a
/// stalled shaft rather than a frozen clock.
#[derive(Debug, Clone)]
pub struct ScriptedCapture {
    samples: VecDeque<RawSample>,
    last: RawSample,
    idle_tick_us: u32,
}

impl ScriptedCapture {
    pub fn new<I: IntoIterator<Item = RawSample>>(samples: I) -> Self {
        let samples: VecDeque<RawSample> = samples.into_iter().collect();
        let last = samples.front().copied().unwrap_or_default();
        Self {
            samples,
            last,
            idle_tick_us: 1_000,
        }
    }

    pub fn with_idle_tick_us(mut self, tick: u32) -> Self {
        self.idle_tick_us = tick;
        self
    }

    pub fn push(&mut self, sample: RawSample) {
        self.samples.push_back(sample);
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl CaptureSource for ScriptedCapture {
    fn read_raw_sample(&mut self) -> RawSample {
        match self.samples.pop_front() {
            Some(s) => {
                self.last = s;
                s
            }
            None => {
                self.last.step_us = self.last.step_us.wrapping_add(self.idle_tick_us);
                self.last
            }
        }
    }
}

/// `count + 1` samples of a shaft turning at one raw step per `interval_us`,
/// each polled exactly at its transition. The first sample sits on
/// `start_step` at time 0.
pub fn steady_rotation(
    start_step: i32,
    count: u32,
    interval_us: u32,
    direction: Direction,
) -> Vec<RawSample> {
    let inc = if direction.is_forward() { 1 } else { -1 };
    (0..=count)
        .map(|i| {
            let t = i.wrapping_mul(interval_us);
            RawSample {
                step: start_step.wrapping_add(inc * i as i32),
                step_us: t,
                transition_us: t,
                direction,
            }
        })
        .collect()
}

/// Like [`steady_rotation`], but with `polls_per_step` evenly spaced polls
/// per raw step (the first on the transition itself).
pub fn oversampled_rotation(
    start_step: i32,
    count: u32,
    interval_us: u32,
    polls_per_step: u32,
    direction: Direction,
) -> Vec<RawSample> {
    let polls = polls_per_step.max(1);
    let inc = if direction.is_forward() { 1 } else { -1 };
    let mut out = Vec::with_capacity((count as usize + 1) * polls as usize);
    for i in 0..=count {
        let transition_us = i.wrapping_mul(interval_us);
        for k in 0..polls {
            out.push(RawSample {
                step: start_step.wrapping_add(inc * i as i32),
                step_us: transition_us.wrapping_add(k * interval_us / polls),
                transition_us,
                direction,
            });
        }
    }
    out
}
