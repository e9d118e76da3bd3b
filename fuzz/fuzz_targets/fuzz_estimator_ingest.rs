#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use substep_core::{EstimatorCfg, Estimator, PhaseSizes};
use substep_traits::{Direction, RawSample};

#[derive(Debug, Arbitrary)]
struct Poll {
    step: i32,
    step_us: u32,
    transition_us: u32,
    forward: bool,
}

#[derive(Debug, Arbitrary)]
struct Input {
    phases: i32,
    idle_stop_samples: u8,
    polls: Vec<Poll>,
}

fn sample(p: &Poll) -> RawSample {
    RawSample {
        step: p.step,
        step_us: p.step_us,
        transition_us: p.transition_us,
        direction: if p.forward {
            Direction::Forward
        } else {
            Direction::Reverse
        },
    }
}

fuzz_target!(|input: Input| {
    // Arbitrary, even garbage, capture data and phase tables must never panic.
    let Some((first, rest)) = input.polls.split_first() else {
        return;
    };
    let cfg = EstimatorCfg {
        idle_stop_samples: u32::from(input.idle_stop_samples).max(1),
        ..EstimatorCfg::default()
    };
    let mut est = Estimator::new(sample(first), cfg, PhaseSizes::decode(input.phases));
    for p in rest {
        est.ingest(sample(p));
        let _ = est.position_substeps();
        let _ = est.speed_substeps_per_sec();
    }
});
