//! Relative quadrature phase sizes.
//!
//! One quadrature cycle (four raw steps) spans 256 substeps. On a perfect
//! encoder each phase is 64 substeps wide; real encoders are not, so the
//! widths are measured and stored as four sizes in 1/256ths of a cycle.
//!
//! Packed form (what `measure_phases` returns and `set_phases` accepts):
//! `s0 | s1 << 8 | s2 << 16`, with `s3 = 256 - s0 - s1 - s2` implied.

/// Substeps per raw step on a uniform encoder.
pub const SUBSTEPS_PER_STEP: i32 = 64;
/// Substeps per quadrature cycle.
pub const SUBSTEPS_PER_CYCLE: u32 = 256;

/// Sizes of the four phases, in 1/256ths of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhaseSizes([u8; 3]);

impl Default for PhaseSizes {
    fn default() -> Self {
        Self::UNIFORM
    }
}

impl PhaseSizes {
    pub const UNIFORM: PhaseSizes = PhaseSizes([64, 64, 64]);

    /// Build from the first three sizes; the fourth is what remains of 256.
    /// Returns `None` unless every phase is at least one unit wide.
    pub fn new(s0: u8, s1: u8, s2: u8) -> Option<Self> {
        let used = u32::from(s0) + u32::from(s1) + u32::from(s2);
        if s0 == 0 || s1 == 0 || s2 == 0 || used >= SUBSTEPS_PER_CYCLE {
            return None;
        }
        Some(Self([s0, s1, s2]))
    }

    /// Build from cumulative phase start offsets `[o1, o2, o3]`
    /// (phase 0 always starts at 0).
    pub fn from_offsets(o1: u32, o2: u32, o3: u32) -> Option<Self> {
        if !(0 < o1 && o1 < o2 && o2 < o3 && o3 < SUBSTEPS_PER_CYCLE) {
            return None;
        }
        Self::new(o1 as u8, (o2 - o1) as u8, (o3 - o2) as u8)
    }

    /// All four sizes.
    pub fn sizes(&self) -> [u32; 4] {
        let [s0, s1, s2] = self.0.map(u32::from);
        [
            s0,
            s1,
            s2,
            SUBSTEPS_PER_CYCLE.wrapping_sub(s0 + s1 + s2),
        ]
    }

    /// Packed integer form; always positive.
    pub fn encode(&self) -> i32 {
        let [s0, s1, s2] = self.0.map(i32::from);
        s0 | (s1 << 8) | (s2 << 16)
    }

    /// Inverse of [`encode`](Self::encode). Only the low 24 bits are read; an
    /// integer that was not produced by `encode` decodes to some table without
    /// panicking.
    pub fn decode(phases: i32) -> Self {
        let p = phases as u32;
        Self([(p & 0xFF) as u8, ((p >> 8) & 0xFF) as u8, ((p >> 16) & 0xFF) as u8])
    }
}

/// Phase start offsets within a cycle, derived from [`PhaseSizes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTable {
    offsets: [i32; 4],
}

impl Default for PhaseTable {
    fn default() -> Self {
        Self::from(PhaseSizes::UNIFORM)
    }
}

impl From<PhaseSizes> for PhaseTable {
    fn from(sizes: PhaseSizes) -> Self {
        let [s0, s1, s2, _] = sizes.sizes().map(|s| s as i32);
        Self {
            offsets: [0, s0, s0 + s1, s0 + s1 + s2],
        }
    }
}

impl PhaseTable {
    pub fn offsets(&self) -> [i32; 4] {
        self.offsets
    }

    /// Substep position where raw step `step` begins.
    #[inline]
    pub fn step_start(&self, step: i32) -> i32 {
        let cycle_base = (step << 6) & !0xFF;
        cycle_base.wrapping_add(self.offsets[(step & 3) as usize])
    }
}
