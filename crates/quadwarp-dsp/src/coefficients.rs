/// Scalar coefficient vectors and the per-voice block-rate tracker.
///
/// The family-specific `coefficients()` functions are pure: parameters in,
/// `CoeffVector` out. `CoefficientMaker` keeps the one piece of history
/// needed to turn a stream of per-block targets into per-sample ramps:
///
///   dC = (target - C_at_block_start) / block_size
///
/// Each block it re-anchors the lane at the previous target, so float
/// accumulation in `CoefficientRamp::advance` cannot drift across blocks.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::registers::{FilterUnit, SlotIndex, N_COEFFS};
use crate::tuning::{pitch_to_frequency, TuningProvider};

/// Block size used when the host does not specify one.
pub const DEFAULT_BLOCK_SIZE: usize = 32;

/// Lowest cutoff either family computes coefficients for.
pub const MIN_CUTOFF_HZ: f32 = 5.0;

/// Highest cutoff as a fraction of the sample rate. Keeps the prewarp and
/// biquad trig arguments well inside the fast-math valid range.
pub const MAX_CUTOFF_RATIO: f32 = 0.3;

/// Cutoff frequency for `pitch` (semitones from A440), clamped to
/// `[MIN_CUTOFF_HZ, MAX_CUTOFF_RATIO * sample_rate]`.
///
/// The upper bound wins when the sample rate is too low for both to hold.
pub fn clamped_frequency<T: TuningProvider>(pitch: f32, sample_rate: f32, provider: &T) -> f32 {
    let freq = pitch_to_frequency(pitch, provider);
    let hi = sample_rate * MAX_CUTOFF_RATIO;
    // f32::min/max drop a NaN operand, so this never panics.
    freq.max(MIN_CUTOFF_HZ).min(hi)
}

/// One voice's coefficient values, indexed by the family's slot enum.
#[derive(Clone, Copy)]
pub struct CoeffVector<C> {
    values: [f32; N_COEFFS],
    _index: PhantomData<fn() -> C>,
}

impl<C: SlotIndex> CoeffVector<C> {
    pub fn zeroed() -> Self {
        Self {
            values: [0.0; N_COEFFS],
            _index: PhantomData,
        }
    }

    /// Unindexed view, in slot order.
    pub fn raw(&self) -> &[f32; N_COEFFS] {
        &self.values
    }
}

impl<C: SlotIndex> Default for CoeffVector<C> {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl<C> PartialEq for CoeffVector<C> {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl<C> std::fmt::Debug for CoeffVector<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

impl<C: SlotIndex> Index<C> for CoeffVector<C> {
    type Output = f32;

    fn index(&self, idx: C) -> &f32 {
        &self.values[idx.slot()]
    }
}

impl<C: SlotIndex> IndexMut<C> for CoeffVector<C> {
    fn index_mut(&mut self, idx: C) -> &mut f32 {
        &mut self.values[idx.slot()]
    }
}

/// Turns per-block coefficient targets into block-start values + per-sample deltas.
#[derive(Clone, Copy, Debug)]
pub struct CoefficientMaker<C> {
    /// Value the lane holds at the start of the current block.
    block_start: CoeffVector<C>,
    /// Per-sample increment towards `target`.
    delta: CoeffVector<C>,
    /// Most recent target; becomes next block's `block_start`.
    target: CoeffVector<C>,
    block_size_inv: f32,
    first_run: bool,
}

impl<C: SlotIndex> CoefficientMaker<C> {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_start: CoeffVector::zeroed(),
            delta: CoeffVector::zeroed(),
            target: CoeffVector::zeroed(),
            block_size_inv: 1.0 / block_size.max(1) as f32,
            first_run: true,
        }
    }

    /// End the ramp in progress: hold the latest target with a zero delta.
    ///
    /// Unlike `reset`, the next target still ramps from here.
    pub fn settle(&mut self) {
        self.block_start = self.target;
        self.delta = CoeffVector::zeroed();
    }

    /// Forget history: the next target is applied instantly, without a ramp.
    pub fn reset(&mut self) {
        self.first_run = true;
        self.delta = CoeffVector::zeroed();
    }

    /// Register this block's target.
    ///
    /// The first target after construction or `reset` jumps straight in with
    /// a zero delta. Later targets ramp from the previous one.
    pub fn from_direct(&mut self, target: CoeffVector<C>) {
        if self.first_run {
            self.block_start = target;
            self.delta = CoeffVector::zeroed();
            self.first_run = false;
        } else {
            self.block_start = self.target;
            for i in 0..N_COEFFS {
                self.delta.values[i] =
                    (target.values[i] - self.block_start.values[i]) * self.block_size_inv;
            }
        }
        self.target = target;
    }

    /// Copy block-start values and deltas into `lane` of a filter unit.
    pub fn update_state<R: SlotIndex, const NR: usize>(
        &self,
        unit: &mut FilterUnit<C, R, NR>,
        lane: usize,
    ) {
        unit.coeffs.load_lane(lane, &self.block_start, &self.delta);
    }

    pub fn block_start(&self) -> &CoeffVector<C> {
        &self.block_start
    }

    pub fn delta(&self) -> &CoeffVector<C> {
        &self.delta
    }

    pub fn target(&self) -> &CoeffVector<C> {
        &self.target
    }
}
