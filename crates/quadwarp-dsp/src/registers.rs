//! Per-instance filter state: unit-delay registers plus the coefficient ramp.
//!
//! Both containers are typed by the enum that indexes them. A K35 register
//! index cannot be used on a ResonanceWarp register file, because the index
//! type is part of the container type. Slot counts differ per family (3 vs 8
//! registers), so indices are the easiest place to make a silent mistake.
//!
//! Per-sample driver contract:
//!   advance every coefficient by its per-sample delta -> run the recurrence
//!   -> mutate registers in place -> return one lane group.
//! No allocation, no locking, no global state.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

use crate::coefficients::CoeffVector;
use crate::lanes::{Lanes, LANES};

/// Coefficient slots per filter unit (shared by all families).
pub const N_COEFFS: usize = 8;

/// Named slot in a coefficient vector or register file.
pub trait SlotIndex: Copy {
    fn slot(self) -> usize;
}

/// Unit-delay storage for one filter instance.
#[derive(Clone, Copy)]
pub struct RegisterFile<R, const N: usize> {
    slots: [Lanes; N],
    _index: PhantomData<fn() -> R>,
}

impl<R: SlotIndex, const N: usize> RegisterFile<R, N> {
    pub fn new() -> Self {
        Self {
            slots: [Lanes::ZERO; N],
            _index: PhantomData,
        }
    }

    pub fn reset(&mut self) {
        self.slots = [Lanes::ZERO; N];
    }

    pub fn as_slice(&self) -> &[Lanes] {
        &self.slots
    }
}

impl<R: SlotIndex, const N: usize> Default for RegisterFile<R, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SlotIndex, const N: usize> PartialEq for RegisterFile<R, N> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<R, const N: usize> std::fmt::Debug for RegisterFile<R, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.slots.iter()).finish()
    }
}

impl<R: SlotIndex, const N: usize> Index<R> for RegisterFile<R, N> {
    type Output = Lanes;

    #[inline]
    fn index(&self, idx: R) -> &Lanes {
        &self.slots[idx.slot()]
    }
}

impl<R: SlotIndex, const N: usize> IndexMut<R> for RegisterFile<R, N> {
    #[inline]
    fn index_mut(&mut self, idx: R) -> &mut Lanes {
        &mut self.slots[idx.slot()]
    }
}

/// Current coefficients `C` and per-sample deltas `dC`, one value per lane.
///
/// Each lane is fed by its own voice's `CoefficientMaker` once per block;
/// `advance` then walks `C` towards that voice's target one sample at a time.
#[derive(Clone, Copy)]
pub struct CoefficientRamp<C> {
    current: [Lanes; N_COEFFS],
    delta: [Lanes; N_COEFFS],
    _index: PhantomData<fn() -> C>,
}

impl<C: SlotIndex> CoefficientRamp<C> {
    pub fn new() -> Self {
        Self {
            current: [Lanes::ZERO; N_COEFFS],
            delta: [Lanes::ZERO; N_COEFFS],
            _index: PhantomData,
        }
    }

    pub fn reset(&mut self) {
        self.current = [Lanes::ZERO; N_COEFFS];
        self.delta = [Lanes::ZERO; N_COEFFS];
    }

    /// `C += dC` for every slot.
    #[inline]
    pub fn advance(&mut self) {
        for (c, dc) in self.current.iter_mut().zip(self.delta.iter()) {
            *c += *dc;
        }
    }

    /// Per-sample delta of one slot.
    #[inline]
    pub fn delta(&self, idx: C) -> Lanes {
        self.delta[idx.slot()]
    }

    /// Set one slot directly, all lanes at once.
    pub fn set(&mut self, idx: C, current: Lanes, delta: Lanes) {
        self.current[idx.slot()] = current;
        self.delta[idx.slot()] = delta;
    }

    /// Load one voice's block-start coefficients and deltas into `lane`.
    pub fn load_lane(&mut self, lane: usize, current: &CoeffVector<C>, delta: &CoeffVector<C>) {
        debug_assert!(lane < LANES);
        for i in 0..N_COEFFS {
            self.current[i] = self.current[i].with_lane(lane, current.raw()[i]);
            self.delta[i] = self.delta[i].with_lane(lane, delta.raw()[i]);
        }
    }
}

impl<C: SlotIndex> Default for CoefficientRamp<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> std::fmt::Debug for CoefficientRamp<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoefficientRamp")
            .field("current", &self.current)
            .field("delta", &self.delta)
            .finish()
    }
}

impl<C: SlotIndex> Index<C> for CoefficientRamp<C> {
    type Output = Lanes;

    #[inline]
    fn index(&self, idx: C) -> &Lanes {
        &self.current[idx.slot()]
    }
}

/// Complete mutable state of one lane-parallel filter instance.
///
/// `C` indexes coefficients, `R` indexes registers, `NR` is the register
/// count. Exclusively owned by one filter; never shared between instances.
#[derive(Clone, Copy, Debug)]
pub struct FilterUnit<C, R, const NR: usize> {
    pub coeffs: CoefficientRamp<C>,
    pub regs: RegisterFile<R, NR>,
}

impl<C: SlotIndex, R: SlotIndex, const NR: usize> FilterUnit<C, R, NR> {
    pub fn new() -> Self {
        Self {
            coeffs: CoefficientRamp::new(),
            regs: RegisterFile::new(),
        }
    }

    /// Back to the all-zero state a fresh unit starts in.
    pub fn reset(&mut self) {
        self.coeffs.reset();
        self.regs.reset();
    }

    /// Advance coefficients, then run `recurrence` on the updated values.
    #[inline]
    pub fn step(
        &mut self,
        input: Lanes,
        recurrence: impl FnOnce(&CoefficientRamp<C>, &mut RegisterFile<R, NR>, Lanes) -> Lanes,
    ) -> Lanes {
        self.coeffs.advance();
        recurrence(&self.coeffs, &mut self.regs, input)
    }

    /// Run `recurrence` on the current values, then advance coefficients.
    ///
    /// Same once-per-call ramp as `step`, but the first sample of a block sees
    /// the block-start coefficients.
    #[inline]
    pub fn step_post_ramp(
        &mut self,
        input: Lanes,
        recurrence: impl FnOnce(&CoefficientRamp<C>, &mut RegisterFile<R, NR>, Lanes) -> Lanes,
    ) -> Lanes {
        let out = recurrence(&self.coeffs, &mut self.regs, input);
        self.coeffs.advance();
        out
    }
}

impl<C: SlotIndex, R: SlotIndex, const NR: usize> Default for FilterUnit<C, R, NR> {
    fn default() -> Self {
        Self::new()
    }
}
