//! QuadFilter: one filter family, four voices.
//!
//! Owns the unit state, one `CoefficientMaker` per lane and the process
//! routine picked for the configured type. Hosts call `set_params` (or
//! `set_lane_params` per voice) once per block, then `process` once per
//! sample. Each parameter call re-targets the lane's coefficient ramp, which
//! lands exactly on the new target after `block_size` samples and then holds
//! there until the next call.

use crate::coefficients::{CoefficientMaker, DEFAULT_BLOCK_SIZE};
use crate::error::{FilterError, FilterResult};
use crate::k35::{self, K35Coeff, K35Mode, K35Unit};
use crate::lanes::{Lanes, LANES};
use crate::registers::{FilterUnit, SlotIndex};
use crate::resonance_warp::{self, WarpCoeff, WarpResponse, WarpSubtype, WarpUnit};
use crate::tuning::{EqualTemperament, TuningProvider};

/// Host family selector codes.
pub const FAMILY_K35: u8 = 0;
pub const FAMILY_RESONANCE_WARP: u8 = 1;

/// Family, response and subtype of a filter instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterType {
    /// `saturation` is the initial tanh drive; 0 is a clean linear filter.
    K35 { mode: K35Mode, saturation: f32 },
    ResonanceWarp {
        response: WarpResponse,
        subtype: WarpSubtype,
    },
}

impl FilterType {
    /// Decode host selector integers.
    ///
    /// `subtype` is ignored for K35, `saturation` for ResonanceWarp.
    pub fn from_codes(family: u8, response: u8, subtype: u8, saturation: f32) -> FilterResult<Self> {
        match family {
            FAMILY_K35 => Ok(FilterType::K35 {
                mode: K35Mode::try_from(response)?,
                saturation,
            }),
            FAMILY_RESONANCE_WARP => Ok(FilterType::ResonanceWarp {
                response: WarpResponse::try_from(response)?,
                subtype: WarpSubtype::from_bits(subtype)?,
            }),
            _ => Err(FilterError::UnknownFamily(family)),
        }
    }
}

enum Engine {
    K35 {
        unit: K35Unit,
        makers: [CoefficientMaker<K35Coeff>; LANES],
        process: fn(&mut K35Unit, Lanes) -> Lanes,
        mode: K35Mode,
        saturation: [f32; LANES],
    },
    Warp {
        unit: WarpUnit,
        makers: [CoefficientMaker<WarpCoeff>; LANES],
        process: fn(&mut WarpUnit, Lanes) -> Lanes,
        response: WarpResponse,
    },
}

/// Four-voice filter instance.
pub struct QuadFilter {
    engine: Engine,
    filter_type: FilterType,
    sample_rate: f32,
    block_size: usize,
    /// Samples left in each lane's ramp; 0 once the lane holds its target.
    ramp_left: [usize; LANES],
}

impl QuadFilter {
    /// Build a filter; `block_size` of 0 selects `DEFAULT_BLOCK_SIZE`.
    ///
    /// Every lane starts at A440 with zero resonance. The first parameter
    /// call per lane then applies without a ramp. Cutoffs are clamped to the
    /// sample rate, but the rate itself must be positive and finite.
    pub fn new(filter_type: FilterType, sample_rate: f32, block_size: usize) -> FilterResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(FilterError::InvalidSampleRate(sample_rate));
        }
        let block_size = if block_size == 0 { DEFAULT_BLOCK_SIZE } else { block_size };
        let engine = match filter_type {
            FilterType::K35 { mode, saturation } => Engine::K35 {
                unit: K35Unit::new(),
                makers: [CoefficientMaker::new(block_size); LANES],
                process: k35::process_fn(mode),
                mode,
                saturation: [saturation; LANES],
            },
            FilterType::ResonanceWarp { response, subtype } => Engine::Warp {
                unit: WarpUnit::new(),
                makers: [CoefficientMaker::new(block_size); LANES],
                process: resonance_warp::process_fn(subtype),
                response,
            },
        };

        let mut filter = Self {
            engine,
            filter_type,
            sample_rate,
            block_size,
            ramp_left: [0; LANES],
        };
        // A zeroed K35 unit would divide by k = 0.
        filter.set_params(0.0, 0.0, &EqualTemperament);
        filter.reset();
        Ok(filter)
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Retarget one voice: cutoff `pitch` in semitones from A440, resonance 0..1.
    pub fn set_lane_params<T: TuningProvider>(
        &mut self,
        lane: usize,
        pitch: f32,
        reso: f32,
        provider: &T,
    ) -> FilterResult<()> {
        if lane >= LANES {
            return Err(FilterError::LaneOutOfRange { lane, lanes: LANES });
        }
        self.retarget(lane, pitch, reso, provider);
        Ok(())
    }

    /// Retarget all four voices to the same parameters.
    pub fn set_params<T: TuningProvider>(&mut self, pitch: f32, reso: f32, provider: &T) {
        for lane in 0..LANES {
            self.retarget(lane, pitch, reso, provider);
        }
    }

    /// Set one voice's K35 drive.
    ///
    /// The drive is a block-rate input like cutoff and resonance: it is picked
    /// up by that lane's next `set_lane_params`/`set_params` call and ramps in
    /// over the block. ResonanceWarp has no drive and ignores it.
    pub fn set_lane_saturation(&mut self, lane: usize, saturation: f32) -> FilterResult<()> {
        if lane >= LANES {
            return Err(FilterError::LaneOutOfRange { lane, lanes: LANES });
        }
        if let Engine::K35 { saturation: drive, .. } = &mut self.engine {
            drive[lane] = saturation;
        }
        Ok(())
    }

    /// Set the K35 drive of all four voices; see `set_lane_saturation`.
    pub fn set_saturation(&mut self, saturation: f32) {
        if let Engine::K35 { saturation: drive, .. } = &mut self.engine {
            *drive = [saturation; LANES];
        }
    }

    fn retarget<T: TuningProvider>(&mut self, lane: usize, pitch: f32, reso: f32, provider: &T) {
        let sample_rate = self.sample_rate;
        match &mut self.engine {
            Engine::K35 {
                unit,
                makers,
                mode,
                saturation,
                ..
            } => {
                let c = k35::coefficients(pitch, reso, *mode, saturation[lane], sample_rate, provider);
                makers[lane].from_direct(c);
                makers[lane].update_state(unit, lane);
            }
            Engine::Warp {
                unit,
                makers,
                response,
                ..
            } => {
                let c = resonance_warp::coefficients(pitch, reso, *response, sample_rate, provider);
                makers[lane].from_direct(c);
                makers[lane].update_state(unit, lane);
            }
        }
        self.ramp_left[lane] = self.block_size;
    }

    /// One sample for all four voices.
    #[inline]
    pub fn process(&mut self, input: Lanes) -> Lanes {
        let out = match &mut self.engine {
            Engine::K35 { unit, process, .. } => (*process)(unit, input),
            Engine::Warp { unit, process, .. } => (*process)(unit, input),
        };
        if self.ramp_left != [0; LANES] {
            self.count_down(1);
        }
        out
    }

    /// Filter `buffer` in place.
    pub fn process_block(&mut self, buffer: &mut [Lanes]) {
        let mut rest = buffer;
        while !rest.is_empty() {
            // Split at the next lane whose ramp ends so it can be settled in time.
            let n = self
                .ramp_left
                .iter()
                .copied()
                .filter(|&left| left > 0)
                .min()
                .map_or(rest.len(), |left| left.min(rest.len()));
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(n);
            self.run(head);
            self.count_down(n);
            rest = tail;
        }
    }

    fn run(&mut self, frames: &mut [Lanes]) {
        match &mut self.engine {
            Engine::K35 { unit, process, .. } => {
                let process = *process;
                for frame in frames.iter_mut() {
                    *frame = process(unit, *frame);
                }
            }
            Engine::Warp { unit, process, .. } => {
                let process = *process;
                for frame in frames.iter_mut() {
                    *frame = process(unit, *frame);
                }
            }
        }
    }

    /// Account for `n` processed samples; lanes whose ramp ran out snap to
    /// their target with a zero delta.
    fn count_down(&mut self, n: usize) {
        for lane in 0..LANES {
            let left = self.ramp_left[lane];
            match left {
                0 => {}
                left if left <= n => {
                    self.ramp_left[lane] = 0;
                    match &mut self.engine {
                        Engine::K35 { unit, makers, .. } => settle(unit, &mut makers[lane], lane),
                        Engine::Warp { unit, makers, .. } => settle(unit, &mut makers[lane], lane),
                    }
                }
                left => self.ramp_left[lane] = left - n,
            }
        }
    }

    /// Clear all delay registers and stop any ramp in progress.
    ///
    /// Coefficients snap to their latest targets. The next parameter call per
    /// lane applies immediately.
    pub fn reset(&mut self) {
        self.ramp_left = [0; LANES];
        match &mut self.engine {
            Engine::K35 { unit, makers, .. } => rearm(unit, makers),
            Engine::Warp { unit, makers, .. } => rearm(unit, makers),
        }
    }

    /// True when every delay register is zero.
    pub fn is_silent(&self) -> bool {
        let regs = match &self.engine {
            Engine::K35 { unit, .. } => unit.regs.as_slice(),
            Engine::Warp { unit, .. } => unit.regs.as_slice(),
        };
        regs.iter().all(|r| *r == Lanes::ZERO)
    }
}

fn settle<C: SlotIndex, R: SlotIndex, const NR: usize>(
    unit: &mut FilterUnit<C, R, NR>,
    maker: &mut CoefficientMaker<C>,
    lane: usize,
) {
    maker.settle();
    maker.update_state(unit, lane);
}

fn rearm<C: SlotIndex, R: SlotIndex, const NR: usize>(
    unit: &mut FilterUnit<C, R, NR>,
    makers: &mut [CoefficientMaker<C>; LANES],
) {
    unit.regs.reset();
    for (lane, maker) in makers.iter_mut().enumerate() {
        let target = *maker.target();
        maker.reset();
        maker.from_direct(target);
        maker.update_state(unit, lane);
        maker.reset();
    }
}
