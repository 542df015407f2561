//! ResonanceWarp: a cascade of 1-4 nonlinear biquads.
//!
//! Each stage is a Direct Form II Transposed biquad whose two state
//! registers are pushed through a saturator after every update:
//!
//!   out = z1 + b0 * x
//!   z1  = sat(z2 + b1 * x - a1 * out)
//!   z2  = sat(b2 * x - a2 * out)
//!
//! Saturating the delay registers, rather than the output, puts the
//! nonlinearity inside the resonant loop. Resonance peaks then limit
//! themselves the way an overdriven analog multi-pole filter does. Stacking
//! stages with one shared coefficient set trades CPU for steeper skirts.
//!
//! Coefficients come from the Audio EQ Cookbook with `q = reso^3 * 18 + 0.1`.
//! `a0` is folded in as a reciprocal so the per-sample path only multiplies.
//!
//! Subtype bit layout (one byte, as stored by hosts):
//!   bits 0-1: stage count - 1
//!   bits 2-3: saturator (0 = tanh, 1-3 = soft clip)

use std::f32::consts::PI;

use crate::coefficients::{clamped_frequency, CoeffVector};
use crate::error::{FilterError, FilterResult};
use crate::fastmath::{fastcos, fastsin, softclip, tanh_clamped};
use crate::lanes::Lanes;
use crate::registers::{FilterUnit, SlotIndex};
use crate::tuning::TuningProvider;

pub const MAX_STAGES: usize = 4;
pub const WARP_REGISTERS: usize = MAX_STAGES * 2;

/// Lowest and highest Q the resonance mapping produces.
pub const Q_MIN: f32 = 0.1;
pub const Q_MAX: f32 = 18.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpCoeff {
    A1,
    A2,
    B0,
    B1,
    B2,
}

impl SlotIndex for WarpCoeff {
    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

/// Position of a biquad in the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpStage {
    First,
    Second,
    Third,
    Fourth,
}

impl WarpStage {
    pub const ALL: [WarpStage; MAX_STAGES] =
        [WarpStage::First, WarpStage::Second, WarpStage::Third, WarpStage::Fourth];
}

/// State register: the two DF2T delays of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpReg {
    Z1(WarpStage),
    Z2(WarpStage),
}

impl SlotIndex for WarpReg {
    #[inline]
    fn slot(self) -> usize {
        match self {
            WarpReg::Z1(stage) => stage as usize * 2,
            WarpReg::Z2(stage) => stage as usize * 2 + 1,
        }
    }
}

pub type WarpUnit = FilterUnit<WarpCoeff, WarpReg, WARP_REGISTERS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpResponse {
    Lowpass,
    Highpass,
    Notch,
    Bandpass,
    Allpass,
}

impl TryFrom<u8> for WarpResponse {
    type Error = FilterError;

    fn try_from(code: u8) -> Result<Self, FilterError> {
        match code {
            0 => Ok(Self::Lowpass),
            1 => Ok(Self::Highpass),
            2 => Ok(Self::Notch),
            3 => Ok(Self::Bandpass),
            4 => Ok(Self::Allpass),
            _ => Err(FilterError::UnknownResponse {
                family: "ResonanceWarp",
                code,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Saturator {
    Tanh = 0,
    SoftClip = 1,
}

/// Decodes the 2-bit subtype field. Every code other than 0 picks soft clip.
impl TryFrom<u8> for Saturator {
    type Error = FilterError;

    fn try_from(code: u8) -> Result<Self, FilterError> {
        match code {
            0 => Ok(Self::Tanh),
            1..=3 => Ok(Self::SoftClip),
            _ => Err(FilterError::UnknownSaturator(code)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageCount {
    One = 0,
    Two = 1,
    Three = 2,
    Four = 3,
}

impl StageCount {
    pub const ALL: [StageCount; MAX_STAGES] =
        [StageCount::One, StageCount::Two, StageCount::Three, StageCount::Four];

    pub fn count(self) -> usize {
        self as usize + 1
    }
}

/// Stage count + saturator, fixed at configuration time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WarpSubtype {
    pub stages: StageCount,
    pub saturator: Saturator,
}

impl WarpSubtype {
    pub fn new(stages: StageCount, saturator: Saturator) -> Self {
        Self { stages, saturator }
    }

    pub fn bits(self) -> u8 {
        self.stages as u8 | (self.saturator as u8) << 2
    }

    /// Decode a host subtype byte. Bits above 3 are ignored.
    pub fn from_bits(bits: u8) -> FilterResult<Self> {
        Ok(Self {
            stages: StageCount::ALL[(bits & 3) as usize],
            saturator: Saturator::try_from((bits >> 2) & 3)?,
        })
    }
}

impl Default for WarpSubtype {
    fn default() -> Self {
        Self::new(StageCount::One, Saturator::Tanh)
    }
}

/// Q for a resonance value; resonance is clamped to [0, 1] first.
pub fn quality(reso: f32) -> f32 {
    let reso = reso.clamp(0.0, 1.0);
    reso * reso * reso * 18.0 + Q_MIN
}

/// Coefficients for one voice. `pitch` is in semitones from A440.
pub fn coefficients<T: TuningProvider>(
    pitch: f32,
    reso: f32,
    response: WarpResponse,
    sample_rate: f32,
    provider: &T,
) -> CoeffVector<WarpCoeff> {
    let q = quality(reso);
    let wc = 2.0 * PI * clamped_frequency(pitch, sample_rate, provider) / sample_rate;

    let wsin = fastsin(wc);
    let wcos = fastcos(wc);
    let alpha = wsin / (2.0 * q);

    // Reciprocal of a0: every coefficient is normalized by it.
    let a0r = 1.0 / (1.0 + alpha);

    let mut c = CoeffVector::zeroed();
    c[WarpCoeff::A1] = -2.0 * wcos * a0r;
    c[WarpCoeff::A2] = (1.0 - alpha) * a0r;

    match response {
        WarpResponse::Lowpass => {
            c[WarpCoeff::B1] = (1.0 - wcos) * a0r;
            c[WarpCoeff::B0] = c[WarpCoeff::B1] * 0.5;
            c[WarpCoeff::B2] = c[WarpCoeff::B0];
        }
        WarpResponse::Highpass => {
            c[WarpCoeff::B1] = -(1.0 + wcos) * a0r;
            c[WarpCoeff::B0] = c[WarpCoeff::B1] * -0.5;
            c[WarpCoeff::B2] = c[WarpCoeff::B0];
        }
        WarpResponse::Notch => {
            c[WarpCoeff::B0] = a0r;
            c[WarpCoeff::B1] = -2.0 * wcos * a0r;
            c[WarpCoeff::B2] = c[WarpCoeff::B0];
        }
        WarpResponse::Bandpass => {
            c[WarpCoeff::B0] = wsin * 0.5 * a0r;
            c[WarpCoeff::B1] = 0.0;
            c[WarpCoeff::B2] = -c[WarpCoeff::B0];
        }
        WarpResponse::Allpass => {
            c[WarpCoeff::B0] = c[WarpCoeff::A2];
            c[WarpCoeff::B1] = c[WarpCoeff::A1];
            // (1 + alpha) / (1 + alpha)
            c[WarpCoeff::B2] = 1.0;
        }
    }
    c
}

/// Stage count encoded in the low two subtype bits.
const fn stage_count(bits: u8) -> usize {
    (bits & 3) as usize + 1
}

const fn saturator_of(bits: u8) -> Saturator {
    if (bits >> 2) & 3 == 0 {
        Saturator::Tanh
    } else {
        Saturator::SoftClip
    }
}

#[inline]
fn saturate(x: Lanes, saturator: Saturator) -> Lanes {
    match saturator {
        Saturator::Tanh => tanh_clamped(x),
        Saturator::SoftClip => softclip(x),
    }
}

/// Shared coefficients for every stage of one call.
#[derive(Clone, Copy)]
struct Biquad {
    a1: Lanes,
    a2: Lanes,
    b0: Lanes,
    b1: Lanes,
    b2: Lanes,
}

/// One nonlinear DF2T stage; updates that stage's two registers.
#[inline]
fn nl_stage(
    bq: &Biquad,
    input: Lanes,
    saturator: Saturator,
    z1: &mut Lanes,
    z2: &mut Lanes,
) -> Lanes {
    let out = *z1 + bq.b0 * input;
    let next_z1 = *z2 + bq.b1 * input - bq.a1 * out;
    let next_z2 = bq.b2 * input - bq.a2 * out;
    *z1 = saturate(next_z1, saturator);
    *z2 = saturate(next_z2, saturator);
    out
}

/// Run the cascade for subtype `SUBTYPE` (see module docs for the bit layout).
///
/// Coefficients advance once per call, after the last stage.
pub fn process<const SUBTYPE: u8>(f: &mut WarpUnit, input: Lanes) -> Lanes {
    let stages = stage_count(SUBTYPE);
    let saturator = saturator_of(SUBTYPE);

    f.step_post_ramp(input, |c, r, mut x| {
        let bq = Biquad {
            a1: c[WarpCoeff::A1],
            a2: c[WarpCoeff::A2],
            b0: c[WarpCoeff::B0],
            b1: c[WarpCoeff::B1],
            b2: c[WarpCoeff::B2],
        };
        for &stage in &WarpStage::ALL[..stages] {
            let mut z1 = r[WarpReg::Z1(stage)];
            let mut z2 = r[WarpReg::Z2(stage)];
            x = nl_stage(&bq, x, saturator, &mut z1, &mut z2);
            r[WarpReg::Z1(stage)] = z1;
            r[WarpReg::Z2(stage)] = z2;
        }
        x
    })
}

/// Monomorphized process routine for a subtype.
pub fn process_fn(subtype: WarpSubtype) -> fn(&mut WarpUnit, Lanes) -> Lanes {
    use Saturator::*;
    use StageCount::*;

    match (subtype.stages, subtype.saturator) {
        (One, Tanh) => process::<0b0000>,
        (Two, Tanh) => process::<0b0001>,
        (Three, Tanh) => process::<0b0010>,
        (Four, Tanh) => process::<0b0011>,
        (One, SoftClip) => process::<0b0100>,
        (Two, SoftClip) => process::<0b0101>,
        (Three, SoftClip) => process::<0b0110>,
        (Four, SoftClip) => process::<0b0111>,
    }
}
