//! Fast rational approximations for coefficient math and in-loop saturation.
//!
//! The trig functions are Padé approximants, valid on [-PI, PI]. Every
//! caller in this crate keeps its argument inside that range: the cutoff
//! clamp at 0.3 * sample_rate bounds `wc` to 0.6 * PI.
//!
//! The saturators are the nonlinearities that sit *inside* the feedback loops:
//!   - `tanh_clamped`: Padé tanh on an input clamped to +/-5. The rational
//!     form reaches +/-1 (within 1e-5) at the clamp points.
//!   - `softclip`: cubic `x - 4/27 x^3` on an input clamped to +/-1.5.
//!     Bounded to +/-1 with zero slope at the clamp.
//!
//! Both are odd and pass zero through unchanged, so a silent filter stays silent.

use crate::lanes::Lanes;

/// Input clamp for `tanh_clamped`. The rational tanh is ~+/-1 here.
const TANH_CLAMP: f32 = 5.0;

/// Input clamp for `softclip`: the cubic peaks at +/-1 for x = +/-1.5.
const SOFTCLIP_CLAMP: f32 = 1.5;
const SOFTCLIP_CUBE: f32 = -4.0 / 27.0;

#[inline]
pub fn fasttan(x: f32) -> f32 {
    let x2 = x * x;
    let num = x * (-135_135.0 + x2 * (17_325.0 + x2 * (-378.0 + x2)));
    let den = -135_135.0 + x2 * (62_370.0 + x2 * (-3_150.0 + 28.0 * x2));
    num / den
}

#[inline]
pub fn fastsin(x: f32) -> f32 {
    let x2 = x * x;
    let num = -x
        * (-11_511_339_840.0 + x2 * (1_640_635_920.0 + x2 * (-52_785_432.0 + x2 * 479_249.0)));
    let den = 11_511_339_840.0 + x2 * (277_920_720.0 + x2 * (3_177_720.0 + x2 * 18_361.0));
    num / den
}

#[inline]
pub fn fastcos(x: f32) -> f32 {
    let x2 = x * x;
    let num = -(-39_251_520.0 + x2 * (18_471_600.0 + x2 * (-1_075_032.0 + 14_615.0 * x2)));
    let den = 39_251_520.0 + x2 * (1_154_160.0 + x2 * (16_632.0 + x2 * 127.0));
    num / den
}

#[inline]
pub fn fasttanh(x: f32) -> f32 {
    let x2 = x * x;
    let num = x * (135_135.0 + x2 * (17_325.0 + x2 * (378.0 + x2)));
    let den = 135_135.0 + x2 * (62_370.0 + x2 * (3_150.0 + 28.0 * x2));
    num / den
}

/// Scalar `tanh_clamped`, for reference checks and single-voice callers.
#[inline]
pub fn fasttanh_clamped(x: f32) -> f32 {
    fasttanh(x.clamp(-TANH_CLAMP, TANH_CLAMP))
}

/// Scalar `softclip`.
#[inline]
pub fn softclip_scalar(x: f32) -> f32 {
    let x = x.clamp(-SOFTCLIP_CLAMP, SOFTCLIP_CLAMP);
    x + SOFTCLIP_CUBE * x * x * x
}

/// Lane-group tanh approximation with input clamp. Output is within 1e-5 of [-1, 1].
#[inline]
pub fn tanh_clamped(x: Lanes) -> Lanes {
    let x = x.clamp(-TANH_CLAMP, TANH_CLAMP);
    let x2 = x * x;
    let num = x * (x2 * (x2 * (x2 + 378.0) + 17_325.0) + 135_135.0);
    let den = x2 * (x2 * (x2 * 28.0 + 3_150.0) + 62_370.0) + 135_135.0;
    num / den
}

/// Lane-group cubic soft clipper. Output is in [-1, 1].
#[inline]
pub fn softclip(x: Lanes) -> Lanes {
    let x = x.clamp(-SOFTCLIP_CLAMP, SOFTCLIP_CLAMP);
    x + x * x * x * SOFTCLIP_CUBE
}
