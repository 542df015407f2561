/// Korg-35 style two-pole filter: cross-coupled one-pole stages with a
/// saturated resonance feedback path.
///
/// Topology (lowpass):
///   input -> LPF1 -> (+ feedback) * alpha -> [tanh blend] -> LPF2 * k -> output
///                        ^                                       |
///                        +---- lb * LPF2 state + hb * HPF1(y) <--+
///
/// Each one-pole stage is a TPT (trapezoidal) integrator with a
/// prewarped gain `G = g / (1 + g)`. The feedback sum is the zero-delay
/// solution of the loop, scaled by `alpha = 1 / (1 - kG + kG^2)`.
///
/// The nonlinearity sits exactly where self-oscillation would otherwise
/// diverge: the signal entering the second stage (lowpass) or the output of
/// the resonant node (highpass). A continuous blend between the clean and
/// the `tanh(x * saturation)` signal lets saturation sweep from 0 (linear)
/// to 1 (fully driven) with no discontinuity. Above 1 the drive keeps
/// growing and the loop settles into bounded self-oscillation at high k.
///
/// The one-pole update drops the no-op terms of the analog derivation
/// (unity input gain, zero feedback/epsilon terms, unity a0); only
/// `(x - z) * G + z` remains.

use std::f32::consts::PI;

use crate::coefficients::{clamped_frequency, CoeffVector};
use crate::error::FilterError;
use crate::fastmath::{fasttan, tanh_clamped};
use crate::lanes::Lanes;
use crate::registers::{FilterUnit, SlotIndex};
use crate::tuning::TuningProvider;

/// Lower bound of the resonance gain `k`.
pub const K_MIN: f32 = 0.01;
/// Upper bound of `k`; the loop self-oscillates at 2.
pub const K_MAX: f32 = 1.96;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum K35Coeff {
    /// One-pole gain g / (1 + g)
    G,
    /// Feedback weight on the second-stage state
    Lb,
    /// Feedback weight on the first-stage state
    Hb,
    /// Resonance gain
    K,
    /// Zero-delay loop normalization
    Alpha,
    /// Drive into tanh
    Saturation,
    /// min(saturation, 1): weight of the driven signal
    SaturationBlend,
    /// 1 - blend: weight of the clean signal
    SaturationBlendInv,
}

impl SlotIndex for K35Coeff {
    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum K35Reg {
    /// LPF1 z^-1
    Lz,
    /// HPF1 z^-1
    Hz,
    /// Second stage z^-1
    Z2,
}

impl SlotIndex for K35Reg {
    #[inline]
    fn slot(self) -> usize {
        self as usize
    }
}

pub const K35_REGISTERS: usize = 3;

pub type K35Unit = FilterUnit<K35Coeff, K35Reg, K35_REGISTERS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum K35Mode {
    Lowpass,
    Highpass,
}

impl TryFrom<u8> for K35Mode {
    type Error = FilterError;

    fn try_from(code: u8) -> Result<Self, FilterError> {
        match code {
            0 => Ok(Self::Lowpass),
            1 => Ok(Self::Highpass),
            _ => Err(FilterError::UnknownResponse { family: "K35", code }),
        }
    }
}

/// Coefficients for one voice.
///
/// - `pitch`: cutoff in semitones from A440
/// - `reso`: 0..1, mapped to `k = reso * 1.96` and clamped to `[K_MIN, K_MAX]`
/// - `saturation`: tanh drive, >= 0 (negative values clamp to 0)
pub fn coefficients<T: TuningProvider>(
    pitch: f32,
    reso: f32,
    mode: K35Mode,
    saturation: f32,
    sample_rate: f32,
    provider: &T,
) -> CoeffVector<K35Coeff> {
    let sr_inv = 1.0 / sample_rate;

    // Bilinear prewarp: analog-equivalent angular frequency for the cutoff.
    let wd = clamped_frequency(pitch, sample_rate, provider) * 2.0 * PI;
    let wa = (2.0 * sample_rate) * fasttan(wd * sr_inv * 0.5);
    let g = wa * sr_inv * 0.5;
    let gp1 = 1.0 + g;
    let big_g = g / gp1;

    let k = (reso * 1.96).clamp(K_MIN, K_MAX);
    let saturation = saturation.max(0.0);

    let mut c = CoeffVector::zeroed();
    c[K35Coeff::G] = big_g;
    match mode {
        K35Mode::Lowpass => {
            c[K35Coeff::Lb] = (k - k * big_g) / gp1;
            c[K35Coeff::Hb] = -1.0 / gp1;
        }
        K35Mode::Highpass => {
            c[K35Coeff::Lb] = 1.0 / gp1;
            c[K35Coeff::Hb] = -big_g / gp1;
        }
    }
    c[K35Coeff::K] = k;
    c[K35Coeff::Alpha] = 1.0 / (1.0 - k * big_g + k * big_g * big_g);
    c[K35Coeff::Saturation] = saturation;
    c[K35Coeff::SaturationBlend] = saturation.min(1.0);
    c[K35Coeff::SaturationBlendInv] = 1.0 - c[K35Coeff::SaturationBlend];
    c
}

/// TPT one-pole lowpass: v = (x - z) * G; y = v + z; z = v + y.
#[inline]
fn lpf(g: Lanes, x: Lanes, z: &mut Lanes) -> Lanes {
    let v = (x - *z) * g;
    let y = v + *z;
    *z = v + y;
    y
}

#[inline]
fn hpf(g: Lanes, x: Lanes, z: &mut Lanes) -> Lanes {
    x - lpf(g, x, z)
}

/// Mix of clean and `tanh(clean * drive)` by the precomputed blend weights.
#[inline]
fn drive(clean: Lanes, saturation: Lanes, blend: Lanes, blend_inv: Lanes) -> Lanes {
    let driven = tanh_clamped(clean * saturation);
    clean * blend_inv + driven * blend
}

pub fn process_lp(f: &mut K35Unit, input: Lanes) -> Lanes {
    f.step(input, |c, r, input| {
        let g = c[K35Coeff::G];
        let y1 = lpf(g, input, &mut r[K35Reg::Lz]);
        // lb * LPF2 state + hb * HPF1 state
        let s35 = c[K35Coeff::Lb] * r[K35Reg::Z2] + c[K35Coeff::Hb] * r[K35Reg::Hz];
        let u_clean = c[K35Coeff::Alpha] * (y1 + s35);
        let u = drive(
            u_clean,
            c[K35Coeff::Saturation],
            c[K35Coeff::SaturationBlend],
            c[K35Coeff::SaturationBlendInv],
        );

        let y = c[K35Coeff::K] * lpf(g, u, &mut r[K35Reg::Z2]);
        // Only the state update matters here.
        hpf(g, y, &mut r[K35Reg::Hz]);

        y / c[K35Coeff::K]
    })
}

pub fn process_hp(f: &mut K35Unit, input: Lanes) -> Lanes {
    f.step(input, |c, r, input| {
        let g = c[K35Coeff::G];
        let y1 = hpf(g, input, &mut r[K35Reg::Hz]);
        let s35 = c[K35Coeff::Hb] * r[K35Reg::Z2] + c[K35Coeff::Lb] * r[K35Reg::Lz];
        let u = c[K35Coeff::Alpha] * (y1 + s35);

        let y_clean = c[K35Coeff::K] * u;
        let y = drive(
            y_clean,
            c[K35Coeff::Saturation],
            c[K35Coeff::SaturationBlend],
            c[K35Coeff::SaturationBlendInv],
        );

        let hp2 = hpf(g, y, &mut r[K35Reg::Z2]);
        lpf(g, hp2, &mut r[K35Reg::Lz]);

        y / c[K35Coeff::K]
    })
}

/// Process routine for a mode.
pub fn process_fn(mode: K35Mode) -> fn(&mut K35Unit, Lanes) -> Lanes {
    match mode {
        K35Mode::Lowpass => process_lp,
        K35Mode::Highpass => process_hp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::CoefficientMaker;
    use crate::lanes::LANES;
    use crate::tuning::{pitch_for_frequency, EqualTemperament};

    const SR: f32 = 48_000.0;

    /// Fresh unit with the same coefficients in every lane and no ramp.
    fn unit_with(cutoff_hz: f32, reso: f32, mode: K35Mode, saturation: f32) -> K35Unit {
        let c = coefficients(
            pitch_for_frequency(cutoff_hz),
            reso,
            mode,
            saturation,
            SR,
            &EqualTemperament,
        );
        let mut cm = CoefficientMaker::new(32);
        cm.from_direct(c);
        let mut unit = K35Unit::new();
        for lane in 0..LANES {
            cm.update_state(&mut unit, lane);
        }
        unit
    }

    #[test]
    fn test_coefficients_within_bounds() {
        for pitch in [-120.0f32, -60.0, -24.0, 0.0, 24.0, 48.0, 120.0] {
            for reso in [-0.5f32, 0.0, 0.25, 0.5, 0.75, 1.0, 1.5] {
                for mode in [K35Mode::Lowpass, K35Mode::Highpass] {
                    let c = coefficients(pitch, reso, mode, 0.7, SR, &EqualTemperament);
                    let k = c[K35Coeff::K];
                    assert!((K_MIN..=K_MAX).contains(&k), "k = {k} at reso {reso}");
                    let g = c[K35Coeff::G];
                    assert!(g > 0.0 && g < 1.0, "G = {g} at pitch {pitch}");
                    let alpha = c[K35Coeff::Alpha];
                    assert!(alpha.is_finite() && alpha > 0.0, "alpha = {alpha}");
                    let blend = c[K35Coeff::SaturationBlend];
                    let inv = c[K35Coeff::SaturationBlendInv];
                    assert!((0.0..=1.0).contains(&blend));
                    assert!((blend + inv - 1.0).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_saturation_blend_clamps() {
        let c = coefficients(0.0, 0.5, K35Mode::Lowpass, 3.0, SR, &EqualTemperament);
        assert_eq!(c[K35Coeff::Saturation], 3.0);
        assert_eq!(c[K35Coeff::SaturationBlend], 1.0);
        assert_eq!(c[K35Coeff::SaturationBlendInv], 0.0);

        let c = coefficients(0.0, 0.5, K35Mode::Lowpass, -1.0, SR, &EqualTemperament);
        assert_eq!(c[K35Coeff::Saturation], 0.0);
        assert_eq!(c[K35Coeff::SaturationBlendInv], 1.0);
    }

    #[test]
    fn test_first_stage_impulse_matches_one_pole() {
        // 60 Hz cutoff, reso 0.5, no saturation, unit impulse into zeroed registers.
        let mut unit = unit_with(60.0, 0.5, K35Mode::Lowpass, 0.0);
        let g = unit.coeffs[K35Coeff::G];

        process_lp(&mut unit, Lanes::ONE);

        // y1 = v = G * x because z was 0; the TPT state stores v + y = 2 * G * x.
        let expected = g * 2.0;
        for lane in 0..LANES {
            let lz = unit.regs[K35Reg::Lz].lane(lane);
            assert!(
                (lz - expected.lane(lane)).abs() < 1e-7,
                "lz = {lz}, expected {}",
                expected.lane(lane)
            );
        }

        let mut z = Lanes::ZERO;
        assert_eq!(lpf(g, Lanes::ONE, &mut z), g);
        assert_eq!(z, expected);
    }

    #[test]
    fn test_silence_in_silence_out() {
        for mode in [K35Mode::Lowpass, K35Mode::Highpass] {
            let mut unit = unit_with(800.0, 1.0, mode, 2.0);
            let process = process_fn(mode);
            for n in 0..4800 {
                let y = process(&mut unit, Lanes::ZERO);
                assert_eq!(y, Lanes::ZERO, "{mode:?} produced output at sample {n}");
            }
        }
    }

    /// Two cascaded TPT one-poles: the linear two-pole reference.
    fn reference_two_pole(g: f64, input: &[f64]) -> Vec<f64> {
        let mut z = [0.0f64; 2];
        input
            .iter()
            .map(|&x| {
                let mut out = x;
                for state in &mut z {
                    let v = (out - *state) * g;
                    let y = v + *state;
                    *state = v + y;
                    out = y;
                }
                out
            })
            .collect()
    }

    #[test]
    fn test_unsaturated_lowpass_matches_linear_two_pole() {
        // At minimum k the feedback loop is ~1% and saturation 0 is exactly
        // linear, so the impulse response collapses to two cascaded one-poles.
        for cutoff in [200.0f32, 1000.0, 5000.0] {
            let mut unit = unit_with(cutoff, 0.0, K35Mode::Lowpass, 0.0);
            let g = unit.coeffs[K35Coeff::G].lane(0) as f64;

            let amplitude = 0.01;
            let n = 4000;
            let input: Vec<f64> = (0..n).map(|i| if i == 0 { amplitude } else { 0.0 }).collect();
            let expected = reference_two_pole(g, &input);

            let mut max_diff = 0.0f64;
            let mut peak = 0.0f64;
            for (i, &x) in input.iter().enumerate() {
                let y = process_lp(&mut unit, Lanes::splat(x as f32)).lane(0) as f64;
                max_diff = max_diff.max((y - expected[i]).abs());
                peak = peak.max(expected[i].abs());
            }
            assert!(
                max_diff < 0.01 * peak,
                "{cutoff} Hz: deviation {max_diff:.3e} vs peak {peak:.3e}"
            );
        }
    }

    #[test]
    fn test_lowpass_unity_dc_gain() {
        for reso in [0.0f32, 0.5, 0.9] {
            let mut unit = unit_with(1000.0, reso, K35Mode::Lowpass, 0.0);
            let mut y = Lanes::ZERO;
            for _ in 0..20_000 {
                y = process_lp(&mut unit, Lanes::splat(0.01));
            }
            let gain = y.lane(0) / 0.01;
            assert!((gain - 1.0).abs() < 1e-3, "reso {reso}: DC gain {gain}");
        }
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut unit = unit_with(1000.0, 0.5, K35Mode::Highpass, 0.0);
        let mut y = Lanes::ZERO;
        for _ in 0..20_000 {
            y = process_hp(&mut unit, Lanes::splat(0.5));
        }
        assert!(y.lane(0).abs() < 1e-4, "HPF passed DC: {}", y.lane(0));
    }

    #[test]
    fn test_high_drive_self_oscillation_is_bounded() {
        // Drive > 1 pushes loop gain past unity at max k: the tanh must hold it.
        let mut unit = unit_with(500.0, 1.0, K35Mode::Lowpass, 4.0);
        let mut tail_peak = 0.0f32;
        for n in 0..48_000 {
            let x = if n == 0 { 0.5 } else { 0.0 };
            let y = process_lp(&mut unit, Lanes::splat(x)).lane(0);
            assert!(y.is_finite() && y.abs() < 2.0, "runaway at sample {n}: {y}");
            if n >= 43_200 {
                tail_peak = tail_peak.max(y.abs());
            }
        }
        assert!(tail_peak > 0.1, "oscillation died out: tail peak {tail_peak}");
    }

    #[test]
    fn test_loud_noise_stays_bounded_with_saturation() {
        let mut state: u32 = 0x1234_5678;
        for mode in [K35Mode::Lowpass, K35Mode::Highpass] {
            let mut unit = unit_with(500.0, 1.0, mode, 1.0);
            let process = process_fn(mode);
            for _ in 0..48_000 {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let x = (state >> 8) as f32 / (1u32 << 24) as f32 * 20.0 - 10.0;
                let y = process(&mut unit, Lanes::splat(x)).lane(0);
                assert!(y.is_finite() && y.abs() < 5.0, "{mode:?} unbounded: {y}");
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let run = || {
            let mut unit = unit_with(2000.0, 0.8, K35Mode::Lowpass, 0.6);
            let out: Vec<[f32; 4]> = (0..512)
                .map(|i| {
                    let x = ((i * 7919) % 97) as f32 / 97.0 - 0.5;
                    process_lp(&mut unit, Lanes::from_array([x, -x, x * 0.5, 0.0])).to_array()
                })
                .collect();
            (out, unit.regs)
        };
        let (a_out, a_regs) = run();
        let (b_out, b_regs) = run();
        let bits = |v: &Vec<[f32; 4]>| -> Vec<u32> {
            v.iter().flat_map(|l| l.iter().map(|x| x.to_bits())).collect()
        };
        assert_eq!(bits(&a_out), bits(&b_out));
        assert_eq!(a_regs, b_regs);
    }

    #[test]
    fn test_lanes_are_independent() {
        // Lane 0 gets the same coefficients and input in both runs; the other
        // lanes differ. Lane 0 output must be bit-identical.
        let target = coefficients(0.0, 0.9, K35Mode::Lowpass, 0.5, SR, &EqualTemperament);
        let other = coefficients(-30.0, 0.1, K35Mode::Lowpass, 2.0, SR, &EqualTemperament);

        let mut quiet = K35Unit::new();
        let mut busy = K35Unit::new();
        let mut cm_target = CoefficientMaker::new(32);
        let mut cm_other = CoefficientMaker::new(32);
        cm_target.from_direct(target);
        cm_other.from_direct(other);
        for lane in 0..LANES {
            cm_target.update_state(&mut quiet, lane);
            if lane == 0 {
                cm_target.update_state(&mut busy, lane);
            } else {
                cm_other.update_state(&mut busy, lane);
            }
        }

        for i in 0..1000 {
            let x = (i as f32 * 0.05).sin();
            let a = process_lp(&mut quiet, Lanes::from_array([x, 0.0, 0.0, 0.0]));
            let b = process_lp(&mut busy, Lanes::from_array([x, 3.0, -x, 0.25]));
            assert_eq!(a.lane(0).to_bits(), b.lane(0).to_bits(), "lane 0 diverged at {i}");
        }
    }

    #[test]
    fn test_mode_decoding() {
        assert_eq!(K35Mode::try_from(0), Ok(K35Mode::Lowpass));
        assert_eq!(K35Mode::try_from(1), Ok(K35Mode::Highpass));
        assert!(K35Mode::try_from(2).is_err());
    }
}
