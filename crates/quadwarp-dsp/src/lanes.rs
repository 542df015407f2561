//! Four-wide lane group: four independent voices advanced in lockstep.
//!
//! Every operation is elementwise. Lanes never exchange data, so one call
//! through a filter drives four unrelated voices with identical math.
//!
//! The default backend is a plain `[f32; 4]`, which the optimizer turns into
//! SSE/NEON code on its own. Enabling the `simd-wide` feature swaps in
//! `wide::f32x4` for explicit vector instructions. Both expose the same API.

use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// Number of voices per lane group.
pub const LANES: usize = 4;

#[cfg(feature = "simd-wide")]
type Inner = wide::f32x4;
#[cfg(not(feature = "simd-wide"))]
type Inner = [f32; LANES];

#[derive(Clone, Copy)]
pub struct Lanes(Inner);

impl Lanes {
    pub const ZERO: Lanes = Lanes::splat_const(0.0);
    pub const ONE: Lanes = Lanes::splat_const(1.0);

    #[cfg(not(feature = "simd-wide"))]
    const fn splat_const(v: f32) -> Self {
        Self([v; LANES])
    }

    #[cfg(feature = "simd-wide")]
    const fn splat_const(v: f32) -> Self {
        Self(wide::f32x4::new([v; LANES]))
    }

    /// Same value in every lane.
    #[inline]
    pub fn splat(v: f32) -> Self {
        Self::from_array([v; LANES])
    }

    #[inline]
    pub fn from_array(values: [f32; LANES]) -> Self {
        #[cfg(feature = "simd-wide")]
        {
            Self(wide::f32x4::new(values))
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            Self(values)
        }
    }

    #[inline]
    pub fn to_array(self) -> [f32; LANES] {
        #[cfg(feature = "simd-wide")]
        {
            self.0.to_array()
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            self.0
        }
    }

    /// Read one lane. Panics if `lane >= LANES`.
    #[inline]
    pub fn lane(self, lane: usize) -> f32 {
        self.to_array()[lane]
    }

    /// Overwrite one lane, leaving the other three untouched.
    #[inline]
    pub fn with_lane(self, lane: usize, value: f32) -> Self {
        let mut values = self.to_array();
        values[lane] = value;
        Self::from_array(values)
    }

    #[inline]
    pub fn min(self, rhs: Self) -> Self {
        #[cfg(feature = "simd-wide")]
        {
            Self(self.0.min(rhs.0))
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            self.zip(rhs, f32::min)
        }
    }

    #[inline]
    pub fn max(self, rhs: Self) -> Self {
        #[cfg(feature = "simd-wide")]
        {
            Self(self.0.max(rhs.0))
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            self.zip(rhs, f32::max)
        }
    }

    /// Elementwise clamp of every lane to `[lo, hi]`.
    #[inline]
    pub fn clamp(self, lo: f32, hi: f32) -> Self {
        self.max(Self::splat(lo)).min(Self::splat(hi))
    }

    #[inline]
    pub fn abs(self) -> Self {
        #[cfg(feature = "simd-wide")]
        {
            Self(self.0.abs())
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            self.map(f32::abs)
        }
    }

    /// Apply a scalar function lane by lane.
    #[inline]
    pub fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let [a, b, c, d] = self.to_array();
        Self::from_array([f(a), f(b), f(c), f(d)])
    }

    #[inline]
    #[cfg_attr(feature = "simd-wide", allow(dead_code))]
    fn zip(self, rhs: Self, f: impl Fn(f32, f32) -> f32) -> Self {
        let [a0, a1, a2, a3] = self.to_array();
        let [b0, b1, b2, b3] = rhs.to_array();
        Self::from_array([f(a0, b0), f(a1, b1), f(a2, b2), f(a3, b3)])
    }
}

impl Default for Lanes {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Lanes {
    fn eq(&self, other: &Self) -> bool {
        self.to_array() == other.to_array()
    }
}

impl fmt::Debug for Lanes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Lanes").field(&self.to_array()).finish()
    }
}

impl From<[f32; LANES]> for Lanes {
    fn from(values: [f32; LANES]) -> Self {
        Self::from_array(values)
    }
}

impl From<f32> for Lanes {
    fn from(v: f32) -> Self {
        Self::splat(v)
    }
}

impl From<Lanes> for [f32; LANES] {
    fn from(lanes: Lanes) -> Self {
        lanes.to_array()
    }
}

macro_rules! lane_binop {
    ($tr:ident, $method:ident, $op:tt, $assign_tr:ident, $assign_method:ident) => {
        impl $tr for Lanes {
            type Output = Lanes;

            #[inline]
            fn $method(self, rhs: Lanes) -> Lanes {
                #[cfg(feature = "simd-wide")]
                {
                    Lanes(self.0 $op rhs.0)
                }
                #[cfg(not(feature = "simd-wide"))]
                {
                    self.zip(rhs, |a, b| a $op b)
                }
            }
        }

        impl $tr<f32> for Lanes {
            type Output = Lanes;

            #[inline]
            fn $method(self, rhs: f32) -> Lanes {
                self $op Lanes::splat(rhs)
            }
        }

        impl $assign_tr for Lanes {
            #[inline]
            fn $assign_method(&mut self, rhs: Lanes) {
                *self = *self $op rhs;
            }
        }
    };
}

lane_binop!(Add, add, +, AddAssign, add_assign);
lane_binop!(Sub, sub, -, SubAssign, sub_assign);
lane_binop!(Mul, mul, *, MulAssign, mul_assign);

impl Div for Lanes {
    type Output = Lanes;

    #[inline]
    fn div(self, rhs: Lanes) -> Lanes {
        #[cfg(feature = "simd-wide")]
        {
            Lanes(self.0 / rhs.0)
        }
        #[cfg(not(feature = "simd-wide"))]
        {
            self.zip(rhs, |a, b| a / b)
        }
    }
}

impl Div<f32> for Lanes {
    type Output = Lanes;

    #[inline]
    fn div(self, rhs: f32) -> Lanes {
        self / Lanes::splat(rhs)
    }
}

impl Neg for Lanes {
    type Output = Lanes;

    #[inline]
    fn neg(self) -> Lanes {
        Lanes::ZERO - self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elementwise_arithmetic() {
        let a = Lanes::from_array([1.0, 2.0, 3.0, 4.0]);
        let b = Lanes::from_array([0.5, -1.0, 2.0, 8.0]);

        assert_eq!((a + b).to_array(), [1.5, 1.0, 5.0, 12.0]);
        assert_eq!((a - b).to_array(), [0.5, 3.0, 1.0, -4.0]);
        assert_eq!((a * b).to_array(), [0.5, -2.0, 6.0, 32.0]);
        assert_eq!((a / b).to_array(), [2.0, -2.0, 1.5, 0.5]);
        assert_eq!((-a).to_array(), [-1.0, -2.0, -3.0, -4.0]);
    }

    #[test]
    fn test_lanes_do_not_interact() {
        // A NaN in one lane must stay in that lane.
        let a = Lanes::from_array([f32::NAN, 1.0, 1.0, 1.0]);
        let b = Lanes::splat(2.0);
        let out = (a * b + b).to_array();
        assert!(out[0].is_nan());
        assert_eq!(&out[1..], &[4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_with_lane() {
        let a = Lanes::ZERO.with_lane(2, 7.0);
        assert_eq!(a.to_array(), [0.0, 0.0, 7.0, 0.0]);
        assert_eq!(a.lane(2), 7.0);
    }

    #[test]
    fn test_clamp_and_assign_ops() {
        let mut a = Lanes::from_array([-3.0, -0.5, 0.5, 3.0]);
        assert_eq!(a.clamp(-1.0, 1.0).to_array(), [-1.0, -0.5, 0.5, 1.0]);
        a += Lanes::ONE;
        a *= Lanes::splat(2.0);
        a -= Lanes::splat(1.0);
        assert_eq!(a.to_array(), [-5.0, 0.0, 2.0, 7.0]);
        assert_eq!(a.abs().to_array(), [5.0, 0.0, 2.0, 7.0]);
    }
}
