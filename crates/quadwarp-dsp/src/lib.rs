//! QuadWarp DSP library: four-voice nonlinear filters for polyphonic synths.
//!
//! Pure DSP math with no audio framework dependencies. Two families share
//! one lane-parallel core: a Korg-35 style two-pole (`k35`) and a cascade of
//! saturated biquads (`resonance_warp`).

// Lane-parallel core
pub mod coefficients;
pub mod lanes;
pub mod registers;

// Filter families
pub mod k35;
pub mod resonance_warp;

// Host-facing
pub mod error;
pub mod filter;

// Shared math
pub mod fastmath;
pub mod tuning;

pub use coefficients::{CoefficientMaker, DEFAULT_BLOCK_SIZE};
pub use error::{FilterError, FilterResult};
pub use filter::{FilterType, QuadFilter};
pub use k35::K35Mode;
pub use lanes::{Lanes, LANES};
pub use resonance_warp::{Saturator, StageCount, WarpResponse, WarpSubtype};
pub use tuning::{EqualTemperament, TuningProvider};
