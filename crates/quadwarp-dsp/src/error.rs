//! Configuration-time errors.
//!
//! Nothing on the per-sample path can fail. These only come out of decoding
//! raw selector integers from a host, out of filter construction and out of
//! per-lane parameter setters.

use thiserror::Error;

/// Result type for filter configuration.
pub type FilterResult<T> = Result<T, FilterError>;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FilterError {
    /// Family selector outside the known filter families.
    #[error("unknown filter family code: {0}")]
    UnknownFamily(u8),

    /// Response selector not valid for the family.
    #[error("unknown {family} response code: {code}")]
    UnknownResponse {
        family: &'static str,
        code: u8,
    },

    /// Saturator code that does not fit the 2-bit subtype field.
    #[error("unknown saturator code: {0}")]
    UnknownSaturator(u8),

    /// Sample rate that is zero, negative or not finite.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f32),

    /// Lane index past the end of a lane group.
    #[error("lane {lane} out of range (lane groups hold {lanes} voices)")]
    LaneOutOfRange { lane: usize, lanes: usize },
}
