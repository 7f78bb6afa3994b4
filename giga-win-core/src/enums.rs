//! This contains the enums that describe how WIN channel payloads are
//! packed and how partial seconds are handled when writing.
//!
//! The WIN format advertises the per-sample width of every channel record in
//! a 4-bit code, so the code lends itself well to being represented by an
//! enum. Codes outside of the defined range return an error rather than an
//! `Invalid` variant, because nothing sensible can be parsed after a bad
//! width.
use num::FromPrimitive;
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

use crate::errors::WinError;

/// The 4-bit sample-size code of a channel sub-record.
///
/// Codes 0..=4 store first differences (0 means packed 4-bit nibbles),
/// code 5 stores absolute 32-bit samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, FromPrimitive, ToPrimitive)]
#[repr(C)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum SampleSize {
    Nibble = 0,
    OneByte = 1,
    TwoBytes = 2,
    ThreeBytes = 3,
    FourBytes = 4,
    Absolute = 5,
}

impl std::fmt::Display for SampleSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        write!(f, "{:?}", self)
    }
}

impl SampleSize {
    /// NB: We give a result here to make life simpler for ourselves down the line.
    pub fn new(code: u8) -> Result<Self, WinError> {
        SampleSize::from_u8(code).ok_or(WinError::UnexpectedSampleSize { code })
    }

    /// The code as stored in the 4-bit header field.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Bit width of a single encoded item after the first sample.
    pub fn bit_step(self) -> u32 {
        match self {
            Self::Nibble => 4,
            Self::OneByte => 8,
            Self::TwoBytes => 16,
            Self::ThreeBytes => 24,
            Self::FourBytes => 32,
            Self::Absolute => 32,
        }
    }

    /// Whether items after the first sample are first differences.
    pub fn is_differential(self) -> bool {
        !matches!(self, Self::Absolute)
    }

    /// Payload length in bytes for a record of `fs` samples: the 32-bit
    /// first sample plus `fs - 1` further items, nibble records rounded up
    /// to a whole byte.
    ///
    /// ```
    /// # use giga_win_core::enums::SampleSize;
    /// assert_eq!(SampleSize::Nibble.payload_len(100), 4 + 50);
    /// assert_eq!(SampleSize::OneByte.payload_len(100), 4 + 99);
    /// assert_eq!(SampleSize::ThreeBytes.payload_len(100), 4 + 297);
    /// assert_eq!(SampleSize::Absolute.payload_len(100), 400);
    /// ```
    pub fn payload_len(self, fs: u16) -> usize {
        let rest = fs as usize - 1;
        match self {
            Self::Nibble => 4 + (rest + 1) / 2,
            Self::Absolute => 4 * fs as usize,
            _ => 4 + (self.bit_step() as usize / 8) * rest,
        }
    }

    /// The range of values an encoded item can hold.
    pub fn item_range(self) -> (i64, i64) {
        let n = self.bit_step();
        (-(1i64 << (n - 1)), (1i64 << (n - 1)) - 1)
    }

    /// Whether `value` fits a single encoded item of this width.
    pub fn fits(self, value: i64) -> bool {
        let (min, max) = self.item_range();
        min <= value && value <= max
    }
}

/// How a channel whose start or end does not fall on a second boundary is
/// fitted into whole second-frames when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub enum BoundaryPolicy {
    /// Drop leading and trailing partial seconds.
    Cut,
    /// Repeat the first (resp. last) sample out to the enclosing boundaries.
    Pad,
    /// Extend with zero samples out to the enclosing boundaries.
    ZeroPad,
}

impl Default for BoundaryPolicy {
    fn default() -> Self {
        BoundaryPolicy::Cut
    }
}
