//! This library is the foundation for the `giga-win-in` and `giga-win-out`
//! crates. It holds the waveform object model, the bit-level codec and the
//! channel-table handling shared by both directions, and can be built with
//! or without serialization support (see features).
//!
//! WIN is the variable-width, differentially encoded, per-second framed
//! multi-channel waveform format of the Japanese WIN seismic observation
//! system. The frame and record layouts implemented here follow the WIN
//! system documentation; the HYPOMH text collaborators live in
//! `giga-win-hypo`.
#![allow(clippy::derive_partial_eq_without_eq)]
extern crate chrono;
extern crate log;
extern crate num;
#[macro_use]
extern crate num_derive;
extern crate regex;

#[cfg(any(feature = "to_json", feature = "serde"))]
extern crate serde;
#[cfg(feature = "to_json")]
extern crate serde_json;

pub mod bits;
pub mod channel;
pub mod chtable;
pub mod dsp;
pub mod enums;
pub mod errors;
pub mod headers;
pub mod params;
pub mod settings;
pub mod timeutil;
pub mod units;
pub mod waveset;

pub use errors::WinError;

pub use channel::{ch_from_hex, Channel, Samples};
pub use enums::*;
pub use headers::{SecondHeader, SubHeader};
pub use params::Params;
pub use settings::{CancelToken, ReadSettings, WriteSettings};
pub use waveset::WaveSet;

/// Byte length of the second-frame header (32-bit length slot + 6 BCD
/// time bytes).
pub const FRAME_HEADER_LEN: usize = 10;
/// Byte length of a channel sub-record header.
pub const SUB_HEADER_LEN: usize = 4;
/// Largest frame length the 24-bit compatible length slot can carry.
pub const MAX_FRAME_LEN: u32 = 0x00FF_FFFF;
/// Largest sampling rate the 12-bit header field can carry.
pub const MAX_SAMPLING_RATE: u16 = 0x0FFF;
/// Station codes are at most this long.
pub const STATION_CODE_LEN: usize = 10;
/// Component codes are at most this long.
pub const COMPONENT_CODE_LEN: usize = 6;
