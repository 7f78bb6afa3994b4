//! Readers and writers for the fixed-column text files of the HYPOMH
//! hypocenter location program: the `seis` arrival-pick file, the `init`
//! initial-hypocenter file, the velocity `structure` file and the `final`
//! result file.
//!
//! HYPOMH itself is FORTRAN with formatted I/O, so column positions are
//! load bearing throughout; every writer here emits the exact column
//! layout the program reads and every reader slices the columns the
//! program writes.
extern crate chrono;
extern crate giga_win_core;
extern crate log;

pub mod finalfile;
pub mod init;
pub mod seis;
pub mod structure;

pub use giga_win_core::errors::WinError;

pub use finalfile::{Diagnosis, Final, FinalArrival};
pub use init::Init;
pub use seis::{Arrival, Seis};
pub use structure::Structure;

/// P-wave first-motion polarity as written in pick files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Up,
    Down,
    /// No reading; written as `.`.
    Unknown,
}

impl Polarity {
    pub fn as_char(self) -> char {
        match self {
            Polarity::Up => 'U',
            Polarity::Down => 'D',
            Polarity::Unknown => '.',
        }
    }

    /// Anything that is not an explicit reading maps to `Unknown`.
    pub fn from_char(c: char) -> Self {
        match c {
            'U' => Polarity::Up,
            'D' => Polarity::Down,
            _ => Polarity::Unknown,
        }
    }
}

impl Default for Polarity {
    fn default() -> Self {
        Polarity::Unknown
    }
}

/// The amplitude column of a `final` file holds the maximum amplitude when
/// one was measured, and the F-P duration otherwise. Amplitudes are in m/s
/// and far below one; durations are seconds and in practice one or more,
/// which is how the two are told apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmpOrFpTime {
    Amp(f64),
    FpTime(f64),
}

impl AmpOrFpTime {
    /// Classify a raw column value.
    ///
    /// ```
    /// # use giga_win_hypo::AmpOrFpTime;
    /// assert_eq!(AmpOrFpTime::from_value(1.77e-6), AmpOrFpTime::Amp(1.77e-6));
    /// assert_eq!(AmpOrFpTime::from_value(43.9), AmpOrFpTime::FpTime(43.9));
    /// ```
    pub fn from_value(v: f64) -> Self {
        if v >= 1.0 {
            AmpOrFpTime::FpTime(v)
        } else {
            AmpOrFpTime::Amp(v)
        }
    }

    pub fn value(self) -> f64 {
        match self {
            AmpOrFpTime::Amp(v) | AmpOrFpTime::FpTime(v) => v,
        }
    }
}

/// FORTRAN-style exponent formatting (`%9.2e` and friends): a fixed
/// precision mantissa and a signed two-digit exponent, right-justified to
/// `width`.
pub(crate) fn fmt_e(value: f64, width: usize, precision: usize, upper: bool) -> String {
    let (mantissa, exponent) = if value == 0.0 || !value.is_finite() {
        (0.0, 0)
    } else {
        let mut exponent = value.abs().log10().floor() as i32;
        let mut mantissa = value / 10f64.powi(exponent);
        // Rounding at the requested precision can carry into a new digit.
        if format!("{:.*}", precision, mantissa.abs()).starts_with("10") {
            exponent += 1;
            mantissa = value / 10f64.powi(exponent);
        }
        (mantissa, exponent)
    };
    let e = if upper { 'E' } else { 'e' };
    let sign = if exponent < 0 { '-' } else { '+' };
    let body = format!(
        "{:.*}{}{}{:02}",
        precision,
        mantissa,
        e,
        sign,
        exponent.abs()
    );
    format!("{:>1$}", body, width)
}

/// Parse a fixed-column float field, treating an all-blank field as `None`.
pub(crate) fn parse_f64_field(
    line: &str,
    range: std::ops::Range<usize>,
    field: &'static str,
) -> Result<Option<f64>, WinError> {
    let text = slice_field(line, range);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>()
        .map(Some)
        .map_err(|_| WinError::ParseField {
            field,
            text: text.to_string(),
        })
}

/// Parse a fixed-column integer field.
pub(crate) fn parse_i64_field(
    line: &str,
    range: std::ops::Range<usize>,
    field: &'static str,
) -> Result<i64, WinError> {
    let text = slice_field(line, range);
    let text = text.trim();
    text.parse::<i64>().map_err(|_| WinError::ParseField {
        field,
        text: text.to_string(),
    })
}

/// Slice a column range out of a line, tolerating short lines.
pub(crate) fn slice_field(line: &str, range: std::ops::Range<usize>) -> &str {
    let start = range.start.min(line.len());
    let end = range.end.min(line.len());
    line.get(start..end).unwrap_or("")
}
