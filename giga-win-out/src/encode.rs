// Copyright (C) 2022 by GiGa infosystems
//! This contains the code for encoding one second of one channel into its
//! WIN sub-record bytes: width selection, delta encoding and nibble
//! packing.
use giga_win_core::bits::BitWriter;
use giga_win_core::enums::SampleSize;
use giga_win_core::errors::WinError;
use giga_win_core::headers::SubHeader;

use tinyvec::TinyVec;

/// This exists to save us a lot of typing.
pub(crate) type TVu8 = TinyVec<[u8; 8]>;

/// Pick the smallest sample-size code that represents every first
/// difference of `samples`, falling back to absolute 32-bit storage when
/// even 4-byte differences do not fit.
///
/// The first sample is always stored at 32 bits, so it has to fit the
/// signed 32-bit range no matter which code wins.
pub fn choose_sample_size(samples: &[i64]) -> Result<SampleSize, WinError> {
    check_first(samples)?;
    for size in [
        SampleSize::Nibble,
        SampleSize::OneByte,
        SampleSize::TwoBytes,
        SampleSize::ThreeBytes,
        SampleSize::FourBytes,
    ] {
        if deltas_fit(samples, size) {
            return Ok(size);
        }
    }
    // Differences overflow even 32 bits; store the absolute values.
    check_absolute(samples)?;
    Ok(SampleSize::Absolute)
}

/// Check that an explicitly requested code can represent the data.
pub fn validate_sample_size(samples: &[i64], size: SampleSize) -> Result<(), WinError> {
    check_first(samples)?;
    match size {
        SampleSize::Absolute => check_absolute(samples),
        _ => match samples
            .windows(2)
            .map(|w| w[1] - w[0])
            .find(|d| !size.fits(*d))
        {
            None => Ok(()),
            Some(delta) => Err(WinError::InsufficientWidth {
                size: size.code(),
                value: delta,
            }),
        },
    }
}

fn check_first(samples: &[i64]) -> Result<(), WinError> {
    let first = *samples.first().ok_or_else(|| WinError::EmptyRange {
        msg: "cannot encode an empty second".to_string(),
    })?;
    if !SampleSize::FourBytes.fits(first) {
        return Err(WinError::OutOfRange {
            msg: format!("first sample {} does not fit signed 32 bits", first),
        });
    }
    Ok(())
}

fn check_absolute(samples: &[i64]) -> Result<(), WinError> {
    match samples.iter().find(|s| !SampleSize::FourBytes.fits(**s)) {
        None => Ok(()),
        Some(&value) => Err(WinError::InsufficientWidth {
            size: SampleSize::Absolute.code(),
            value,
        }),
    }
}

fn deltas_fit(samples: &[i64], size: SampleSize) -> bool {
    samples.windows(2).all(|w| size.fits(w[1] - w[0]))
}

/// One encoded item (a first difference or an absolute sample) as its
/// big-endian byte string.
fn item_bytes(value: i64, size: SampleSize) -> TVu8 {
    match size {
        SampleSize::OneByte => TinyVec::from(&(value as i8).to_be_bytes()[..]),
        SampleSize::TwoBytes => TinyVec::from(&(value as i16).to_be_bytes()[..]),
        SampleSize::ThreeBytes => TinyVec::from(&(value as i32).to_be_bytes()[1..]),
        _ => TinyVec::from(&(value as i32).to_be_bytes()[..]),
    }
}

/// Encode one second of one channel as a complete sub-record (header,
/// 32-bit first sample, items, nibble pad).
///
/// `samples.len()` doubles as the sampling rate, as the format dictates.
/// With an explicit `size` the data is validated against it; otherwise the
/// smallest satisfying code is chosen per second.
pub fn encode_second(
    ch: u16,
    samples: &[i64],
    size: Option<SampleSize>,
) -> Result<Vec<u8>, WinError> {
    let size = match size {
        Some(s) => {
            validate_sample_size(samples, s)?;
            s
        }
        None => choose_sample_size(samples)?,
    };
    let fs = samples.len() as u16;
    let header = SubHeader::new(ch, size, fs);

    let mut out = Vec::with_capacity(header.record_len());
    out.extend_from_slice(&header.as_bytes()?);
    out.extend_from_slice(&(samples[0] as i32).to_be_bytes());
    match size {
        SampleSize::Nibble => {
            let mut bits = BitWriter::new();
            for w in samples.windows(2) {
                bits.put_int(w[1] - w[0], 4)?;
            }
            // An even rate leaves an odd nibble count; the writer pads the
            // trailing half byte with zeros.
            out.extend_from_slice(&bits.into_bytes());
        }
        SampleSize::Absolute => {
            for &s in &samples[1..] {
                out.extend_from_slice(item_bytes(s, size).as_ref());
            }
        }
        _ => {
            for w in samples.windows(2) {
                out.extend_from_slice(item_bytes(w[1] - w[0], size).as_ref());
            }
        }
    }
    debug_assert_eq!(out.len(), header.record_len());
    Ok(out)
}
