//! The two binary headers of the WIN format: the 10-byte second-frame
//! header and the 4-byte channel sub-record header.
//!
//! The frame length occupies a 32-bit big-endian slot. Historic tooling read
//! only 24 bits of it, so the writer refuses lengths of `2^24` bytes or more
//! (the top byte stays zero) and the reader rejects frames with a non-zero
//! top byte as malformed.
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bits::{decode_bcd, encode_bcd};
use crate::enums::SampleSize;
use crate::errors::WinError;
use crate::timeutil::{yy2yyyy, yyyy2yy};
use crate::{FRAME_HEADER_LEN, MAX_FRAME_LEN, SUB_HEADER_LEN};

/// The header of one second-frame: the total frame length in bytes and the
/// wall-clock second the frame covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondHeader {
    /// Total length of the frame in bytes, header included.
    pub frame_len: u32,
    /// Start of the second covered by the frame.
    pub time: NaiveDateTime,
}

impl SecondHeader {
    pub fn new(frame_len: u32, time: NaiveDateTime) -> Self {
        SecondHeader { frame_len, time }
    }

    /// Parse a header from the first ten bytes of a frame.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WinError> {
        if bytes.len() < FRAME_HEADER_LEN {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "{} bytes left, a second-frame header needs {}",
                    bytes.len(),
                    FRAME_HEADER_LEN
                ),
            });
        }
        let frame_len = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if frame_len > MAX_FRAME_LEN {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "frame length {} exceeds the 24-bit limit {}",
                    frame_len, MAX_FRAME_LEN
                ),
            });
        }
        if (frame_len as usize) < FRAME_HEADER_LEN {
            return Err(WinError::MalformedFrame {
                msg: format!("frame length {} is shorter than its own header", frame_len),
            });
        }

        let yy = decode_bcd(bytes[4])?;
        let mm = decode_bcd(bytes[5])?;
        let dd = decode_bcd(bytes[6])?;
        let hh = decode_bcd(bytes[7])?;
        let mi = decode_bcd(bytes[8])?;
        let ss = decode_bcd(bytes[9])?;

        check_field("month", mm.into(), 1, 12)?;
        check_field("day", dd.into(), 1, 31)?;
        check_field("hour", hh.into(), 0, 23)?;
        check_field("minute", mi.into(), 0, 59)?;
        check_field("second", ss.into(), 0, 59)?;

        let year = yy2yyyy(yy.into())?;
        let time = NaiveDate::from_ymd_opt(year, mm.into(), dd.into())
            .and_then(|d| d.and_hms_opt(hh.into(), mi.into(), ss.into()))
            .ok_or_else(|| WinError::OutOfRange {
                msg: format!("{:02}/{:02}/{:02} is not a calendar date", yy, mm, dd),
            })?;
        log::debug!("frame: {} B at {}", frame_len, time);
        Ok(SecondHeader { frame_len, time })
    }

    /// Emit the ten header bytes.
    pub fn as_bytes(&self) -> Result<[u8; FRAME_HEADER_LEN], WinError> {
        if self.frame_len > MAX_FRAME_LEN {
            return Err(WinError::OutOfRange {
                msg: format!(
                    "frame length {} exceeds the 24-bit limit {}",
                    self.frame_len, MAX_FRAME_LEN
                ),
            });
        }
        if self.time.nanosecond() != 0 {
            return Err(WinError::OutOfRange {
                msg: format!("frame time {} is not second aligned", self.time),
            });
        }
        let mut out = [0u8; FRAME_HEADER_LEN];
        out[..4].copy_from_slice(&self.frame_len.to_be_bytes());
        out[4] = encode_bcd(yyyy2yy(self.time.year())?)?;
        out[5] = encode_bcd(self.time.month() as u8)?;
        out[6] = encode_bcd(self.time.day() as u8)?;
        out[7] = encode_bcd(self.time.hour() as u8)?;
        out[8] = encode_bcd(self.time.minute() as u8)?;
        out[9] = encode_bcd(self.time.second() as u8)?;
        Ok(out)
    }
}

fn check_field(field: &'static str, value: u32, min: u32, max: u32) -> Result<(), WinError> {
    if value < min || value > max {
        return Err(WinError::OutOfRange {
            msg: format!("{} {} is outside [{}, {}]", field, value, min, max),
        });
    }
    Ok(())
}

/// The header of one channel sub-record: channel id, sample-size code and
/// sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubHeader {
    pub ch: u16,
    pub size: SampleSize,
    /// Sampling rate in Hz; also the sample count of the record.
    pub fs: u16,
}

impl SubHeader {
    pub fn new(ch: u16, size: SampleSize, fs: u16) -> Self {
        SubHeader { ch, size, fs }
    }

    /// Parse the four header bytes of a sub-record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WinError> {
        if bytes.len() < SUB_HEADER_LEN {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "{} bytes left, a channel sub-record header needs {}",
                    bytes.len(),
                    SUB_HEADER_LEN
                ),
            });
        }
        let ch = u16::from_be_bytes([bytes[0], bytes[1]]);
        let size = SampleSize::new(bytes[2] >> 4)?;
        let fs = u16::from(bytes[2] & 0x0F) << 8 | u16::from(bytes[3]);
        if fs == 0 {
            return Err(WinError::MalformedFrame {
                msg: format!("channel {:04X} declares a sampling rate of 0 Hz", ch),
            });
        }
        Ok(SubHeader { ch, size, fs })
    }

    /// Emit the four header bytes.
    pub fn as_bytes(&self) -> Result<[u8; SUB_HEADER_LEN], WinError> {
        if self.fs > 0x0FFF {
            return Err(WinError::OutOfRange {
                msg: format!(
                    "sampling rate {} Hz does not fit the 12-bit header field",
                    self.fs
                ),
            });
        }
        let ch = self.ch.to_be_bytes();
        Ok([
            ch[0],
            ch[1],
            self.size.code() << 4 | (self.fs >> 8) as u8,
            (self.fs & 0xFF) as u8,
        ])
    }

    /// Total byte length of the sub-record this header starts.
    pub fn record_len(&self) -> usize {
        SUB_HEADER_LEN + self.size.payload_len(self.fs)
    }
}
