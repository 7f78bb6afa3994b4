//! This contains the code for walking second-frames and decoding their
//! channel sub-records back into samples.
use chrono::NaiveDateTime;

use giga_win_core::bits::BitReader;
use giga_win_core::errors::WinError;
use giga_win_core::headers::{SecondHeader, SubHeader};
use giga_win_core::{FRAME_HEADER_LEN, SUB_HEADER_LEN};

/// One second-frame cut out of a file: its parsed header and the raw
/// concatenated sub-record bytes.
#[derive(Debug)]
pub struct RawFrame<'a> {
    pub header: SecondHeader,
    pub body: &'a [u8],
}

/// A cursor that walks a byte slice frame by frame.
pub struct FrameCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        FrameCursor { data, pos: 0 }
    }

    /// Cut out the next frame, or `None` at the end of the data.
    pub fn next_frame(&mut self) -> Option<Result<RawFrame<'a>, WinError>> {
        if self.pos >= self.data.len() {
            return None;
        }
        let header = match SecondHeader::from_bytes(&self.data[self.pos..]) {
            Ok(h) => h,
            Err(e) => return Some(Err(e)),
        };
        let end = self.pos + header.frame_len as usize;
        if end > self.data.len() {
            return Some(Err(WinError::MalformedFrame {
                msg: format!(
                    "frame at byte {} declares {} bytes but only {} remain",
                    self.pos,
                    header.frame_len,
                    self.data.len() - self.pos
                ),
            }));
        }
        let body = &self.data[self.pos + FRAME_HEADER_LEN..end];
        self.pos = end;
        Some(Ok(RawFrame { header, body }))
    }
}

/// A decoded channel sub-record: the channel id, its sampling rate and the
/// reconstructed samples of one second.
#[derive(Debug, Clone, PartialEq)]
pub struct SubRecord {
    pub ch: u16,
    pub fs: u16,
    pub samples: Vec<i64>,
}

/// Decode every sub-record of a frame body.
///
/// With a channel filter, records of other channels are still walked (their
/// lengths are needed to find the next record) but not decoded.
pub fn decode_frame_body(
    body: &[u8],
    filter: Option<&[u16]>,
) -> Result<Vec<SubRecord>, WinError> {
    let mut records = Vec::new();
    let mut pos = 0usize;
    while pos < body.len() {
        let header = SubHeader::from_bytes(&body[pos..])?;
        let len = header.record_len();
        if pos + len > body.len() {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "channel {:04X} sub-record needs {} bytes but the frame holds {}",
                    header.ch,
                    len,
                    body.len() - pos
                ),
            });
        }
        let wanted = filter.map_or(true, |chs| chs.contains(&header.ch));
        if wanted {
            let payload = &body[pos + SUB_HEADER_LEN..pos + len];
            records.push(SubRecord {
                ch: header.ch,
                fs: header.fs,
                samples: decode_payload(&header, payload)?,
            });
        }
        pos += len;
    }
    Ok(records)
}

/// Decode one payload: the 32-bit first sample, then `fs - 1` deltas (or
/// absolute values), cumulatively summed where the code says so.
///
/// The accumulator is 64 bits wide; a reconstructed sample outside the
/// signed 32-bit range means the stream is corrupt.
fn decode_payload(header: &SubHeader, payload: &[u8]) -> Result<Vec<i64>, WinError> {
    let mut reader = BitReader::new(payload);
    let mut samples = Vec::with_capacity(header.fs as usize);
    let first = reader.read_int(32)?;
    samples.push(first);

    let step = header.size.bit_step();
    if header.size.is_differential() {
        let mut acc = first;
        for _ in 1..header.fs {
            acc += reader.read_int(step)?;
            if acc < i64::from(i32::MIN) || acc > i64::from(i32::MAX) {
                return Err(WinError::OutOfRange {
                    msg: format!(
                        "channel {:04X} accumulates to {} which leaves the 32-bit range",
                        header.ch, acc
                    ),
                });
            }
            samples.push(acc);
        }
    } else {
        for _ in 1..header.fs {
            samples.push(reader.read_int(step)?);
        }
    }
    Ok(samples)
}

/// Parse only the header of the first frame, for cheap time-range scans.
pub fn first_frame_time(data: &[u8]) -> Result<NaiveDateTime, WinError> {
    Ok(SecondHeader::from_bytes(data)?.time)
}

/// Walk all frame headers and return the first frame time and the end of
/// the last frame (exclusive). Bodies are not decoded.
pub fn scan_time_range(data: &[u8]) -> Result<(NaiveDateTime, NaiveDateTime), WinError> {
    let start = first_frame_time(data)?;
    let mut pos = 0usize;
    let mut last = start;
    while pos < data.len() {
        let header = SecondHeader::from_bytes(&data[pos..])?;
        let end = pos + header.frame_len as usize;
        if end > data.len() {
            return Err(WinError::MalformedFrame {
                msg: format!(
                    "frame at byte {} declares {} bytes but only {} remain",
                    pos,
                    header.frame_len,
                    data.len() - pos
                ),
            });
        }
        last = header.time;
        pos = end;
    }
    Ok((start, last + chrono::Duration::seconds(1)))
}
