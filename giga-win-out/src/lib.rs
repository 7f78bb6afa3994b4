// Copyright (C) 2022 by GiGa infosystems
//! This is a library for writing WIN seismic waveform files from rust. It
//! takes the continuous per-channel time series of a
//! [`WaveSet`] and emits the per-second interleaved frame stream of the
//! WIN format.
//!
//! Each channel is cut into whole-second buckets (with a configurable
//! policy for partial leading/trailing seconds), every bucket is encoded at
//! the smallest sample width that represents its first differences, and the
//! per-channel records of each second are concatenated in ascending
//! channel-id order under a common frame header.
extern crate chrono;
extern crate giga_win_core;
extern crate log;
extern crate tinyvec;
#[cfg(test)]
extern crate giga_win_in;
#[cfg(test)]
extern crate tempfile;

pub mod encode;
pub mod frame;
#[cfg(test)]
mod integration_tests;

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use chrono::NaiveDateTime;

use giga_win_core::headers::SecondHeader;
use giga_win_core::FRAME_HEADER_LEN;

pub use giga_win_core::errors::*;
pub use giga_win_core::{BoundaryPolicy, Channel, SampleSize, WaveSet, WriteSettings};

use crate::encode::encode_second;
use crate::frame::bucket_channel;

/// Encode a whole [`WaveSet`] as WIN bytes.
///
/// Channels are bucketed per second, encoded, and interleaved under
/// chronological second-frame headers. Sub-records inside a frame are in
/// ascending channel-id order, and a channel simply drops out of frames
/// that lie outside its own time span.
pub fn to_bytes(set: &WaveSet, settings: &WriteSettings) -> Result<Vec<u8>, WinError> {
    if set.is_empty() {
        return Err(WinError::EmptyRange {
            msg: "there are no channels to write".to_string(),
        });
    }
    let mut channels: Vec<&Channel> = set.iter().collect();
    channels.sort_by_key(|c| c.ch());

    let mut frames: BTreeMap<NaiveDateTime, Vec<u8>> = BTreeMap::new();
    for channel in channels {
        let (_fs, buckets) = bucket_channel(channel, settings.boundary)?;
        for bucket in buckets {
            settings.cancel.bail_if_cancelled()?;
            let record = encode_second(channel.ch(), &bucket.samples, settings.sample_size)?;
            frames
                .entry(bucket.time)
                .or_default()
                .extend_from_slice(&record);
        }
    }

    let mut out = Vec::new();
    for (time, body) in frames {
        let header = SecondHeader::new((FRAME_HEADER_LEN + body.len()) as u32, time);
        out.extend_from_slice(&header.as_bytes()?);
        out.extend_from_slice(&body);
    }
    Ok(out)
}

/// Write a [`WaveSet`] to a WIN file.
///
/// Refuses to clobber an existing file unless the settings allow it.
/// Write errors are fatal; nothing is retried.
pub fn write<P: AsRef<Path>>(
    path: P,
    set: &WaveSet,
    settings: &WriteSettings,
) -> Result<(), WinError> {
    let path = path.as_ref();
    if path.exists() && !settings.overwrite {
        return Err(WinError::FileExists {
            path: path.to_path_buf(),
        });
    }
    let bytes = to_bytes(set, settings)?;
    let mut file = std::fs::File::create(path)?;
    file.write_all(&bytes)?;
    log::info!("Saved: {}", path.display());
    Ok(())
}

/// Write a single channel to a WIN file.
pub fn write_channel<P: AsRef<Path>>(
    path: P,
    channel: &Channel,
    settings: &WriteSettings,
) -> Result<(), WinError> {
    let mut set = WaveSet::new();
    set.push(channel.clone())?;
    write(path, &set, settings)
}
