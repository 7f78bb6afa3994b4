// Copyright (C) 2022 by GiGa infosystems
//! This contains the code for cutting a channel into whole-second buckets
//! according to the boundary policy, ready for sub-record encoding.
use chrono::{Duration, NaiveDateTime};

use giga_win_core::channel::{Channel, Samples};
use giga_win_core::enums::BoundaryPolicy;
use giga_win_core::errors::WinError;
use giga_win_core::timeutil::{ceil_second, floor_second, seconds_between};
use giga_win_core::MAX_SAMPLING_RATE;

/// One whole second of counts for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct SecondBucket {
    pub time: NaiveDateTime,
    pub samples: Vec<i64>,
}

/// Cut a channel into whole-second buckets of `fs` samples each.
///
/// The channel is decalibrated and converted to counts first (folding any
/// float scale into `ad_bit_step`), then its partial leading and trailing
/// seconds are cut or padded per the policy.
pub fn bucket_channel(
    channel: &Channel,
    boundary: BoundaryPolicy,
) -> Result<(u16, Vec<SecondBucket>), WinError> {
    if channel.is_empty() {
        return Err(WinError::EmptyRange {
            msg: format!("channel {} has no samples to write", channel.ch_string()),
        });
    }
    let fs_f = channel.fs()?;
    let fs = fs_f.round();
    if (fs_f - fs).abs() > 1e-6 || fs < 1.0 || fs > f64::from(MAX_SAMPLING_RATE) {
        return Err(WinError::OutOfRange {
            msg: format!(
                "sampling rate {} Hz is not an integer in 1..={} Hz",
                fs_f, MAX_SAMPLING_RATE
            ),
        });
    }
    let fs = fs as usize;

    let counts_channel = channel.to_counts()?;
    let counts = match &counts_channel.data {
        Samples::Counts(v) => v,
        Samples::Physical(_) => unreachable!("to_counts returns counts"),
    };

    let st = channel.starttime().expect("non-empty");
    let dt = Duration::nanoseconds((1e9 / fs_f).round() as i64);
    // Exclusive end of the data: one interval past the last sample.
    let data_end = channel.endtime().expect("non-empty") + dt;

    let (win_start, padded) = match boundary {
        BoundaryPolicy::Cut => {
            let win_start = ceil_second(st);
            let win_end = floor_second(data_end);
            if win_end <= win_start {
                return Err(WinError::EmptyRange {
                    msg: format!(
                        "channel {} holds no whole second between {} and {}",
                        channel.ch_string(),
                        st,
                        data_end
                    ),
                });
            }
            if win_start != st {
                log::warn!(
                    "{}: cutting the first {} s",
                    channel.ch_string(),
                    seconds_between(st, win_start)
                );
            }
            if win_end != data_end {
                log::warn!(
                    "{}: cutting the last {} s",
                    channel.ch_string(),
                    seconds_between(win_end, data_end)
                );
            }
            let skip = (seconds_between(st, win_start) * fs_f).round() as usize;
            let take = (seconds_between(win_start, win_end) * fs_f).round() as usize;
            (win_start, counts[skip..skip + take].to_vec())
        }
        BoundaryPolicy::Pad | BoundaryPolicy::ZeroPad => {
            let win_start = floor_second(st);
            let win_end = ceil_second(data_end);
            let front = (seconds_between(win_start, st) * fs_f).round() as usize;
            let back = (seconds_between(data_end, win_end) * fs_f).round() as usize;
            let (front_value, back_value) = match boundary {
                BoundaryPolicy::Pad => (counts[0], counts[counts.len() - 1]),
                _ => (0, 0),
            };
            let mut padded = Vec::with_capacity(front + counts.len() + back);
            padded.resize(front, front_value);
            padded.extend_from_slice(counts);
            padded.resize(front + counts.len() + back, back_value);
            (win_start, padded)
        }
    };

    if padded.len() % fs != 0 {
        return Err(WinError::Process {
            msg: format!(
                "channel {}: {} bucketed samples do not divide into {} Hz seconds",
                channel.ch_string(),
                padded.len(),
                fs
            ),
        });
    }

    let buckets = padded
        .chunks(fs)
        .enumerate()
        .map(|(i, chunk)| SecondBucket {
            time: win_start + Duration::seconds(i as i64),
            samples: chunk.to_vec(),
        })
        .collect();
    Ok((fs as u16, buckets))
}
