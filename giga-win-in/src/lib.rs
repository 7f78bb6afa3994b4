//! This is a library for reading WIN seismic waveform files into rust. It
//! reassembles the per-second interleaved channel records of one or more
//! files into a [`WaveSet`] of continuous per-channel time series.
//!
//! Reading a single file is the simple case; reading many files merges the
//! per-channel streams chronologically, skipping files that fail to parse
//! (with a warning) so one corrupt file does not take down a whole archive
//! read. A time window can be requested up front so that only the files
//! overlapping it are opened.
extern crate chrono;
extern crate log;
extern crate memmap2;

pub mod frame;
pub mod mapped;
#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};

use giga_win_core::chtable::read_chtable;
use giga_win_core::settings::CancelToken;
use giga_win_core::timeutil::sample_times;

pub use giga_win_core::errors::*;
pub use giga_win_core::{Channel, ReadSettings, Samples, WaveSet};

use crate::frame::{decode_frame_body, FrameCursor};
use crate::mapped::MappedWin;

/// One continuous per-channel run of seconds out of one file.
#[derive(Debug)]
struct Segment {
    ch: u16,
    fs: u16,
    start: NaiveDateTime,
    samples: Vec<i64>,
}

/// Read one or more WIN files into a [`WaveSet`].
///
/// Channels are merged across files by channel id. Inside a single file
/// the seconds of a channel must be contiguous; across files, overlapping
/// seconds are dropped and gaps are kept (and logged), so the result can
/// carry a hole where a file was skipped.
pub fn read<P: AsRef<Path>>(paths: &[P], settings: &ReadSettings) -> Result<WaveSet, WinError> {
    if paths.is_empty() {
        return Err(WinError::Process {
            msg: "no input files were given".to_string(),
        });
    }
    let window = settings.window()?;
    let filter = settings.channels.as_deref();

    // With a window over many files, work out which files overlap it first
    // so the rest are never opened.
    let selected: Vec<&P> = match (window, paths.len()) {
        (Some((start, end)), n) if n > 1 => {
            let ranges = file_time_ranges(paths, settings)?;
            let picked: Vec<&P> = paths
                .iter()
                .zip(ranges.iter())
                .filter(|(_, (st, et))| *st < end && start < *et)
                .map(|(p, _)| p)
                .collect();
            if picked.is_empty() {
                log::warn!("no file overlaps the requested window, reading everything");
                paths.iter().collect()
            } else {
                picked
            }
        }
        _ => paths.iter().collect(),
    };

    // Per-file parse, skipping failures when there is more than one file.
    let single = selected.len() == 1;
    let mut per_file: Vec<Vec<Segment>> = Vec::with_capacity(selected.len());
    for path in &selected {
        match read_single(path.as_ref(), filter, &settings.cancel) {
            Ok(segments) => per_file.push(segments),
            Err(WinError::Cancelled) => return Err(WinError::Cancelled),
            Err(e) if single => return Err(e),
            Err(e) => {
                log::warn!(
                    "skipping unreadable file {}: {}",
                    path.as_ref().display(),
                    e
                );
            }
        }
    }
    if per_file.is_empty() {
        return Err(WinError::Process {
            msg: "none of the input files could be read".to_string(),
        });
    }

    let mut set = merge_segments(per_file)?;

    // Trim to the window; channels entirely outside it are dropped.
    if let Some((start, end)) = window {
        let mut trimmed = WaveSet::new();
        for channel in set {
            match channel.trim(Some(start), Some(end), false) {
                Ok(c) => trimmed.push(c)?,
                Err(WinError::EmptyRange { .. }) | Err(WinError::TimeRangeEmpty { .. }) => {
                    log::debug!("channel {} has no data in the window", channel.ch_string());
                }
                Err(e) => return Err(e),
            }
        }
        set = trimmed;
    }

    if settings.sort {
        set.sort_by_ch();
    }

    // Channel table: an explicit path, or the `<file>.ch` sibling of a
    // single input.
    let table = settings.chtable.clone().or_else(|| {
        if paths.len() == 1 {
            let auto = PathBuf::from(format!("{}.ch", paths[0].as_ref().display()));
            if auto.exists() {
                log::debug!("channel table was automatically detected: {}", auto.display());
                return Some(auto);
            }
        }
        None
    });
    if let Some(table) = table {
        let rows = read_chtable(&table)?;
        set.bind_chtable(&rows, settings.apply_calib);
    }

    Ok(set)
}

/// Read a single WIN file with default settings.
///
/// Shorthand for [`read`] with one path.
pub fn read_file<P: AsRef<Path>>(path: P, settings: &ReadSettings) -> Result<WaveSet, WinError> {
    read(&[path], settings)
}

/// Parse one file into per-channel segments, enforcing that each channel's
/// seconds are contiguous within the file.
fn read_single(
    path: &Path,
    filter: Option<&[u16]>,
    cancel: &CancelToken,
) -> Result<Vec<Segment>, WinError> {
    let mapped = MappedWin::new(path)?;
    let mut cursor = FrameCursor::new(mapped.bytes());
    let mut acc: BTreeMap<u16, Segment> = BTreeMap::new();
    let mut frames = 0usize;

    while let Some(frame) = cursor.next_frame() {
        cancel.bail_if_cancelled()?;
        let frame = frame?;
        frames += 1;
        for record in decode_frame_body(frame.body, filter)? {
            match acc.get_mut(&record.ch) {
                None => {
                    acc.insert(
                        record.ch,
                        Segment {
                            ch: record.ch,
                            fs: record.fs,
                            start: frame.header.time,
                            samples: record.samples,
                        },
                    );
                }
                Some(segment) => {
                    if record.fs != segment.fs {
                        return Err(WinError::MalformedFrame {
                            msg: format!(
                                "channel {:04X} changes rate from {} to {} Hz mid-file",
                                record.ch, segment.fs, record.fs
                            ),
                        });
                    }
                    let expected = segment.start
                        + Duration::seconds((segment.samples.len() / segment.fs as usize) as i64);
                    if frame.header.time != expected {
                        return Err(WinError::MalformedFrame {
                            msg: format!(
                                "channel {:04X} jumps from second {} to {}",
                                record.ch, expected, frame.header.time
                            ),
                        });
                    }
                    segment.samples.extend_from_slice(&record.samples);
                }
            }
        }
    }
    log::debug!("{}: {} second-frames, {} channels", path.display(), frames, acc.len());
    Ok(acc.into_values().collect())
}

/// Merge the per-file segments of every channel into continuous channels,
/// dropping duplicated seconds and keeping (but logging) gaps.
fn merge_segments(per_file: Vec<Vec<Segment>>) -> Result<WaveSet, WinError> {
    let mut by_ch: BTreeMap<u16, Vec<Segment>> = BTreeMap::new();
    for segments in per_file {
        for s in segments {
            by_ch.entry(s.ch).or_default().push(s);
        }
    }

    let mut set = WaveSet::new();
    for (ch, mut segments) in by_ch {
        segments.sort_by_key(|s| s.start);
        let fs = segments[0].fs;
        let dt_ns = (1e9 / f64::from(fs)).round() as i64;

        let mut samples: Vec<i64> = Vec::new();
        let mut times: Vec<NaiveDateTime> = Vec::new();
        for segment in segments {
            if segment.fs != fs {
                log::warn!(
                    "channel {:04X}: dropping a segment at {} Hz amid {} Hz data",
                    ch,
                    segment.fs,
                    fs
                );
                continue;
            }
            let seg_times = sample_times(segment.start, f64::from(fs), segment.samples.len());
            let skip = match times.last() {
                None => 0,
                Some(&last) => {
                    let next = last + Duration::nanoseconds(dt_ns);
                    if segment.start > next {
                        log::warn!(
                            "channel {:04X}: gap between {} and {}",
                            ch,
                            last,
                            segment.start
                        );
                        0
                    } else {
                        // Overlap with already merged data: drop the
                        // duplicated leading samples.
                        seg_times.iter().position(|&t| t > last).unwrap_or(seg_times.len())
                    }
                }
            };
            samples.extend_from_slice(&segment.samples[skip..]);
            times.extend_from_slice(&seg_times[skip..]);
        }
        set.push(Channel::from_parts(ch, samples, times)?)?;
    }
    Ok(set)
}

/// The wall-clock range of each file, from its name when a format was
/// given, otherwise by scanning its frame headers.
fn file_time_ranges<P: AsRef<Path>>(
    paths: &[P],
    settings: &ReadSettings,
) -> Result<Vec<(NaiveDateTime, NaiveDateTime)>, WinError> {
    match &settings.filename_format {
        Some(format) => {
            let mut starts = Vec::with_capacity(paths.len());
            for path in paths {
                let name = path
                    .as_ref()
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let start = NaiveDateTime::parse_from_str(&name, format).map_err(|e| {
                    WinError::ParseField {
                        field: "file name time",
                        text: format!("{} ({})", name, e),
                    }
                })?;
                starts.push(start);
            }
            // Each file runs until the next one starts; the last is scanned.
            let mut ranges = Vec::with_capacity(paths.len());
            for i in 0..starts.len() {
                let end = if i + 1 < starts.len() {
                    starts[i + 1]
                } else {
                    scan_or_everything(paths[i].as_ref()).1
                };
                ranges.push((starts[i], end));
            }
            Ok(ranges)
        }
        None => {
            log::debug!("opening all files to get their time ranges");
            Ok(paths
                .iter()
                .map(|p| scan_or_everything(p.as_ref()))
                .collect())
        }
    }
}

/// Scan a file's time range; a file that cannot be scanned gets the widest
/// possible range, so it is always selected and its failure surfaces (and
/// is skipped) during the actual read.
fn scan_or_everything(path: &Path) -> (NaiveDateTime, NaiveDateTime) {
    let scanned = MappedWin::new(path).and_then(|m| frame::scan_time_range(m.bytes()));
    match scanned {
        Ok(range) => range,
        Err(e) => {
            log::warn!("could not scan {}: {}", path.display(), e);
            (NaiveDateTime::MIN, NaiveDateTime::MAX)
        }
    }
}
