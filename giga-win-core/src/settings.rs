//! This module contains the settings structures used to customise WIN
//! reading and writing, plus the cancel token both honour between
//! second-frames.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;

use crate::enums::{BoundaryPolicy, SampleSize};
use crate::errors::WinError;
use crate::timeutil::duration_secs;

/// A cheaply clonable cancellation flag. Readers and writers check it
/// between consecutive second-frames and abort with
/// [`WinError::Cancelled`] once it is set.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Shorthand for the check sites inside read/write loops.
    pub fn bail_if_cancelled(&self) -> Result<(), WinError> {
        if self.is_cancelled() {
            Err(WinError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Settings for reading WIN files.
///
/// A time window can be given either as (`targettime`, `beforesec`,
/// `aftersec`) or as (`starttime`, `endtime`); when both are given the
/// latter wins and a warning is logged.
#[derive(Debug, Clone)]
pub struct ReadSettings {
    /// Read only these channel ids, or everything when `None`.
    pub channels: Option<Vec<u16>>,
    pub targettime: Option<NaiveDateTime>,
    /// Seconds of data before the target time.
    pub beforesec: Option<f64>,
    /// Seconds of data after the target time.
    pub aftersec: Option<f64>,
    pub starttime: Option<NaiveDateTime>,
    pub endtime: Option<NaiveDateTime>,
    /// Sort the resulting set by channel id.
    pub sort: bool,
    /// An explicit channel table to bind after reading. Without one, a
    /// sibling file named `<input>.ch` is picked up automatically.
    pub chtable: Option<PathBuf>,
    /// Apply the calibration factor right after binding the table.
    pub apply_calib: bool,
    /// A chrono format string for deriving each file's start time from its
    /// file name, which saves opening every file when window-reading many.
    pub filename_format: Option<String>,
    pub cancel: CancelToken,
}

impl Default for ReadSettings {
    fn default() -> Self {
        ReadSettings {
            channels: None,
            targettime: None,
            beforesec: None,
            aftersec: None,
            starttime: None,
            endtime: None,
            sort: true,
            chtable: None,
            apply_calib: false,
            filename_format: None,
            cancel: CancelToken::new(),
        }
    }
}

impl ReadSettings {
    /// Resolve the two time-window forms into one absolute window.
    ///
    /// ```
    /// # use giga_win_core::settings::ReadSettings;
    /// # use chrono::NaiveDate;
    /// let mut s = ReadSettings::default();
    /// s.targettime = NaiveDate::from_ymd_opt(2024, 9, 21).unwrap().and_hms_opt(0, 0, 10);
    /// // beforesec/aftersec are missing:
    /// assert!(s.window().is_err());
    /// s.beforesec = Some(5.0);
    /// s.aftersec = Some(5.0);
    /// let (start, end) = s.window().unwrap().unwrap();
    /// assert_eq!((end - start).num_seconds(), 10);
    /// ```
    pub fn window(&self) -> Result<Option<(NaiveDateTime, NaiveDateTime)>, WinError> {
        if let (Some(start), Some(end)) = (self.starttime, self.endtime) {
            if self.targettime.is_some() || self.beforesec.is_some() || self.aftersec.is_some() {
                log::warn!(
                    "Both (targettime, beforesec, aftersec) and (starttime, endtime) \
                     are given. The latter will be used."
                );
            }
            if start >= end {
                return Err(WinError::TimeRangeEmpty { start, end });
            }
            return Ok(Some((start, end)));
        }
        let target = match self.targettime {
            Some(t) => t,
            None => return Ok(None),
        };
        let before = self.beforesec.ok_or(WinError::MissingTimeArgs {
            missing: "beforesec",
        })?;
        let after = self.aftersec.ok_or(WinError::MissingTimeArgs {
            missing: "aftersec",
        })?;
        if before < 0.0 || after < 0.0 {
            return Err(WinError::Process {
                msg: format!(
                    "beforesec/aftersec must not be negative: {}, {}",
                    before, after
                ),
            });
        }
        let start = target - duration_secs(before);
        let end = target + duration_secs(after);
        if start >= end {
            return Err(WinError::TimeRangeEmpty { start, end });
        }
        Ok(Some((start, end)))
    }
}

/// Settings for writing WIN files.
#[derive(Debug, Clone, Default)]
pub struct WriteSettings {
    /// Force one sample-size code instead of picking the smallest per
    /// second. Fails with `InsufficientWidth` when the data does not fit.
    pub sample_size: Option<SampleSize>,
    /// How partial leading/trailing seconds are handled.
    pub boundary: BoundaryPolicy,
    /// Allow clobbering an existing output file.
    pub overwrite: bool,
    pub cancel: CancelToken,
}
