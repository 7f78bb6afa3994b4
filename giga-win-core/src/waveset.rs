//! An ordered collection of channels keyed by channel id, with broadcast
//! versions of the per-channel operations.
use chrono::{Duration, NaiveDateTime};
use regex::Regex;

use crate::channel::{ch_from_hex, Channel};
use crate::chtable::ChRow;
use crate::errors::WinError;

/// A set of channels. Each channel id appears at most once and iteration
/// order is stable (by channel id once sorted).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaveSet {
    channels: Vec<Channel>,
}

impl WaveSet {
    pub fn new() -> Self {
        WaveSet::default()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// The channel ids, in iteration order.
    pub fn chs(&self) -> Vec<u16> {
        self.channels.iter().map(|c| c.ch()).collect()
    }

    /// Add a channel. Fails if its id is already present.
    pub fn push(&mut self, channel: Channel) -> Result<(), WinError> {
        if self.get(channel.ch()).is_some() {
            return Err(WinError::DuplicateChannel { ch: channel.ch() });
        }
        self.channels.push(channel);
        Ok(())
    }

    /// Concatenate two sets. Fails on any shared channel id.
    pub fn merge(mut self, other: WaveSet) -> Result<WaveSet, WinError> {
        for ch in other.channels {
            self.push(ch)?;
        }
        Ok(self)
    }

    /// Look a channel up by id.
    pub fn get(&self, ch: u16) -> Option<&Channel> {
        self.channels.iter().find(|c| c.ch() == ch)
    }

    pub fn get_mut(&mut self, ch: u16) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.ch() == ch)
    }

    /// Look a channel up by its hex rendering, case-insensitively.
    pub fn get_hex(&self, ch: &str) -> Result<Option<&Channel>, WinError> {
        Ok(self.get(ch_from_hex(ch)?))
    }

    /// The channel at position `i` in iteration order.
    pub fn by_index(&self, i: usize) -> Option<&Channel> {
        self.channels.get(i)
    }

    pub fn iter(&self) -> std::slice::Iter<Channel> {
        self.channels.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<Channel> {
        self.channels.iter_mut()
    }

    /// Sort the channels by id.
    pub fn sort_by_ch(&mut self) {
        self.channels.sort_by_key(|c| c.ch());
    }

    /// The subset whose ids appear in `ids`, in this set's order.
    pub fn subset(&self, ids: &[u16]) -> WaveSet {
        WaveSet {
            channels: self
                .channels
                .iter()
                .filter(|c| ids.contains(&c.ch()))
                .cloned()
                .collect(),
        }
    }

    /// Select channels whose station and component match the given glob
    /// patterns (`*` and `?` wildcards, full-string match). A `None`
    /// pattern matches everything.
    pub fn select(
        &self,
        station: Option<&str>,
        component: Option<&str>,
    ) -> Result<WaveSet, WinError> {
        let st_re = station.map(glob_to_regex).transpose()?;
        let cmp_re = component.map(glob_to_regex).transpose()?;
        let channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|c| {
                let st_ok = st_re.as_ref().map_or(true, |re| {
                    c.params
                        .station
                        .as_deref()
                        .map_or(false, |s| re.is_match(s))
                });
                let cmp_ok = cmp_re.as_ref().map_or(true, |re| {
                    c.params
                        .component
                        .as_deref()
                        .map_or(false, |s| re.is_match(s))
                });
                st_ok && cmp_ok
            })
            .cloned()
            .collect();
        if channels.is_empty() {
            log::warn!("No channel was found.");
        }
        Ok(WaveSet { channels })
    }

    /// Overwrite each channel's metadata from the matching table row.
    ///
    /// Channels without a row keep their defaults (logged at debug); rows
    /// without a channel are ignored. The channel id itself is never
    /// overwritten. With `apply_calib` the freshly bound calibration is
    /// applied to the samples right away.
    pub fn bind_chtable(&mut self, rows: &[ChRow], apply_calib: bool) {
        for channel in self.channels.iter_mut() {
            match rows.iter().find(|r| r.ch == channel.ch()) {
                Some(row) => {
                    let is_calibed = channel.params.is_calibed;
                    channel.params = row.params.clone();
                    channel.params.is_calibed = is_calibed;
                    if apply_calib {
                        channel.calibrate();
                    }
                }
                None => {
                    log::debug!(
                        "no channel table row for channel {}",
                        channel.ch_string()
                    );
                }
            }
        }
    }

    /// The channel table rows describing this set.
    pub fn chtable_rows(&self) -> Vec<ChRow> {
        self.channels
            .iter()
            .map(|c| ChRow::new(c.ch(), c.params.clone()))
            .collect()
    }

    // =======================
    // Broadcast operations
    // =======================

    pub fn calibrate(&mut self) -> &mut Self {
        for c in self.channels.iter_mut() {
            c.calibrate();
        }
        self
    }

    pub fn decalibrate(&mut self) -> &mut Self {
        for c in self.channels.iter_mut() {
            c.decalibrate();
        }
        self
    }

    pub fn demean(&mut self) -> &mut Self {
        for c in self.channels.iter_mut() {
            c.demean();
        }
        self
    }

    pub fn detrend(&mut self) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.detrend()?;
        }
        Ok(self)
    }

    pub fn gradient(&mut self) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.gradient()?;
        }
        Ok(self)
    }

    pub fn cumsum(&mut self) -> &mut Self {
        for c in self.channels.iter_mut() {
            c.cumsum();
        }
        self
    }

    pub fn integrate(&mut self) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.integrate()?;
        }
        Ok(self)
    }

    pub fn shift_time(&mut self, delta: Duration) -> &mut Self {
        for c in self.channels.iter_mut() {
            c.shift_time(delta);
        }
        self
    }

    pub fn bandpass(
        &mut self,
        fmin: Option<f64>,
        fmax: Option<f64>,
        filt_order: usize,
    ) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.bandpass(fmin, fmax, filt_order)?;
        }
        Ok(self)
    }

    pub fn taper(&mut self, taper_ratio: f64) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.taper(taper_ratio)?;
        }
        Ok(self)
    }

    pub fn decimate(&mut self, new_fs: f64) -> Result<&mut Self, WinError> {
        for c in self.channels.iter_mut() {
            c.decimate(new_fs)?;
        }
        Ok(self)
    }

    /// Trim every channel to the same window (closed end).
    pub fn trim(
        &self,
        starttime: Option<NaiveDateTime>,
        endtime: Option<NaiveDateTime>,
    ) -> Result<WaveSet, WinError> {
        let mut channels = Vec::with_capacity(self.channels.len());
        for c in &self.channels {
            channels.push(c.trim(starttime, endtime, true)?);
        }
        Ok(WaveSet { channels })
    }
}

impl IntoIterator for WaveSet {
    type Item = Channel;
    type IntoIter = std::vec::IntoIter<Channel>;

    fn into_iter(self) -> Self::IntoIter {
        self.channels.into_iter()
    }
}

/// Translate a `*`/`?` glob into an anchored regular expression.
fn glob_to_regex(glob: &str) -> Result<Regex, WinError> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| WinError::Process {
        msg: format!("bad selection pattern {:?}: {}", glob, e),
    })
}
