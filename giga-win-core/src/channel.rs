//! The single-channel time series at the heart of the waveform object
//! model.
use chrono::{Duration, NaiveDateTime};

use crate::dsp;
use crate::errors::WinError;
use crate::params::Params;
use crate::timeutil::{sample_times, seconds_between};
use crate::units::{diff_unit, integrate_unit};

/// Sample storage of a channel.
///
/// A channel fresh off the wire holds raw integer counts; calibration and
/// most processing operations promote it to floating point, mirroring how
/// the data flows through the rest of the toolchain.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    Counts(Vec<i64>),
    Physical(Vec<f64>),
}

impl Samples {
    pub fn len(&self) -> usize {
        match self {
            Samples::Counts(v) => v.len(),
            Samples::Physical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at `i` as a float.
    pub fn get(&self, i: usize) -> f64 {
        match self {
            Samples::Counts(v) => v[i] as f64,
            Samples::Physical(v) => v[i],
        }
    }

    /// All samples as floats. Clones the data.
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Samples::Counts(v) => v.iter().map(|&x| x as f64).collect(),
            Samples::Physical(v) => v.clone(),
        }
    }

    /// A copy of the subrange `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Samples {
        match self {
            Samples::Counts(v) => Samples::Counts(v[start..end].to_vec()),
            Samples::Physical(v) => Samples::Physical(v[start..end].to_vec()),
        }
    }

    fn map_to_physical<F: FnMut(Vec<f64>) -> Vec<f64>>(&mut self, mut f: F) {
        let data = self.to_f64();
        *self = Samples::Physical(f(data));
    }
}

impl From<Vec<i64>> for Samples {
    fn from(v: Vec<i64>) -> Self {
        Samples::Counts(v)
    }
}

impl From<Vec<f64>> for Samples {
    fn from(v: Vec<f64>) -> Self {
        Samples::Physical(v)
    }
}

/// Parse a channel id from its conventional rendering as up to four hex
/// digits, case-insensitively.
///
/// ```
/// # use giga_win_core::channel::ch_from_hex;
/// assert_eq!(ch_from_hex("0010").unwrap(), 0x0010);
/// assert_eq!(ch_from_hex("a3").unwrap(), 0x00A3);
/// assert!(ch_from_hex("12345").is_err());
/// ```
pub fn ch_from_hex(s: &str) -> Result<u16, WinError> {
    if s.is_empty() || s.len() > 4 {
        return Err(WinError::ParseField {
            field: "channel id",
            text: s.to_string(),
        });
    }
    u16::from_str_radix(s, 16).map_err(|_| WinError::ParseField {
        field: "channel id",
        text: s.to_string(),
    })
}

/// This structure represents one channel of waveform data: a channel id,
/// the samples, an equally long vector of sample instants and the station
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    ch: u16,
    /// The samples.
    pub data: Samples,
    /// One instant per sample, strictly increasing.
    pub time: Vec<NaiveDateTime>,
    /// Station metadata, owned by the channel.
    pub params: Params,
}

impl Channel {
    /// Build a channel from samples, a start instant and a constant
    /// sampling rate; the time vector is derived.
    pub fn new<S: Into<Samples>>(ch: u16, data: S, starttime: NaiveDateTime, fs: f64) -> Self {
        let data = data.into();
        let time = sample_times(starttime, fs, data.len());
        Channel {
            ch,
            data,
            time,
            params: Params::default(),
        }
    }

    /// Build a channel from pre-existing sample and time vectors, which
    /// must have the same length.
    pub fn from_parts<S: Into<Samples>>(
        ch: u16,
        data: S,
        time: Vec<NaiveDateTime>,
    ) -> Result<Self, WinError> {
        let data = data.into();
        if data.len() != time.len() {
            return Err(WinError::Process {
                msg: format!(
                    "sample and time vectors differ in length: {} != {}",
                    data.len(),
                    time.len()
                ),
            });
        }
        Ok(Channel {
            ch,
            data,
            time,
            params: Params::default(),
        })
    }

    /// The 16-bit channel id.
    pub fn ch(&self) -> u16 {
        self.ch
    }

    /// The channel id in its conventional four-digit uppercase hex form.
    pub fn ch_string(&self) -> String {
        format!("{:04X}", self.ch)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn starttime(&self) -> Option<NaiveDateTime> {
        self.time.first().copied()
    }

    pub fn endtime(&self) -> Option<NaiveDateTime> {
        self.time.last().copied()
    }

    /// Seconds between the first and the last sample.
    pub fn timelength(&self) -> f64 {
        match (self.starttime(), self.endtime()) {
            (Some(s), Some(e)) => seconds_between(s, e),
            _ => 0.0,
        }
    }

    /// The constant sampling interval in seconds.
    ///
    /// Fails with [`WinError::NonUniformRate`] when the spacing varies.
    pub fn dt(&self) -> Result<f64, WinError> {
        if self.time.len() < 2 {
            return Err(WinError::Process {
                msg: "at least two samples are needed for a sampling interval".to_string(),
            });
        }
        let first = self.time[1] - self.time[0];
        for w in self.time.windows(2) {
            if w[1] - w[0] != first {
                return Err(WinError::NonUniformRate);
            }
        }
        let ns = first.num_nanoseconds().ok_or(WinError::NonUniformRate)?;
        if ns <= 0 {
            return Err(WinError::NonUniformRate);
        }
        Ok(ns as f64 / 1e9)
    }

    /// The constant sampling rate in Hz.
    pub fn fs(&self) -> Result<f64, WinError> {
        Ok(1.0 / self.dt()?)
    }

    /// A deep copy.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// A new channel over the samples `[start, end)`, sharing metadata.
    pub fn slice(&self, start: usize, end: usize) -> Result<Channel, WinError> {
        if start >= end || end > self.len() {
            return Err(WinError::EmptyRange {
                msg: format!(
                    "index range [{}, {}) of a channel with {} samples",
                    start,
                    end,
                    self.len()
                ),
            });
        }
        Ok(Channel {
            ch: self.ch,
            data: self.data.slice(start, end),
            time: self.time[start..end].to_vec(),
            params: self.params.clone(),
        })
    }

    // =======================
    // Calibration
    // =======================

    /// Scale the samples by the calibration factor. Idempotent.
    pub fn calibrate(&mut self) -> &mut Self {
        if !self.params.is_calibed {
            let calib = self.params.calib();
            self.data.map_to_physical(|mut v| {
                for x in v.iter_mut() {
                    *x *= calib;
                }
                v
            });
            self.params.is_calibed = true;
        }
        self
    }

    /// Undo [`Channel::calibrate`]. Idempotent.
    pub fn decalibrate(&mut self) -> &mut Self {
        if self.params.is_calibed {
            let calib = self.params.calib();
            self.data.map_to_physical(|mut v| {
                for x in v.iter_mut() {
                    *x /= calib;
                }
                v
            });
            self.params.is_calibed = false;
        }
        self
    }

    /// Convert physical samples back to integer counts, folding the scale
    /// used into `ad_bit_step`. Integer channels are returned unchanged.
    ///
    /// Floats that are already whole numbers are cast directly; anything
    /// else is scaled by `max(|sample|)/255` first so the dynamic range
    /// stays within a handful of bytes per delta.
    pub fn to_counts(&self) -> Result<Channel, WinError> {
        let mut out = self.copy();
        out.decalibrate();
        let v = match &out.data {
            Samples::Counts(_) => return Ok(out),
            Samples::Physical(v) => v,
        };
        if v.iter().all(|x| x.fract() == 0.0 && x.abs() <= i64::MAX as f64) {
            out.data = Samples::Counts(v.iter().map(|&x| x as i64).collect());
            return Ok(out);
        }
        let max = v.iter().fold(0.0f64, |m, &x| m.max(x.abs()));
        if max == 0.0 {
            out.data = Samples::Counts(vec![0; v.len()]);
            return Ok(out);
        }
        let scale = max / 255.0;
        out.data = Samples::Counts(v.iter().map(|&x| (x / scale).round() as i64).collect());
        out.params.ad_bit_step *= scale;
        Ok(out)
    }

    // =======================
    // Processing
    // =======================

    /// Translate the time vector by `delta`.
    pub fn shift_time(&mut self, delta: Duration) -> &mut Self {
        for t in self.time.iter_mut() {
            *t += delta;
        }
        self
    }

    /// The subsequence between `starttime` and `endtime`.
    ///
    /// With `contain_end`, a sample within half a sampling interval of the
    /// end is still included, which keeps the boundary deterministic in the
    /// face of rounded sample instants. At least one bound must be given.
    pub fn trim(
        &self,
        starttime: Option<NaiveDateTime>,
        endtime: Option<NaiveDateTime>,
        contain_end: bool,
    ) -> Result<Channel, WinError> {
        if starttime.is_none() && endtime.is_none() {
            return Err(WinError::Process {
                msg: "either a start or an end time must be given to trim".to_string(),
            });
        }
        if let (Some(s), Some(e)) = (starttime, endtime) {
            if s >= e {
                return Err(WinError::TimeRangeEmpty { start: s, end: e });
            }
        }
        let own_start = self.starttime().ok_or_else(|| WinError::EmptyRange {
            msg: "cannot trim an empty channel".to_string(),
        })?;
        let own_end = self.endtime().expect("non-empty");
        if let Some(s) = starttime {
            if s > own_end {
                return Err(WinError::EmptyRange {
                    msg: format!("start {} is after the end of the data {}", s, own_end),
                });
            }
        }
        if let Some(e) = endtime {
            if e < own_start {
                return Err(WinError::EmptyRange {
                    msg: format!("end {} is before the start of the data {}", e, own_start),
                });
            }
        }

        let start_idx = match starttime {
            Some(s) => self.time.iter().position(|&t| t >= s),
            None => Some(0),
        };
        let end_idx = match endtime {
            Some(e) => {
                let bound = if contain_end {
                    // Half a sampling interval of slack on the closed end.
                    let half = self
                        .dt()
                        .map(|dt| Duration::nanoseconds((dt * 5e8) as i64))
                        .unwrap_or_else(|_| Duration::zero());
                    e + half
                } else {
                    e
                };
                let cmp = |t: &NaiveDateTime| {
                    if contain_end {
                        *t <= bound
                    } else {
                        *t < bound
                    }
                };
                self.time.iter().rposition(cmp)
            }
            None => Some(self.time.len() - 1),
        };
        match (start_idx, end_idx) {
            (Some(i), Some(j)) if i <= j => self.slice(i, j + 1),
            _ => Err(WinError::EmptyRange {
                msg: format!(
                    "window {:?} - {:?} holds no samples",
                    starttime, endtime
                ),
            }),
        }
    }

    /// Remove the mean.
    pub fn demean(&mut self) -> &mut Self {
        if self.is_empty() {
            return self;
        }
        self.data.map_to_physical(|mut v| {
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            for x in v.iter_mut() {
                *x -= mean;
            }
            v
        });
        self
    }

    /// Remove the least-squares linear trend.
    pub fn detrend(&mut self) -> Result<&mut Self, WinError> {
        if self.len() >= 2 {
            self.dt()?;
        }
        self.data.map_to_physical(|mut v| {
            dsp::detrend_linear(&mut v);
            v
        });
        Ok(self)
    }

    /// Differentiate with central differences, updating the unit.
    pub fn gradient(&mut self) -> Result<&mut Self, WinError> {
        let dt = self.dt()?;
        self.data.map_to_physical(|v| {
            let n = v.len();
            let mut out = Vec::with_capacity(n);
            for i in 0..n {
                let d = if i == 0 {
                    v[1] - v[0]
                } else if i == n - 1 {
                    v[n - 1] - v[n - 2]
                } else {
                    (v[i + 1] - v[i - 1]) / 2.0
                };
                out.push(d / dt);
            }
            out
        });
        self.params.unit = diff_unit(&self.params.unit);
        Ok(self)
    }

    /// Running sum of the samples, updating the unit as an integration.
    pub fn cumsum(&mut self) -> &mut Self {
        match &mut self.data {
            Samples::Counts(v) => {
                let mut acc = 0i64;
                for x in v.iter_mut() {
                    acc += *x;
                    *x = acc;
                }
            }
            Samples::Physical(v) => {
                let mut acc = 0.0;
                for x in v.iter_mut() {
                    acc += *x;
                    *x = acc;
                }
            }
        }
        self.params.unit = integrate_unit(&self.params.unit);
        self
    }

    /// Cumulative trapezoid integration, updating the unit.
    pub fn integrate(&mut self) -> Result<&mut Self, WinError> {
        let dt = self.dt()?;
        self.data.map_to_physical(|v| dsp::cumtrapz(&v, dt));
        self.params.unit = integrate_unit(&self.params.unit);
        Ok(self)
    }

    /// Zero-phase Butterworth filter. One corner gives a high- or low-pass,
    /// both a band-pass; an upper corner beyond Nyquist is clamped.
    pub fn bandpass(
        &mut self,
        fmin: Option<f64>,
        fmax: Option<f64>,
        filt_order: usize,
    ) -> Result<&mut Self, WinError> {
        let fs = self.fs()?;
        let fmax = fmax.map(|f| {
            if f > fs / 2.0 {
                log::warn!("fmax is set to Nyquist frequency {} Hz (fs/2)", fs / 2.0);
                fs / 2.0 * (1.0 - 1e-9)
            } else {
                f
            }
        });
        let (b, a) = dsp::butter(filt_order, fmin, fmax, fs)?;
        let filtered = dsp::filtfilt(&b, &a, &self.data.to_f64())?;
        self.data = Samples::Physical(filtered);
        self.params.fmin = fmin;
        self.params.fmax = fmax;
        Ok(self)
    }

    /// Taper both ends with a Hann window. `ratio` is the tapered fraction
    /// of the record on each side, at most 0.5.
    pub fn taper(&mut self, taper_ratio: f64) -> Result<&mut Self, WinError> {
        if !(0.0..=0.5).contains(&taper_ratio) {
            return Err(WinError::Process {
                msg: format!("taper ratio {} is outside [0, 0.5]", taper_ratio),
            });
        }
        let pts = (self.len() as f64 * taper_ratio) as usize;
        if pts == 0 {
            return Ok(self);
        }
        let window = dsp::hann(pts * 2);
        self.data.map_to_physical(|mut v| {
            let n = v.len();
            for i in 0..pts {
                v[i] *= window[i];
                v[n - 1 - i] *= window[window.len() - 1 - i];
            }
            v
        });
        Ok(self)
    }

    /// Downsample to `new_fs` by an integer factor, low-pass filtering
    /// first so nothing aliases, and keeping zero phase.
    pub fn decimate(&mut self, new_fs: f64) -> Result<&mut Self, WinError> {
        let fs = self.fs()?;
        let ratio = fs / new_fs;
        let q = ratio.round() as usize;
        if q < 1 || (ratio - q as f64).abs() > 1e-9 {
            return Err(WinError::Process {
                msg: format!(
                    "decimation from {} Hz to {} Hz is not an integer ratio",
                    fs, new_fs
                ),
            });
        }
        if q > 1 {
            let cutoff = 0.8 * new_fs / 2.0;
            let (b, a) = dsp::butter(8, None, Some(cutoff), fs)?;
            let filtered = dsp::filtfilt(&b, &a, &self.data.to_f64())?;
            self.data = Samples::Physical(filtered.into_iter().step_by(q).collect());
            self.time = self.time.iter().copied().step_by(q).collect();
        }
        self.params.fmax = Some(new_fs / 2.0);
        Ok(self)
    }
}
