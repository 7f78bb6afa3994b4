//! The `seis` arrival-pick file: a reference time line followed by one
//! fixed-column row per station.
//!
//! Arrival times are seconds from the reference time. A missing pick is
//! stored as `0` with certainty `0`; the two station corrections at the
//! end of a row are omitted entirely when both are absent.
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use giga_win_core::errors::WinError;
use giga_win_core::timeutil::{duration_secs, seconds_between, yy2yyyy, yyyy2yy};

use crate::{fmt_e, parse_f64_field, slice_field, Polarity};

/// One pick row of a `seis` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    /// Station code, at most 10 characters.
    pub stncode: String,
    pub polarity: Polarity,
    /// P arrival in seconds from the reference time; `None` when unpicked.
    pub ptime: Option<f64>,
    pub pcertainty: Option<f64>,
    /// S arrival in seconds from the reference time; `None` when unpicked.
    pub stime: Option<f64>,
    pub scertainty: Option<f64>,
    /// F-P duration in seconds; `0` when absent.
    pub fptime: f64,
    /// Maximum amplitude; `0` when absent.
    pub maxamp: f64,
    pub lat: f64,
    pub lon: f64,
    /// Station elevation in metres.
    pub elev: f64,
    pub pcorrection: Option<f64>,
    pub scorrection: Option<f64>,
}

impl Default for Arrival {
    fn default() -> Self {
        Arrival {
            stncode: String::new(),
            polarity: Polarity::Unknown,
            ptime: None,
            pcertainty: None,
            stime: None,
            scertainty: None,
            fptime: 0.0,
            maxamp: 0.0,
            lat: 0.0,
            lon: 0.0,
            elev: 0.0,
            pcorrection: None,
            scorrection: None,
        }
    }
}

/// A parsed `seis` file: the reference time and the pick rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Seis {
    /// Reference minute for the per-row arrival seconds.
    pub reftime: NaiveDateTime,
    pub arrivals: Vec<Arrival>,
}

impl Seis {
    pub fn new(reftime: NaiveDateTime) -> Self {
        Seis {
            reftime,
            arrivals: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.arrivals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrivals.is_empty()
    }

    /// Read a `seis` file (or a win pick file, whose `#s` lines carry the
    /// same payload).
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Seis, WinError> {
        let text = std::fs::read_to_string(path)?;
        Seis::parse(&text)
    }

    /// Parse `seis` text.
    ///
    /// When any line starts with `#s` the input is treated as a pick file:
    /// only those lines are used, with the `#s ` framing stripped.
    pub fn parse(text: &str) -> Result<Seis, WinError> {
        let mut lines: Vec<&str> = text.lines().collect();
        if lines.iter().any(|l| l.starts_with("#s")) {
            log::info!("Reading pick file: only lines starting with '#s' are read.");
            lines = lines
                .iter()
                .filter_map(|l| l.strip_prefix("#s"))
                .map(|l| l.strip_prefix(' ').unwrap_or(l))
                .collect();
        }
        let head = lines.first().ok_or(WinError::ParseField {
            field: "seis reference time",
            text: "empty file".to_string(),
        })?;

        let num = |range: std::ops::Range<usize>, field: &'static str| -> Result<u32, WinError> {
            let text = slice_field(head, range).trim();
            text.parse::<u32>().map_err(|_| WinError::ParseField {
                field,
                text: text.to_string(),
            })
        };
        let yy = num(0..2, "reference year")?;
        let mm = num(3..5, "reference month")?;
        let dd = num(6..8, "reference day")?;
        let hh = num(9..11, "reference hour")?;
        let mi = num(12..14, "reference minute")?;
        let reftime = NaiveDate::from_ymd_opt(yy2yyyy(yy as i32)?, mm, dd)
            .and_then(|d| d.and_hms_opt(hh, mi, 0))
            .ok_or_else(|| WinError::ParseField {
                field: "seis reference time",
                text: head.to_string(),
            })?;

        let mut arrivals = Vec::new();
        for line in &lines[1..] {
            if line.trim().is_empty() {
                continue;
            }
            arrivals.push(parse_arrival(line)?);
        }
        Ok(Seis { reftime, arrivals })
    }

    /// Shift the reference time, keeping every pick at the same absolute
    /// instant. The new reference may not carry seconds or fractions.
    pub fn change_reftime(&mut self, newreftime: NaiveDateTime) -> Result<(), WinError> {
        if newreftime.second() != 0 || newreftime.nanosecond() != 0 {
            return Err(WinError::Process {
                msg: format!(
                    "a reference time may not have units below the minute: {}",
                    newreftime
                ),
            });
        }
        let dt = seconds_between(newreftime, self.reftime);
        if dt == 0.0 {
            log::debug!("No change in reftime.");
            return Ok(());
        }
        self.reftime = newreftime;
        for arrival in self.arrivals.iter_mut() {
            if let Some(p) = arrival.ptime.as_mut() {
                *p += dt;
            }
            if let Some(s) = arrival.stime.as_mut() {
                *s += dt;
            }
        }
        log::debug!("New reftime: {} ({:+.3}s)", self.reftime, dt);
        Ok(())
    }

    /// Concatenate two pick sets onto the earlier of the two reference
    /// times.
    pub fn concat(mut self, mut other: Seis) -> Result<Seis, WinError> {
        let reftime = self.reftime.min(other.reftime);
        self.change_reftime(reftime)?;
        other.change_reftime(reftime)?;
        self.arrivals.extend(other.arrivals);
        Ok(self)
    }

    /// Write the file, refusing to clobber unless asked.
    pub fn write<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> Result<(), WinError> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(WinError::FileExists {
                path: path.to_path_buf(),
            });
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.to_text(chrono::Local::now().naive_local()).as_bytes())?;
        log::info!("Saved: {}", path.display());
        Ok(())
    }

    /// Render the file content. `now` lands in the right half of the first
    /// line as the creation stamp.
    pub fn to_text(&self, now: NaiveDateTime) -> String {
        let mut text = String::new();
        text.push_str(&format!(
            "{:02}/{:02}/{:02} {:02}:{:02}                   {}\n",
            yyyy2yy(chrono::Datelike::year(&self.reftime)).unwrap_or(0),
            chrono::Datelike::month(&self.reftime),
            chrono::Datelike::day(&self.reftime),
            self.reftime.hour(),
            self.reftime.minute(),
            now.format("%y/%m/%d %H:%M:%S"),
        ));
        for a in &self.arrivals {
            // An unpicked arrival zeroes both the time and its certainty.
            let (ptime, pcert) = match a.ptime {
                Some(p) => (p, a.pcertainty.unwrap_or(0.0)),
                None => (0.0, 0.0),
            };
            let (stime, scert) = match a.stime {
                Some(s) => (s, a.scertainty.unwrap_or(0.0)),
                None => (0.0, 0.0),
            };
            text.push_str(&format!(
                "{:<10} {}{:>8.3}{:>6.3}{:>8.3}{:>6.3}{:>6.1}{}{:>11.5}{:>11.5}{:>7.0}",
                a.stncode,
                a.polarity.as_char(),
                ptime,
                pcert,
                stime,
                scert,
                a.fptime,
                fmt_e(a.maxamp, 9, 2, false),
                a.lat,
                a.lon,
                a.elev,
            ));
            // Corrections are dropped together when both are absent.
            let pcorr = a.pcorrection.filter(|c| *c != 0.0);
            let scorr = a.scorrection.filter(|c| *c != 0.0);
            if pcorr.is_some() || scorr.is_some() {
                match pcorr {
                    Some(c) => text.push_str(&format!("{:>7.3}", c)),
                    None => text.push_str("       "),
                }
                match scorr {
                    Some(c) => text.push_str(&format!("{:>7.3}", c)),
                    None => text.push_str("       "),
                }
            }
            text.push('\n');
        }
        text
    }

    /// The row with the earliest P arrival (falling back to the earliest S
    /// arrival), which HYPOMH conventionally uses as the initial epicentre.
    pub fn earliest_arrival(&self) -> Option<&Arrival> {
        let by_p = self
            .arrivals
            .iter()
            .filter(|a| a.ptime.is_some())
            .min_by(|a, b| cmp_f64(a.ptime, b.ptime));
        by_p.or_else(|| {
            self.arrivals
                .iter()
                .filter(|a| a.stime.is_some())
                .min_by(|a, b| cmp_f64(a.stime, b.stime))
        })
    }

    /// The absolute instant of a pick given in seconds from the reference.
    pub fn absolute(&self, seconds: f64) -> NaiveDateTime {
        self.reftime + duration_secs(seconds)
    }
}

fn cmp_f64(a: Option<f64>, b: Option<f64>) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

fn parse_arrival(line: &str) -> Result<Arrival, WinError> {
    // Rows without the optional corrections are shorter; the field slicer
    // treats everything past the end as blank.
    let get = |range: std::ops::Range<usize>, field: &'static str| -> Result<f64, WinError> {
        Ok(parse_f64_field(line, range, field)?.unwrap_or(0.0))
    };

    let mut a = Arrival {
        stncode: slice_field(line, 0..10).trim_end().to_string(),
        polarity: slice_field(line, 11..12)
            .chars()
            .next()
            .map(Polarity::from_char)
            .unwrap_or_default(),
        ..Default::default()
    };

    // Zero means "no pick" for the times, certainties and corrections.
    let none_if_zero = |v: f64| if v == 0.0 { None } else { Some(v) };
    a.ptime = none_if_zero(get(12..20, "ptime")?);
    a.pcertainty = none_if_zero(get(20..26, "pcertainty")?);
    a.stime = none_if_zero(get(26..34, "stime")?);
    a.scertainty = none_if_zero(get(34..40, "scertainty")?);
    a.fptime = get(40..46, "fptime")?;
    a.maxamp = get(46..55, "maxamp")?;
    a.lat = get(55..66, "lat")?;
    a.lon = get(66..77, "lon")?;
    a.elev = get(77..84, "elev")?;
    a.pcorrection = none_if_zero(get(84..91, "pcorrection")?);
    a.scorrection = none_if_zero(get(91..98, "scorrection")?);
    Ok(a)
}
