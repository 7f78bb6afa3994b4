//! The `final` result file of HYPOMH: origin, diagnosis and errors,
//! covariance, initial hypocenter, data counts, per-station results and
//! the O-C standard deviations.
//!
//! The layout follows HYPOMH's FORTRAN formats 2200/2210/2220/2230/2240
//! plus the per-station block; the readers slice exactly the columns those
//! formats produce.
use std::io::Write;
use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use giga_win_core::errors::WinError;
use giga_win_core::timeutil::{duration_secs, yy2yyyy, yyyy2yy};

use crate::{fmt_e, parse_f64_field, parse_i64_field, slice_field, AmpOrFpTime, Polarity};

/// HYPOMH's convergence diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnosis {
    /// Converged.
    Conv,
    /// Did not converge.
    Nocn,
    /// Ran into the depth limit.
    Deep,
    /// Converged above the surface.
    Airf,
    Other(String),
}

impl Diagnosis {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "CONV" => Diagnosis::Conv,
            "NOCN" => Diagnosis::Nocn,
            "DEEP" => Diagnosis::Deep,
            "AIRF" => Diagnosis::Airf,
            other => Diagnosis::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Diagnosis::Conv => "CONV",
            Diagnosis::Nocn => "NOCN",
            Diagnosis::Deep => "DEEP",
            Diagnosis::Airf => "AIRF",
            Diagnosis::Other(s) => s,
        }
    }
}

/// One per-station result row.
#[derive(Debug, Clone, PartialEq)]
pub struct FinalArrival {
    pub code: String,
    pub polarity: Polarity,
    pub distance_km: f64,
    /// Station azimuth, degrees east of north.
    pub azimuth: f64,
    /// Takeoff angle, degrees up from down.
    pub takeoff: f64,
    /// Incident angle, degrees up from down.
    pub incident: f64,
    /// Station-corrected P time in seconds from the origin line's minute.
    pub ptime: f64,
    pub punc: f64,
    /// P observed-minus-calculated in seconds.
    pub poc: f64,
    pub stime: f64,
    pub sunc: f64,
    pub soc: f64,
    /// Maximum amplitude, or the F-P duration when no amplitude exists.
    pub amp: AmpOrFpTime,
    /// Station magnitude; `9.9` on the wire means undetermined.
    pub mag: Option<f64>,
}

/// A parsed `final` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Final {
    /// Origin time; `None` when HYPOMH printed an unreadable second field.
    pub origintime: Option<NaiveDateTime>,
    pub lat: f64,
    pub lon: f64,
    pub dep_km: f64,
    /// Event magnitude; `9.9` on the wire means undetermined.
    pub mag: Option<f64>,
    pub diag: Diagnosis,
    /// Origin-time error in seconds (always zero from HYPOMH).
    pub ot_error: f64,
    pub laterror_km: f64,
    pub lonerror_km: f64,
    pub deperror_km: f64,
    /// Error covariance Cxx, Cxy, Cxz, Cyy, Cyz, Czz in km^2 (x east,
    /// y south, z down).
    pub cov: [f64; 6],
    pub init_lat: f64,
    pub init_lat_unc_km: f64,
    pub init_lon: f64,
    pub init_lon_unc_km: f64,
    pub init_dep_km: f64,
    pub init_dep_unc_km: f64,
    pub n_station: usize,
    /// Velocity model name.
    pub model: String,
    pub n_p: usize,
    pub contrib_p: f64,
    pub n_s: usize,
    pub contrib_s: f64,
    /// Initial-position data count; always 3 for the three coordinates.
    pub n_init: usize,
    pub contrib_init: f64,
    pub arrivals: Vec<FinalArrival>,
    /// Standard deviation of the P time O-C values, seconds.
    pub poc_std: f64,
    /// Standard deviation of the S time O-C values, seconds.
    pub soc_std: f64,
}

impl Final {
    pub fn cxx(&self) -> f64 {
        self.cov[0]
    }
    pub fn cxy(&self) -> f64 {
        self.cov[1]
    }
    pub fn cxz(&self) -> f64 {
        self.cov[2]
    }
    pub fn cyy(&self) -> f64 {
        self.cov[3]
    }
    pub fn cyz(&self) -> f64 {
        self.cov[4]
    }
    pub fn czz(&self) -> f64 {
        self.cov[5]
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Final, WinError> {
        let text = std::fs::read_to_string(path)?;
        Final::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Final, WinError> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 5 {
            return Err(WinError::ParseField {
                field: "final file",
                text: format!("{} lines is too short for a final file", lines.len()),
            });
        }

        // Line 1: origin time, hypocenter, magnitude.
        let hypo = lines[0];
        let origintime = if slice_field(hypo, 18..26).contains('*') {
            None
        } else {
            let int = |r: std::ops::Range<usize>, f: &'static str| parse_i64_field(hypo, r, f);
            let seconds = parse_f64_field(hypo, 18..26, "origin seconds")?.unwrap_or(0.0);
            let base = NaiveDate::from_ymd_opt(
                yy2yyyy(int(0..3, "origin year")? as i32)?,
                int(3..6, "origin month")? as u32,
                int(6..9, "origin day")? as u32,
            )
            .and_then(|d| {
                d.and_hms_opt(
                    int(12..15, "origin hour").unwrap_or(0) as u32,
                    int(15..18, "origin minute").unwrap_or(0) as u32,
                    0,
                )
            })
            .ok_or_else(|| WinError::ParseField {
                field: "origin time",
                text: hypo.to_string(),
            })?;
            Some(base + duration_secs(seconds))
        };
        let lat = parse_f64_field(hypo, 26..37, "latitude")?.unwrap_or(0.0);
        let lon = parse_f64_field(hypo, 37..48, "longitude")?.unwrap_or(0.0);
        let dep_km = parse_f64_field(hypo, 48..56, "depth")?.unwrap_or(0.0);
        let mag = parse_f64_field(hypo, 56..62, "magnitude")?.and_then(undetermined_mag);

        // Line 2: diagnosis and errors.
        let qual = lines[1];
        let diag = Diagnosis::from_code(slice_field(qual, 3..7));
        let ot_error = parse_f64_field(qual, 18..26, "origin-time error")?.unwrap_or(0.0);
        let laterror_km = parse_f64_field(qual, 26..35, "latitude error")?.unwrap_or(0.0);
        let lonerror_km = parse_f64_field(qual, 37..46, "longitude error")?.unwrap_or(0.0);
        let deperror_km = parse_f64_field(qual, 48..56, "depth error")?.unwrap_or(0.0);

        // Line 3: the six covariance components.
        let cov_values: Result<Vec<f64>, _> = lines[2]
            .split_whitespace()
            .map(|t| t.parse::<f64>())
            .collect();
        let cov_values = cov_values.map_err(|_| WinError::ParseField {
            field: "covariance",
            text: lines[2].to_string(),
        })?;
        if cov_values.len() != 6 {
            return Err(WinError::ParseField {
                field: "covariance",
                text: lines[2].to_string(),
            });
        }
        let mut cov = [0.0; 6];
        cov.copy_from_slice(&cov_values);

        // Line 4: the initial hypocenter and its uncertainties.
        let init = lines[3];
        let f = |r: std::ops::Range<usize>, n: &'static str| -> Result<f64, WinError> {
            Ok(parse_f64_field(init, r, n)?.unwrap_or(0.0))
        };
        let init_lat = f(12..19, "initial latitude")?;
        let init_lat_unc_km = f(20..25, "initial latitude uncertainty")?;
        let init_lon = f(26..33, "initial longitude")?;
        let init_lon_unc_km = f(34..39, "initial longitude uncertainty")?;
        let init_dep_km = f(40..47, "initial depth")?;
        let init_dep_unc_km = f(48..53, "initial depth uncertainty")?;

        // Line 5: counts, model and contributions.
        let info = lines[4];
        let n_station = parse_i64_field(info, 2..5, "station count")? as usize;
        let model = slice_field(info, 6..10).trim().to_string();
        let n_p = parse_i64_field(info, 11..14, "P count")? as usize;
        let contrib_p = parse_f64_field(info, 16..21, "P contribution")?.unwrap_or(0.0);
        let n_s = parse_i64_field(info, 25..28, "S count")? as usize;
        let contrib_s = parse_f64_field(info, 30..35, "S contribution")?.unwrap_or(0.0);
        let n_init = parse_i64_field(info, 39..42, "initial count")? as usize;
        let contrib_init = parse_f64_field(info, 44..49, "initial contribution")?.unwrap_or(0.0);

        // The per-station block, then the O-C standard deviations.
        if lines.len() < 5 + n_station + 1 {
            return Err(WinError::ParseField {
                field: "final station block",
                text: format!(
                    "{} stations declared but the file ends after {} lines",
                    n_station,
                    lines.len()
                ),
            });
        }
        let mut arrivals = Vec::with_capacity(n_station);
        for line in &lines[5..5 + n_station] {
            arrivals.push(parse_station_row(line)?);
        }
        let std_line = lines[5 + n_station];
        let poc_std = parse_f64_field(std_line, 52..59, "P O-C std")?.unwrap_or(0.0);
        let soc_std = parse_f64_field(std_line, 72..79, "S O-C std")?.unwrap_or(0.0);

        Ok(Final {
            origintime,
            lat,
            lon,
            dep_km,
            mag,
            diag,
            ot_error,
            laterror_km,
            lonerror_km,
            deperror_km,
            cov,
            init_lat,
            init_lat_unc_km,
            init_lon,
            init_lon_unc_km,
            init_dep_km,
            init_dep_unc_km,
            n_station,
            model,
            n_p,
            contrib_p,
            n_s,
            contrib_s,
            n_init,
            contrib_init,
            arrivals,
            poc_std,
            soc_std,
        })
    }

    /// Render the file in HYPOMH's own column layout.
    pub fn to_text(&self) -> Result<String, WinError> {
        let origin = self.origintime.ok_or_else(|| WinError::Process {
            msg: "cannot write a final file without an origin time".to_string(),
        })?;
        let seconds =
            f64::from(origin.second()) + f64::from(origin.nanosecond()) / 1e9;

        let mut text = String::new();
        // 2200: 3I3.2,3X,2I3,F8.3,2F11.5,F8.3,F6.1
        text.push_str(&format!(
            "{}{}{}   {:>3}{:>3}{:>8.3}{:>11.5}{:>11.5}{:>8.3}{:>6.1}\n",
            i3_2(i64::from(yyyy2yy(origin.year())?)),
            i3_2(i64::from(origin.month())),
            i3_2(i64::from(origin.day())),
            origin.hour(),
            origin.minute(),
            seconds,
            self.lat,
            self.lon,
            self.dep_km,
            self.mag.unwrap_or(9.9),
        ));
        // 2210: 3X,A4,11X,F8.3,2(F9.3,2X),F8.3
        text.push_str(&format!(
            "   {:<4}           {:>8.3}{:>9.3}  {:>9.3}  {:>8.3}\n",
            self.diag.code(),
            self.ot_error,
            self.laterror_km,
            self.lonerror_km,
            self.deperror_km,
        ));
        // 2220: 6F10.3
        for c in &self.cov {
            text.push_str(&format!("{:>10.3}", c));
        }
        text.push('\n');
        // 2230: 12X,3(F7.3,1X,F5.1,1X)
        text.push_str(&format!(
            "            {:>7.3} {:>5.1} {:>7.3} {:>5.1} {:>7.3} {:>5.1} \n",
            self.init_lat,
            self.init_lat_unc_km,
            self.init_lon,
            self.init_lon_unc_km,
            self.init_dep_km,
            self.init_dep_unc_km,
        ));
        // 2240: 2X,I3,1X,A4,1X,3(I3,1X,'(',F5.1,'%',1X,')',1X)
        text.push_str(&format!(
            "  {:>3} {:<4} {:>3} ({:>5.1}% ) {:>3} ({:>5.1}% ) {:>3} ({:>5.1}% ) \n",
            self.n_station,
            self.model,
            self.n_p,
            self.contrib_p,
            self.n_s,
            self.contrib_s,
            self.n_init,
            self.contrib_init,
        ));
        for a in &self.arrivals {
            text.push_str(&format!(
                "{:<10} {} {:>8.3}{:>6.1}{:>6.1}{:>6.1}{:>7.3}{:>6.3}{:>7.3}{:>7.3}{:>6.3}{:>7.3}{}{:>5.1}\n",
                a.code,
                a.polarity.as_char(),
                a.distance_km,
                a.azimuth,
                a.takeoff,
                a.incident,
                a.ptime,
                a.punc,
                a.poc,
                a.stime,
                a.sunc,
                a.soc,
                fmt_e(a.amp.value(), 10, 3, true),
                a.mag.unwrap_or(9.9),
            ));
        }
        text.push_str(&format!(
            "{:>59.3}{:>20.3}\n",
            self.poc_std, self.soc_std
        ));
        Ok(text)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> Result<(), WinError> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(WinError::FileExists {
                path: path.to_path_buf(),
            });
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.to_text()?.as_bytes())?;
        log::info!("Saved: {}", path.display());
        Ok(())
    }
}

/// A magnitude of 9.9 is HYPOMH for "could not be determined".
fn undetermined_mag(m: f64) -> Option<f64> {
    if (m - 9.9).abs() < 1e-9 {
        None
    } else {
        Some(m)
    }
}

/// FORTRAN `I3.2`: width three, at least two digits.
fn i3_2(v: i64) -> String {
    format!("{:>3}", format!("{:02}", v))
}

fn parse_station_row(line: &str) -> Result<FinalArrival, WinError> {
    let f = |r: std::ops::Range<usize>, n: &'static str| -> Result<f64, WinError> {
        Ok(parse_f64_field(line, r, n)?.unwrap_or(0.0))
    };
    Ok(FinalArrival {
        code: slice_field(line, 0..10).trim_end().to_string(),
        polarity: slice_field(line, 11..12)
            .chars()
            .next()
            .map(Polarity::from_char)
            .unwrap_or_default(),
        distance_km: f(13..21, "distance")?,
        azimuth: f(21..27, "azimuth")?,
        takeoff: f(27..33, "takeoff")?,
        incident: f(33..39, "incident")?,
        ptime: f(39..46, "P time")?,
        punc: f(46..52, "P uncertainty")?,
        poc: f(52..59, "P O-C")?,
        stime: f(59..66, "S time")?,
        sunc: f(66..72, "S uncertainty")?,
        soc: f(72..79, "S O-C")?,
        amp: AmpOrFpTime::from_value(f(79..89, "amplitude")?),
        mag: parse_f64_field(line, 89..94, "station magnitude")?.and_then(undetermined_mag),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Final {
        Final {
            origintime: Some(
                NaiveDate::from_ymd_opt(1999, 11, 9)
                    .unwrap()
                    .and_hms_milli_opt(6, 46, 2, 162)
                    .unwrap(),
            ),
            lat: 36.64934,
            lon: 139.4597,
            dep_km: 6.104,
            mag: Some(1.2),
            diag: Diagnosis::Conv,
            ot_error: 0.0,
            laterror_km: 0.321,
            lonerror_km: 0.254,
            deperror_km: 0.635,
            cov: [0.065, -0.004, 0.032, 0.103, -0.021, 0.403],
            init_lat: 36.649,
            init_lat_unc_km: 100.0,
            init_lon: 139.46,
            init_lon_unc_km: 100.0,
            init_dep_km: 30.0,
            init_dep_unc_km: 30.0,
            n_station: 2,
            model: "ABC".to_string(),
            n_p: 2,
            contrib_p: 48.0,
            n_s: 1,
            contrib_s: 42.0,
            n_init: 3,
            contrib_init: 10.0,
            arrivals: vec![
                FinalArrival {
                    code: "ASO".to_string(),
                    polarity: Polarity::Down,
                    distance_km: 4.532,
                    azimuth: 213.4,
                    takeoff: 95.2,
                    incident: 84.1,
                    ptime: 6.854,
                    punc: 0.015,
                    poc: -0.012,
                    stime: 0.0,
                    sunc: 0.0,
                    soc: 0.0,
                    amp: AmpOrFpTime::Amp(1.77e-6),
                    mag: Some(1.1),
                },
                FinalArrival {
                    code: "NIK".to_string(),
                    polarity: Polarity::Up,
                    distance_km: 5.871,
                    azimuth: 142.0,
                    takeoff: 93.0,
                    incident: 82.5,
                    ptime: 6.884,
                    punc: 0.006,
                    poc: 0.009,
                    stime: 8.1,
                    sunc: 0.02,
                    soc: -0.004,
                    amp: AmpOrFpTime::FpTime(43.9),
                    mag: None,
                },
            ],
            poc_std: 0.011,
            soc_std: 0.004,
        }
    }

    #[test]
    fn written_columns_follow_the_fortran_formats() {
        let text = sample().to_text().unwrap();
        let lines: Vec<&str> = text.lines().collect();

        // 2200: " 99 11  9    6 46   2.162   36.64934  139.45970 ..."
        assert_eq!(&lines[0][..9], " 99 11 09");
        assert_eq!(&lines[0][12..15], "  6");
        assert_eq!(&lines[0][15..18], " 46");
        assert_eq!(&lines[0][18..26], "   2.162");
        assert_eq!(&lines[0][26..37], "   36.64934");
        assert_eq!(&lines[0][37..48], "  139.45970");
        assert_eq!(&lines[0][48..56], "   6.104");
        assert_eq!(&lines[0][56..62], "   1.2");

        // 2210 places the diagnosis at columns 3..7.
        assert_eq!(&lines[1][3..7], "CONV");
        assert_eq!(&lines[1][26..35], "    0.321");

        // 2240 parenthesised contributions.
        assert!(lines[4].starts_with("    2 ABC "));
        assert!(lines[4].contains("( 48.0% )"));

        // Station rows put the amplitude column at 79..89.
        assert_eq!(&lines[5][79..89], " 1.770E-06");
        assert_eq!(&lines[6][79..89], " 4.390E+01");
        // Undetermined station magnitude is written as 9.9.
        assert_eq!(&lines[6][89..94], "  9.9");
    }

    #[test]
    fn round_trip_preserves_everything() {
        let original = sample();
        let text = original.to_text().unwrap();
        let again = Final::parse(&text).unwrap();
        assert_eq!(again, original);
    }

    #[test]
    fn unreadable_origin_seconds_survive() {
        let mut text = sample().to_text().unwrap();
        text.replace_range(18..26, "********");
        let parsed = Final::parse(&text).unwrap();
        assert_eq!(parsed.origintime, None);
        assert!((parsed.lat - 36.64934).abs() < 1e-9);
    }

    #[test]
    fn undetermined_magnitude_is_none() {
        let mut m = sample();
        m.mag = None;
        let text = m.to_text().unwrap();
        assert_eq!(&text.lines().next().unwrap()[56..62], "   9.9");
        assert_eq!(Final::parse(&text).unwrap().mag, None);
    }

    #[test]
    fn amp_column_classifies_fp_times() {
        let parsed = Final::parse(&sample().to_text().unwrap()).unwrap();
        assert!(matches!(parsed.arrivals[0].amp, AmpOrFpTime::Amp(_)));
        assert!(matches!(parsed.arrivals[1].amp, AmpOrFpTime::FpTime(_)));
    }

    #[test]
    fn short_files_are_rejected() {
        assert!(Final::parse("only\nthree\nlines\n").is_err());
        // A declared station count the file cannot honour.
        let mut text = sample().to_text().unwrap();
        text = text.lines().take(6).collect::<Vec<_>>().join("\n");
        assert!(Final::parse(&text).is_err());
    }

    #[test]
    fn files_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("event.final");
        let f = sample();
        f.write(&path, false).unwrap();
        assert!(matches!(
            f.write(&path, false),
            Err(WinError::FileExists { .. })
        ));
        assert_eq!(Final::read(&path).unwrap(), f);
    }
}
