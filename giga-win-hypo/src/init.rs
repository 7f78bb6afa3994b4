//! The `init` initial-hypocenter file: position on the first line,
//! uncertainties on the second, and an optional third line with full
//! source elements for the travel-time calculation mode.
use std::io::Write;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};

use giga_win_core::errors::WinError;
use giga_win_core::timeutil::{duration_secs, yy2yyyy, yyyy2yy};

/// The optional travel-time-mode source line: origin time, position and
/// magnitude.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceLine {
    pub time: NaiveDateTime,
    pub lat: f64,
    pub lon: f64,
    pub dep_km: f64,
    pub mag: f64,
}

/// An initial hypocenter with its uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub struct Init {
    pub lat: f64,
    pub lon: f64,
    pub dep_km: f64,
    /// Uncertainty of the latitude in km.
    pub unc_lat_km: f64,
    /// Uncertainty of the longitude in km.
    pub unc_lon_km: f64,
    /// Uncertainty of the depth in km.
    pub unc_dep_km: f64,
    /// Present only in travel-time calculation mode.
    pub source: Option<SourceLine>,
}

impl Default for Init {
    fn default() -> Self {
        Init {
            lat: 0.0,
            lon: 0.0,
            dep_km: 0.0,
            unc_lat_km: 100.0,
            unc_lon_km: 100.0,
            unc_dep_km: 30.0,
            source: None,
        }
    }
}

impl Init {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Init, WinError> {
        let text = std::fs::read_to_string(path)?;
        Init::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Init, WinError> {
        let mut lines = text.lines();
        let position = floats(lines.next().unwrap_or(""), 3, "init position")?;
        let uncertainty = floats(lines.next().unwrap_or(""), 3, "init uncertainty")?;

        let source = match lines.next().filter(|l| !l.trim().is_empty()) {
            None => None,
            Some(line) => {
                let tokens: Vec<&str> = line.split_whitespace().collect();
                if tokens.len() < 10 {
                    return Err(WinError::ParseField {
                        field: "init source line",
                        text: line.to_string(),
                    });
                }
                let int = |i: usize, field: &'static str| -> Result<i64, WinError> {
                    tokens[i].parse().map_err(|_| WinError::ParseField {
                        field,
                        text: tokens[i].to_string(),
                    })
                };
                let float = |i: usize, field: &'static str| -> Result<f64, WinError> {
                    tokens[i].parse().map_err(|_| WinError::ParseField {
                        field,
                        text: tokens[i].to_string(),
                    })
                };
                let seconds = float(5, "source seconds")?;
                let hour = int(3, "source hour")? as u32;
                let minute = int(4, "source minute")? as u32;
                let time = NaiveDate::from_ymd_opt(
                    yy2yyyy(int(0, "source year")? as i32)?,
                    int(1, "source month")? as u32,
                    int(2, "source day")? as u32,
                )
                .and_then(|d| d.and_hms_opt(hour, minute, 0))
                .ok_or_else(|| WinError::ParseField {
                    field: "source time",
                    text: line.to_string(),
                })? + duration_secs(seconds);
                Some(SourceLine {
                    time,
                    lat: float(6, "source lat")?,
                    lon: float(7, "source lon")?,
                    dep_km: float(8, "source depth")?,
                    mag: float(9, "source magnitude")?,
                })
            }
        };

        Ok(Init {
            lat: position[0],
            lon: position[1],
            dep_km: position[2],
            unc_lat_km: uncertainty[0],
            unc_lon_km: uncertainty[1],
            unc_dep_km: uncertainty[2],
            source,
        })
    }

    pub fn to_text(&self) -> String {
        let mut text = format!(
            "{:<10.3} {:<10.3} {:<10.3}\n{:<10.3}{:<10.3}{:<10.3}\n",
            self.lat, self.lon, self.dep_km, self.unc_lat_km, self.unc_lon_km, self.unc_dep_km,
        );
        if let Some(src) = &self.source {
            use chrono::{Datelike, Timelike};
            let secs = f64::from(src.time.second())
                + f64::from(src.time.nanosecond()) / 1e9;
            text.push_str(&format!(
                "{} {} {} {} {} {:.3} {:.5} {:.5} {} {}\n",
                yyyy2yy(src.time.year()).unwrap_or(0),
                src.time.month(),
                src.time.day(),
                src.time.hour(),
                src.time.minute(),
                secs,
                src.lat,
                src.lon,
                src.dep_km,
                src.mag,
            ));
        }
        text
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, overwrite: bool) -> Result<(), WinError> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(WinError::FileExists {
                path: path.to_path_buf(),
            });
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.to_text().as_bytes())?;
        log::info!("Saved: {}", path.display());
        Ok(())
    }
}

fn floats(line: &str, n: usize, field: &'static str) -> Result<Vec<f64>, WinError> {
    let values: Result<Vec<f64>, _> = line
        .split_whitespace()
        .map(|t| t.parse::<f64>())
        .collect();
    match values {
        Ok(v) if v.len() >= n => Ok(v),
        _ => Err(WinError::ParseField {
            field,
            text: line.to_string(),
        }),
    }
}
