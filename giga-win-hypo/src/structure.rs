//! The velocity `structure` file: a reference hypocenter, the layer count
//! and model name, the top-of-layer P velocities, the layer thicknesses
//! and the initial uncertainties.
//!
//! The velocity line carries `n_layers + 2` values and the thickness line
//! `n_layers + 1`; both wrap after seven values per line, exactly as the
//! FORTRAN `7F10.0` reads expect.
use std::io::Write;
use std::path::Path;

use giga_win_core::errors::WinError;

/// A parsed velocity-structure file.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Nominal initial hypocenter (unused by HYPOMH when an `init` file is
    /// given).
    pub lat: f64,
    pub lon: f64,
    pub dep_km: f64,
    /// Model name, at most 3 characters on the wire.
    pub name: String,
    /// P velocity at the top of each layer, km/s.
    pub vp: Vec<f64>,
    /// Layer thicknesses, km; one fewer than `vp`.
    pub thickness: Vec<f64>,
    /// Origin-time uncertainty in seconds (carried but unused by HYPOMH).
    pub unc_t: f64,
    pub unc_lat_km: f64,
    pub unc_lon_km: f64,
    pub unc_dep_km: f64,
}

impl Default for Structure {
    /// The standard crustal model the WIN distribution ships.
    fn default() -> Self {
        Structure {
            lat: 35.5,
            lon: 139.5,
            dep_km: 30.0,
            name: "ABC".to_string(),
            vp: vec![5.5, 5.51, 6.1, 6.11, 6.7, 6.71, 8.0, 8.2],
            thickness: vec![4.0, 0.01, 10.6, 0.01, 16.9, 0.01, 600.0],
            unc_t: 5.0,
            unc_lat_km: 100.0,
            unc_lon_km: 100.0,
            unc_dep_km: 30.0,
        }
    }
}

impl Structure {
    /// The layer count written on line two: two fewer than the velocity
    /// values.
    pub fn n_layers(&self) -> usize {
        self.vp.len().saturating_sub(2)
    }

    fn validate(&self) -> Result<(), WinError> {
        if self.vp.len() < 2 {
            return Err(WinError::Process {
                msg: format!("at least two velocities are needed, got {}", self.vp.len()),
            });
        }
        if self.thickness.len() + 1 != self.vp.len() {
            return Err(WinError::Process {
                msg: format!(
                    "{} thicknesses do not fit {} velocities (must be one fewer)",
                    self.thickness.len(),
                    self.vp.len()
                ),
            });
        }
        Ok(())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Structure, WinError> {
        let text = std::fs::read_to_string(path)?;
        Structure::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Structure, WinError> {
        let mut lines = text.lines();
        let head = values(lines.next().unwrap_or(""), "structure position")?;
        if head.len() < 3 {
            return Err(WinError::ParseField {
                field: "structure position",
                text: "expected lat, lon, depth".to_string(),
            });
        }

        let name_line = lines.next().unwrap_or("");
        let mut name_tokens = name_line.split_whitespace();
        let n_layers: usize = name_tokens
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| WinError::ParseField {
                field: "layer count",
                text: name_line.to_string(),
            })?;
        let name = name_tokens.next().unwrap_or("").to_string();

        // The remaining numbers flow across lines: velocities, then
        // thicknesses, then the four uncertainties.
        let mut numbers = Vec::new();
        for line in lines {
            numbers.extend(values(line, "structure values")?);
        }
        let expect = (n_layers + 2) + (n_layers + 1) + 4;
        if numbers.len() < expect {
            return Err(WinError::ParseField {
                field: "structure values",
                text: format!("expected {} values, found {}", expect, numbers.len()),
            });
        }
        let vp = numbers[..n_layers + 2].to_vec();
        let thickness = numbers[n_layers + 2..2 * n_layers + 3].to_vec();
        let unc = &numbers[2 * n_layers + 3..2 * n_layers + 7];

        let out = Structure {
            lat: head[0],
            lon: head[1],
            dep_km: head[2],
            name,
            vp,
            thickness,
            unc_t: unc[0],
            unc_lat_km: unc[1],
            unc_lon_km: unc[2],
            unc_dep_km: unc[3],
        };
        out.validate()?;
        Ok(out)
    }

    pub fn to_text(&self) -> Result<String, WinError> {
        self.validate()?;
        let mut text = format!(
            "{:<10}{:<10}{:<10}\n",
            g(self.lat),
            g(self.lon),
            g(self.dep_km)
        );
        text.push_str(&format!("{:>5}  {:<3}\n", self.n_layers(), truncate(&self.name, 3)));
        text.push_str(&seven_per_line(&self.vp));
        text.push_str(&seven_per_line(&self.thickness));
        text.push_str(&format!(
            "{:<10}{:<10}{:<10}{:<10}",
            g(self.unc_t),
            g(self.unc_lat_km),
            g(self.unc_lon_km),
            g(self.unc_dep_km)
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

/// Compact float rendering for the 10-column fields ("5.5", "600", "0.01").
fn g(v: f64) -> String {
    format!("{}", v)
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

fn seven_per_line(values: &[f64]) -> String {
    let mut out = String::new();
    for chunk in values.chunks(7) {
        for v in chunk {
            out.push_str(&format!("{:<10}", g(*v)));
        }
        out.push('\n');
    }
    out
}

fn values(line: &str, field: &'static str) -> Result<Vec<f64>, WinError> {
    line.split_whitespace()
        .map(|t| {
            t.parse::<f64>().map_err(|_| WinError::ParseField {
                field,
                text: t.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_documented_sample_parses() {
        let text = "\
35.5      139.5     30.0
    6 ABC
5.50      5.51      6.10      6.11      6.70      6.71      8.00
8.20
4.00      0.01      10.60     0.01      16.90     0.01      600.0
5.0       100.0     100.0     30.0";
        let s = Structure::parse(text).unwrap();
        assert_eq!(s.n_layers(), 6);
        assert_eq!(s.name, "ABC");
        assert_eq!(s.vp.len(), 8);
        assert_eq!(s.thickness.len(), 7);
        assert!((s.vp[7] - 8.2).abs() < 1e-9);
        assert!((s.thickness[6] - 600.0).abs() < 1e-9);
        assert!((s.unc_t - 5.0).abs() < 1e-9);
        assert!((s.unc_dep_km - 30.0).abs() < 1e-9);
    }

    #[test]
    fn round_trip_the_default_model() {
        let s = Structure::default();
        let text = s.to_text().unwrap();
        // Eight velocities wrap onto a second line after seven.
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "    6  ABC");
        assert_eq!(lines[2].split_whitespace().count(), 7);
        assert_eq!(lines[3].split_whitespace().count(), 1);

        let again = Structure::parse(&text).unwrap();
        assert_eq!(again, s);
    }

    #[test]
    fn inconsistent_layers_are_rejected() {
        let mut s = Structure::default();
        s.thickness.pop();
        assert!(s.to_text().is_err());
        let mut s = Structure::default();
        s.vp.truncate(1);
        assert!(s.to_text().is_err());
    }

    #[test]
    fn long_names_are_clipped() {
        let mut s = Structure::default();
        s.name = "ABCDEF".to_string();
        let text = s.to_text().unwrap();
        assert!(text.lines().nth(1).unwrap().ends_with("ABC"));
        let again = Structure::parse(&text).unwrap();
        assert_eq!(again.name, "ABC");
    }

    #[test]
    fn files_round_trip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("struct.tbl");
        let s = Structure::default();
        s.write(&path, false).unwrap();
        assert!(matches!(
            s.write(&path, false),
            Err(WinError::FileExists { .. })
        ));
        assert_eq!(Structure::read(&path).unwrap(), s);
    }
}
