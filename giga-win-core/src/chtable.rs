//! Reading and writing of WIN channel tables: the whitespace separated
//! text files that carry per-channel station metadata.
use std::io::Write;
use std::path::Path;

use crate::channel::ch_from_hex;
use crate::errors::WinError;
use crate::params::Params;

/// One row of a channel table: a channel id plus its [`Params`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChRow {
    pub ch: u16,
    pub params: Params,
}

impl ChRow {
    pub fn new(ch: u16, params: Params) -> Self {
        ChRow { ch, params }
    }
}

/// Read a channel table file. Lines starting with `#` and empty lines are
/// skipped.
pub fn read_chtable<P: AsRef<Path>>(path: P) -> Result<Vec<ChRow>, WinError> {
    let text = std::fs::read_to_string(path)?;
    parse_chtable(&text)
}

/// Parse channel table text.
///
/// Rows have 18 whitespace separated columns plus an optional note; short
/// rows keep defaults for the missing columns, and everything after the
/// 18th column is rejoined into the note so that notes may contain spaces.
/// Unparseable numeric fields keep their defaults as well.
///
/// ```
/// # use giga_win_core::chtable::parse_chtable;
/// let rows = parse_chtable("# comment\n0001 1 0 ASO NS 3 20 1.0 m/s 1 1 0 1 36.6 139.4 720 0 0\n").unwrap();
/// assert_eq!(rows.len(), 1);
/// assert_eq!(rows[0].ch, 1);
/// assert_eq!(rows[0].params.station.as_deref(), Some("ASO"));
/// ```
pub fn parse_chtable(text: &str) -> Result<Vec<ChRow>, WinError> {
    let mut rows = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            log::debug!("chtable: skipping {:?}", line);
            continue;
        }
        let cols: Vec<&str> = line.split_whitespace().collect();
        let ch = ch_from_hex(cols[0])?;
        let mut p = Params::default();

        let f64_col = |i: usize, field: &'static str, default: f64| -> f64 {
            match cols.get(i).map(|c| c.parse::<f64>()) {
                Some(Ok(v)) => v,
                Some(Err(_)) => {
                    log::debug!("chtable: bad {} {:?}, keeping default", field, cols[i]);
                    default
                }
                None => default,
            }
        };
        let i32_col = |i: usize, field: &'static str, default: i32| -> i32 {
            f64_col(i, field, default as f64) as i32
        };

        p.flag = i32_col(1, "flag", p.flag);
        p.delay_time = i32_col(2, "delay time", p.delay_time);
        p.station = cols.get(3).map(|s| s.to_string());
        p.component = cols.get(4).map(|s| s.to_string());
        p.monitor_size = i32_col(5, "monitor size", p.monitor_size);
        p.ad_bit_size = i32_col(6, "ad bit size", p.ad_bit_size);
        p.sensitivity = f64_col(7, "sensitivity", p.sensitivity);
        if let Some(u) = cols.get(8) {
            p.unit = u.to_string();
        }
        p.natural_period = f64_col(9, "natural period", p.natural_period);
        p.damping = f64_col(10, "damping", p.damping);
        p.ad_gain = f64_col(11, "ad gain", p.ad_gain);
        p.ad_bit_step = f64_col(12, "ad bit step", p.ad_bit_step);
        p.lat = f64_col(13, "latitude", p.lat);
        p.lon = f64_col(14, "longitude", p.lon);
        p.elv = f64_col(15, "elevation", p.elv);
        p.p_correction = f64_col(16, "p correction", p.p_correction);
        p.s_correction = f64_col(17, "s correction", p.s_correction);
        if cols.len() > 18 {
            p.note = cols[18..].join(" ");
        }

        rows.push(ChRow::new(ch, p));
    }
    Ok(rows)
}

/// Render rows as channel table text, one line per channel.
pub fn chtable_to_string(rows: &[ChRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let p = &row.params;
        out.push_str(&format!(
            "{:04X} {:1}  {:4}  {:<10}  {:<6}   {} {}     {:.1} {}     {}  {}  {}  {:9.3E} {:9.6} {:10.6} {:<5} {} {}",
            row.ch,
            p.flag,
            p.delay_time,
            p.station.as_deref().unwrap_or("-"),
            p.component.as_deref().unwrap_or("-"),
            p.monitor_size,
            p.ad_bit_size,
            p.sensitivity,
            p.unit,
            p.natural_period,
            p.damping,
            p.ad_gain,
            p.ad_bit_step,
            p.lat,
            p.lon,
            p.elv,
            p.p_correction,
            p.s_correction,
        ));
        if !p.note.is_empty() {
            out.push(' ');
            out.push_str(&p.note);
        }
        out.push('\n');
    }
    out
}

/// Write a channel table file, refusing to clobber an existing one unless
/// asked.
pub fn write_chtable<P: AsRef<Path>>(
    path: P,
    rows: &[ChRow],
    overwrite: bool,
) -> Result<(), WinError> {
    let path = path.as_ref();
    if path.exists() && !overwrite {
        return Err(WinError::FileExists {
            path: path.to_path_buf(),
        });
    }
    let mut file = std::fs::File::create(path)?;
    file.write_all(chtable_to_string(rows).as_bytes())?;
    log::info!("Saved: {}", path.display());
    Ok(())
}
