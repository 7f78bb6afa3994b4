//! Digital signal processing primitives for the waveform object model:
//! Butterworth design, forward-reverse (zero phase) filtering, the Hann
//! window and cumulative trapezoid integration.
//!
//! Filters are designed as zero/pole/gain systems in the analog domain and
//! moved to the digital domain with the bilinear transform, so the usual
//! guarantees of a Butterworth response (maximally flat passband, monotonic
//! rolloff) hold at the prewarped corner frequencies.
use num::complex::Complex64;

use crate::errors::WinError;

/// Design a digital Butterworth filter of the given order.
///
/// `fmin` alone gives a high-pass, `fmax` alone a low-pass, both together a
/// band-pass. Frequencies are in Hz against the sampling rate `fs`; they
/// must lie strictly inside (0, fs/2).
pub fn butter(
    order: usize,
    fmin: Option<f64>,
    fmax: Option<f64>,
    fs: f64,
) -> Result<(Vec<f64>, Vec<f64>), WinError> {
    if order == 0 {
        return Err(WinError::Process {
            msg: "filter order must be at least 1".to_string(),
        });
    }
    let nyq = fs / 2.0;
    let check = |f: f64, name: &str| -> Result<f64, WinError> {
        if !(f > 0.0 && f < nyq) {
            return Err(WinError::Process {
                msg: format!(
                    "{} frequency {} Hz must lie strictly inside (0, {}) Hz",
                    name, f, nyq
                ),
            });
        }
        // Prewarp so the digital corner lands where it was asked for.
        Ok(4.0 * (std::f64::consts::PI * (f / nyq) / 2.0).tan())
    };

    // Analog Butterworth prototype: `order` poles on the unit circle, no
    // zeros, unit gain.
    let n = order as i32;
    let mut poles: Vec<Complex64> = (1..=n)
        .map(|k| {
            let theta = std::f64::consts::PI * f64::from(2 * k + n - 1) / f64::from(2 * n);
            Complex64::new(theta.cos(), theta.sin())
        })
        .collect();
    let mut zeros: Vec<Complex64> = Vec::new();
    let mut gain = 1.0;

    match (fmin, fmax) {
        (None, None) => {
            return Err(WinError::Process {
                msg: "a filter needs at least one corner frequency".to_string(),
            });
        }
        // Low-pass at fmax.
        (None, Some(f)) => {
            let wc = check(f, "low-pass corner")?;
            for p in poles.iter_mut() {
                *p *= wc;
            }
            gain *= wc.powi(n);
        }
        // High-pass at fmin.
        (Some(f), None) => {
            let wc = check(f, "high-pass corner")?;
            // Gain correction uses the prototype poles, before the
            // transform moves them.
            let prod: Complex64 = poles.iter().map(|p| -*p).product();
            gain *= (Complex64::new(1.0, 0.0) / prod).re;
            for p in poles.iter_mut() {
                *p = wc / *p;
            }
            zeros = vec![Complex64::new(0.0, 0.0); order];
        }
        // Band-pass between fmin and fmax.
        (Some(lo), Some(hi)) => {
            if lo >= hi {
                return Err(WinError::Process {
                    msg: format!("band-pass corners are inverted: {} >= {} Hz", lo, hi),
                });
            }
            let w1 = check(lo, "band-pass lower corner")?;
            let w2 = check(hi, "band-pass upper corner")?;
            let bw = w2 - w1;
            let wo2 = w1 * w2;
            let mut shifted = Vec::with_capacity(order * 2);
            for p in &poles {
                let half = *p * (bw / 2.0);
                let root = (half * half - wo2).sqrt();
                shifted.push(half + root);
                shifted.push(half - root);
            }
            poles = shifted;
            zeros = vec![Complex64::new(0.0, 0.0); order];
            gain *= bw.powi(n);
        }
    }

    // Bilinear transform at the prewarped rate.
    let fs2 = Complex64::new(4.0, 0.0);
    let num: Complex64 = zeros.iter().map(|z| fs2 - z).product();
    let den: Complex64 = poles.iter().map(|p| fs2 - p).product();
    gain *= (num / den).re;
    let mut z_digital: Vec<Complex64> = zeros.iter().map(|z| (fs2 + z) / (fs2 - z)).collect();
    // Zeros at infinity land on z = -1.
    z_digital.resize(poles.len(), Complex64::new(-1.0, 0.0));
    let p_digital: Vec<Complex64> = poles.iter().map(|p| (fs2 + p) / (fs2 - p)).collect();

    let b: Vec<f64> = poly(&z_digital).iter().map(|&c| (c * gain).re).collect();
    let a: Vec<f64> = poly(&p_digital).iter().map(|c| c.re).collect();
    Ok((b, a))
}

/// Expand a set of roots into monic polynomial coefficients.
fn poly(roots: &[Complex64]) -> Vec<Complex64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for r in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c * r;
        }
        coeffs = next;
    }
    coeffs
}

/// Run a direct-form II transposed IIR filter over `x`, starting from and
/// updating the state `z`.
fn lfilter(b: &[f64], a: &[f64], x: &[f64], z: &mut [f64]) -> Vec<f64> {
    let get = |v: &[f64], i: usize| if i < v.len() { v[i] } else { 0.0 };
    let mut y = Vec::with_capacity(x.len());
    for &xv in x {
        let yv = get(b, 0) * xv + if z.is_empty() { 0.0 } else { z[0] };
        for i in 0..z.len() {
            let znext = if i + 1 < z.len() { z[i + 1] } else { 0.0 };
            z[i] = get(b, i + 1) * xv + znext - get(a, i + 1) * yv;
        }
        y.push(yv);
    }
    y
}

/// The steady-state filter state for a unit step, so that filtering can
/// start without an edge transient.
fn lfilter_zi(b: &[f64], a: &[f64]) -> Result<Vec<f64>, WinError> {
    let n = b.len().max(a.len());
    if n < 2 {
        return Ok(Vec::new());
    }
    let get = |v: &[f64], i: usize| if i < v.len() { v[i] } else { 0.0 };
    let m = n - 1;
    // M = I - C^T where C is the companion matrix of `a`.
    let mut mat = vec![vec![0.0f64; m]; m];
    let mut rhs = vec![0.0f64; m];
    for i in 0..m {
        mat[i][0] = get(a, i + 1);
        if i == 0 {
            mat[i][0] += 1.0;
        }
        for j in 1..m {
            mat[i][j] = if i == j { 1.0 } else { 0.0 } - if i == j - 1 { 1.0 } else { 0.0 };
        }
        rhs[i] = get(b, i + 1) - get(a, i + 1) * get(b, 0);
    }
    solve(&mut mat, &mut rhs)?;
    Ok(rhs)
}

/// In-place Gaussian elimination with partial pivoting; the solution lands
/// in `rhs`.
fn solve(mat: &mut [Vec<f64>], rhs: &mut [f64]) -> Result<(), WinError> {
    let m = rhs.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| {
                mat[i][col]
                    .abs()
                    .partial_cmp(&mat[j][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if mat[pivot][col].abs() < 1e-300 {
            return Err(WinError::Process {
                msg: "singular system while preparing the filter state".to_string(),
            });
        }
        mat.swap(col, pivot);
        rhs.swap(col, pivot);
        for row in (col + 1)..m {
            let f = mat[row][col] / mat[col][col];
            for k in col..m {
                mat[row][k] -= f * mat[col][k];
            }
            rhs[row] -= f * rhs[col];
        }
    }
    for col in (0..m).rev() {
        let mut acc = rhs[col];
        for k in (col + 1)..m {
            acc -= mat[col][k] * rhs[k];
        }
        rhs[col] = acc / mat[col][col];
    }
    Ok(())
}

/// Zero-phase filtering: filter forward, then backward, with odd extension
/// padding on both ends to suppress edge transients.
pub fn filtfilt(b: &[f64], a: &[f64], x: &[f64]) -> Result<Vec<f64>, WinError> {
    let ntaps = b.len().max(a.len());
    let padlen = 3 * (ntaps.saturating_sub(1));
    if x.len() <= padlen {
        return Err(WinError::Process {
            msg: format!(
                "{} samples is too short for a filter needing {} padding samples",
                x.len(),
                padlen
            ),
        });
    }
    let first = x[0];
    let last = x[x.len() - 1];
    let mut ext = Vec::with_capacity(x.len() + 2 * padlen);
    for i in 0..padlen {
        ext.push(2.0 * first - x[padlen - i]);
    }
    ext.extend_from_slice(x);
    for i in 0..padlen {
        ext.push(2.0 * last - x[x.len() - 2 - i]);
    }

    let zi = lfilter_zi(b, a)?;
    let mut z: Vec<f64> = zi.iter().map(|v| v * ext[0]).collect();
    let mut y = lfilter(b, a, &ext, &mut z);
    y.reverse();
    let mut z: Vec<f64> = zi.iter().map(|v| v * y[0]).collect();
    let mut y = lfilter(b, a, &y, &mut z);
    y.reverse();
    Ok(y[padlen..y.len() - padlen].to_vec())
}

/// The symmetric Hann window of `n` points.
pub fn hann(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| {
                0.5 - 0.5
                    * (2.0 * std::f64::consts::PI * i as f64 / (n as f64 - 1.0)).cos()
            })
            .collect(),
    }
}

/// Cumulative trapezoid integration with constant spacing `dx`, starting
/// from zero.
pub fn cumtrapz(x: &[f64], dx: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.len());
    let mut acc = 0.0;
    for (i, &v) in x.iter().enumerate() {
        if i > 0 {
            acc += (x[i - 1] + v) / 2.0 * dx;
        }
        out.push(acc);
    }
    out
}

/// Subtract the least-squares line from `x`, assuming uniform spacing.
pub fn detrend_linear(x: &mut [f64]) {
    let n = x.len();
    if n < 2 {
        return;
    }
    let nf = n as f64;
    let tbar = (nf - 1.0) / 2.0;
    let xbar = x.iter().sum::<f64>() / nf;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &v) in x.iter().enumerate() {
        let t = i as f64 - tbar;
        num += t * (v - xbar);
        den += t * t;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    for (i, v) in x.iter_mut().enumerate() {
        *v -= xbar + slope * (i as f64 - tbar);
    }
}
