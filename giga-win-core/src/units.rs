//! Arithmetic on MKS unit strings, so that differentiating a velocity
//! channel relabels it as acceleration and integrating undoes it again.

/// Differentiate a unit string: remove one `*s`, or append `/s`.
///
/// ```
/// # use giga_win_core::units::{diff_unit, integrate_unit};
/// assert_eq!(diff_unit("m"), "m/s");
/// assert_eq!(diff_unit("m*s"), "m");
/// assert_eq!(integrate_unit(&diff_unit("m/s")), "m/s");
/// ```
pub fn diff_unit(unit: &str) -> String {
    match unit.find("*s") {
        Some(i) => {
            let mut out = String::with_capacity(unit.len() - 2);
            out.push_str(&unit[..i]);
            out.push_str(&unit[i + 2..]);
            out
        }
        None => format!("{}/s", unit),
    }
}

/// Integrate a unit string: remove one `/s`, or append `*s`.
pub fn integrate_unit(unit: &str) -> String {
    match unit.find("/s") {
        Some(i) => {
            let mut out = String::with_capacity(unit.len() - 2);
            out.push_str(&unit[..i]);
            out.push_str(&unit[i + 2..]);
            out
        }
        None => format!("{}*s", unit),
    }
}
