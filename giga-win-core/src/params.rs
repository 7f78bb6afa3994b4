//! Per-channel station metadata, matching the columns of a WIN channel
//! table.
//!
//! The metadata is embedded by value in each [`crate::Channel`]; there is no
//! back-pointer from the metadata to its owner. The calibration factor is
//! derived on demand by [`Params::calib`].
#[cfg(any(feature = "to_json", feature = "serde"))]
use serde::{Deserialize, Serialize};

/// Station metadata for one channel.
///
/// The bracketed numbers in the field docs are the channel-table column
/// numbers (the channel id itself is column 1 and lives on the channel).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(feature = "to_json", feature = "serde"),
    derive(Serialize, Deserialize)
)]
pub struct Params {
    /// [2] Retrieval flag. Not used in general.
    pub flag: i32,
    /// [3] Line delay time in milliseconds. Not used in general.
    pub delay_time: i32,
    /// [4] Station code, up to 10 characters.
    pub station: Option<String>,
    /// [5] Component code, up to 6 characters.
    pub component: Option<String>,
    /// [6] Monitor amplitude reduction exponent.
    pub monitor_size: i32,
    /// [7] Quantisation bit count of the AD converter. Not used in general.
    pub ad_bit_size: i32,
    /// [8] Sensor sensitivity in V per input unit.
    pub sensitivity: f64,
    /// [9] Input amplitude unit, MKS ("m", "m/s", "m/s/s").
    pub unit: String,
    /// [10] Natural period of the sensor in seconds. Not used in general.
    pub natural_period: f64,
    /// [11] Damping constant of the sensor. Not used in general.
    pub damping: f64,
    /// [12] Amplifier gain between sensor and AD converter in dB.
    pub ad_gain: f64,
    /// [13] Voltage width of one AD quantisation step.
    pub ad_bit_step: f64,
    /// [14] Station latitude in degrees.
    pub lat: f64,
    /// [15] Station longitude in degrees.
    pub lon: f64,
    /// [16] Station elevation in metres.
    pub elv: f64,
    /// [17] P arrival time correction in seconds.
    pub p_correction: f64,
    /// [18] S arrival time correction in seconds.
    pub s_correction: f64,
    /// [19] Free-form note.
    pub note: String,
    /// Lower corner of the last applied frequency filter.
    pub fmin: Option<f64>,
    /// Upper corner of the last applied frequency filter.
    pub fmax: Option<f64>,
    /// Whether the owning channel's samples are currently scaled by
    /// [`Params::calib`].
    pub is_calibed: bool,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            flag: 1,
            delay_time: 1,
            station: None,
            component: None,
            monitor_size: 3,
            ad_bit_size: 20,
            sensitivity: 1.0,
            unit: ".".to_string(),
            natural_period: 1.0,
            damping: 1.0,
            ad_gain: 0.0,
            ad_bit_step: 1.0,
            lat: 0.0,
            lon: 0.0,
            elv: 0.0,
            p_correction: 0.0,
            s_correction: 0.0,
            note: String::new(),
            fmin: None,
            fmax: None,
            is_calibed: false,
        }
    }
}

impl Params {
    #[cfg(feature = "to_json")]
    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(&self).map_err(|e| e.to_string())
    }

    /// The calibration factor that converts raw counts into the physical
    /// unit: `1/sensitivity * ad_bit_step / 10^(ad_gain/20)`.
    ///
    /// ```
    /// # use giga_win_core::params::Params;
    /// let mut p = Params::default();
    /// p.sensitivity = 2.0;
    /// p.ad_bit_step = 5.0;
    /// p.ad_gain = 20.0;
    /// assert!((p.calib() - 0.25).abs() < 1e-12);
    /// ```
    pub fn calib(&self) -> f64 {
        1.0 / self.sensitivity * self.ad_bit_step / 10f64.powf(self.ad_gain / 20.0)
    }
}
