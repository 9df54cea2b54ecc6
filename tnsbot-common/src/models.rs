//! Survey and registry domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A saved transient source as listed by the survey API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Survey-assigned identifier (e.g. `ZTF24aaaaaaa`)
    pub id: String,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    /// Registry designation already attached by the survey, if any
    #[serde(default, alias = "tns_name", skip_serializing_if = "Option::is_none")]
    pub registry_name: Option<String>,
}

/// Photometric filter band
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterBand {
    Ztfg,
    Ztfr,
    Ztfi,
    /// Any band reported by an instrument outside the survey camera
    Other(String),
}

impl FilterBand {
    pub fn as_str(&self) -> &str {
        match self {
            FilterBand::Ztfg => "ztfg",
            FilterBand::Ztfr => "ztfr",
            FilterBand::Ztfi => "ztfi",
            FilterBand::Other(name) => name,
        }
    }
}

impl From<String> for FilterBand {
    fn from(name: String) -> Self {
        match name.as_str() {
            "ztfg" => FilterBand::Ztfg,
            "ztfr" => FilterBand::Ztfr,
            "ztfi" => FilterBand::Ztfi,
            _ => FilterBand::Other(name),
        }
    }
}

impl From<&str> for FilterBand {
    fn from(name: &str) -> Self {
        FilterBand::from(name.to_string())
    }
}

impl From<FilterBand> for String {
    fn from(band: FilterBand) -> Self {
        band.as_str().to_string()
    }
}

impl fmt::Display for FilterBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One photometric measurement of a source
///
/// `flux`/`flux_err` are absent for non-detections. Magnitudes are derived on
/// demand and are only defined when the flux is present and positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotometryPoint {
    /// Observation time (Julian date)
    pub jd: f64,
    pub filter: FilterBand,
    pub flux: Option<f64>,
    pub flux_err: Option<f64>,
    /// Photometric zero-point
    pub zp: f64,
    pub instrument_id: i64,
}

impl PhotometryPoint {
    /// `-2.5 log10(flux) + zp`, finite values only
    pub fn magnitude(&self) -> Option<f64> {
        let flux = self.flux?;
        finite(-2.5 * flux.log10() + self.zp)
    }

    /// `1.086 * flux_err / flux`
    pub fn magnitude_error(&self) -> Option<f64> {
        let (flux, flux_err) = (self.flux?, self.flux_err?);
        finite(1.086 * flux_err / flux)
    }

    /// 5-sigma limiting magnitude, `-2.5 log10(5 * flux_err) + zp`
    pub fn limiting_magnitude(&self) -> Option<f64> {
        let flux_err = self.flux_err?;
        finite(-2.5 * (5.0 * flux_err).log10() + self.zp)
    }
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Candidate entry from the survey's paginated candidates listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    #[serde(default)]
    pub ra: Option<f64>,
    #[serde(default)]
    pub dec: Option<f64>,
}

/// Closed interval of "saved at" times covered by one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}
