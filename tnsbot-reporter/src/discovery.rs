//! Discovery record derivation from a source's photometry
//!
//! A point is a **detection** when it has a finite magnitude and comes from a
//! trusted instrument. The discovery epoch is the earliest detection. A point
//! is a **limit** when it precedes discovery, has no magnitude, has a finite
//! limiting magnitude and comes from a trusted instrument. The latest limit
//! becomes the last non-detection; without one the configured fallback limit
//! is used.

use serde::Serialize;
use tnsbot_common::config::DetectionTables;
use tnsbot_common::models::{FilterBand, PhotometryPoint};
use tnsbot_common::{Error, Result};

/// Discovery fields of one per-source report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryRecord {
    /// Julian date of the earliest trusted detection
    pub discovery_jd: f64,
    pub magnitude: f64,
    pub magnitude_error: Option<f64>,
    pub limiting_magnitude: Option<f64>,
    pub filter: FilterBand,
    /// Registry code of `filter`
    pub filter_code: String,
    pub last_non_detection: NonDetection,
}

/// Last observation before discovery that did not detect the source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonDetection {
    pub jd: f64,
    pub limiting_magnitude: f64,
    pub filter: FilterBand,
    pub filter_code: String,
    /// True when no usable limit existed and the fixed fallback was used
    pub is_fallback: bool,
}

/// Derive the discovery record of one source
///
/// Returns `Ok(None)` when there is no trusted detection; the caller skips
/// the source. Fails with `UnsupportedFilter` when a selected point's band
/// has no registry code, and with `MalformedPhotometry` when a point has a
/// non-finite observation time.
pub fn build_discovery_record(
    photometry: &[PhotometryPoint],
    tables: &DetectionTables,
) -> Result<Option<DiscoveryRecord>> {
    if let Some(bad) = photometry.iter().find(|p| !p.jd.is_finite()) {
        return Err(Error::MalformedPhotometry(format!(
            "non-finite observation time in {} point from instrument {}",
            bad.filter, bad.instrument_id
        )));
    }

    let Some((discovery, magnitude)) = earliest_detection(photometry, tables) else {
        return Ok(None);
    };

    let last_non_detection = match latest_limit(photometry, tables, discovery.jd) {
        Some((limit, limiting_magnitude)) => NonDetection {
            jd: limit.jd,
            limiting_magnitude,
            filter: limit.filter.clone(),
            filter_code: tables.filter_codes.code_for(&limit.filter)?.to_string(),
            is_fallback: false,
        },
        None => {
            let fallback = &tables.fallback_limit;
            tracing::warn!(
                discovery_jd = discovery.jd,
                fallback_jd = fallback.jd,
                "No usable limit precedes discovery, using fallback non-detection"
            );
            NonDetection {
                jd: fallback.jd,
                limiting_magnitude: fallback.limiting_magnitude,
                filter: fallback.filter.clone(),
                filter_code: tables.filter_codes.code_for(&fallback.filter)?.to_string(),
                is_fallback: true,
            }
        }
    };

    Ok(Some(DiscoveryRecord {
        discovery_jd: discovery.jd,
        magnitude,
        magnitude_error: discovery.magnitude_error(),
        limiting_magnitude: discovery.limiting_magnitude(),
        filter: discovery.filter.clone(),
        filter_code: tables.filter_codes.code_for(&discovery.filter)?.to_string(),
        last_non_detection,
    }))
}

/// Earliest trusted detection; the first point wins ties
fn earliest_detection<'a>(
    photometry: &'a [PhotometryPoint],
    tables: &DetectionTables,
) -> Option<(&'a PhotometryPoint, f64)> {
    photometry
        .iter()
        .filter(|p| tables.is_trusted(p.instrument_id))
        .filter_map(|p| p.magnitude().map(|mag| (p, mag)))
        .fold(None, |best, (p, mag)| match best {
            Some((b, _)) if b.jd <= p.jd => best,
            _ => Some((p, mag)),
        })
}

/// Latest trusted limit strictly before `discovery_jd`; the first point wins ties
fn latest_limit<'a>(
    photometry: &'a [PhotometryPoint],
    tables: &DetectionTables,
    discovery_jd: f64,
) -> Option<(&'a PhotometryPoint, f64)> {
    photometry
        .iter()
        .filter(|p| p.jd < discovery_jd)
        .filter(|p| tables.is_trusted(p.instrument_id))
        .filter(|p| p.magnitude().is_none())
        .filter_map(|p| p.limiting_magnitude().map(|lim| (p, lim)))
        .fold(None, |best, (p, lim)| match best {
            Some((b, _)) if b.jd >= p.jd => best,
            _ => Some((p, lim)),
        })
}
