//! Bulk discovery report payload
//!
//! Serializes as `{"at_report": {"0": {...}, "1": {...}}}` with keys in
//! insertion order.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::path::Path;
use tnsbot_common::config::{InternalNameFormat, ReporterMetadata};
use tnsbot_common::models::Source;
use tnsbot_common::Result;

use crate::discovery::DiscoveryRecord;

const FLUX_UNITS_MAG: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateValue {
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProprietaryPeriod {
    pub proprietary_period_value: u32,
    pub proprietary_period_units: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotometryEntry {
    pub obsdate: f64,
    pub flux: f64,
    pub flux_err: Option<f64>,
    pub limiting_flux: Option<f64>,
    pub flux_units: String,
    pub filter_value: String,
    pub instrument_value: String,
    pub exptime: String,
    pub observer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotometryGroup {
    #[serde(serialize_with = "serialize_indexed")]
    pub photometry_group: Vec<PhotometryEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NonDetectionEntry {
    pub obsdate: f64,
    pub limiting_flux: f64,
    pub flux_units: String,
    pub filter_value: String,
    pub instrument_value: String,
    pub exptime: String,
    pub observer: String,
}

/// Per-source report object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub ra: CoordinateValue,
    pub dec: CoordinateValue,
    pub groupid: u32,
    pub reporter: String,
    pub discovery_datetime: f64,
    pub at_type: String,
    pub host_name: String,
    pub host_redshift: String,
    pub transient_redshift: String,
    pub internal_name: String,
    pub proprietary_period: ProprietaryPeriod,
    pub proprietary_period_groups: Vec<u32>,
    pub internal_name_format: InternalNameFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    pub photometry: PhotometryGroup,
    pub non_detection: NonDetectionEntry,
}

impl SourceReport {
    pub fn new(source: &Source, record: &DiscoveryRecord, meta: &ReporterMetadata) -> Self {
        let discovery = PhotometryEntry {
            obsdate: record.discovery_jd,
            flux: record.magnitude,
            flux_err: record.magnitude_error,
            limiting_flux: record.limiting_magnitude,
            flux_units: FLUX_UNITS_MAG.to_string(),
            filter_value: record.filter_code.clone(),
            instrument_value: meta.instrument_value.clone(),
            exptime: meta.exptime.clone(),
            observer: meta.observer.clone(),
        };

        let nd = &record.last_non_detection;
        let non_detection = NonDetectionEntry {
            obsdate: nd.jd,
            limiting_flux: nd.limiting_magnitude,
            flux_units: FLUX_UNITS_MAG.to_string(),
            filter_value: nd.filter_code.clone(),
            instrument_value: meta.instrument_value.clone(),
            exptime: meta.exptime.clone(),
            observer: meta.observer.clone(),
        };

        Self {
            ra: CoordinateValue { value: source.ra },
            dec: CoordinateValue { value: source.dec },
            groupid: meta.group_id,
            reporter: meta.reporter.clone(),
            discovery_datetime: record.discovery_jd,
            at_type: meta.at_type.to_string(),
            host_name: String::new(),
            host_redshift: String::new(),
            transient_redshift: String::new(),
            internal_name: source.id.clone(),
            proprietary_period: ProprietaryPeriod {
                proprietary_period_value: 0,
                proprietary_period_units: "years".to_string(),
            },
            proprietary_period_groups: vec![meta.group_id],
            internal_name_format: meta.internal_name_format.clone(),
            remarks: meta.remarks.clone(),
            photometry: PhotometryGroup {
                photometry_group: vec![discovery],
            },
            non_detection,
        }
    }
}

/// Serialize a list as a map keyed by the zero-based index string
fn serialize_indexed<T, S>(items: &[T], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(items.len()))?;
    for (index, item) in items.iter().enumerate() {
        map.serialize_entry(&index.to_string(), item)?;
    }
    map.end()
}

struct Indexed<'a, T>(&'a [T]);

impl<T: Serialize> Serialize for Indexed<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serialize_indexed(self.0, serializer)
    }
}

/// One run's bulk report, submitted in a single request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    entries: Vec<SourceReport>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: SourceReport) {
        self.entries.push(report);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[SourceReport] {
        &self.entries
    }

    /// Internal names in report order
    pub fn source_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.internal_name.clone()).collect()
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the payload to disk, replacing any previous report file
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_pretty_json()?)?;
        tracing::debug!(path = %path.display(), entries = self.len(), "Wrote bulk report");
        Ok(())
    }
}

impl Serialize for BatchReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("at_report", &Indexed(&self.entries))?;
        map.end()
    }
}
