//! Timestamp utilities
//!
//! Modified Julian date conversion and the ISO-8601 forms accepted on the
//! command line and stored in the run log.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::{Error, Result};

/// Offset between Julian date and modified Julian date
pub const MJD_OFFSET: f64 = 2_400_000.5;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a modified Julian date to a Julian date
pub fn mjd_to_jd(mjd: f64) -> f64 {
    mjd + MJD_OFFSET
}

/// Parse an ISO-8601 timestamp
///
/// Accepts RFC 3339 (`2024-01-01T00:00:00Z`), naive date-times with optional
/// fractional seconds (`2024-01-01T00:00:00.000`, space separator allowed) and
/// bare dates (`2024-01-01`). Naive values are taken as UTC.
pub fn parse_iso(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }

    Err(Error::Config(format!("Invalid ISO-8601 timestamp: {value:?}")))
}

/// Format a timestamp the way the survey API and run log expect (`isot`)
pub fn format_isot(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}
