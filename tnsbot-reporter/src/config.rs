//! Run configuration resolution
//!
//! Turns raw command-line values into a validated time window and candidate
//! selection before any network call is made.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tnsbot_common::models::TimeWindow;
use tnsbot_common::time::{format_isot, parse_iso};
use tnsbot_common::{Error, Result};

use crate::reconcile::CandidateSelection;
use crate::run_log::RunLog;

/// Existence check used for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CheckStrategy {
    /// Search the registry by position and internal name
    Registry,
    /// Consult the local report ledger only
    Ledger,
}

/// Split a comma-separated list, dropping blanks
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Delay between lookups from a seconds value
pub fn lookup_delay(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::Config(format!(
            "delay must be a non-negative number of seconds, got {seconds}"
        )));
    }
    Ok(Duration::from_secs_f64(seconds))
}

/// Resolve the query window
///
/// The start comes from `start_time` or, exclusively, from the run log's
/// latest end time. `None` means no start is available. The end defaults to
/// `now`.
pub fn resolve_window(
    start_time: Option<&str>,
    end_time: Option<&str>,
    run_log: Option<&RunLog>,
    now: DateTime<Utc>,
) -> Result<Option<TimeWindow>> {
    let start = match (start_time, run_log) {
        (Some(_), Some(_)) => {
            return Err(Error::Config(
                "both run log and start time have been specified".to_string(),
            ))
        }
        (Some(start), None) => Some(parse_iso(start)?),
        (None, Some(log)) => {
            let resumed = log.resume_start_time()?;
            match &resumed {
                Some(start) => tracing::info!(
                    path = %log.path().display(),
                    start = %format_isot(start),
                    "Resuming from run log"
                ),
                None => tracing::warn!(
                    path = %log.path().display(),
                    "Run log has no rows to resume from; seed it with a first row"
                ),
            }
            resumed
        }
        (None, None) => None,
    };

    let Some(start) = start else {
        return Ok(None);
    };

    let end = match end_time {
        Some(end) => parse_iso(end)?,
        None => now,
    };
    if end < start {
        return Err(Error::Config(format!(
            "end time {} precedes start time {}",
            format_isot(&end),
            format_isot(&start)
        )));
    }

    Ok(Some(TimeWindow::new(start, end)))
}

/// Decide which sources a run considers
///
/// Explicit source names win over groups; otherwise a window is required.
pub fn plan_selection(
    group_ids: Vec<String>,
    source_names: Vec<String>,
    window: Option<TimeWindow>,
) -> Result<CandidateSelection> {
    if !source_names.is_empty() {
        return Ok(CandidateSelection::Named(source_names));
    }
    if group_ids.is_empty() {
        return Err(Error::Config("no group ids given".to_string()));
    }
    let window = window.ok_or_else(|| {
        Error::Config("Please provide a start time, or a run log".to_string())
    })?;
    Ok(CandidateSelection::Groups { group_ids, window })
}
