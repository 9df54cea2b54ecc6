//! Per-run summary table used to resume the time window
//!
//! CSV with columns `programs, query_start_time, query_end_time, tot_sources,
//! nsrcs_already_on_TNS, nsrcs_reported`, one row per run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tnsbot_common::models::TimeWindow;
use tnsbot_common::time::{format_isot, parse_iso};
use tnsbot_common::{Error, Result};

use crate::reconcile::RunSummary;

/// One run's summary row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunLogEntry {
    /// Group ids joined with `&`
    pub programs: String,
    pub query_start_time: String,
    pub query_end_time: String,
    pub tot_sources: usize,
    #[serde(rename = "nsrcs_already_on_TNS")]
    pub nsrcs_already_on_tns: usize,
    pub nsrcs_reported: usize,
}

impl RunLogEntry {
    pub fn from_summary(group_ids: &[String], window: &TimeWindow, summary: &RunSummary) -> Self {
        Self {
            programs: group_ids.join("&"),
            query_start_time: format_isot(&window.start),
            query_end_time: format_isot(&window.end),
            tot_sources: summary.total_sources,
            nsrcs_already_on_tns: summary.already_known,
            nsrcs_reported: summary.reported,
        }
    }
}

/// Append-only run log file
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in file order; a missing file has none
    pub fn entries(&self) -> Result<Vec<RunLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.table_error(e))?;

        reader
            .deserialize::<RunLogEntry>()
            .map(|row| row.map_err(|e| self.table_error(e)))
            .collect()
    }

    /// Latest `query_end_time` over all rows, the start of the next window
    pub fn resume_start_time(&self) -> Result<Option<DateTime<Utc>>> {
        let mut latest: Option<DateTime<Utc>> = None;
        for entry in self.entries()? {
            let end = parse_iso(&entry.query_end_time).map_err(|_| {
                Error::Table(format!(
                    "{}: unreadable query_end_time {:?}",
                    self.path.display(),
                    entry.query_end_time
                ))
            })?;
            latest = Some(latest.map_or(end, |l| l.max(end)));
        }
        Ok(latest)
    }

    /// Append one row, writing the header when the file is new
    pub fn append(&self, entry: &RunLogEntry) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let is_new = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(&mut file);
        writer.serialize(entry).map_err(|e| self.table_error(e))?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;

        tracing::info!(
            path = %self.path.display(),
            programs = %entry.programs,
            start = %entry.query_start_time,
            end = %entry.query_end_time,
            "Appended run log entry"
        );
        Ok(())
    }

    fn table_error(&self, err: csv::Error) -> Error {
        Error::Table(format!("{}: {err}", self.path.display()))
    }
}
