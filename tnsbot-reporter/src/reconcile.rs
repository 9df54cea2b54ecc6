//! Reconciliation engine
//!
//! For one run: gather candidate sources, drop those the survey already
//! associates with a registry name, ask the configured existence check about
//! the rest, build discovery records for the unknown ones and submit them as
//! a single batch. The ledger is updated only after the registry accepted the
//! whole batch.
//!
//! Remote failures are logged and skip the affected item; configuration and
//! local persistence failures abort the run.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::time::Duration;
use tnsbot_common::config::{DetectionTables, ReporterMetadata};
use tnsbot_common::models::{PhotometryPoint, Source, TimeWindow};
use tnsbot_common::time::format_isot;
use tnsbot_common::{Error, Result};

use crate::discovery::build_discovery_record;
use crate::ledger::ReportLedger;
use crate::report::{BatchReport, SourceReport};
use crate::services::{Existence, KnownSourceCheck, ReportSink, SourceCatalog};
use crate::throttle::Throttle;

/// Which sources a run considers
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateSelection {
    /// Sources saved to any of the groups inside the window
    Groups {
        group_ids: Vec<String>,
        window: TimeWindow,
    },
    /// Explicitly named sources, bypassing the group query
    Named(Vec<String>),
}

/// Run policy
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Minimum spacing between existence lookups
    pub lookup_delay: Duration,
    /// Build (and write) the report but never submit it
    pub dry_run: bool,
    /// Record accepted reports in the ledger
    pub record_in_ledger: bool,
    /// Where to write the report payload before submission
    pub report_path: Option<PathBuf>,
    pub reporter: ReporterMetadata,
    pub tables: DetectionTables,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            lookup_delay: Duration::from_secs(2),
            dry_run: false,
            record_in_ledger: true,
            report_path: Some(PathBuf::from("bulkreport.json")),
            reporter: ReporterMetadata::default(),
            tables: DetectionTables::default(),
        }
    }
}

/// Totals of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Sources returned by the survey (or named explicitly)
    pub total_sources: usize,
    /// Survey-named plus existence-check hits
    pub already_known: usize,
    /// Sources in an accepted batch report
    pub reported: usize,
    /// Unknown sources without a usable trusted detection
    pub skipped_no_detection: usize,
    /// Items dropped after a remote or data error
    pub failed: usize,
    /// Identifiers in the accepted batch, in report order
    pub reported_ids: Vec<String>,
}

/// Drives one reconciliation pass over its collaborators
pub struct Reconciler<'a> {
    catalog: &'a dyn SourceCatalog,
    check: &'a dyn KnownSourceCheck,
    sink: &'a dyn ReportSink,
    ledger: &'a mut ReportLedger,
    settings: ReconcileSettings,
    throttle: Throttle,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        catalog: &'a dyn SourceCatalog,
        check: &'a dyn KnownSourceCheck,
        sink: &'a dyn ReportSink,
        ledger: &'a mut ReportLedger,
        settings: ReconcileSettings,
    ) -> Self {
        let throttle = Throttle::new(settings.lookup_delay);
        Self {
            catalog,
            check,
            sink,
            ledger,
            settings,
            throttle,
        }
    }

    pub async fn run(&mut self, selection: &CandidateSelection) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        // Photometry already retrieved while gathering, keyed by source id
        let mut prefetched = HashMap::new();
        let candidates = match selection {
            CandidateSelection::Groups { group_ids, window } => {
                self.gather_from_groups(group_ids, window, &mut summary).await?
            }
            CandidateSelection::Named(names) => {
                self.gather_named(names, &mut prefetched, &mut summary).await?
            }
        };

        let to_report = self.partition_unknown(candidates, &mut summary).await?;

        if to_report.is_empty() {
            tracing::info!("No new sources to report");
        } else {
            let batch = self.build_batch(&to_report, prefetched, &mut summary).await?;
            self.deliver(batch, &mut summary).await?;
        }

        tracing::info!(
            total = summary.total_sources,
            already_known = summary.already_known,
            reported = summary.reported,
            skipped_no_detection = summary.skipped_no_detection,
            failed = summary.failed,
            "Reconciliation complete"
        );
        Ok(summary)
    }

    /// Saved sources per group, minus those the survey already names
    async fn gather_from_groups(
        &self,
        group_ids: &[String],
        window: &TimeWindow,
        summary: &mut RunSummary,
    ) -> Result<Vec<Source>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for group_id in group_ids {
            let sources = match self.catalog.list_sources(group_id, window, None).await {
                Ok(sources) => sources,
                Err(e) => {
                    self.absorb(e, group_id, "list sources")?;
                    continue;
                }
            };
            let sources: Vec<Source> = sources
                .into_iter()
                .filter(|s| seen.insert(s.id.clone()))
                .collect();

            tracing::info!(
                group_id = %group_id,
                count = sources.len(),
                start = %format_isot(&window.start),
                end = %format_isot(&window.end),
                "Found saved sources"
            );
            summary.total_sources += sources.len();

            let named: HashSet<String> =
                match self.catalog.list_sources(group_id, window, Some(true)).await {
                    Ok(named) => named.into_iter().map(|s| s.id).collect(),
                    Err(e) => {
                        self.absorb(e, group_id, "list registry-named sources")?;
                        HashSet::new()
                    }
                };

            let (already_named, unnamed): (Vec<Source>, Vec<Source>) = sources
                .into_iter()
                .partition(|s| named.contains(&s.id) || s.registry_name.is_some());

            for source in &already_named {
                tracing::debug!(
                    source_id = %source.id,
                    registry_name = source.registry_name.as_deref().unwrap_or("?"),
                    "Survey already associates a registry name"
                );
            }
            summary.already_known += already_named.len();

            tracing::info!(
                group_id = %group_id,
                count = unnamed.len(),
                "Sources without registry names"
            );
            candidates.extend(unnamed);
        }

        Ok(candidates)
    }

    async fn gather_named(
        &self,
        names: &[String],
        prefetched: &mut HashMap<String, Vec<PhotometryPoint>>,
        summary: &mut RunSummary,
    ) -> Result<Vec<Source>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for name in names.iter().filter(|n| seen.insert(n.as_str())) {
            summary.total_sources += 1;
            match self.catalog.fetch_source(name).await {
                Ok(detail) => {
                    prefetched.insert(detail.source.id.clone(), detail.photometry);
                    candidates.push(detail.source);
                }
                Err(e) => {
                    self.absorb(e, name, "fetch source")?;
                    summary.failed += 1;
                }
            }
        }
        Ok(candidates)
    }

    /// Candidates the existence check does not know about
    async fn partition_unknown(
        &self,
        candidates: Vec<Source>,
        summary: &mut RunSummary,
    ) -> Result<Vec<Source>> {
        let mut unknown = Vec::new();

        for source in candidates {
            self.throttle.wait().await;
            tracing::info!(source_id = %source.id, strategy = self.check.strategy_name(), "Checking source");

            match self.check.lookup(&source).await {
                Ok(Existence::Known { names }) => {
                    tracing::info!(
                        source_id = %source.id,
                        names = ?names,
                        "Source already known, not reporting"
                    );
                    summary.already_known += 1;
                }
                Ok(Existence::Unknown) => {
                    tracing::info!(source_id = %source.id, "Source not known, reporting it");
                    unknown.push(source);
                }
                Err(e) => {
                    self.absorb(e, &source.id, "existence lookup")?;
                    summary.failed += 1;
                }
            }
        }

        Ok(unknown)
    }

    async fn build_batch(
        &self,
        sources: &[Source],
        mut prefetched: HashMap<String, Vec<PhotometryPoint>>,
        summary: &mut RunSummary,
    ) -> Result<BatchReport> {
        let mut batch = BatchReport::new();

        for source in sources {
            let photometry = match prefetched.remove(&source.id) {
                Some(points) => points,
                None => match self.catalog.fetch_photometry(&source.id).await {
                    Ok(points) => points,
                    Err(e) => {
                        self.absorb(e, &source.id, "fetch photometry")?;
                        summary.failed += 1;
                        continue;
                    }
                },
            };

            match build_discovery_record(&photometry, &self.settings.tables) {
                Ok(Some(record)) => {
                    batch.push(SourceReport::new(source, &record, &self.settings.reporter));
                }
                Ok(None) => {
                    tracing::info!(source_id = %source.id, "No trusted detections, skipping");
                    summary.skipped_no_detection += 1;
                }
                Err(e) => {
                    self.absorb(e, &source.id, "build discovery record")?;
                    summary.failed += 1;
                }
            }
        }

        Ok(batch)
    }

    /// Write, submit and record the batch
    async fn deliver(&mut self, batch: BatchReport, summary: &mut RunSummary) -> Result<()> {
        if batch.is_empty() {
            tracing::info!("No reportable sources after building discovery records");
            return Ok(());
        }

        if let Some(path) = &self.settings.report_path {
            batch.write_to(path)?;
        }

        if self.settings.dry_run {
            tracing::info!(entries = batch.len(), "Dry run, report not submitted");
            return Ok(());
        }

        let receipt = match self.sink.submit(&batch).await {
            Ok(receipt) => receipt,
            Err(e) => {
                // Nothing is recorded; the next run retries every source
                self.absorb(e, "batch", "submit report")?;
                summary.failed += batch.len();
                return Ok(());
            }
        };

        let ids = batch.source_ids();
        tracing::info!(
            report_id = receipt.report_id.as_deref().unwrap_or("?"),
            entries = ids.len(),
            "Report accepted"
        );

        if self.settings.record_in_ledger {
            self.ledger.append_all(ids.iter().map(String::as_str))?;
        }
        summary.reported = ids.len();
        summary.reported_ids = ids;
        Ok(())
    }

    /// Log a per-item failure, or hand back errors that must stop the run
    fn absorb(&self, err: Error, item: &str, operation: &str) -> Result<()> {
        if err.is_fatal() {
            return Err(err);
        }
        if err.is_data_error() {
            tracing::warn!(item, operation, error = %err, "Skipping item with unusable data");
        } else {
            tracing::error!(item, operation, error = %err, "Remote operation failed");
        }
        Ok(())
    }
}
