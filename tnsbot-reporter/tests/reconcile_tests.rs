//! End-to-end reconciliation tests
//!
//! The engine runs against in-memory survey, existence-check and report-sink
//! fakes; ledgers, run logs and report files live in temp directories.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use tnsbot_common::models::{FilterBand, PhotometryPoint, Source, TimeWindow};
use tnsbot_common::time::format_isot;
use tnsbot_common::{Error, Result};
use tnsbot_reporter::services::{
    Existence, KnownSourceCheck, ReportSink, SourceCatalog, SourceDetail, SubmissionReceipt,
};
use tnsbot_reporter::{
    BatchReport, CandidateSelection, ReconcileSettings, Reconciler, ReportLedger, RunLog,
    RunLogEntry, RunSummary,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeCatalog {
    /// group id -> saved sources
    groups: HashMap<String, Vec<Source>>,
    /// group id -> ids the survey reports as registry-named
    named: HashMap<String, Vec<String>>,
    photometry: HashMap<String, Vec<PhotometryPoint>>,
    /// group ids whose listing fails with the given error factory
    failing_groups: HashSet<String>,
    fatal: bool,
    list_calls: Mutex<usize>,
    /// ids passed to fetch_source / fetch_photometry, in call order
    detail_requests: Mutex<Vec<String>>,
}

impl FakeCatalog {
    fn with_group(mut self, group: &str, sources: Vec<Source>) -> Self {
        for s in &sources {
            self.photometry
                .entry(s.id.clone())
                .or_insert_with(|| single_detection());
        }
        self.groups.insert(group.to_string(), sources);
        self
    }

    fn with_named(mut self, group: &str, ids: &[&str]) -> Self {
        self.named
            .insert(group.to_string(), ids.iter().map(|s| s.to_string()).collect());
        self
    }

    fn with_photometry(mut self, id: &str, points: Vec<PhotometryPoint>) -> Self {
        self.photometry.insert(id.to_string(), points);
        self
    }

    fn all_sources(&self) -> impl Iterator<Item = &Source> {
        self.groups.values().flatten()
    }
}

#[async_trait]
impl SourceCatalog for FakeCatalog {
    async fn list_sources(
        &self,
        group_id: &str,
        _window: &TimeWindow,
        has_registry_name: Option<bool>,
    ) -> Result<Vec<Source>> {
        *self.list_calls.lock().unwrap() += 1;

        if self.fatal {
            return Err(Error::Config("survey token missing".to_string()));
        }
        if self.failing_groups.contains(group_id) {
            return Err(Error::Remote {
                service: "survey",
                status: 500,
                message: "internal error".to_string(),
            });
        }

        let sources = self.groups.get(group_id).cloned().unwrap_or_default();
        Ok(match has_registry_name {
            Some(true) => {
                let named = self.named.get(group_id).cloned().unwrap_or_default();
                sources.into_iter().filter(|s| named.contains(&s.id)).collect()
            }
            _ => sources,
        })
    }

    async fn fetch_source(&self, source_id: &str) -> Result<SourceDetail> {
        self.detail_requests.lock().unwrap().push(source_id.to_string());
        let source = self
            .all_sources()
            .find(|s| s.id == source_id)
            .cloned()
            .ok_or_else(|| Error::Remote {
                service: "survey",
                status: 404,
                message: format!("{source_id} not found"),
            })?;
        Ok(SourceDetail {
            photometry: self.photometry.get(source_id).cloned().unwrap_or_default(),
            source,
        })
    }

    async fn fetch_photometry(&self, source_id: &str) -> Result<Vec<PhotometryPoint>> {
        self.detail_requests.lock().unwrap().push(source_id.to_string());
        self.photometry.get(source_id).cloned().ok_or_else(|| Error::Remote {
            service: "survey",
            status: 404,
            message: format!("{source_id} not found"),
        })
    }
}

/// Registry-search stand-in
#[derive(Default)]
struct FakeRegistry {
    known: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    lookups: Mutex<Vec<String>>,
}

#[async_trait]
impl KnownSourceCheck for FakeRegistry {
    fn strategy_name(&self) -> &'static str {
        "fake-registry"
    }

    async fn lookup(&self, source: &Source) -> Result<Existence> {
        self.lookups.lock().unwrap().push(source.id.clone());
        if self.failing.contains(&source.id) {
            return Err(Error::Remote {
                service: "registry",
                status: 429,
                message: "rate limited".to_string(),
            });
        }
        Ok(match self.known.get(&source.id) {
            Some(names) => Existence::Known {
                names: names.clone(),
            },
            None => Existence::Unknown,
        })
    }
}

#[derive(Default)]
struct FakeSink {
    fail: bool,
    batches: Mutex<Vec<Value>>,
}

impl FakeSink {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn submitted(&self) -> Vec<Value> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportSink for FakeSink {
    async fn submit(&self, report: &BatchReport) -> Result<SubmissionReceipt> {
        if self.fail {
            return Err(Error::Remote {
                service: "registry",
                status: 500,
                message: "bulk report rejected".to_string(),
            });
        }
        let value = serde_json::to_value(report).unwrap();
        self.batches.lock().unwrap().push(value);
        Ok(SubmissionReceipt {
            report_id: Some("4242".to_string()),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn source(id: &str) -> Source {
    Source {
        id: id.to_string(),
        ra: 150.0,
        dec: 2.5,
        registry_name: None,
    }
}

/// One trusted detection at JD 2460000 with flux 100, zp 25
fn single_detection() -> Vec<PhotometryPoint> {
    vec![PhotometryPoint {
        jd: 2_460_000.0,
        filter: FilterBand::Ztfr,
        flux: Some(100.0),
        flux_err: Some(5.0),
        zp: 25.0,
        instrument_id: 1,
    }]
}

fn window() -> TimeWindow {
    TimeWindow::new(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
    )
}

fn groups(ids: &[&str]) -> CandidateSelection {
    CandidateSelection::Groups {
        group_ids: ids.iter().map(|s| s.to_string()).collect(),
        window: window(),
    }
}

fn settings(report_dir: &Path) -> ReconcileSettings {
    ReconcileSettings {
        lookup_delay: Duration::ZERO,
        report_path: Some(report_dir.join("bulkreport.json")),
        ..ReconcileSettings::default()
    }
}

fn reported_names(batch: &Value) -> Vec<String> {
    let at_report = batch["at_report"].as_object().unwrap();
    (0..at_report.len())
        .map(|i| at_report[&i.to_string()]["internal_name"].as_str().unwrap().to_string())
        .collect()
}

async fn run(
    catalog: &FakeCatalog,
    check: &dyn KnownSourceCheck,
    sink: &FakeSink,
    ledger: &mut ReportLedger,
    settings: ReconcileSettings,
    selection: &CandidateSelection,
) -> Result<RunSummary> {
    Reconciler::new(catalog, check, sink, ledger, settings)
        .run(selection)
        .await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_only_unknown_unnamed_source_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default()
        .with_group("43", vec![source("A"), source("B"), source("C")])
        .with_named("43", &["B"]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    ledger.append("C").unwrap();
    let check = ledger.snapshot();
    let sink = FakeSink::default();

    let summary = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(summary.total_sources, 3);
    assert_eq!(summary.already_known, 2);
    assert_eq!(summary.reported, 1);
    assert_eq!(summary.reported_ids, vec!["A"]);

    let batches = sink.submitted();
    assert_eq!(batches.len(), 1);
    assert_eq!(reported_names(&batches[0]), vec!["A"]);
    assert!(ledger.contains("A"));
}

#[tokio::test]
async fn test_second_run_over_same_window_reports_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let sink = FakeSink::default();

    let mut ledger = ReportLedger::open(&ledger_path).unwrap();
    let check = ledger.snapshot();
    let first = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();
    assert_eq!(first.reported, 2);

    let mut ledger = ReportLedger::open(&ledger_path).unwrap();
    let check = ledger.snapshot();
    let second = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(second.reported, 0);
    assert_eq!(second.already_known, 2);
    assert_eq!(sink.submitted().len(), 1);
}

#[tokio::test]
async fn test_single_detection_report_uses_fallback_non_detection() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry::default();
    let sink = FakeSink::default();

    run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    let entry = &sink.submitted()[0]["at_report"]["0"];
    assert_eq!(entry["discovery_datetime"].as_f64(), Some(2_460_000.0));
    let magnitude = entry["photometry"]["photometry_group"]["0"]["flux"].as_f64().unwrap();
    assert!((magnitude - 20.0).abs() < 1e-9);
    assert_eq!(entry["non_detection"]["obsdate"].as_f64(), Some(2_458_270.0));
    assert_eq!(entry["non_detection"]["filter_value"], "111");
    assert_eq!(entry["non_detection"]["limiting_flux"].as_f64(), Some(20.5));
}

#[tokio::test]
async fn test_source_without_detections_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default()
        .with_group("43", vec![source("A")])
        .with_photometry(
            "A",
            vec![PhotometryPoint {
                jd: 2_460_000.0,
                filter: FilterBand::Ztfg,
                flux: None,
                flux_err: Some(3.0),
                zp: 25.0,
                instrument_id: 1,
            }],
        );
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &groups(&["43"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.skipped_no_detection, 1);
    assert_eq!(summary.reported, 0);
    assert!(sink.submitted().is_empty());
    assert!(!dir.path().join("bulkreport.json").exists());
}

#[tokio::test]
async fn test_registry_hits_count_as_known() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry {
        known: HashMap::from([("B".to_string(), vec!["AT2024abc".to_string()])]),
        ..FakeRegistry::default()
    };
    let sink = FakeSink::default();

    let summary = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(summary.already_known, 1);
    assert_eq!(summary.reported_ids, vec!["A"]);
    assert_eq!(*check.lookups.lock().unwrap(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_survey_named_sources_are_never_looked_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut named = source("B");
    named.registry_name = Some("2024xyz".to_string());
    let catalog = FakeCatalog::default()
        .with_group("43", vec![source("A"), named, source("C")])
        .with_named("43", &["C"]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry::default();
    let sink = FakeSink::default();

    let summary = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(*check.lookups.lock().unwrap(), vec!["A"]);
    assert_eq!(summary.already_known, 2);
}

#[tokio::test]
async fn test_dry_run_writes_report_but_submits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        ReconcileSettings {
            dry_run: true,
            ..settings(dir.path())
        },
        &groups(&["43"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.reported, 0);
    assert!(sink.submitted().is_empty());
    assert!(ledger.is_empty());

    let written: Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("bulkreport.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(reported_names(&written), vec!["A"]);
}

#[tokio::test]
async fn test_failed_submission_records_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(&ledger_path).unwrap();
    let sink = FakeSink::failing();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &groups(&["43"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.reported, 0);
    assert_eq!(summary.failed, 2);
    assert!(ledger.is_empty());
    assert!(!ledger_path.exists());
}

#[tokio::test]
async fn test_sandbox_submissions_are_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        ReconcileSettings {
            record_in_ledger: false,
            ..settings(dir.path())
        },
        &groups(&["43"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.reported, 1);
    assert!(!ledger.contains("A"));
}

#[tokio::test]
async fn test_failed_lookup_skips_only_that_source() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry {
        failing: HashSet::from(["A".to_string()]),
        ..FakeRegistry::default()
    };
    let sink = FakeSink::default();

    let summary = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reported_ids, vec!["B"]);
}

#[tokio::test]
async fn test_failed_group_listing_does_not_abort_other_groups() {
    let dir = tempfile::tempdir().unwrap();
    let mut catalog = FakeCatalog::default()
        .with_group("43", vec![source("A")])
        .with_group("48", vec![source("B")]);
    catalog.failing_groups.insert("43".to_string());
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &groups(&["43", "48"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.total_sources, 1);
    assert_eq!(summary.reported_ids, vec!["B"]);
}

#[tokio::test]
async fn test_configuration_error_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog {
        fatal: true,
        ..FakeCatalog::default()
    };
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let err = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &groups(&["43", "48"]),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Config(_)));
    assert_eq!(*catalog.list_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_unsupported_filter_isolated_to_its_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut tables = tnsbot_common::config::DetectionTables::default();
    tables.trusted_instruments.push(9);
    let catalog = FakeCatalog::default()
        .with_group("43", vec![source("A"), source("B")])
        .with_photometry(
            "A",
            vec![PhotometryPoint {
                jd: 2_460_000.0,
                filter: FilterBand::from("atlasc"),
                flux: Some(100.0),
                flux_err: Some(5.0),
                zp: 25.0,
                instrument_id: 9,
            }],
        );
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        ReconcileSettings {
            tables,
            ..settings(dir.path())
        },
        &groups(&["43"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reported_ids, vec!["B"]);
}

#[tokio::test]
async fn test_source_in_several_groups_is_considered_once() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default()
        .with_group("43", vec![source("A"), source("B")])
        .with_group("48", vec![source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry::default();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &check,
        &sink,
        &mut ledger,
        settings(dir.path()),
        &groups(&["43", "48"]),
    )
    .await
    .unwrap();

    assert_eq!(summary.total_sources, 2);
    assert_eq!(check.lookups.lock().unwrap().len(), 2);
    assert_eq!(reported_names(&sink.submitted()[0]), vec!["A", "B"]);
}

#[tokio::test]
async fn test_named_sources_bypass_group_listing() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &CandidateSelection::Named(vec!["B".to_string(), "missing".to_string(), "B".to_string()]),
    )
    .await
    .unwrap();

    assert_eq!(*catalog.list_calls.lock().unwrap(), 0);
    assert_eq!(summary.total_sources, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.reported_ids, vec!["B"]);
}

#[tokio::test]
async fn test_named_sources_fetched_once() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let summary = run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        settings(dir.path()),
        &CandidateSelection::Named(vec!["A".to_string(), "B".to_string()]),
    )
    .await
    .unwrap();

    assert_eq!(summary.reported_ids, vec!["A", "B"]);
    assert_eq!(*catalog.detail_requests.lock().unwrap(), vec!["A", "B"]);
}

#[tokio::test]
async fn test_group_sources_fetch_photometry_once() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let check = FakeRegistry {
        known: HashMap::from([("B".to_string(), vec!["AT2024abc".to_string()])]),
        ..FakeRegistry::default()
    };
    let sink = FakeSink::default();

    run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(*catalog.detail_requests.lock().unwrap(), vec!["A"]);
}

#[tokio::test]
async fn test_index_column_ledger_keeps_runs_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let ledger_path = dir.path().join("ledger.csv");
    std::fs::write(&ledger_path, ",ZTF_names\n0,C\n").unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("C")]);
    let sink = FakeSink::default();

    let mut ledger = ReportLedger::open(&ledger_path).unwrap();
    let check = ledger.snapshot();
    let first = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();
    assert_eq!(first.reported_ids, vec!["A"]);

    let mut ledger = ReportLedger::open(&ledger_path).unwrap();
    let check = ledger.snapshot();
    let second = run(&catalog, &check, &sink, &mut ledger, settings(dir.path()), &groups(&["43"]))
        .await
        .unwrap();

    assert_eq!(second.reported, 0);
    assert_eq!(second.already_known, 2);
    assert_eq!(sink.submitted().len(), 1);
}

#[tokio::test]
async fn test_lookups_respect_delay() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::default().with_group("43", vec![source("A"), source("B"), source("C")]);
    let mut ledger = ReportLedger::open(dir.path().join("ledger.csv")).unwrap();
    let sink = FakeSink::default();

    let start = std::time::Instant::now();
    run(
        &catalog,
        &FakeRegistry::default(),
        &sink,
        &mut ledger,
        ReconcileSettings {
            lookup_delay: Duration::from_millis(100),
            ..settings(dir.path())
        },
        &groups(&["43"]),
    )
    .await
    .unwrap();

    // Three lookups, two enforced gaps
    assert!(start.elapsed() >= Duration::from_millis(180));
}

#[tokio::test]
async fn test_run_log_rows_chain_windows() {
    let dir = tempfile::tempdir().unwrap();
    let log = RunLog::new(dir.path().join("runs.csv"));
    let summary = RunSummary {
        total_sources: 3,
        already_known: 2,
        reported: 1,
        ..RunSummary::default()
    };

    let day = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
    let group_ids = vec!["43".to_string(), "48".to_string()];
    for (start, end) in [(1, 2), (2, 3), (3, 4)] {
        let window = TimeWindow::new(day(start), day(end));
        log.append(&RunLogEntry::from_summary(&group_ids, &window, &summary))
            .unwrap();
    }

    let rows = log.entries().unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].programs, "43&48");
    assert_eq!(rows[0].nsrcs_already_on_tns, 2);
    assert_eq!(
        format_isot(&log.resume_start_time().unwrap().unwrap()),
        "2024-01-04T00:00:00.000"
    );
}
