//! tnsbot-reporter library interface
//!
//! Reports newly saved survey sources to the transient registry, once per
//! source. Exposes the engine and its collaborators for integration testing.

pub mod config;
pub mod discovery;
pub mod ledger;
pub mod reconcile;
pub mod report;
pub mod run_log;
pub mod services;
pub mod throttle;

pub use discovery::{build_discovery_record, DiscoveryRecord, NonDetection};
pub use ledger::{LedgerCheck, ReportLedger};
pub use reconcile::{CandidateSelection, ReconcileSettings, Reconciler, RunSummary};
pub use report::{BatchReport, SourceReport};
pub use run_log::{RunLog, RunLogEntry};
