//! Remote collaborators of the reconciliation engine
//!
//! The engine only sees the three capabilities below. The survey and registry
//! HTTP clients implement them for production; tests substitute in-memory
//! fakes.

pub mod registry_client;
pub mod survey_client;

pub use registry_client::{RegistryClient, RegistryMatch, RegistryTarget};
pub use survey_client::{collect_pages, SurveyClient};

use async_trait::async_trait;
use tnsbot_common::models::{PhotometryPoint, Source, TimeWindow};
use tnsbot_common::Result;

use crate::report::BatchReport;

/// Source listing and photometry retrieval
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Sources saved to `group_id` inside `window`
    ///
    /// `has_registry_name = Some(true)` restricts the listing to sources the
    /// survey already associates with a registry designation.
    async fn list_sources(
        &self,
        group_id: &str,
        window: &TimeWindow,
        has_registry_name: Option<bool>,
    ) -> Result<Vec<Source>>;

    /// One source by survey identifier, with its photometry
    async fn fetch_source(&self, source_id: &str) -> Result<SourceDetail>;

    /// Full photometry of one source
    async fn fetch_photometry(&self, source_id: &str) -> Result<Vec<PhotometryPoint>>;
}

/// A source and its full photometry, as returned by a single detail request
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDetail {
    pub source: Source,
    pub photometry: Vec<PhotometryPoint>,
}

/// Outcome of an existence lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existence {
    /// Already on the registry or already reported by us; `names` lists any
    /// registry designations the lookup returned
    Known { names: Vec<String> },
    Unknown,
}

impl Existence {
    pub fn is_known(&self) -> bool {
        matches!(self, Existence::Known { .. })
    }
}

/// "Does this source already exist remotely, or have we already told the
/// registry about it?"
#[async_trait]
pub trait KnownSourceCheck: Send + Sync {
    /// Short label used in logs
    fn strategy_name(&self) -> &'static str;

    async fn lookup(&self, source: &Source) -> Result<Existence>;
}

/// Registry acknowledgement of a bulk report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub report_id: Option<String>,
}

/// Destination of batch discovery reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn submit(&self, report: &BatchReport) -> Result<SubmissionReceipt>;
}
