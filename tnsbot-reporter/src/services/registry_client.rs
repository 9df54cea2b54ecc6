//! Registry API client
//!
//! Position/internal-name search and bulk discovery report submission. Every
//! request carries the bot marker as `User-Agent` and the API key as a form
//! field; the request payload travels JSON-encoded in the `data` form field.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tnsbot_common::config::{Endpoints, RegistryCredentials};
use tnsbot_common::models::Source;
use tnsbot_common::{Error, Result};

use super::{Existence, KnownSourceCheck, ReportSink, SubmissionReceipt};
use crate::report::BatchReport;

const SERVICE: &str = "registry";

/// Which registry host receives requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryTarget {
    Production,
    /// Test host; reports sent here are not public
    Sandbox,
}

/// One search hit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryMatch {
    pub objname: String,
    #[serde(default)]
    pub prefix: Option<String>,
}

impl RegistryMatch {
    /// Full designation, e.g. `AT2024abc`
    pub fn designation(&self) -> String {
        format!("{}{}", self.prefix.as_deref().unwrap_or(""), self.objname)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SearchData {
    Wrapped {
        #[serde(default)]
        reply: Vec<RegistryMatch>,
    },
    Bare(Vec<RegistryMatch>),
}

/// Registry API client
pub struct RegistryClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: RegistryCredentials,
    search_radius: f64,
    search_radius_units: String,
}

impl RegistryClient {
    pub fn new(
        credentials: RegistryCredentials,
        endpoints: &Endpoints,
        target: RegistryTarget,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(credentials.bot_marker())
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        let base_url = match target {
            RegistryTarget::Production => &endpoints.registry_url,
            RegistryTarget::Sandbox => &endpoints.registry_sandbox_url,
        };

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            search_radius: endpoints.search_radius,
            search_radius_units: endpoints.search_radius_units.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Search by position and, when given, exact internal name
    pub async fn search(&self, ra: f64, dec: f64, internal_name: &str) -> Result<Vec<RegistryMatch>> {
        let payload = search_payload(
            ra,
            dec,
            internal_name,
            self.search_radius,
            &self.search_radius_units,
        );
        let body = self.post("/get/search", &payload.to_string()).await?;
        parse_search_reply(&body)
    }

    async fn post(&self, path: &str, data: &str) -> Result<String> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url = %url, "Posting to registry API");

        let form = [("api_key", self.credentials.api_key.as_str()), ("data", data)];
        let response = self
            .http_client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Remote {
                service: SERVICE,
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl KnownSourceCheck for RegistryClient {
    fn strategy_name(&self) -> &'static str {
        "registry"
    }

    async fn lookup(&self, source: &Source) -> Result<Existence> {
        let matches = self.search(source.ra, source.dec, &source.id).await?;
        if matches.is_empty() {
            Ok(Existence::Unknown)
        } else {
            Ok(Existence::Known {
                names: matches.iter().map(RegistryMatch::designation).collect(),
            })
        }
    }
}

#[async_trait]
impl ReportSink for RegistryClient {
    async fn submit(&self, report: &BatchReport) -> Result<SubmissionReceipt> {
        tracing::info!(
            url = %self.base_url,
            entries = report.len(),
            "Sending bulk report"
        );
        let body = self.post("/bulk-report", &report.to_pretty_json()?).await?;
        Ok(parse_submission_reply(&body))
    }
}

/// Search request document
///
/// The internal-name exact-match flag is set only when a name is given.
pub fn search_payload(ra: f64, dec: f64, internal_name: &str, radius: f64, units: &str) -> Value {
    json!({
        "ra": ra,
        "dec": dec,
        "radius": radius,
        "units": units,
        "objname": "",
        "objname_exact_match": 0,
        "internal_name": internal_name,
        "internal_name_exact_match": i32::from(!internal_name.is_empty()),
        "objid": "",
        "public_timestamp": "",
    })
}

/// Hits of a search response; an empty list means not on the registry
pub fn parse_search_reply(body: &str) -> Result<Vec<RegistryMatch>> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(match response.data {
        SearchData::Wrapped { reply } => reply,
        SearchData::Bare(reply) => reply,
    })
}

/// Report id from a bulk-report response, when the body carries one
pub fn parse_submission_reply(body: &str) -> SubmissionReceipt {
    let report_id = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("data")?.get("report_id").cloned())
        .and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    SubmissionReceipt { report_id }
}
