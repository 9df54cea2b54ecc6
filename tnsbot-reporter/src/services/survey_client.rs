//! Survey API client
//!
//! Lists saved sources per group and time window, fetches source photometry
//! and pages through sources and candidates. Authenticates with `Authorization: token
//! <FRITZ_TOKEN>`; the token is read from the environment on the first
//! request, not at construction.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tokio::sync::OnceCell;
use tnsbot_common::config::survey_token_from_env;
use tnsbot_common::models::{Candidate, PhotometryPoint, Source, TimeWindow};
use tnsbot_common::time::{format_isot, mjd_to_jd};
use tnsbot_common::{Error, Result};

use super::{SourceCatalog, SourceDetail};

const SERVICE: &str = "survey";
const USER_AGENT: &str = concat!("tnsbot/", env!("CARGO_PKG_VERSION"));
const CANDIDATES_PER_PAGE: u32 = 50;
const SOURCES_PER_PAGE: u32 = 100;

/// `{"data": ...}` envelope used by every survey endpoint
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct SourceList {
    #[serde(default)]
    sources: Vec<Source>,
}

#[derive(Debug, Deserialize)]
struct CandidateList {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct RawSourceDetail {
    #[serde(flatten)]
    source: Source,
    #[serde(default)]
    photometry: Vec<RawPhotometry>,
}

/// Photometry row as served by the survey
#[derive(Debug, Deserialize)]
struct RawPhotometry {
    mjd: Option<f64>,
    filter: String,
    flux: Option<f64>,
    fluxerr: Option<f64>,
    zp: Option<f64>,
    instrument_id: i64,
}

impl RawPhotometry {
    fn into_point(self) -> Result<PhotometryPoint> {
        let mjd = self
            .mjd
            .filter(|m| m.is_finite())
            .ok_or_else(|| {
                Error::MalformedPhotometry(format!(
                    "{} point from instrument {} has no observation time",
                    self.filter, self.instrument_id
                ))
            })?;

        Ok(PhotometryPoint {
            jd: mjd_to_jd(mjd),
            filter: self.filter.into(),
            flux: self.flux,
            flux_err: self.fluxerr,
            // A missing zero-point leaves every magnitude undefined
            zp: self.zp.unwrap_or(f64::NAN),
            instrument_id: self.instrument_id,
        })
    }
}

/// Survey API client
pub struct SurveyClient {
    http_client: reqwest::Client,
    base_url: String,
    token: OnceCell<String>,
}

impl SurveyClient {
    /// Client whose token is read from the environment on first use
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: OnceCell::new(),
        })
    }

    /// Client with an explicit token
    pub fn with_token(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let client = Self::new(base_url)?;
        client
            .token
            .set(token.into())
            .map_err(|e| Error::Config(e.to_string()))?;
        Ok(client)
    }

    async fn token(&self) -> Result<&str> {
        self.token
            .get_or_try_init(|| async { survey_token_from_env() })
            .await
            .map(String::as_str)
    }

    /// Issue a GET and return the status and body text
    async fn get_raw(&self, path: &str, query: &[(&str, String)]) -> Result<(StatusCode, String)> {
        let token = self.token().await?;
        let url = format!("{}{}", self.base_url, path);

        tracing::debug!(url = %url, "Querying survey API");

        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("token {token}"))
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;
        Ok((status, body))
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let (status, body) = self.get_raw(path, query).await?;
        if !status.is_success() {
            return Err(remote_error(status, body));
        }
        parse_data(&body)
    }

    async fn fetch_detail(&self, source_id: &str) -> Result<RawSourceDetail> {
        self.get_data(
            &format!("/api/sources/{source_id}"),
            &[("includePhotometry", "true".to_string())],
        )
        .await
    }

    /// One page of saved sources; `None` once the survey answers HTTP 400
    /// past the first page
    async fn source_page(
        &self,
        group_id: &str,
        window: &TimeWindow,
        has_registry_name: Option<bool>,
        page: u32,
    ) -> Result<Option<Vec<Source>>> {
        let query = saved_sources_query(group_id, window, has_registry_name, page);
        let (status, body) = self.get_raw("/api/sources", &query).await?;
        tracing::debug!(group_id, page, status = status.as_u16(), "Queried sources page");

        if status == StatusCode::BAD_REQUEST && page > 1 {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(remote_error(status, body));
        }
        let list: SourceList = parse_data(&body)?;
        Ok(Some(list.sources))
    }

    /// One page of candidates; `None` once the survey answers HTTP 400
    async fn candidate_page(
        &self,
        group_id: &str,
        window: &TimeWindow,
        page: u32,
    ) -> Result<Option<Vec<Candidate>>> {
        let query = [
            ("savedStatus", "all".to_string()),
            ("startDate", format_isot(&window.start)),
            ("endDate", format_isot(&window.end)),
            ("groupIDs", group_id.to_string()),
            ("numPerPage", CANDIDATES_PER_PAGE.to_string()),
            ("pageNumber", page.to_string()),
        ];

        let (status, body) = self.get_raw("/api/candidates", &query).await?;
        tracing::debug!(group_id, page, status = status.as_u16(), "Queried candidates page");

        if status == StatusCode::BAD_REQUEST {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(remote_error(status, body));
        }
        let list: CandidateList = parse_data(&body)?;
        Ok(Some(list.candidates))
    }

    /// All candidates of a group in a window, paging until the survey stops
    pub async fn list_candidates(&self, group_id: &str, window: &TimeWindow) -> Result<Vec<Candidate>> {
        let candidates = collect_pages(move |page| self.candidate_page(group_id, window, page)).await?;
        tracing::info!(group_id, count = candidates.len(), "Retrieved candidates");
        Ok(candidates)
    }
}

#[async_trait]
impl SourceCatalog for SurveyClient {
    async fn list_sources(
        &self,
        group_id: &str,
        window: &TimeWindow,
        has_registry_name: Option<bool>,
    ) -> Result<Vec<Source>> {
        tracing::debug!(
            group_id,
            start = %format_isot(&window.start),
            end = %format_isot(&window.end),
            ?has_registry_name,
            "Querying saved sources"
        );

        collect_pages(move |page| self.source_page(group_id, window, has_registry_name, page)).await
    }

    async fn fetch_source(&self, source_id: &str) -> Result<SourceDetail> {
        let detail = self.fetch_detail(source_id).await?;
        Ok(SourceDetail {
            source: detail.source,
            photometry: into_points(detail.photometry)?,
        })
    }

    async fn fetch_photometry(&self, source_id: &str) -> Result<Vec<PhotometryPoint>> {
        into_points(self.fetch_detail(source_id).await?.photometry)
    }
}

fn into_points(raw: Vec<RawPhotometry>) -> Result<Vec<PhotometryPoint>> {
    raw.into_iter().map(RawPhotometry::into_point).collect()
}

/// Query parameters of one `/api/sources` page
fn saved_sources_query(
    group_id: &str,
    window: &TimeWindow,
    has_registry_name: Option<bool>,
    page: u32,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("group_ids", group_id.to_string()),
        ("savedAfter", format_isot(&window.start)),
        ("savedBefore", format_isot(&window.end)),
        ("numPerPage", SOURCES_PER_PAGE.to_string()),
        ("pageNumber", page.to_string()),
    ];
    if let Some(flag) = has_registry_name {
        query.push(("hasTNSname", flag.to_string()));
    }
    query
}

/// Concatenate pages `1, 2, ..` until `fetch` yields `None` or an empty page
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<Vec<T>>>>,
{
    let mut items = Vec::new();
    let mut page = 1;
    while let Some(batch) = fetch(page).await? {
        if batch.is_empty() {
            break;
        }
        items.extend(batch);
        page += 1;
    }
    Ok(items)
}

fn remote_error(status: StatusCode, body: String) -> Error {
    Error::Remote {
        service: SERVICE,
        status: status.as_u16(),
        message: body,
    }
}

fn parse_data<T: DeserializeOwned>(body: &str) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    Ok(envelope.data)
}
