//! Credential and settings loading
//!
//! Credentials come from the process environment and are validated once at
//! startup. Everything else has a compiled default that an optional TOML
//! settings file may override section by section.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::models::FilterBand;
use crate::{Error, Result};

pub const TNS_BOT_ID_VAR: &str = "TNS_BOT_ID";
pub const TNS_BOT_NAME_VAR: &str = "TNS_BOT_NAME";
pub const TNS_API_KEY_VAR: &str = "TNS_API_KEY";
pub const SURVEY_TOKEN_VAR: &str = "FRITZ_TOKEN";

/// Registry bot credentials
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub bot_id: String,
    pub bot_name: String,
    pub api_key: String,
}

impl RegistryCredentials {
    /// Read all three credentials from the environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::Config(format!("Please specify {name} in environment variables"))
                })
        };

        let credentials = Self {
            bot_id: required(TNS_BOT_ID_VAR)?,
            bot_name: required(TNS_BOT_NAME_VAR)?,
            api_key: required(TNS_API_KEY_VAR)?,
        };

        if credentials.bot_id.parse::<u64>().is_err() {
            return Err(Error::Config(format!(
                "{TNS_BOT_ID_VAR} must be a numeric bot id, got {:?}",
                credentials.bot_id
            )));
        }

        Ok(credentials)
    }

    /// `User-Agent` value identifying the bot to the registry
    pub fn bot_marker(&self) -> String {
        format!(
            "tns_marker{{\"tns_id\": {}, \"type\": \"bot\", \"name\": \"{}\"}}",
            self.bot_id, self.bot_name
        )
    }
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("bot_id", &self.bot_id)
            .field("bot_name", &self.bot_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Survey API token, read at the moment a survey request needs it
pub fn survey_token_from_env() -> Result<String> {
    std::env::var(SURVEY_TOKEN_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::Config(format!(
                "Please specify survey token using export {SURVEY_TOKEN_VAR}=<token>"
            ))
        })
}

/// Remote endpoints and search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub survey_url: String,
    pub registry_url: String,
    pub registry_sandbox_url: String,
    pub search_radius: f64,
    pub search_radius_units: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            survey_url: "https://fritz.science".to_string(),
            registry_url: "https://www.wis-tns.org/api".to_string(),
            registry_sandbox_url: "https://sandbox.wis-tns.org/api".to_string(),
            search_radius: 4.0,
            search_radius_units: "arcsec".to_string(),
        }
    }
}

/// Naming convention of the reporting survey's internal names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalNameFormat {
    pub prefix: String,
    pub year_format: String,
    pub postfix: String,
}

impl Default for InternalNameFormat {
    fn default() -> Self {
        Self {
            prefix: "ZTF".to_string(),
            year_format: "YY".to_string(),
            postfix: String::new(),
        }
    }
}

/// Fixed fields stamped on every per-source report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReporterMetadata {
    pub reporter: String,
    pub group_id: u32,
    pub at_type: u32,
    pub instrument_value: String,
    pub exptime: String,
    pub observer: String,
    pub internal_name_format: InternalNameFormat,
    pub remarks: Option<String>,
}

impl Default for ReporterMetadata {
    fn default() -> Self {
        Self {
            reporter: "tnsbot on behalf of the ZTF collaboration".to_string(),
            group_id: 48,
            at_type: 1,
            instrument_value: "196".to_string(),
            exptime: "30".to_string(),
            observer: "None".to_string(),
            internal_name_format: InternalNameFormat::default(),
            remarks: None,
        }
    }
}

/// Band name to registry filter code lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilterCodes(BTreeMap<String, String>);

impl FilterCodes {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn code_for(&self, band: &FilterBand) -> Result<&str> {
        self.0
            .get(band.as_str())
            .map(String::as_str)
            .ok_or_else(|| Error::UnsupportedFilter(band.to_string()))
    }
}

impl Default for FilterCodes {
    fn default() -> Self {
        Self::new([("ztfg", "110"), ("ztfr", "111"), ("ztfi", "112")])
    }
}

/// Non-detection substituted when no usable limit precedes discovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackLimit {
    pub jd: f64,
    pub filter: FilterBand,
    pub limiting_magnitude: f64,
}

impl Default for FallbackLimit {
    fn default() -> Self {
        Self {
            jd: 2_458_270.0,
            filter: FilterBand::Ztfr,
            limiting_magnitude: 20.5,
        }
    }
}

/// Static tables the discovery builder depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionTables {
    /// Instruments whose photometry counts toward discovery and limits
    pub trusted_instruments: Vec<i64>,
    pub filter_codes: FilterCodes,
    pub fallback_limit: FallbackLimit,
}

impl DetectionTables {
    pub fn is_trusted(&self, instrument_id: i64) -> bool {
        self.trusted_instruments.contains(&instrument_id)
    }
}

impl Default for DetectionTables {
    fn default() -> Self {
        Self {
            trusted_instruments: vec![1],
            filter_codes: FilterCodes::default(),
            fallback_limit: FallbackLimit::default(),
        }
    }
}

/// Complete non-secret settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingSettings {
    pub endpoints: Endpoints,
    pub reporter: ReporterMetadata,
    pub tables: DetectionTables,
}

impl ReportingSettings {
    /// Load settings from an optional TOML file; no path means defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read settings file {}: {e}", path.display()))
        })?;
        let settings = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), "Loaded reporting settings");
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid settings file: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.tables.trusted_instruments.is_empty() {
            return Err(Error::Config(
                "tables.trusted_instruments must name at least one instrument".to_string(),
            ));
        }
        if !(self.endpoints.search_radius > 0.0) {
            return Err(Error::Config(
                "endpoints.search_radius must be positive".to_string(),
            ));
        }
        self.tables
            .filter_codes
            .code_for(&self.tables.fallback_limit.filter)
            .map_err(|_| {
                Error::Config(format!(
                    "fallback filter {} has no filter code",
                    self.tables.fallback_limit.filter
                ))
            })?;
        Ok(())
    }
}
