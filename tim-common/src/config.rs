//! Sources document loading and API key placeholder expansion
//!
//! The sources document maps a source type (`fred`, `bls`, `census`) to its
//! endpoint, API key and per-series fetch parameters. It is loaded once at
//! startup and handed to the adapter registry; nothing here reads ambient
//! globals except [`ProcessEnvironment`], which callers inject explicitly.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Upstream statistical source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SourceType {
    Fred,
    Bls,
    Census,
}

impl SourceType {
    /// Fixed ingestion order used by the orchestrator
    pub const ALL: [SourceType; 3] = [SourceType::Fred, SourceType::Bls, SourceType::Census];

    /// Key of this source in the sources document
    pub fn key(&self) -> &'static str {
        match self {
            SourceType::Fred => "fred",
            SourceType::Bls => "bls",
            SourceType::Census => "census",
        }
    }

    /// Agency tag written into series and points
    pub fn agency(&self) -> &'static str {
        match self {
            SourceType::Fred => "FRED",
            SourceType::Bls => "BLS",
            SourceType::Census => "Census",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fred" => Ok(SourceType::Fred),
            "bls" => Ok(SourceType::Bls),
            "census" => Ok(SourceType::Census),
            other => Err(Error::Config(format!("Unknown source type: {}", other))),
        }
    }
}

/// Per-series fetch parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeriesConfig {
    /// Upstream series id/code when it differs from the document key
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    /// Census: `imports` or `exports`
    #[serde(default, alias = "tradeType")]
    pub trade_type: Option<String>,
    /// Census: commodity classification level (e.g. "HS6")
    #[serde(default, alias = "commodityLevel")]
    pub commodity_level: Option<String>,
    /// Census: HS commodity code
    #[serde(default, alias = "hsCode", deserialize_with = "string_or_number")]
    pub hs_code: Option<String>,
    /// Census: country code filter
    #[serde(default)]
    pub country: Option<String>,
    /// Census: first period requested (`YYYY-MM`)
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    /// Census: value variable(s) requested through `get`
    #[serde(default)]
    pub fields: Option<String>,
}

/// One source block of the sources document
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(alias = "baseUrl")]
    pub base_url: String,
    /// May embed `${ENV_VAR}` placeholders, expanded at call time
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub cadence: String,
    #[serde(default)]
    pub series: BTreeMap<String, SeriesConfig>,
}

impl SourceConfig {
    /// Look up the fetch parameters of one configured series
    pub fn series_config(&self, series_id: &str) -> Result<&SeriesConfig> {
        self.series.get(series_id).ok_or_else(|| {
            Error::Config(format!("Series {} not found in {} config", series_id, self.name))
        })
    }

    /// Resolve the API key, expanding placeholders against `env`.
    ///
    /// Missing key or unset variable is a configuration error.
    pub fn resolve_api_key(&self, env: &dyn Environment) -> Result<String> {
        let raw = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config(format!("API key required for {}", self.name)))?;
        let key = expand_placeholders(raw, env)?;
        if key.trim().is_empty() {
            return Err(Error::Config(format!("API key for {} is empty", self.name)));
        }
        Ok(key)
    }
}

/// Static per-source configuration document, keyed by source type
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SourcesDocument {
    sources: BTreeMap<String, SourceConfig>,
}

impl SourcesDocument {
    /// Load from a TOML file, or JSON when the extension is `.json`
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read sources document {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid sources document: {}", e)))
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid sources document: {}", e)))
    }

    /// Configuration block for one source
    pub fn source(&self, source: SourceType) -> Result<&SourceConfig> {
        self.sources
            .get(source.key())
            .ok_or_else(|| Error::Config(format!("{} configuration not found", source.agency())))
    }

    /// Source keys present in the document, in key order
    pub fn source_keys(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }
}

/// Read access to environment variables
///
/// Adapters receive one of these instead of calling `std::env` directly, so
/// placeholder expansion can be exercised with injected values.
pub trait Environment: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// Reads the process environment at call time
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed set of variables
#[derive(Debug, Clone, Default)]
pub struct StaticEnvironment {
    vars: HashMap<String, String>,
}

impl StaticEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for StaticEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Replace every `${NAME}` in `raw` with the value of `NAME` from `env`.
///
/// `NAME` is `[A-Za-z0-9_]+`. Text that does not form a complete placeholder
/// is copied through unchanged. An unset (or empty) variable is an error.
pub fn expand_placeholders(raw: &str, env: &dyn Environment) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        let name = &after[..name_len];

        if name.is_empty() || !after[name_len..].starts_with('}') {
            out.push_str("${");
            rest = after;
            continue;
        }

        match env.var(name) {
            Some(value) if !value.is_empty() => out.push_str(&value),
            _ => {
                return Err(Error::Config(format!(
                    "Environment variable {} not set",
                    name
                )))
            }
        }
        rest = &after[name_len + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
    }))
}
