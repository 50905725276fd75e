//! Adapter registry
//!
//! Maps a source type to its adapter and configuration block. Dispatch is by
//! [`SourceType`] tag; adapters are built once and shared.

use crate::adapters::{base, AdapterError, BlsAdapter, CensusAdapter, FredAdapter, SourceAdapter};
use std::collections::HashMap;
use std::sync::Arc;
use tim_common::config::{Environment, SourceConfig, SourceType, SourcesDocument};
use tim_common::TimeSeries;

pub struct AdapterRegistry {
    document: SourcesDocument,
    adapters: HashMap<SourceType, Arc<dyn SourceAdapter>>,
}

impl AdapterRegistry {
    /// Registry with the three production adapters sharing one HTTP client
    pub fn new(document: SourcesDocument, env: Arc<dyn Environment>) -> Result<Self, AdapterError> {
        let http = base::build_http_client()?;

        let mut adapters: HashMap<SourceType, Arc<dyn SourceAdapter>> = HashMap::new();
        adapters.insert(
            SourceType::Fred,
            Arc::new(FredAdapter::new(http.clone(), env.clone())),
        );
        adapters.insert(
            SourceType::Bls,
            Arc::new(BlsAdapter::new(http.clone(), env.clone())),
        );
        adapters.insert(SourceType::Census, Arc::new(CensusAdapter::new(http, env)));

        Ok(Self { document, adapters })
    }

    /// Registry with no adapters; populate with [`with_adapter`](Self::with_adapter)
    pub fn empty(document: SourcesDocument) -> Self {
        Self {
            document,
            adapters: HashMap::new(),
        }
    }

    /// Register (or replace) the adapter for one source
    pub fn with_adapter(mut self, source: SourceType, adapter: Arc<dyn SourceAdapter>) -> Self {
        self.adapters.insert(source, adapter);
        self
    }

    pub fn document(&self) -> &SourcesDocument {
        &self.document
    }

    /// Resolve a source type string such as `"fred"`
    pub fn resolve(&self, source: &str) -> Result<(Arc<dyn SourceAdapter>, &SourceConfig), AdapterError> {
        let source: SourceType = source.parse()?;
        self.resolve_source(source)
    }

    /// Adapter and configuration block for one source
    pub fn resolve_source(
        &self,
        source: SourceType,
    ) -> Result<(Arc<dyn SourceAdapter>, &SourceConfig), AdapterError> {
        let adapter = self.adapters.get(&source).cloned().ok_or_else(|| {
            AdapterError::Config(format!("No adapter registered for {}", source))
        })?;
        let config = self.document.source(source)?;
        Ok((adapter, config))
    }

    /// Convenience: resolve then fetch one series
    pub async fn fetch_series(&self, source: &str, series_id: &str) -> Result<TimeSeries, AdapterError> {
        let (adapter, config) = self.resolve(source)?;
        adapter.fetch_series(series_id, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tim_common::config::StaticEnvironment;

    const DOC: &str = r#"
[fred]
name = "FRED"
base_url = "http://127.0.0.1:1"
api_key = "${FRED_API_KEY}"

[fred.series.PSOYBUSDM]
name = "Soybeans"
"#;

    fn registry() -> AdapterRegistry {
        let doc = SourcesDocument::from_toml_str(DOC).unwrap();
        AdapterRegistry::new(doc, Arc::new(StaticEnvironment::new())).unwrap()
    }

    #[test]
    fn test_resolve_known_source() {
        let registry = registry();
        let (adapter, config) = registry.resolve("fred").unwrap();
        assert_eq!(adapter.name(), "FRED");
        assert_eq!(config.name, "FRED");
    }

    #[test]
    fn test_unknown_source_is_config_error() {
        let registry = registry();
        assert!(matches!(registry.resolve("imf"), Err(AdapterError::Config(_))));
    }

    #[test]
    fn test_missing_config_block_is_config_error() {
        let registry = registry();
        assert!(matches!(registry.resolve("bls"), Err(AdapterError::Config(_))));
    }

    #[tokio::test]
    async fn test_unset_key_fails_before_request() {
        let registry = registry();
        let err = registry.fetch_series("fred", "PSOYBUSDM").await.unwrap_err();
        assert!(matches!(err, AdapterError::Config(ref msg) if msg.contains("FRED_API_KEY")));
    }
}
