//! Seed document loading
//!
//! Modules and policy events are authored out-of-band in a TOML document.
//! Every record is validated before anything is written, so a bad document
//! leaves the store untouched.

use crate::validation;
use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;
use tim_common::{db, Module, PolicyEvent};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub policy_events: Vec<PolicyEvent>,
}

impl SeedDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed document {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid seed document {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        for module in &self.modules {
            validation::validate_module(module)
                .with_context(|| format!("Module '{}'", module.id))?;
        }
        for event in &self.policy_events {
            validation::validate_policy_event(event)
                .with_context(|| format!("Policy event '{}'", event.id))?;
        }
        Ok(())
    }
}

/// Validate, then upsert every module and policy event
pub async fn seed(pool: &SqlitePool, document: &SeedDocument) -> Result<()> {
    document.validate()?;

    for module in &document.modules {
        db::upsert_module(pool, module)
            .await
            .with_context(|| format!("Failed to write module '{}'", module.slug))?;
        info!(module = %module.slug, series = module.series.len(), "Seeded module");
    }

    for event in &document.policy_events {
        db::upsert_policy_event(pool, event)
            .await
            .with_context(|| format!("Failed to write policy event '{}'", event.id))?;
    }

    info!(
        modules = document.modules.len(),
        policy_events = document.policy_events.len(),
        "Seed complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    const SEED: &str = r#"
[[modules]]
id = "soybeans"
slug = "soybeans"
title = "Soybeans"
headline = "Exports fell"
series = ["PSOYBUSDM", "soybeans_china"]
confounders = ["Weather"]

[modules.policy_band]
start = "2018-07-06"
label = "Section 301 Tariffs"

[[policy_events]]
id = "s301-list1"
date = "2018-07-06"
title = "Section 301 List 1 tariffs take effect"
type = "tariff"
source_url = "https://ustr.gov/"
"#;

    async fn pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        db::init_schema(&pool).await.unwrap();
        pool
    }

    #[test]
    fn test_parse_seed_document() {
        let doc = SeedDocument::from_toml_str(SEED).unwrap();
        assert_eq!(doc.modules.len(), 1);
        assert_eq!(doc.modules[0].policy_band.as_ref().unwrap().start, "2018-07-06");
        assert_eq!(doc.policy_events[0].event_type, tim_common::PolicyEventType::Tariff);
        assert!(doc.validate().is_ok());
    }

    #[test]
    fn test_invalid_event_rejected() {
        let mut doc = SeedDocument::from_toml_str(SEED).unwrap();
        doc.policy_events[0].date = "July 2018".to_string();
        assert!(doc.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.toml");
        std::fs::write(&path, SEED).unwrap();

        let doc = SeedDocument::load(&path).unwrap();
        assert_eq!(doc.modules[0].slug, "soybeans");
        assert_eq!(doc.policy_events.len(), 1);

        let missing = SeedDocument::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(format!("{:#}", missing).contains("absent.toml"));

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[[modules]]\nid = ").unwrap();
        let err = SeedDocument::load(&broken).unwrap_err();
        assert!(err.to_string().starts_with("Invalid seed document"));
    }

    #[tokio::test]
    async fn test_seed_writes_and_is_repeatable() {
        let pool = pool().await;
        let doc = SeedDocument::from_toml_str(SEED).unwrap();

        seed(&pool, &doc).await.unwrap();
        seed(&pool, &doc).await.unwrap();

        let module = db::get_module_by_slug(&pool, "soybeans").await.unwrap().unwrap();
        assert_eq!(module.series, vec!["PSOYBUSDM", "soybeans_china"]);

        let events = db::get_recent_policy_events(&pool, 10).await.unwrap();
        assert_eq!(events.len(), 1);
    }
}
