//! # Tariff Impact Monitor common library
//!
//! Shared code for the pipeline and the read API:
//! - Domain types (series, points, modules, KPI metrics, policy events)
//! - Error type
//! - Sources document loading and `${ENV_VAR}` placeholder expansion
//! - Storage gateway over SQLite

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    DataPoint, KpiMetric, Module, PolicyBand, PolicyEvent, PolicyEventType, TimeSeries, Trend,
};
