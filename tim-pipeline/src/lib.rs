//! # Tariff Impact Monitor pipeline
//!
//! Source adapters (FRED, BLS, Census), the adapter registry, validation, the
//! metrics engine, and the jobs that tie them to the storage gateway. Seed
//! and sample-data loaders prepare a store for offline use.

pub mod adapters;
pub mod jobs;
pub mod metrics;
pub mod registry;
pub mod sample;
pub mod seed;
pub mod validation;

pub use adapters::{AdapterError, SourceAdapter};
pub use registry::AdapterRegistry;
