//! Storage gateway
//!
//! Idempotent upserts keyed by natural identifiers plus the read operations
//! the metrics engine and the read API depend on. Every write is an
//! `INSERT ... ON CONFLICT DO UPDATE`, so re-running a job converges to the
//! same rows instead of duplicating them.

pub mod init;
pub mod metrics;
pub mod modules;
pub mod policy;
pub mod series;

pub use init::*;
pub use metrics::*;
pub use modules::*;
pub use policy::*;
pub use series::*;
