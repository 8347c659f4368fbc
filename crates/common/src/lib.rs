//! Bibnet Common Library
//!
//! Shared code for the Bibnet engine including:
//! - The normalized fact store, ingestion and bundle import/export
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod errors;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use store::models::{EntityId, EntityKind};
pub use store::{FactReader, FactStore, WorkFacts, WorkRecord, YearRange};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
