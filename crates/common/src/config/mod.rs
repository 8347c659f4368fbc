//! Configuration management for Bibnet
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Aggregation engine tuning
    #[serde(default)]
    pub engine: EngineConfig,

    /// Workspace identity
    #[serde(default)]
    pub workspace: WorkspaceConfig,

    /// Bundle locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Rows and columns kept in the author x keyword heatmap
    #[serde(default = "default_heatmap_top_k")]
    pub heatmap_top_k: usize,

    /// Edge threshold used when a caller does not pass one
    #[serde(default = "default_min_edge_weight")]
    pub default_min_edge_weight: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkspaceConfig {
    /// Name of the workspace the binary operates on
    #[serde(default = "default_workspace_name")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bundle directory to load at startup
    pub bundle_dir: Option<String>,

    /// JSON array of work records to ingest at startup
    pub ingest_path: Option<String>,

    /// Directory to export the bundle into after processing
    pub export_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for log records
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_heatmap_top_k() -> usize { 30 }
fn default_min_edge_weight() -> u32 { 1 }
fn default_workspace_name() -> String { "default".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "bibnet".to_string() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            heatmap_top_k: default_heatmap_top_k(),
            default_min_edge_weight: default_min_edge_weight(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            name: default_workspace_name(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            workspace: WorkspaceConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("engine.heatmap_top_k", 30)?
            .set_default("workspace.name", "default")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            // e.g., APP__ENGINE__HEATMAP_TOP_K=20
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.heatmap_top_k, 30);
        assert_eq!(config.engine.default_min_edge_weight, 1);
        assert_eq!(config.workspace.name, "default");
        assert!(config.storage.bundle_dir.is_none());
    }

    #[test]
    fn test_partial_sections_use_defaults() {
        let config: AppConfig = Config::builder()
            .set_override("engine.heatmap_top_k", 10)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.engine.heatmap_top_k, 10);
        assert_eq!(config.engine.default_min_edge_weight, 1);
        assert_eq!(config.observability.log_level, "info");
    }
}
