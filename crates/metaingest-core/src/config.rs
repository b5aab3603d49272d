//! Configuration schema (metaingest.toml)

use crate::connection::ServiceConnection;
use serde::{Deserialize, Serialize};

/// Default per-step timeout for connectivity probes, in seconds
pub const THREE_MIN: u64 = 3 * 60;

fn default_namespace() -> String {
    "ingestion".to_string()
}

fn default_timeout_seconds() -> u64 {
    THREE_MIN
}

/// When the resolver may fall back to a service type's default spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Never fall back; a missing source spec is an error
    Never,

    /// Fall back only when the source-specific spec module does not exist.
    /// Load failures and malformed specs still propagate.
    ModuleNotFound,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::ModuleNotFound
    }
}

/// Spec resolution settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Default-spec fallback policy
    #[serde(default)]
    pub fallback: FallbackPolicy,
}

/// Connectivity test settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConnectionConfig {
    /// Per-step timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for TestConnectionConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: THREE_MIN,
        }
    }
}

impl TestConnectionConfig {
    /// Per-step timeout as a duration
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Plugin namespace under `metadata.<namespace>.source`
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Spec resolution
    #[serde(default)]
    pub resolution: ResolutionConfig,

    /// Connectivity tests
    #[serde(default)]
    pub test_connection: TestConnectionConfig,

    /// Service to connect to (for `test-connection`)
    #[serde(default)]
    pub service: Option<ServiceConnection>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            resolution: ResolutionConfig::default(),
            test_connection: TestConnectionConfig::default(),
            service: None,
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save config to TOML file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialize error: {0}")]
    SerializeError(String),
}
