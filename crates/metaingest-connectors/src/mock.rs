//! Mock connector for testing
//!
//! This connector never talks to a real system. Its probes succeed unless
//! told otherwise, which makes it useful for:
//! - Unit testing connectivity test reporting
//! - Exercising workflows end to end without credentials
//! - Simulating failing or slow steps
//!
//! ## Usage
//!
//! ```rust,ignore
//! use metaingest_connectors::{MockConnector, DynConnector, InMemoryCatalog};
//!
//! let connector = MockConnector::new();
//! connector.add_step_failure("GetTables", "permission denied").await;
//!
//! let err = connector
//!     .connect_and_test(&InMemoryCatalog::new(), &config, None, None)
//!     .await
//!     .unwrap_err();
//! ```
//!
//! ## Simulating Failures From Settings
//!
//! The connection settings can drive the same behavior, which is how the
//! CLI exercises it:
//! - `fail_connection = "true"` makes `get_connection` fail
//! - `fail_steps = "GetTables,GetViews"` makes those probes fail
//! - `latency_ms = "100"` delays every probe

use crate::connector::{Connector, SourceConnectionError};
use crate::steps::TestFns;
use metaingest_core::{SanitizedConnection, ServiceConnection};
use metaingest_spec::PluginType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Probes every mock connection offers, in order
pub const MOCK_STEPS: [&str; 4] = ["CheckAccess", "GetSchemas", "GetTables", "GetViews"];

/// Mock connector
pub struct MockConnector {
    /// Error message per failing step
    failures: Arc<RwLock<HashMap<String, String>>>,

    /// Extra delay per step (milliseconds)
    step_latency: Arc<RwLock<HashMap<String, u64>>>,

    /// Simulate connection failure
    fail_connection: bool,

    /// Delay before every probe (milliseconds)
    latency_ms: u64,

    /// Name to return from name() method
    connector_name: &'static str,
}

/// Live handle of a [`MockConnector`]
#[derive(Debug, Clone)]
pub struct MockConnection {
    pub connection: SanitizedConnection,
    failures: HashMap<String, String>,
    step_latency: HashMap<String, u64>,
    latency_ms: u64,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            failures: Arc::new(RwLock::new(HashMap::new())),
            step_latency: Arc::new(RwLock::new(HashMap::new())),
            fail_connection: false,
            latency_ms: 0,
            connector_name: "Mock",
        }
    }

    /// Make a probe fail with `message`
    pub async fn add_step_failure(&self, step: impl Into<String>, message: impl Into<String>) {
        self.failures.write().await.insert(step.into(), message.into());
    }

    /// Delay a single probe
    ///
    /// Useful to push one step past its timeout.
    pub async fn add_step_latency(&self, step: impl Into<String>, latency_ms: u64) {
        self.step_latency.write().await.insert(step.into(), latency_ms);
    }

    /// Clear all simulated failures
    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    /// Fail every `get_connection`
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Delay every probe by `latency_ms`
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Set a custom connector name
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.connector_name = name;
        self
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockConnector {
    fn clone(&self) -> Self {
        Self {
            failures: Arc::clone(&self.failures),
            step_latency: Arc::clone(&self.step_latency),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            connector_name: self.connector_name,
        }
    }
}

impl PluginType for MockConnector {
    const MODULE: &'static str = "metadata.ingestion.source.database.mock.metadata";
    const NAME: &'static str = "MockSource";
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    type Connection = MockConnection;

    fn name(&self) -> &'static str {
        self.connector_name
    }

    async fn get_connection(&self, config: &ServiceConnection) -> Result<MockConnection, SourceConnectionError> {
        let fail_connection = match config.get("fail_connection") {
            Some(value) => value
                .parse::<bool>()
                .map_err(|_| SourceConnectionError::config(config, format!("fail_connection must be true or false, got '{}'", value)))?,
            None => false,
        };
        if self.fail_connection || fail_connection {
            return Err(SourceConnectionError::connect(config, "simulated connection failure"));
        }

        let latency_ms = match config.get("latency_ms") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|_| SourceConnectionError::config(config, format!("latency_ms must be a number, got '{}'", value)))?,
            None => self.latency_ms,
        };

        let mut failures = self.failures.read().await.clone();
        if let Some(steps) = config.get("fail_steps") {
            for step in steps.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                failures
                    .entry(step.to_string())
                    .or_insert_with(|| "simulated failure".to_string());
            }
        }

        Ok(MockConnection {
            connection: config.sanitized(),
            failures,
            step_latency: self.step_latency.read().await.clone(),
            latency_ms,
        })
    }

    fn test_fns(&self, connection: Arc<MockConnection>) -> TestFns {
        let mut fns = TestFns::new();
        for step in MOCK_STEPS {
            let failure = connection.failures.get(step).cloned();
            let delay = connection.latency_ms + connection.step_latency.get(step).copied().unwrap_or(0);

            fns.insert(step, async move {
                if delay > 0 {
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                match failure {
                    Some(message) => anyhow::bail!("{}", message),
                    None => Ok(()),
                }
            });
        }
        fns
    }
}
