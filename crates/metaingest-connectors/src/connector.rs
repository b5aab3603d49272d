//! Connector binding contract
//!
//! Every connector turns a [`ServiceConnection`] into a live connection and
//! describes the probes that prove the connection is usable. Running those
//! probes is shared: [`Connector::test_connection`] hands them to
//! [`test_connection_steps`].

use crate::catalog::{CatalogClient, CatalogError};
use crate::steps::{test_connection_steps, TestFns};
use metaingest_core::{AutomationWorkflow, SanitizedConnection, ServiceConnection, TestConnectionResult};
use std::sync::Arc;
use std::time::Duration;

/// Boxed error from a vendor SDK
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A connector failed to build a live connection
///
/// Every variant carries the connection settings with secrets masked.
#[derive(Debug, thiserror::Error)]
pub enum SourceConnectionError {
    #[error("Authentication failed for {connection}: {source}")]
    Authentication {
        connection: SanitizedConnection,
        #[source]
        source: BoxError,
    },

    #[error("Invalid connection settings for {connection}: {message}")]
    Config {
        connection: SanitizedConnection,
        message: String,
    },

    #[error("Failed to connect to {connection}: {source}")]
    Connect {
        connection: SanitizedConnection,
        #[source]
        source: BoxError,
    },

    #[error("{connector} support not compiled. Rebuild with: cargo build --features {feature}")]
    NotCompiled {
        connection: SanitizedConnection,
        connector: &'static str,
        feature: &'static str,
    },
}

impl SourceConnectionError {
    pub fn authentication(config: &ServiceConnection, source: impl Into<BoxError>) -> Self {
        Self::Authentication {
            connection: config.sanitized(),
            source: source.into(),
        }
    }

    pub fn config(config: &ServiceConnection, message: impl Into<String>) -> Self {
        Self::Config {
            connection: config.sanitized(),
            message: message.into(),
        }
    }

    pub fn connect(config: &ServiceConnection, source: impl Into<BoxError>) -> Self {
        Self::Connect {
            connection: config.sanitized(),
            source: source.into(),
        }
    }

    pub fn not_compiled(config: &ServiceConnection, connector: &'static str, feature: &'static str) -> Self {
        Self::NotCompiled {
            connection: config.sanitized(),
            connector,
            feature,
        }
    }

    /// Settings of the connection that failed
    pub fn connection(&self) -> &SanitizedConnection {
        match self {
            Self::Authentication { connection, .. }
            | Self::Config { connection, .. }
            | Self::Connect { connection, .. }
            | Self::NotCompiled { connection, .. } => connection,
        }
    }
}

/// A connectivity test failed
#[derive(Debug, thiserror::Error)]
pub enum TestConnectionError {
    #[error("Test connection step '{step}' failed: {message}")]
    StepFailed {
        step: String,
        message: String,
        error_log: Option<String>,
    },

    #[error("Test connection step '{step}' timed out after {timeout:?}")]
    StepTimedOut { step: String, timeout: Duration },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl TestConnectionError {
    /// Name of the failing step
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::StepFailed { step, .. } | Self::StepTimedOut { step, .. } => Some(step),
            Self::Catalog(_) => None,
        }
    }
}

/// Either half of connect-then-test
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Connection(#[from] SourceConnectionError),

    #[error(transparent)]
    Test(#[from] TestConnectionError),
}

/// Binding contract every connector satisfies
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Live handle produced by [`Connector::get_connection`]
    type Connection: Send + Sync + 'static;

    /// Connector name (e.g. "Redshift")
    fn name(&self) -> &'static str;

    /// Build a live connection from validated settings
    async fn get_connection(&self, config: &ServiceConnection) -> Result<Self::Connection, SourceConnectionError>;

    /// Named connectivity probes over `connection`
    fn test_fns(&self, connection: Arc<Self::Connection>) -> TestFns;

    /// Run the connectivity probes for `config.source_type`
    async fn test_connection(
        &self,
        catalog: &dyn CatalogClient,
        connection: Arc<Self::Connection>,
        config: &ServiceConnection,
        workflow: Option<&mut AutomationWorkflow>,
        timeout: Option<Duration>,
    ) -> Result<TestConnectionResult, TestConnectionError> {
        let test_fns = self.test_fns(connection);
        test_connection_steps(catalog, test_fns, &config.source_type, workflow, timeout).await
    }
}

/// Object-safe view of a [`Connector`]
///
/// Implemented for every connector, so callers holding a
/// [`SourceClass`](crate::SourceClass) never see the connection type.
#[async_trait::async_trait]
pub trait DynConnector: Send + Sync {
    fn connector_name(&self) -> &'static str;

    /// Connect, then run the connectivity probes
    async fn connect_and_test(
        &self,
        catalog: &dyn CatalogClient,
        config: &ServiceConnection,
        workflow: Option<&mut AutomationWorkflow>,
        timeout: Option<Duration>,
    ) -> Result<TestConnectionResult, ConnectorError>;
}

#[async_trait::async_trait]
impl<C: Connector> DynConnector for C {
    fn connector_name(&self) -> &'static str {
        self.name()
    }

    async fn connect_and_test(
        &self,
        catalog: &dyn CatalogClient,
        config: &ServiceConnection,
        workflow: Option<&mut AutomationWorkflow>,
        timeout: Option<Duration>,
    ) -> Result<TestConnectionResult, ConnectorError> {
        tracing::debug!(connector = self.name(), source_type = %config.source_type, "connecting");
        let connection = Arc::new(self.get_connection(config).await?);

        Ok(self
            .test_connection(catalog, connection, config, workflow, timeout)
            .await?)
    }
}
