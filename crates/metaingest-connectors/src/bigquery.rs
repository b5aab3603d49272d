//! BigQuery connector
//!
//! Probes query the region-qualified INFORMATION_SCHEMA views, so the
//! credentials need:
//! - bigquery.jobs.create
//! - bigquery.datasets.get / bigquery.tables.list
//!
//! ## Authentication
//!
//! 1. Service account JSON file (`credentials_path`)
//! 2. Service account JSON content (`credentials_json`)
//! 3. Application Default Credentials (ADC) when neither is set
//!
//! ## Settings
//!
//! `project_id` (required), `location` (default `us`), and one of the
//! credential settings above.
//!
//! Reference: https://cloud.google.com/bigquery/docs/information-schema-intro

use crate::connector::{Connector, SourceConnectionError};
use crate::steps::TestFns;
use metaingest_core::ServiceConnection;
use metaingest_spec::PluginType;
use std::sync::Arc;

#[cfg(feature = "bigquery")]
use gcp_bigquery_client::{model::query_request::QueryRequest, Client as BigQueryClient};

/// How the connector authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BigQueryCredentials {
    /// Application Default Credentials
    Adc,
    /// Path to a service account key file
    KeyFile(String),
    /// Inline service account key
    KeyJson(String),
}

impl BigQueryCredentials {
    /// Pick the credentials from settings
    ///
    /// A key file wins over inline JSON; with neither, ADC is used.
    pub fn from_settings(config: &ServiceConnection) -> Self {
        if let Some(path) = config.get("credentials_path") {
            Self::KeyFile(path.to_string())
        } else if let Some(json) = config.get("credentials_json") {
            Self::KeyJson(json.to_string())
        } else {
            Self::Adc
        }
    }
}

/// Probe name and the SQL it runs
///
/// `{project}` and `{location}` are substituted per connection.
const PROBES: [(&str, &str); 5] = [
    ("CheckAccess", "SELECT 1"),
    (
        "GetSchemas",
        "SELECT schema_name FROM `{project}.region-{location}.INFORMATION_SCHEMA.SCHEMATA` LIMIT 1",
    ),
    (
        "GetTables",
        "SELECT table_name FROM `{project}.region-{location}.INFORMATION_SCHEMA.TABLES` LIMIT 1",
    ),
    (
        "GetViews",
        "SELECT table_name FROM `{project}.region-{location}.INFORMATION_SCHEMA.VIEWS` LIMIT 1",
    ),
    (
        "GetQueries",
        "SELECT query FROM `{project}.region-{location}.INFORMATION_SCHEMA.JOBS_BY_PROJECT` LIMIT 1",
    ),
];

/// BigQuery connector
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQueryConnector;

/// Live BigQuery connection
pub struct BigQueryConnection {
    /// BigQuery client (only available with bigquery feature)
    #[cfg(feature = "bigquery")]
    client: BigQueryClient,

    pub project_id: String,

    pub location: String,
}

impl BigQueryConnection {
    /// Probe SQL for this connection's project and location
    pub fn probe_sql(&self, template: &str) -> String {
        template
            .replace("{project}", &self.project_id)
            .replace("{location}", &self.location)
    }
}

impl BigQueryConnector {
    pub fn new() -> Self {
        Self
    }

    /// Probe names this connector offers, in order
    pub fn probe_names(&self) -> Vec<&'static str> {
        PROBES.iter().map(|(name, _)| *name).collect()
    }

    #[cfg(feature = "bigquery")]
    async fn client(config: &ServiceConnection) -> Result<BigQueryClient, SourceConnectionError> {
        match BigQueryCredentials::from_settings(config) {
            BigQueryCredentials::Adc => BigQueryClient::from_application_default_credentials()
                .await
                .map_err(|e| {
                    tracing::warn!(
                        "ADC authentication failed. Ensure GOOGLE_APPLICATION_CREDENTIALS is set \
                         or run 'gcloud auth application-default login'"
                    );
                    SourceConnectionError::authentication(config, e)
                }),

            BigQueryCredentials::KeyFile(path) => BigQueryClient::from_service_account_key_file(&path)
                .await
                .map_err(|e| {
                    tracing::warn!(path = %path, "failed to read service account key file");
                    SourceConnectionError::authentication(config, e)
                }),

            BigQueryCredentials::KeyJson(json) => {
                let key: gcp_bigquery_client::yup_oauth2::ServiceAccountKey = serde_json::from_str(&json)
                    .map_err(|e| SourceConnectionError::config(config, format!(
                        "Failed to parse service account JSON: {}",
                        e
                    )))?;

                BigQueryClient::from_service_account_key(key, false)
                    .await
                    .map_err(|e| SourceConnectionError::authentication(config, e))
            }
        }
    }
}

impl PluginType for BigQueryConnector {
    const MODULE: &'static str = "metadata.ingestion.source.database.bigquery.metadata";
    const NAME: &'static str = "BigquerySource";
}

fn required<'a>(config: &'a ServiceConnection, key: &str) -> Result<&'a str, SourceConnectionError> {
    config
        .get(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| SourceConnectionError::config(config, format!("missing required setting '{}'", key)))
}

#[async_trait::async_trait]
impl Connector for BigQueryConnector {
    type Connection = BigQueryConnection;

    fn name(&self) -> &'static str {
        "BigQuery"
    }

    #[cfg(feature = "bigquery")]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<BigQueryConnection, SourceConnectionError> {
        let project_id = required(config, "project_id")?.to_string();
        let location = config.get("location").unwrap_or("us").to_lowercase();
        let client = Self::client(config).await?;

        Ok(BigQueryConnection {
            client,
            project_id,
            location,
        })
    }

    #[cfg(not(feature = "bigquery"))]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<BigQueryConnection, SourceConnectionError> {
        required(config, "project_id")?;
        Err(SourceConnectionError::not_compiled(config, "BigQuery", "bigquery"))
    }

    #[cfg(feature = "bigquery")]
    fn test_fns(&self, connection: Arc<BigQueryConnection>) -> TestFns {
        let mut fns = TestFns::new();
        for (name, template) in PROBES {
            let connection = Arc::clone(&connection);
            let sql = connection.probe_sql(template);
            fns.insert(name, async move {
                connection
                    .client
                    .job()
                    .query(&connection.project_id, QueryRequest::new(sql))
                    .await
                    .map_err(|e| anyhow::anyhow!("{}", e))?;
                Ok(())
            });
        }
        fns
    }

    #[cfg(not(feature = "bigquery"))]
    fn test_fns(&self, connection: Arc<BigQueryConnection>) -> TestFns {
        let _ = connection;
        TestFns::new()
    }
}
