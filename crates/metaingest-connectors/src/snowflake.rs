//! Snowflake connector
//!
//! The role used needs USAGE on a warehouse and on the databases it should
//! see; `GetQueries` and `GetTags` additionally read query history and
//! `SNOWFLAKE.ACCOUNT_USAGE`.
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (`password`)
//! 2. Key-pair authentication (`private_key`, PEM)
//!
//! ## Settings
//!
//! `account` and `username` are required; `warehouse`, `role` and
//! `database` are optional.
//!
//! Reference: https://docs.snowflake.com/en/sql-reference/sql/show

use crate::connector::{Connector, SourceConnectionError};
use crate::steps::TestFns;
use metaingest_core::ServiceConnection;
use metaingest_spec::PluginType;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "snowflake")]
use snowflake_api::{QueryResult, SnowflakeApi};

/// Snowflake authentication credentials
#[derive(Clone, PartialEq, Eq)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

impl fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(..)"),
            Self::PrivateKey(_) => write!(f, "PrivateKey(..)"),
        }
    }
}

/// Account, user and session parameters read from settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnowflakeTarget {
    pub account: String,
    pub username: String,
    pub credentials: SnowflakeCredentials,
    pub warehouse: Option<String>,
    pub role: Option<String>,
    pub database: Option<String>,
}

impl SnowflakeTarget {
    pub fn from_settings(config: &ServiceConnection) -> Result<Self, SourceConnectionError> {
        let setting = |key: &str| config.get(key).filter(|v| !v.trim().is_empty()).map(str::to_string);
        let missing = |key: &str| SourceConnectionError::config(config, format!("missing required setting '{}'", key));

        let credentials = match (setting("private_key"), setting("password")) {
            (Some(pem), _) => SnowflakeCredentials::PrivateKey(pem),
            (None, Some(password)) => SnowflakeCredentials::Password(password),
            (None, None) => return Err(missing("password")),
        };

        Ok(Self {
            account: setting("account").ok_or_else(|| missing("account"))?,
            username: setting("username").ok_or_else(|| missing("username"))?,
            credentials,
            warehouse: setting("warehouse"),
            role: setting("role"),
            database: setting("database"),
        })
    }
}

/// Probe name and the SQL it runs
const PROBES: [(&str, &str); 7] = [
    ("CheckAccess", "SELECT CURRENT_ROLE()"),
    ("GetDatabases", "SHOW DATABASES"),
    ("GetSchemas", "SHOW SCHEMAS LIMIT 1"),
    ("GetTables", "SHOW TABLES LIMIT 1"),
    ("GetViews", "SHOW VIEWS LIMIT 1"),
    (
        "GetQueries",
        "SELECT query_text FROM TABLE(INFORMATION_SCHEMA.QUERY_HISTORY()) LIMIT 1",
    ),
    (
        "GetTags",
        "SELECT tag_name FROM SNOWFLAKE.ACCOUNT_USAGE.TAG_REFERENCES LIMIT 1",
    ),
];

/// Snowflake connector
#[derive(Debug, Clone, Copy, Default)]
pub struct SnowflakeConnector;

/// Live Snowflake session
pub struct SnowflakeConnection {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    pub account: String,
    pub warehouse: Option<String>,
    pub role: Option<String>,
}

impl SnowflakeConnector {
    pub fn new() -> Self {
        Self
    }

    /// Probe names this connector offers, in order
    pub fn probe_names(&self) -> Vec<&'static str> {
        PROBES.iter().map(|(name, _)| *name).collect()
    }
}

impl PluginType for SnowflakeConnector {
    const MODULE: &'static str = "metadata.ingestion.source.database.snowflake.metadata";
    const NAME: &'static str = "SnowflakeSource";
}

/// Rows returned by a probe query
#[cfg(feature = "snowflake")]
async fn row_count(api: &SnowflakeApi, sql: &str) -> anyhow::Result<usize> {
    let result = api.exec(sql).await.map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(match result {
        QueryResult::Arrow(batches) => batches.iter().map(arrow_array::RecordBatch::num_rows).sum(),
        QueryResult::Json(_) => 1,
        QueryResult::Empty => 0,
    })
}

#[async_trait::async_trait]
impl Connector for SnowflakeConnector {
    type Connection = SnowflakeConnection;

    fn name(&self) -> &'static str {
        "Snowflake"
    }

    #[cfg(feature = "snowflake")]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<SnowflakeConnection, SourceConnectionError> {
        let target = SnowflakeTarget::from_settings(config)?;

        let api = match &target.credentials {
            SnowflakeCredentials::Password(password) => SnowflakeApi::with_password_auth(
                &target.account,
                target.warehouse.as_deref(),
                target.database.as_deref(),
                None, // schema
                &target.username,
                target.role.as_deref(),
                password,
            )
            .map_err(|e| SourceConnectionError::authentication(config, e))?,

            SnowflakeCredentials::PrivateKey(private_key_pem) => SnowflakeApi::with_certificate_auth(
                &target.account,
                target.warehouse.as_deref(),
                target.database.as_deref(),
                None, // schema
                &target.username,
                target.role.as_deref(),
                private_key_pem,
            )
            .map_err(|e| {
                tracing::warn!(account = %target.account, "key-pair setup failed; check that private_key is a PEM encoded key");
                SourceConnectionError::authentication(config, e)
            })?,
        };

        Ok(SnowflakeConnection {
            api,
            account: target.account,
            warehouse: target.warehouse,
            role: target.role,
        })
    }

    #[cfg(not(feature = "snowflake"))]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<SnowflakeConnection, SourceConnectionError> {
        SnowflakeTarget::from_settings(config)?;
        Err(SourceConnectionError::not_compiled(config, "Snowflake", "snowflake"))
    }

    #[cfg(feature = "snowflake")]
    fn test_fns(&self, connection: Arc<SnowflakeConnection>) -> TestFns {
        let mut fns = TestFns::new();
        for (name, sql) in PROBES {
            let connection = Arc::clone(&connection);
            fns.insert(name, async move {
                let rows = row_count(&connection.api, sql).await?;
                if name == "GetDatabases" && rows == 0 {
                    anyhow::bail!("No databases are visible to this role");
                }
                Ok(())
            });
        }
        fns
    }

    #[cfg(not(feature = "snowflake"))]
    fn test_fns(&self, connection: Arc<SnowflakeConnection>) -> TestFns {
        let _ = connection;
        TestFns::new()
    }
}
