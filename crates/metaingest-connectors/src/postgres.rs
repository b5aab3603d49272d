//! PostgreSQL-family connector
//!
//! One connector serves every source speaking the PostgreSQL wire protocol:
//! - PostgreSQL 9.4+
//! - Amazon Redshift
//! - Greenplum
//!
//! The flavors differ in default port and database, and in the catalog
//! tables the `GetQueries` probe reads.
//!
//! ## Settings
//!
//! | key        | required | default                          |
//! |------------|----------|----------------------------------|
//! | `host`     | yes      |                                  |
//! | `port`     | no       | 5432 (5439 for Redshift)         |
//! | `database` | no       | `postgres` (`dev` for Redshift)  |
//! | `username` | yes      |                                  |
//! | `password` | no       |                                  |
//! | `sslmode`  | no       | `disable`; `require` enables TLS |
//!
//! ## Probes
//!
//! `CheckAccess`, `GetSchemas`, `GetTables`, `GetViews`, and `GetQueries`
//! (`pg_stat_statements` on PostgreSQL, `stl_query` on Redshift).

use crate::connector::{Connector, SourceConnectionError};
use crate::steps::TestFns;
use metaingest_core::ServiceConnection;
use std::sync::Arc;

#[cfg(feature = "postgres")]
use tokio_postgres::{Client, NoTls};

#[cfg(feature = "postgres")]
use postgres_native_tls::MakeTlsConnector;

#[cfg(feature = "postgres")]
use native_tls::TlsConnector;

/// Wire-compatible database flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostgresFlavor {
    Postgres,
    Redshift,
    Greenplum,
}

impl PostgresFlavor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Postgres => "Postgres",
            Self::Redshift => "Redshift",
            Self::Greenplum => "Greenplum",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Self::Redshift => 5439,
            Self::Postgres | Self::Greenplum => 5432,
        }
    }

    pub fn default_database(&self) -> &'static str {
        match self {
            Self::Redshift => "dev",
            Self::Postgres | Self::Greenplum => "postgres",
        }
    }

    /// Query behind the `GetQueries` probe, if the flavor has one
    pub fn query_log_sql(&self) -> Option<&'static str> {
        match self {
            Self::Postgres => Some("SELECT query FROM pg_stat_statements LIMIT 1"),
            Self::Redshift => Some("SELECT query FROM stl_query LIMIT 1"),
            Self::Greenplum => None,
        }
    }
}

/// Probes and the SQL each one runs
const PROBES: [(&str, &str); 4] = [
    ("CheckAccess", "SELECT 1"),
    ("GetSchemas", "SELECT schema_name FROM information_schema.schemata LIMIT 1"),
    (
        "GetTables",
        "SELECT table_name FROM information_schema.tables WHERE table_type = 'BASE TABLE' LIMIT 1",
    ),
    ("GetViews", "SELECT table_name FROM information_schema.views LIMIT 1"),
];

/// Connection target parsed from settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub tls: bool,
}

impl PostgresTarget {
    /// Read the target from settings, applying the flavor defaults
    pub fn from_settings(flavor: PostgresFlavor, config: &ServiceConnection) -> Result<Self, SourceConnectionError> {
        let host = config
            .get("host")
            .ok_or_else(|| SourceConnectionError::config(config, "missing required setting 'host'"))?;
        let username = config
            .get("username")
            .ok_or_else(|| SourceConnectionError::config(config, "missing required setting 'username'"))?;

        let port = match config.get("port") {
            Some(port) => port
                .parse()
                .map_err(|_| SourceConnectionError::config(config, format!("invalid port '{}'", port)))?,
            None => flavor.default_port(),
        };

        let tls = match config.get("sslmode").unwrap_or("disable") {
            "disable" | "allow" | "prefer" => false,
            "require" | "verify-ca" | "verify-full" => true,
            other => return Err(SourceConnectionError::config(config, format!("unsupported sslmode '{}'", other))),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            database: config.get("database").unwrap_or(flavor.default_database()).to_string(),
            username: username.to_string(),
            tls,
        })
    }
}

/// PostgreSQL-family connector
#[derive(Debug, Clone, Copy)]
pub struct PostgresConnector {
    flavor: PostgresFlavor,
}

/// Live PostgreSQL connection
pub struct PostgresConnection {
    /// PostgreSQL client (only available with postgres feature)
    #[cfg(feature = "postgres")]
    client: Client,

    pub target: PostgresTarget,

    pub flavor: PostgresFlavor,
}

impl PostgresConnector {
    pub fn new(flavor: PostgresFlavor) -> Self {
        Self { flavor }
    }

    pub fn postgres() -> Self {
        Self::new(PostgresFlavor::Postgres)
    }

    pub fn redshift() -> Self {
        Self::new(PostgresFlavor::Redshift)
    }

    pub fn greenplum() -> Self {
        Self::new(PostgresFlavor::Greenplum)
    }

    pub fn flavor(&self) -> PostgresFlavor {
        self.flavor
    }

    /// Probe names this connector offers, in order
    pub fn probe_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = PROBES.iter().map(|(name, _)| *name).collect();
        if self.flavor.query_log_sql().is_some() {
            names.push("GetQueries");
        }
        names
    }

    #[cfg(feature = "postgres")]
    async fn connect(&self, target: PostgresTarget, config: &ServiceConnection) -> Result<PostgresConnection, SourceConnectionError> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(&target.host)
            .port(target.port)
            .dbname(&target.database)
            .user(&target.username);
        if let Some(password) = config.get("password") {
            pg.password(password);
        }

        let client = if target.tls {
            let connector = TlsConnector::builder()
                .build()
                .map_err(|e| SourceConnectionError::config(config, format!("Failed to create TLS connector: {}", e)))?;

            let (client, connection) = pg
                .connect(MakeTlsConnector::new(connector))
                .await
                .map_err(|e| classify(config, e))?;
            spawn_connection(&target, connection);
            client
        } else {
            let (client, connection) = pg.connect(NoTls).await.map_err(|e| classify(config, e))?;
            spawn_connection(&target, connection);
            client
        };

        Ok(PostgresConnection {
            client,
            target,
            flavor: self.flavor,
        })
    }
}

/// Drive the connection in the background
#[cfg(feature = "postgres")]
fn spawn_connection<S, T>(target: &PostgresTarget, connection: tokio_postgres::Connection<S, T>)
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let host = target.host.clone();
    let port = target.port;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(host = %host, port, "PostgreSQL connection error: {}", e);
        }
    });
}

#[cfg(feature = "postgres")]
fn classify(config: &ServiceConnection, error: tokio_postgres::Error) -> SourceConnectionError {
    use tokio_postgres::error::SqlState;

    match error.code() {
        Some(code) if *code == SqlState::INVALID_PASSWORD || *code == SqlState::INVALID_AUTHORIZATION_SPECIFICATION => {
            SourceConnectionError::authentication(config, error)
        }
        _ => SourceConnectionError::connect(config, error),
    }
}

#[async_trait::async_trait]
impl Connector for PostgresConnector {
    type Connection = PostgresConnection;

    fn name(&self) -> &'static str {
        self.flavor.name()
    }

    #[cfg(feature = "postgres")]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<PostgresConnection, SourceConnectionError> {
        let target = PostgresTarget::from_settings(self.flavor, config)?;
        self.connect(target, config).await
    }

    #[cfg(not(feature = "postgres"))]
    async fn get_connection(&self, config: &ServiceConnection) -> Result<PostgresConnection, SourceConnectionError> {
        PostgresTarget::from_settings(self.flavor, config)?;
        Err(SourceConnectionError::not_compiled(config, self.flavor.name(), "postgres"))
    }

    #[cfg(feature = "postgres")]
    fn test_fns(&self, connection: Arc<PostgresConnection>) -> TestFns {
        let queries = PROBES
            .iter()
            .copied()
            .chain(connection.flavor.query_log_sql().map(|sql| ("GetQueries", sql)));

        let mut fns = TestFns::new();
        for (name, sql) in queries {
            let connection = Arc::clone(&connection);
            fns.insert(name, async move {
                connection.client.simple_query(sql).await?;
                Ok(())
            });
        }
        fns
    }

    #[cfg(not(feature = "postgres"))]
    fn test_fns(&self, connection: Arc<PostgresConnection>) -> TestFns {
        let _ = connection;
        TestFns::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metaingest_core::ServiceType;
    use pretty_assertions::assert_eq;

    fn settings(source: &str) -> ServiceConnection {
        ServiceConnection::new(ServiceType::Database, source)
            .with_setting("host", "cluster.example.com")
            .with_setting("username", "loader")
            .with_setting("password", "hunter2")
    }

    #[test]
    fn flavor_defaults() {
        let target = PostgresTarget::from_settings(PostgresFlavor::Redshift, &settings("redshift")).unwrap();
        assert_eq!(
            target,
            PostgresTarget {
                host: "cluster.example.com".to_string(),
                port: 5439,
                database: "dev".to_string(),
                username: "loader".to_string(),
                tls: false,
            }
        );

        let target = PostgresTarget::from_settings(PostgresFlavor::Postgres, &settings("postgres")).unwrap();
        assert_eq!(target.port, 5432);
        assert_eq!(target.database, "postgres");
    }

    #[test]
    fn explicit_settings_win() {
        let config = settings("postgres")
            .with_setting("port", "6543")
            .with_setting("database", "analytics")
            .with_setting("sslmode", "require");

        let target = PostgresTarget::from_settings(PostgresFlavor::Postgres, &config).unwrap();
        assert_eq!(target.port, 6543);
        assert_eq!(target.database, "analytics");
        assert!(target.tls);
    }

    #[test]
    fn invalid_settings() {
        let config = ServiceConnection::new(ServiceType::Database, "postgres").with_setting("username", "u");
        assert!(matches!(
            PostgresTarget::from_settings(PostgresFlavor::Postgres, &config),
            Err(SourceConnectionError::Config { .. })
        ));

        let config = settings("postgres").with_setting("port", "not-a-port");
        let err = PostgresTarget::from_settings(PostgresFlavor::Postgres, &config).unwrap_err();
        assert!(err.to_string().contains("invalid port 'not-a-port'"));
        assert!(!err.to_string().contains("hunter2"));

        let config = settings("postgres").with_setting("sslmode", "sometimes");
        assert!(PostgresTarget::from_settings(PostgresFlavor::Postgres, &config).is_err());
    }

    #[test]
    fn probe_names_per_flavor() {
        assert_eq!(
            PostgresConnector::redshift().probe_names(),
            vec!["CheckAccess", "GetSchemas", "GetTables", "GetViews", "GetQueries"]
        );
        assert!(!PostgresConnector::greenplum().probe_names().contains(&"GetQueries"));
        assert_eq!(PostgresConnector::greenplum().name(), "Greenplum");
    }

    #[tokio::test]
    #[cfg(not(feature = "postgres"))]
    async fn not_compiled_without_feature() {
        let err = PostgresConnector::postgres()
            .get_connection(&settings("postgres"))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SourceConnectionError::NotCompiled { feature: "postgres", .. }));
    }
}
