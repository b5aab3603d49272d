//! Connector binding for ingestion sources
//!
//! Every connector turns connection settings into a live handle and exposes
//! named connectivity probes. Probes run through one shared step runner that
//! either records results against an automation workflow or raises the
//! first failing step.
//!
//! ## Features
//!
//! Enable vendor SDKs via Cargo features:
//! - `bigquery` - Google BigQuery support
//! - `snowflake` - Snowflake support
//! - `postgres` - PostgreSQL/Redshift/Greenplum support
//! - `all-connectors` - All vendor connectors
//!
//! Without a feature the connector still resolves and validates its
//! settings, but `get_connection` reports that support was not compiled.
//!
//! ## Example
//!
//! ```rust,ignore
//! use metaingest_connectors::{builtin_resolver, InMemoryCatalog, SourceClass};
//!
//! let resolver = builtin_resolver(&config)?;
//! let source = resolver.import_source_class::<SourceClass>(ServiceType::Database, "redshift")?;
//! let result = source
//!     .connector()
//!     .connect_and_test(&InMemoryCatalog::new(), &service, None, None)
//!     .await?;
//! ```

pub mod catalog;
pub mod connector;
pub mod steps;
pub mod source;
pub mod mock;
pub mod bigquery;
pub mod snowflake;
pub mod postgres;
pub mod plugins;

pub use catalog::{CatalogClient, CatalogError, InMemoryCatalog};
pub use connector::{BoxError, Connector, ConnectorError, DynConnector, SourceConnectionError, TestConnectionError};
pub use steps::{test_connection_steps, ProbeFuture, TestFns};
pub use source::{ComponentClass, ComponentKind, SourceClass};
pub use mock::{MockConnection, MockConnector};
pub use bigquery::{BigQueryConnection, BigQueryConnector, BigQueryCredentials};
pub use snowflake::{SnowflakeConnection, SnowflakeConnector, SnowflakeCredentials, SnowflakeTarget};
pub use postgres::{PostgresConnection, PostgresConnector, PostgresFlavor, PostgresTarget};
pub use plugins::{builtin_resolver, default_database_spec, register_builtin, ClassLocation};
