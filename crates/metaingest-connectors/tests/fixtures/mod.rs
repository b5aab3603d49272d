//! Test fixtures for connector integration tests
//!
//! Test-connection definitions and connection settings shaped like the ones
//! a catalog serves for real sources.

#![allow(dead_code)]

use metaingest_core::{ServiceConnection, ServiceType, TestConnectionDefinition, TestConnectionStep};

/// Definitions file shipped with the fixtures
pub const DEFINITIONS_JSON: &str = include_str!("definitions.json");

/// Redshift definition: access is mandatory and short-circuits, query log is optional
pub fn redshift_definition() -> TestConnectionDefinition {
    TestConnectionDefinition::new(
        "Redshift",
        vec![
            TestConnectionStep::mandatory("CheckAccess")
                .with_description("Validate that we can properly reach the database and authenticate")
                .with_short_circuit(),
            TestConnectionStep::mandatory("GetSchemas"),
            TestConnectionStep::mandatory("GetTables"),
            TestConnectionStep::mandatory("GetViews"),
            TestConnectionStep::optional("GetQueries"),
        ],
    )
}

/// Mock definition covering every mock probe
pub fn mock_definition() -> TestConnectionDefinition {
    TestConnectionDefinition::new(
        "Mock",
        vec![
            TestConnectionStep::mandatory("CheckAccess").with_short_circuit(),
            TestConnectionStep::mandatory("GetSchemas"),
            TestConnectionStep::mandatory("GetTables"),
            TestConnectionStep::optional("GetViews"),
        ],
    )
}

/// Mock connection settings, including a secret
pub fn mock_connection() -> ServiceConnection {
    ServiceConnection::new(ServiceType::Database, "mock")
        .with_setting("host", "mock.internal")
        .with_setting("username", "ingest")
        .with_setting("password", "hunter2")
}

/// Redshift connection settings
pub fn redshift_connection() -> ServiceConnection {
    ServiceConnection::new(ServiceType::Database, "redshift")
        .with_setting("host", "cluster.abc123.us-east-1.redshift.amazonaws.com")
        .with_setting("username", "loader")
        .with_setting("password", "hunter2")
}
