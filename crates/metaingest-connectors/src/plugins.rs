//! Built-in plugin tree
//!
//! Registers the bundled connectors with a [`ModuleLocator`] following the
//! plugin layout:
//!
//! ```text
//! metadata.<namespace>.source.database.<source>.service_spec   ServiceSpec
//! metadata.ingestion.source.database.<source>.metadata         <Source>Source
//! metadata.ingestion.source.database.<source>.lineage          <Source>LineageSource
//! metadata.ingestion.source.database.<source>.usage            <Source>UsageSource
//! ```
//!
//! Spec modules are registered under the requested namespace; the classes
//! they point at always live under `metadata.ingestion`.
//!
//! Most database specs start from [`default_database_spec`], which adds the
//! generic SQL profiler and sampler. The same default, built around the
//! common SQL source, is the database fallback used by [`builtin_resolver`].

use crate::bigquery::BigQueryConnector;
use crate::connector::Connector;
use crate::mock::MockConnector;
use crate::postgres::PostgresConnector;
use crate::snowflake::SnowflakeConnector;
use crate::source::{ComponentClass, ComponentKind, SourceClass};
use metaingest_core::{Config, ServiceType};
use metaingest_spec::{
    spec_module_path, Module, ModuleLocator, PluginType, RawSpec, Reference, RegistryError, SpecResolver,
    TypeRef, SERVICE_SPEC_SYMBOL,
};
use std::fmt;
use std::sync::Arc;

/// A class and the module exporting it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassLocation {
    pub module: &'static str,
    pub name: &'static str,
}

impl ClassLocation {
    pub const fn new(module: &'static str, name: &'static str) -> Self {
        Self { module, name }
    }

    /// `<module>.<name>`
    pub fn path(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for ClassLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

impl From<ClassLocation> for Reference {
    fn from(location: ClassLocation) -> Self {
        Reference::Path(location.path())
    }
}

pub const SQA_PROFILER: ClassLocation =
    ClassLocation::new("metadata.profiler.interface.sqlalchemy.profiler_interface", "SQAProfilerInterface");
pub const SQA_SAMPLER: ClassLocation = ClassLocation::new("metadata.sampler.sqlalchemy.sampler", "SQASampler");
pub const COMMON_DB_SOURCE: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.common_db_source", "CommonDbSourceService");

pub const POSTGRES_SOURCE: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.postgres.metadata", "PostgresSource");
pub const REDSHIFT_SOURCE: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.redshift.metadata", "RedshiftSource");
pub const GREENPLUM_SOURCE: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.greenplum.metadata", "GreenplumSource");

pub const REDSHIFT_PROFILER: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.redshift.profiler.profiler", "RedshiftProfiler");
pub const BIGQUERY_PROFILER: ClassLocation =
    ClassLocation::new("metadata.ingestion.source.database.bigquery.profiler.profiler", "BigQueryProfiler");

const LINEAGE_SOURCES: [ClassLocation; 4] = [
    ClassLocation::new("metadata.ingestion.source.database.bigquery.lineage", "BigqueryLineageSource"),
    ClassLocation::new("metadata.ingestion.source.database.snowflake.lineage", "SnowflakeLineageSource"),
    ClassLocation::new("metadata.ingestion.source.database.postgres.lineage", "PostgresLineageSource"),
    ClassLocation::new("metadata.ingestion.source.database.redshift.lineage", "RedshiftLineageSource"),
];

const USAGE_SOURCES: [ClassLocation; 4] = [
    ClassLocation::new("metadata.ingestion.source.database.bigquery.usage", "BigqueryUsageSource"),
    ClassLocation::new("metadata.ingestion.source.database.snowflake.usage", "SnowflakeUsageSource"),
    ClassLocation::new("metadata.ingestion.source.database.postgres.usage", "PostgresUsageSource"),
    ClassLocation::new("metadata.ingestion.source.database.redshift.usage", "RedshiftUsageSource"),
];

/// Database source types with a bundled spec
pub const BUILTIN_DATABASE_SOURCES: [&str; 6] = ["bigquery", "greenplum", "mock", "postgres", "redshift", "snowflake"];

/// Database spec with the generic SQL profiler and sampler
pub fn default_database_spec(metadata_source: impl Into<Reference>) -> RawSpec {
    RawSpec::new(metadata_source)
        .with_profiler(SQA_PROFILER)
        .with_sampler(SQA_SAMPLER)
}

/// Spec for each bundled database source
fn builtin_spec(source: &str) -> Option<RawSpec> {
    let spec = match source {
        "bigquery" => default_database_spec(TypeRef::of::<BigQueryConnector>())
            .with_profiler(BIGQUERY_PROFILER)
            .with_lineage_source(LINEAGE_SOURCES[0])
            .with_usage_source(USAGE_SOURCES[0]),
        "snowflake" => default_database_spec(TypeRef::of::<SnowflakeConnector>())
            .with_lineage_source(LINEAGE_SOURCES[1])
            .with_usage_source(USAGE_SOURCES[1]),
        "postgres" => default_database_spec(POSTGRES_SOURCE)
            .with_lineage_source(LINEAGE_SOURCES[2])
            .with_usage_source(USAGE_SOURCES[2]),
        "redshift" => default_database_spec(REDSHIFT_SOURCE)
            .with_profiler(REDSHIFT_PROFILER)
            .with_lineage_source(LINEAGE_SOURCES[3])
            .with_usage_source(USAGE_SOURCES[3]),
        "greenplum" => default_database_spec(GREENPLUM_SOURCE),
        "mock" => RawSpec::new(TypeRef::of::<MockConnector>()),
        _ => return None,
    };
    Some(spec)
}

/// Register every bundled plugin
///
/// Spec modules go under `metadata.<namespace>`. Class modules have fixed
/// paths, so this can only be called once per locator.
pub fn register_builtin(locator: &mut ModuleLocator, namespace: &str) -> Result<(), RegistryError> {
    // Shared classes
    register_component(locator, SQA_PROFILER, ComponentKind::Profiler)?;
    register_component(locator, SQA_SAMPLER, ComponentKind::Sampler)?;
    register_source(locator, COMMON_DB_SOURCE, PostgresConnector::postgres)?;

    // Source classes
    register_connector::<BigQueryConnector>(locator)?;
    register_connector::<SnowflakeConnector>(locator)?;
    register_connector::<MockConnector>(locator)?;
    register_source(locator, POSTGRES_SOURCE, PostgresConnector::postgres)?;
    register_source(locator, REDSHIFT_SOURCE, PostgresConnector::redshift)?;
    register_source(locator, GREENPLUM_SOURCE, PostgresConnector::greenplum)?;

    // Vendor profilers, lineage and usage
    register_component(locator, REDSHIFT_PROFILER, ComponentKind::Profiler)?;
    register_component(locator, BIGQUERY_PROFILER, ComponentKind::Profiler)?;
    for location in LINEAGE_SOURCES {
        register_component(locator, location, ComponentKind::Lineage)?;
    }
    for location in USAGE_SOURCES {
        register_component(locator, location, ComponentKind::Usage)?;
    }

    // Service specs
    for source in BUILTIN_DATABASE_SOURCES {
        let Some(spec) = builtin_spec(source) else { continue };
        locator.register(spec_module_path(ServiceType::Database, source, namespace), move || {
            Ok(Module::new().with_symbol(SERVICE_SPEC_SYMBOL, spec.clone()))
        })?;
    }

    Ok(())
}

/// Locator with the bundled plugins, and a resolver over it configured from `config`
///
/// Unknown database sources fall back to the common SQL source, which is
/// backed by the PostgreSQL connector. Testing the connection of an
/// unbundled source (e.g. `dynamodb`) therefore runs PostgreSQL probes
/// against its settings; check [`SourceClass::name`] against
/// [`COMMON_DB_SOURCE`] to tell a fallback apart from a bundled source.
pub fn builtin_resolver(config: &Config) -> Result<SpecResolver, RegistryError> {
    let mut locator = ModuleLocator::new();
    register_builtin(&mut locator, &config.namespace)?;

    Ok(SpecResolver::from_config(Arc::new(locator), config)
        .with_default(ServiceType::Database, default_database_spec(COMMON_DB_SOURCE)))
}

fn register_connector<C>(locator: &mut ModuleLocator) -> Result<(), RegistryError>
where
    C: Connector + PluginType + Default + 'static,
{
    locator.register(C::MODULE, || {
        Ok(Module::new().with_symbol(C::NAME, SourceClass::new(C::NAME, ServiceType::Database, C::default)))
    })
}

fn register_source<C>(
    locator: &mut ModuleLocator,
    location: ClassLocation,
    factory: fn() -> C,
) -> Result<(), RegistryError>
where
    C: Connector + 'static,
{
    locator.register(location.module, move || {
        Ok(Module::new().with_symbol(
            location.name,
            SourceClass::new(location.name, ServiceType::Database, factory),
        ))
    })
}

fn register_component(
    locator: &mut ModuleLocator,
    location: ClassLocation,
    kind: ComponentKind,
) -> Result<(), RegistryError> {
    locator.register(location.module, move || {
        Ok(Module::new().with_symbol(location.name, ComponentClass::new(kind, location.name)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::DynConnector;
    use metaingest_spec::DEFAULT_NAMESPACE;
    use pretty_assertions::assert_eq;

    fn locator() -> ModuleLocator {
        let mut locator = ModuleLocator::new();
        register_builtin(&mut locator, DEFAULT_NAMESPACE).unwrap();
        locator
    }

    #[test]
    fn every_builtin_source_has_a_spec() {
        for source in BUILTIN_DATABASE_SOURCES {
            assert!(builtin_spec(source).is_some(), "{} has no spec", source);
        }
        assert!(builtin_spec("oracle").is_none());
    }

    #[test]
    fn every_declared_class_is_registered() {
        let locator = locator();
        let resolver = SpecResolver::new(Arc::new(locator));

        for source in BUILTIN_DATABASE_SOURCES {
            let spec = resolver.resolve_spec(ServiceType::Database, source).unwrap();
            for (field, path) in spec.class_paths() {
                assert!(
                    resolver.locator().resolve(path).is_ok(),
                    "{}.{} points at unregistered {}",
                    source,
                    field,
                    path
                );
            }
        }
    }

    #[test]
    fn direct_handles_match_registered_classes() {
        let locator = locator();
        let source = locator
            .resolve_as::<SourceClass>(&TypeRef::of::<BigQueryConnector>().class_path())
            .unwrap();

        assert_eq!(source.name(), "BigquerySource");
        assert_eq!(source.connector().connector_name(), "BigQuery");
    }

    #[test]
    fn registering_twice_is_rejected() {
        let mut locator = locator();
        assert!(matches!(
            register_builtin(&mut locator, "staging"),
            Err(RegistryError::DuplicateModule(_))
        ));
    }

    #[test]
    fn class_location_reference() {
        assert_eq!(
            Reference::from(SQA_SAMPLER).normalize(),
            "metadata.sampler.sqlalchemy.sampler.SQASampler"
        );
        assert_eq!(SQA_SAMPLER.to_string(), SQA_SAMPLER.path());
    }
}
