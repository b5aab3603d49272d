//! Service spec resolver
//!
//! Maps a `(service type, source type)` pair to its [`SpecDescriptor`] by
//! naming convention, and from there to the concrete classes.
//!
//! ## Default specs
//!
//! A service type may have a default spec. It is used when the
//! source-specific spec module is not registered at all, and only then:
//! a spec module that exists but fails to load, lacks the `ServiceSpec`
//! symbol, or exports a malformed spec is always an error. Set
//! [`FallbackPolicy::Never`] to turn the fallback off.

use crate::descriptor::{RawSpec, SpecDescriptor, SpecValidationError};
use crate::locator::{module_dir_for, ModuleLocator, ResolutionError};
use metaingest_core::{Config, FallbackPolicy, ServiceType};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "ingestion";

/// Module name every connector publishes its spec under
pub const SERVICE_SPEC_MODULE: &str = "service_spec";

/// Symbol the spec module exports
pub const SERVICE_SPEC_SYMBOL: &str = "ServiceSpec";

/// Module path of the spec for a source
///
/// `metadata.<namespace>.source.<service_type>.<source_dir>.service_spec`
pub fn spec_module_path(service_type: ServiceType, source_type: &str, namespace: &str) -> String {
    format!(
        "metadata.{}.source.{}.{}.{}",
        namespace,
        service_type.module_segment(),
        module_dir_for(source_type),
        SERVICE_SPEC_MODULE
    )
}

/// Errors returned by the resolver
#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Invalid service spec '{path}': {source}")]
    Validation {
        path: String,
        #[source]
        source: SpecValidationError,
    },
}

/// Resolves service specs and the classes they name
pub struct SpecResolver {
    locator: Arc<ModuleLocator>,
    namespace: String,
    fallback: FallbackPolicy,
    defaults: HashMap<ServiceType, RawSpec>,
}

impl SpecResolver {
    /// Resolver over `locator` with the default namespace and fallback policy
    pub fn new(locator: Arc<ModuleLocator>) -> Self {
        Self {
            locator,
            namespace: DEFAULT_NAMESPACE.to_string(),
            fallback: FallbackPolicy::default(),
            defaults: HashMap::new(),
        }
    }

    /// Resolver configured from `metaingest.toml`
    pub fn from_config(locator: Arc<ModuleLocator>, config: &Config) -> Self {
        Self::new(locator)
            .with_namespace(config.namespace.clone())
            .with_fallback(config.resolution.fallback)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.fallback = fallback;
        self
    }

    /// Register the default spec for a service type
    pub fn with_default(mut self, service_type: ServiceType, spec: RawSpec) -> Self {
        self.register_default(service_type, spec);
        self
    }

    /// Register the default spec for a service type, returning the one it replaces
    pub fn register_default(&mut self, service_type: ServiceType, spec: RawSpec) -> Option<RawSpec> {
        self.defaults.insert(service_type, spec)
    }

    pub fn default_spec(&self, service_type: ServiceType) -> Option<&RawSpec> {
        self.defaults.get(&service_type)
    }

    pub fn locator(&self) -> &Arc<ModuleLocator> {
        &self.locator
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fallback(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Resolve the spec for a source in the configured namespace
    pub fn resolve_spec(&self, service_type: ServiceType, source_type: &str) -> Result<SpecDescriptor, SpecError> {
        self.resolve_spec_in(service_type, source_type, &self.namespace)
    }

    /// Resolve the spec for a source in `namespace`
    pub fn resolve_spec_in(
        &self,
        service_type: ServiceType,
        source_type: &str,
        namespace: &str,
    ) -> Result<SpecDescriptor, SpecError> {
        let module_path = spec_module_path(service_type, source_type, namespace);
        let symbol_path = format!("{}.{}", module_path, SERVICE_SPEC_SYMBOL);

        match self.locator.resolve(&symbol_path) {
            Ok(symbol) => SpecDescriptor::from_symbol(&symbol)
                .map_err(|source| SpecError::Validation { path: symbol_path, source }),

            Err(ResolutionError::ModuleNotFound(missing))
                if missing == module_path && self.fallback == FallbackPolicy::ModuleNotFound =>
            {
                let Some(default) = self.defaults.get(&service_type) else {
                    return Err(ResolutionError::ModuleNotFound(missing).into());
                };

                tracing::info!(
                    service_type = %service_type,
                    source_type,
                    "no service spec at {}, using the {} default",
                    missing,
                    service_type
                );

                SpecDescriptor::from_raw(default.clone()).map_err(|source| SpecError::Validation {
                    path: format!("<default {} spec>", service_type),
                    source,
                })
            }

            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the metadata source class for a source
    pub fn import_source_class<T: Any + Send + Sync>(
        &self,
        service_type: ServiceType,
        source_type: &str,
    ) -> Result<Arc<T>, SpecError> {
        self.import_source_class_in(service_type, source_type, &self.namespace)
    }

    /// Resolve the metadata source class for a source in `namespace`
    pub fn import_source_class_in<T: Any + Send + Sync>(
        &self,
        service_type: ServiceType,
        source_type: &str,
        namespace: &str,
    ) -> Result<Arc<T>, SpecError> {
        let spec = self.resolve_spec_in(service_type, source_type, namespace)?;
        Ok(self.locator.resolve_as::<T>(&spec.metadata_source_class)?)
    }

    /// Resolve the profiler class for a source, if its spec names one
    pub fn import_profiler_class<T: Any + Send + Sync>(
        &self,
        service_type: ServiceType,
        source_type: &str,
    ) -> Result<Option<Arc<T>>, SpecError> {
        let spec = self.resolve_spec(service_type, source_type)?;
        match spec.profiler_class {
            Some(path) => Ok(Some(self.locator.resolve_as::<T>(&path)?)),
            None => Ok(None),
        }
    }

    /// Source directories with a registered spec module for `service_type`
    pub fn source_types(&self, service_type: ServiceType) -> Vec<String> {
        let prefix = format!("metadata.{}.source.{}.", self.namespace, service_type.module_segment());
        let suffix = format!(".{}", SERVICE_SPEC_MODULE);

        self.locator
            .module_paths()
            .filter_map(|path| path.strip_prefix(prefix.as_str()))
            .filter_map(|rest| rest.strip_suffix(suffix.as_str()))
            .filter(|source| !source.contains('.'))
            .map(str::to_string)
            .collect()
    }
}
