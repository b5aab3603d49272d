//! Service spec resolution
//!
//! Every connector publishes a `ServiceSpec` at a conventional module path:
//!
//! ```text
//! metadata.<namespace>.source.<service_type>.<source_type>.service_spec.ServiceSpec
//! ```
//!
//! e.g. `metadata.ingestion.source.database.redshift.service_spec.ServiceSpec`.
//! The spec names the classes implementing metadata extraction and
//! (optionally) profiling. Classes can be given either as direct type handles
//! or as their full path; both normalize to the same string, so specs can also
//! be written as plain JSON/TOML manifests.
//!
//! Modules are registered up front in a [`ModuleLocator`] and initialized
//! lazily, at most once, on first resolution.
//!
//! ## Example
//!
//! ```rust,ignore
//! use metaingest_spec::{ModuleLocator, Module, RawSpec, SpecResolver};
//! use metaingest_core::ServiceType;
//!
//! let mut locator = ModuleLocator::new();
//! locator.register("metadata.ingestion.source.database.fake.service_spec", || {
//!     Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.FakeExtractor")))
//! })?;
//!
//! let resolver = SpecResolver::new(Arc::new(locator));
//! let spec = resolver.resolve_spec(ServiceType::Database, "fake")?;
//! assert_eq!(spec.metadata_source_class, "pkg.FakeExtractor");
//! ```

pub mod locator;
pub mod reference;
pub mod descriptor;
pub mod resolver;

pub use locator::{module_dir_for, LoadError, Module, ModuleLocator, RegistryError, ResolutionError, Symbol};
pub use reference::{PluginType, Reference, TypeRef};
pub use descriptor::{RawSpec, SpecDescriptor, SpecValidationError};
pub use resolver::{
    spec_module_path, SpecError, SpecResolver, DEFAULT_NAMESPACE, SERVICE_SPEC_MODULE,
    SERVICE_SPEC_SYMBOL,
};
pub use metaingest_core::FallbackPolicy;
