//! End-to-end resolution tests
//!
//! These tests build a small plugin tree in a [`ModuleLocator`] the same way a
//! connector crate does, then resolve specs and classes through the
//! [`SpecResolver`].

use metaingest_core::{FallbackPolicy, ServiceType};
use metaingest_spec::{
    Module, ModuleLocator, PluginType, RawSpec, ResolutionError, SpecDescriptor, SpecError,
    SpecResolver, SpecValidationError, TypeRef,
};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// =============================================================================
// Fixture plugin tree
// =============================================================================

/// Stand-in for an extractor class
#[derive(Debug, PartialEq)]
struct FakeExtractor {
    label: &'static str,
}

impl PluginType for FakeExtractor {
    const MODULE: &'static str = "pkg";
    const NAME: &'static str = "FakeExtractor";
}

#[derive(Debug, PartialEq)]
struct FakeProfiler;

impl PluginType for FakeProfiler {
    const MODULE: &'static str = "pkg.profiler";
    const NAME: &'static str = "FakeProfiler";
}

#[derive(Debug, PartialEq)]
struct GenericExtractor;

impl PluginType for GenericExtractor {
    const MODULE: &'static str = "pkg.common";
    const NAME: &'static str = "GenericExtractor";
}

fn fixture_locator() -> ModuleLocator {
    let mut locator = ModuleLocator::new();

    // Class modules
    locator
        .register("pkg", || {
            Ok(Module::new().with_symbol("FakeExtractor", FakeExtractor { label: "fake" }))
        })
        .unwrap();
    locator
        .register("pkg.profiler", || Ok(Module::new().with_symbol("FakeProfiler", FakeProfiler)))
        .unwrap();
    locator
        .register("pkg.common", || Ok(Module::new().with_symbol("GenericExtractor", GenericExtractor)))
        .unwrap();

    // Spec modules
    locator
        .register("metadata.ingestion.source.database.fake.service_spec", || {
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.FakeExtractor")))
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.profiled.service_spec", || {
            Ok(Module::new().with_symbol(
                "ServiceSpec",
                RawSpec::new(TypeRef::of::<FakeExtractor>()).with_profiler(TypeRef::of::<FakeProfiler>()),
            ))
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.big_query.service_spec", || {
            Ok(Module::new().with_symbol(
                "ServiceSpec",
                serde_json::json!({"metadata_source_class": "pkg.FakeExtractor"}),
            ))
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.broken.service_spec", || {
            Err("vendor SDK failed to initialize".into())
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.nospec.service_spec", || {
            Ok(Module::new().with_symbol("SomethingElse", 1u8))
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.invalid.service_spec", || {
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::default().with_profiler("pkg.profiler.FakeProfiler")))
        })
        .unwrap();
    locator
        .register("metadata.ingestion.source.database.dangling.service_spec", || {
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.DoesNotExist")))
        })
        .unwrap();

    locator
}

fn resolver() -> SpecResolver {
    SpecResolver::new(Arc::new(fixture_locator()))
}

fn resolver_with_default() -> SpecResolver {
    resolver().with_default(
        ServiceType::Database,
        RawSpec::new(TypeRef::of::<GenericExtractor>()),
    )
}

// =============================================================================
// Spec resolution
// =============================================================================

#[test]
fn test_resolve_fake_plugin() {
    let spec = resolver().resolve_spec(ServiceType::Database, "fake").unwrap();

    assert_eq!(spec.metadata_source_class, "pkg.FakeExtractor");
    assert_eq!(spec.profiler_class, None);
}

#[test]
fn test_resolve_direct_handles() {
    let spec = resolver().resolve_spec(ServiceType::Database, "profiled").unwrap();

    assert_eq!(spec.metadata_source_class, "pkg.FakeExtractor");
    assert_eq!(spec.profiler_class.as_deref(), Some("pkg.profiler.FakeProfiler"));
}

#[test]
fn test_resolve_normalizes_source_type() {
    // "Big-Query" -> "big_query"
    let spec = resolver().resolve_spec(ServiceType::Database, "Big-Query").unwrap();
    assert_eq!(spec.metadata_source_class, "pkg.FakeExtractor");
}

#[test]
fn test_direct_and_path_specs_agree() {
    let resolver = resolver();
    let by_path = resolver.resolve_spec(ServiceType::Database, "fake").unwrap();
    let by_handle = resolver.resolve_spec(ServiceType::Database, "profiled").unwrap();

    assert_eq!(by_path.metadata_source_class, by_handle.metadata_source_class);
}

#[test]
fn test_descriptors_are_not_cached_but_modules_are() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);

    let mut locator = ModuleLocator::new();
    locator
        .register("metadata.ingestion.source.database.fake.service_spec", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.FakeExtractor")))
        })
        .unwrap();
    let resolver = SpecResolver::new(Arc::new(locator));

    let first = resolver.resolve_spec(ServiceType::Database, "fake").unwrap();
    let second = resolver.resolve_spec(ServiceType::Database, "fake").unwrap();

    assert_eq!(first, second);
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_custom_namespace() {
    let mut locator = ModuleLocator::new();
    locator
        .register("metadata.staging.source.dashboard.looker.service_spec", || {
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.Looker")))
        })
        .unwrap();
    let resolver = SpecResolver::new(Arc::new(locator));

    let spec = resolver
        .resolve_spec_in(ServiceType::Dashboard, "looker", "staging")
        .unwrap();
    assert_eq!(spec.metadata_source_class, "pkg.Looker");

    assert!(resolver.resolve_spec(ServiceType::Dashboard, "looker").is_err());

    let staged = SpecResolver::new(Arc::clone(resolver.locator())).with_namespace("staging");
    assert!(staged.resolve_spec(ServiceType::Dashboard, "looker").is_ok());
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_missing_metadata_source_is_validation_error() {
    let err = resolver().resolve_spec(ServiceType::Database, "invalid").unwrap_err();

    match err {
        SpecError::Validation { path, source } => {
            assert_eq!(path, "metadata.ingestion.source.database.invalid.service_spec.ServiceSpec");
            assert_eq!(source, SpecValidationError::MissingMetadataSource);
        }
        other => panic!("expected validation error, got {:?}", other),
    }
}

#[test]
fn test_unknown_source_without_fallback() {
    let err = resolver()
        .with_fallback(FallbackPolicy::Never)
        .with_default(ServiceType::Database, RawSpec::new("pkg.common.GenericExtractor"))
        .resolve_spec(ServiceType::Database, "unknown")
        .unwrap_err();

    assert!(matches!(
        err,
        SpecError::Resolution(ResolutionError::ModuleNotFound(ref m))
            if m == "metadata.ingestion.source.database.unknown.service_spec"
    ));
}

#[test]
fn test_unknown_source_without_default_registered() {
    let err = resolver().resolve_spec(ServiceType::Database, "unknown").unwrap_err();
    assert!(matches!(err, SpecError::Resolution(ResolutionError::ModuleNotFound(_))));
}

#[test]
fn test_load_failure_propagates_cause() {
    let err = resolver_with_default()
        .resolve_spec(ServiceType::Database, "broken")
        .unwrap_err();

    match err {
        SpecError::Resolution(ResolutionError::LoadFailed { module, source }) => {
            assert_eq!(module, "metadata.ingestion.source.database.broken.service_spec");
            assert_eq!(source.to_string(), "vendor SDK failed to initialize");
        }
        other => panic!("expected load failure, got {:?}", other),
    }
}

#[test]
fn test_missing_spec_symbol_does_not_fall_back() {
    let err = resolver_with_default()
        .resolve_spec(ServiceType::Database, "nospec")
        .unwrap_err();

    assert!(matches!(
        err,
        SpecError::Resolution(ResolutionError::SymbolNotFound { ref symbol, .. }) if symbol == "ServiceSpec"
    ));
}

#[test]
fn test_dangling_class_is_only_detected_on_import() {
    let resolver = resolver();

    // The spec itself is valid
    let spec = resolver.resolve_spec(ServiceType::Database, "dangling").unwrap();
    assert_eq!(spec.metadata_source_class, "pkg.DoesNotExist");

    // Importing the class fails
    let err = resolver
        .import_source_class::<FakeExtractor>(ServiceType::Database, "dangling")
        .unwrap_err();
    assert!(matches!(
        err,
        SpecError::Resolution(ResolutionError::SymbolNotFound { .. })
    ));
}

// =============================================================================
// Default fallback
// =============================================================================

#[test]
fn test_unknown_source_falls_back_to_default() {
    let spec = resolver_with_default()
        .resolve_spec(ServiceType::Database, "unknown")
        .unwrap();

    assert_eq!(spec.metadata_source_class, "pkg.common.GenericExtractor");
}

#[test]
fn test_default_is_per_service_type() {
    let err = resolver_with_default()
        .resolve_spec(ServiceType::Dashboard, "unknown")
        .unwrap_err();

    assert!(matches!(err, SpecError::Resolution(ResolutionError::ModuleNotFound(_))));
}

#[test]
fn test_invalid_default_is_validation_error() {
    let err = resolver()
        .with_default(ServiceType::Database, RawSpec::default())
        .resolve_spec(ServiceType::Database, "unknown")
        .unwrap_err();

    assert!(matches!(
        err,
        SpecError::Validation { source: SpecValidationError::MissingMetadataSource, .. }
    ));
}

// =============================================================================
// Class import
// =============================================================================

#[test]
fn test_import_source_class() {
    let extractor = resolver()
        .import_source_class::<FakeExtractor>(ServiceType::Database, "fake")
        .unwrap();

    assert_eq!(*extractor, FakeExtractor { label: "fake" });
}

#[test]
fn test_import_source_class_identity() {
    let resolver = resolver();
    let a = resolver
        .import_source_class::<FakeExtractor>(ServiceType::Database, "fake")
        .unwrap();
    let b = resolver
        .import_source_class::<FakeExtractor>(ServiceType::Database, "profiled")
        .unwrap();

    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_import_source_class_type_mismatch() {
    let err = resolver()
        .import_source_class::<FakeProfiler>(ServiceType::Database, "fake")
        .unwrap_err();

    assert!(matches!(
        err,
        SpecError::Resolution(ResolutionError::TypeMismatch { ref path, .. }) if path == "pkg.FakeExtractor"
    ));
}

#[test]
fn test_import_source_class_through_default() {
    let extractor = resolver_with_default()
        .import_source_class::<GenericExtractor>(ServiceType::Database, "unknown")
        .unwrap();

    assert_eq!(*extractor, GenericExtractor);
}

#[test]
fn test_import_profiler_class() {
    let resolver = resolver();

    let profiler = resolver
        .import_profiler_class::<FakeProfiler>(ServiceType::Database, "profiled")
        .unwrap();
    assert!(profiler.is_some());

    let none = resolver
        .import_profiler_class::<FakeProfiler>(ServiceType::Database, "fake")
        .unwrap();
    assert!(none.is_none());
}

#[test]
fn test_spec_descriptor_symbol_is_revalidated() {
    let mut locator = ModuleLocator::new();
    locator
        .register("metadata.ingestion.source.database.manual.service_spec", || {
            Ok(Module::new().with_symbol(
                "ServiceSpec",
                SpecDescriptor {
                    metadata_source_class: String::new(),
                    profiler_class: None,
                    lineage_source_class: None,
                    usage_source_class: None,
                    sampler_class: None,
                },
            ))
        })
        .unwrap();

    let err = SpecResolver::new(Arc::new(locator))
        .resolve_spec(ServiceType::Database, "manual")
        .unwrap_err();
    assert!(matches!(
        err,
        SpecError::Validation { source: SpecValidationError::MissingMetadataSource, .. }
    ));
}

#[test]
fn test_concurrent_resolution() {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);

    let mut locator = ModuleLocator::new();
    locator
        .register("metadata.ingestion.source.database.fake.service_spec", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().with_symbol("ServiceSpec", RawSpec::new("pkg.FakeExtractor")))
        })
        .unwrap();
    let resolver = Arc::new(SpecResolver::new(Arc::new(locator)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let resolver = Arc::clone(&resolver);
            std::thread::spawn(move || resolver.resolve_spec(ServiceType::Database, "fake").unwrap())
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().metadata_source_class, "pkg.FakeExtractor");
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}
