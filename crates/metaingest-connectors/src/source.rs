//! Classes a service spec can point at
//!
//! The module locator stores these as symbols. A [`SourceClass`] is the
//! metadata source class: it knows which service type it serves and how to
//! build its connector. A [`ComponentClass`] stands for the secondary
//! classes (profiler, sampler, lineage, usage), which this crate only names.

use crate::connector::DynConnector;
use metaingest_core::ServiceType;
use std::fmt;
use std::sync::Arc;

type ConnectorFactory = Arc<dyn Fn() -> Box<dyn DynConnector> + Send + Sync>;

/// Metadata source class
#[derive(Clone)]
pub struct SourceClass {
    name: &'static str,
    service_type: ServiceType,
    factory: ConnectorFactory,
}

impl SourceClass {
    /// Source class whose connector is built by `factory`
    pub fn new<C, F>(name: &'static str, service_type: ServiceType, factory: F) -> Self
    where
        C: DynConnector + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        Self {
            name,
            service_type,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn DynConnector>),
        }
    }

    /// Exported class name (e.g. "RedshiftSource")
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// A fresh connector instance
    pub fn connector(&self) -> Box<dyn DynConnector> {
        (self.factory)()
    }
}

impl fmt::Debug for SourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceClass")
            .field("name", &self.name)
            .field("service_type", &self.service_type)
            .finish()
    }
}

/// Role of a secondary class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Profiler,
    Sampler,
    Lineage,
    Usage,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profiler => write!(f, "profiler"),
            Self::Sampler => write!(f, "sampler"),
            Self::Lineage => write!(f, "lineage"),
            Self::Usage => write!(f, "usage"),
        }
    }
}

/// Profiler, sampler, lineage or usage class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentClass {
    pub kind: ComponentKind,
    pub name: &'static str,
}

impl ComponentClass {
    pub fn new(kind: ComponentKind, name: &'static str) -> Self {
        Self { kind, name }
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}
