//! References to plugin classes
//!
//! A spec field names a class either directly ([`Reference::Direct`]) or by
//! its full path ([`Reference::Path`]). Direct handles are normalized into the
//! path `<declaring module>.<name>` before a spec is validated, so both forms
//! end up as the same string.

use std::any::TypeId;
use std::fmt;

/// A type that can be referenced from a service spec
///
/// `MODULE` must be the module path the type is registered under in the
/// [`ModuleLocator`](crate::ModuleLocator), and `NAME` the symbol it is
/// exported as. Normalization relies on this to produce a resolvable path.
pub trait PluginType: 'static {
    /// Declaring module path
    const MODULE: &'static str;

    /// Exported name
    const NAME: &'static str;
}

/// Direct handle to a plugin type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeRef {
    module: &'static str,
    name: &'static str,
    type_id: TypeId,
}

impl TypeRef {
    /// Handle for `T`
    pub fn of<T: PluginType>() -> Self {
        Self {
            module: T::MODULE,
            name: T::NAME,
            type_id: TypeId::of::<T>(),
        }
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Whether this handle points at `T`
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Fully-qualified path: `<module>.<name>`
    pub fn class_path(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.name)
    }
}

/// A class reference as written in a spec
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Direct type handle
    Direct(TypeRef),

    /// Fully-qualified path
    Path(String),
}

impl Reference {
    /// Direct reference to `T`
    pub fn direct<T: PluginType>() -> Self {
        Self::Direct(TypeRef::of::<T>())
    }

    /// Path reference
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Self::Direct(_))
    }

    /// The path form of this reference
    pub fn normalize(self) -> String {
        match self {
            Self::Direct(type_ref) => type_ref.class_path(),
            Self::Path(path) => path,
        }
    }
}

impl From<TypeRef> for Reference {
    fn from(type_ref: TypeRef) -> Self {
        Self::Direct(type_ref)
    }
}

impl From<&str> for Reference {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Reference {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(type_ref) => write!(f, "{}", type_ref),
            Self::Path(path) => write!(f, "{}", path),
        }
    }
}
