//! Module locator
//!
//! A registration table from module paths to lazily initialized modules.
//! A module is a bag of named symbols; a symbol is any `Send + Sync` value
//! (a spec, a source class, a profiler class, ...). Callers address symbols
//! with a fully-qualified dotted path: `<module path>.<symbol name>`.
//!
//! Module initialization runs at most once per locator. Two resolutions of
//! the same path return the same `Arc`.

use once_cell::sync::OnceCell;
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// A resolved symbol
pub type Symbol = Arc<dyn Any + Send + Sync>;

/// Error raised by a module initializer
pub type LoadError = Box<dyn std::error::Error + Send + Sync + 'static>;

type ModuleInit = Box<dyn Fn() -> Result<Module, LoadError> + Send + Sync>;

/// Normalize a source type into its plugin directory name
///
/// Lower-cases ASCII letters and maps every character that is not an ASCII
/// letter, digit or underscore to `_`. Idempotent.
///
/// ```rust,ignore
/// assert_eq!(module_dir_for("BigQuery"), "bigquery");
/// assert_eq!(module_dir_for("my-source"), "my_source");
/// ```
pub fn module_dir_for(source_type: &str) -> String {
    source_type
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Errors that can occur when resolving a symbolic path
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Invalid symbol path '{0}': expected '<module>.<symbol>'")]
    InvalidPath(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Failed to load module '{module}': {source}")]
    LoadFailed {
        module: String,
        #[source]
        source: LoadError,
    },

    #[error("Symbol '{symbol}' not found in module '{module}'")]
    SymbolNotFound { module: String, symbol: String },

    #[error("Symbol '{path}' is not a {expected}")]
    TypeMismatch { path: String, expected: &'static str },
}

/// Errors raised while building the registration table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Module already registered: {0}")]
    DuplicateModule(String),

    #[error("Invalid module path: '{0}'")]
    InvalidModulePath(String),
}

/// Named symbols exported by one module
#[derive(Default)]
pub struct Module {
    symbols: HashMap<String, Symbol>,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Export a value under `name`
    pub fn with_symbol<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Export a value under `name`
    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.symbols.insert(name.into(), Arc::new(value));
    }

    /// Export an already shared symbol, keeping its identity
    pub fn insert_shared(&mut self, name: impl Into<String>, symbol: Symbol) {
        self.symbols.insert(name.into(), symbol);
    }

    /// Look up a symbol
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Exported symbol names, sorted
    pub fn symbol_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.symbols.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("symbols", &self.symbol_names())
            .finish()
    }
}

struct ModuleSlot {
    init: ModuleInit,
    loaded: OnceCell<Arc<Module>>,
}

/// Registration table of lazily loaded modules
///
/// Registration needs `&mut self` and happens at startup; the finished
/// locator is shared (usually as `Arc<ModuleLocator>`) and only read from.
#[derive(Default)]
pub struct ModuleLocator {
    modules: BTreeMap<String, ModuleSlot>,
}

impl ModuleLocator {
    /// Create an empty locator
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `module_path`
    ///
    /// `init` is not called here. It runs on the first `load`/`resolve` that
    /// reaches this module, and again only if that attempt failed.
    pub fn register<F>(&mut self, module_path: impl Into<String>, init: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Result<Module, LoadError> + Send + Sync + 'static,
    {
        let module_path = module_path.into();
        if module_path.is_empty()
            || module_path.starts_with('.')
            || module_path.ends_with('.')
            || module_path.contains("..")
        {
            return Err(RegistryError::InvalidModulePath(module_path));
        }
        if self.modules.contains_key(&module_path) {
            return Err(RegistryError::DuplicateModule(module_path));
        }

        self.modules.insert(
            module_path,
            ModuleSlot {
                init: Box::new(init),
                loaded: OnceCell::new(),
            },
        );
        Ok(())
    }

    /// Whether a module path is registered
    pub fn contains_module(&self, module_path: &str) -> bool {
        self.modules.contains_key(module_path)
    }

    /// Whether a module has already been initialized
    pub fn is_loaded(&self, module_path: &str) -> bool {
        self.modules
            .get(module_path)
            .map(|slot| slot.loaded.get().is_some())
            .unwrap_or(false)
    }

    /// All registered module paths, sorted
    pub fn module_paths(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Load (or fetch the already loaded) module at `module_path`
    pub fn load(&self, module_path: &str) -> Result<Arc<Module>, ResolutionError> {
        let slot = self
            .modules
            .get(module_path)
            .ok_or_else(|| ResolutionError::ModuleNotFound(module_path.to_string()))?;

        slot.loaded
            .get_or_try_init(|| {
                tracing::debug!(module = module_path, "loading module");
                (slot.init)()
                    .map(Arc::new)
                    .map_err(|source| ResolutionError::LoadFailed {
                        module: module_path.to_string(),
                        source,
                    })
            })
            .map(Arc::clone)
    }

    /// Resolve `<module path>.<symbol>` to the exported symbol
    pub fn resolve(&self, path: &str) -> Result<Symbol, ResolutionError> {
        let (module_path, symbol) = split_symbol_path(path)?;
        let module = self.load(module_path)?;

        module
            .get(symbol)
            .cloned()
            .ok_or_else(|| ResolutionError::SymbolNotFound {
                module: module_path.to_string(),
                symbol: symbol.to_string(),
            })
    }

    /// Resolve a symbol and downcast it to `T`
    pub fn resolve_as<T: Any + Send + Sync>(&self, path: &str) -> Result<Arc<T>, ResolutionError> {
        self.resolve(path)?
            .downcast::<T>()
            .map_err(|_| ResolutionError::TypeMismatch {
                path: path.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}

impl fmt::Debug for ModuleLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleLocator")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Split at the last `.` into (module path, symbol name)
fn split_symbol_path(path: &str) -> Result<(&str, &str), ResolutionError> {
    match path.rsplit_once('.') {
        Some((module, symbol)) if !module.is_empty() && !symbol.is_empty() => Ok((module, symbol)),
        _ => Err(ResolutionError::InvalidPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn shared_symbol_keeps_identity_across_modules() {
        let shared: Symbol = Arc::new(String::from("SQASampler"));
        let reexported = Arc::clone(&shared);

        let mut locator = ModuleLocator::new();
        locator
            .register("pkg.sampler", move || {
                let mut module = Module::new();
                module.insert_shared("SQASampler", Arc::clone(&shared));
                Ok(module)
            })
            .unwrap();
        locator
            .register("pkg.reexport", move || {
                let mut module = Module::new();
                module.insert_shared("Sampler", Arc::clone(&reexported));
                Ok(module)
            })
            .unwrap();

        let a = locator.resolve("pkg.sampler.SQASampler").unwrap();
        let b = locator.resolve("pkg.reexport.Sampler").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn module_dir_examples() {
        assert_eq!(module_dir_for("BigQuery"), "bigquery");
        assert_eq!(module_dir_for("my-source"), "my_source");
        assert_eq!(module_dir_for("Domo Database"), "domo_database");
        assert_eq!(module_dir_for("alation.sink"), "alation_sink");
        assert_eq!(module_dir_for("redshift"), "redshift");
    }

    #[test]
    fn module_dir_is_idempotent() {
        for input in ["BigQuery", "my-source", "a--b", "Mixed_Case-9", ""] {
            let once = module_dir_for(input);
            assert_eq!(module_dir_for(&once), once);
        }
    }

    #[test]
    fn split_paths() {
        assert_eq!(split_symbol_path("a.b.C").unwrap(), ("a.b", "C"));
        assert!(matches!(split_symbol_path("NoDots"), Err(ResolutionError::InvalidPath(_))));
        assert!(matches!(split_symbol_path("trailing."), Err(ResolutionError::InvalidPath(_))));
        assert!(matches!(split_symbol_path(".leading"), Err(ResolutionError::InvalidPath(_))));
    }

    #[test]
    fn register_rejects_duplicates_and_bad_paths() {
        let mut locator = ModuleLocator::new();
        locator.register("pkg.mod", || Ok(Module::new())).unwrap();

        assert_eq!(
            locator.register("pkg.mod", || Ok(Module::new())),
            Err(RegistryError::DuplicateModule("pkg.mod".to_string()))
        );
        assert!(matches!(
            locator.register("pkg..mod", || Ok(Module::new())),
            Err(RegistryError::InvalidModulePath(_))
        ));
        assert!(matches!(
            locator.register("", || Ok(Module::new())),
            Err(RegistryError::InvalidModulePath(_))
        ));
    }

    #[test]
    fn resolve_symbol() {
        let mut locator = ModuleLocator::new();
        locator
            .register("pkg.mod", || Ok(Module::new().with_symbol("Answer", 42u32)))
            .unwrap();

        let answer = locator.resolve_as::<u32>("pkg.mod.Answer").unwrap();
        assert_eq!(*answer, 42);
    }

    #[test]
    fn resolve_errors() {
        let mut locator = ModuleLocator::new();
        locator
            .register("pkg.mod", || Ok(Module::new().with_symbol("Answer", 42u32)))
            .unwrap();

        assert!(matches!(
            locator.resolve("pkg.other.Answer"),
            Err(ResolutionError::ModuleNotFound(m)) if m == "pkg.other"
        ));
        assert!(matches!(
            locator.resolve("pkg.mod.Question"),
            Err(ResolutionError::SymbolNotFound { symbol, .. }) if symbol == "Question"
        ));
        assert!(matches!(
            locator.resolve_as::<String>("pkg.mod.Answer"),
            Err(ResolutionError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn init_runs_once_and_identity_is_stable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut locator = ModuleLocator::new();
        locator
            .register("pkg.mod", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Module::new().with_symbol("Value", String::from("v")))
            })
            .unwrap();

        assert!(!locator.is_loaded("pkg.mod"));
        let first = locator.resolve("pkg.mod.Value").unwrap();
        let second = locator.resolve("pkg.mod.Value").unwrap();

        assert!(locator.is_loaded("pkg.mod"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_load_keeps_cause_and_is_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let mut locator = ModuleLocator::new();
        locator
            .register("pkg.broken", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("missing dependency: vendor-sdk".into())
            })
            .unwrap();

        let err = locator.resolve("pkg.broken.Thing").unwrap_err();
        match &err {
            ResolutionError::LoadFailed { module, source } => {
                assert_eq!(module, "pkg.broken");
                assert_eq!(source.to_string(), "missing dependency: vendor-sdk");
            }
            other => panic!("expected LoadFailed, got {:?}", other),
        }
        assert!(std::error::Error::source(&err).is_some());

        let _ = locator.resolve("pkg.broken.Thing");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!locator.is_loaded("pkg.broken"));
    }

    #[test]
    fn module_paths_are_sorted() {
        let mut locator = ModuleLocator::new();
        locator.register("b.mod", || Ok(Module::new())).unwrap();
        locator.register("a.mod", || Ok(Module::new())).unwrap();

        let paths: Vec<&str> = locator.module_paths().collect();
        assert_eq!(paths, vec!["a.mod", "b.mod"]);
    }

    #[test]
    fn locator_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ModuleLocator>();
    }
}
