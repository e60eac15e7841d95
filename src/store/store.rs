use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::cell::Subscription;
use super::instance::ModuleInstance;
use crate::accessor::ModuleAccessor;
use crate::error::StoreError;
use crate::module::{ModuleDefinition, State};
use crate::runtime::Scope;

/// Store construction options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreOptions {
    /// Reject duplicate module names and commits of unknown mutation kinds.
    ///
    /// Off by default: duplicates overwrite earlier modules and unknown
    /// kinds are ignored, so one kind can be broadcast to several modules.
    pub strict: bool,
}

/// Builder for [`Store`] with non-default options.
#[derive(Debug, Default)]
pub struct StoreBuilder {
    modules: Vec<ModuleDefinition>,
    options: StoreOptions,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(mut self, definition: ModuleDefinition) -> Self {
        self.modules.push(definition);
        self
    }

    pub fn modules(mut self, definitions: impl IntoIterator<Item = ModuleDefinition>) -> Self {
        self.modules.extend(definitions);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.options.strict = strict;
        self
    }

    pub fn options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Bind every module into a new store.
    ///
    /// Only fails in strict mode, on a duplicate module name.
    pub fn build(self) -> Result<Store, StoreError> {
        Store::assemble(&self.modules, self.options)
    }
}

struct StoreInner {
    registry: HashMap<String, ModuleInstance>,
    disposed: AtomicBool,
}

impl StoreInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        for instance in self.registry.values() {
            instance.dispose();
        }
        debug!(modules = self.registry.len(), "store disposed");
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A registry of live module instances.
///
/// Cloning a store clones the handle, not the state. The store is torn
/// down by [`Store::dispose`] or when the last handle is dropped; after
/// that every read through the store fails and every commit, including
/// those from actions still running elsewhere, fails with
/// [`StoreError::Disposed`].
///
/// # Examples
///
/// ```
/// use modstore::{ModuleDefinition, Store};
/// use serde_json::json;
///
/// let store = Store::new([ModuleDefinition::new("counter")
///     .state("count", 0)
///     .mutation("increment", |state, by| {
///         let count = state["count"].as_i64().unwrap_or(0);
///         state.insert("count".into(), json!(count + by.as_i64().unwrap_or(1)));
///     })]);
///
/// let counter = store.module("counter").unwrap();
/// counter.commit("increment", json!(5)).unwrap();
/// counter.commit("increment", json!(-2)).unwrap();
///
/// let slice = store.accessor().states("counter", &["count"]).unwrap();
/// assert_eq!(slice["count"], Some(json!(3)));
/// ```
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

impl Store {
    /// Build a permissive store from `modules`.
    ///
    /// A later definition with an already used name replaces the earlier one.
    pub fn new(modules: impl IntoIterator<Item = ModuleDefinition>) -> Self {
        let modules: Vec<ModuleDefinition> = modules.into_iter().collect();
        let (registry, _) = bind_all(&modules, false);
        Self::from_registry(registry)
    }

    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    fn assemble(modules: &[ModuleDefinition], options: StoreOptions) -> Result<Self, StoreError> {
        let (registry, duplicates) = bind_all(modules, options.strict);
        if options.strict {
            if let Some(module) = duplicates.into_iter().next() {
                return Err(StoreError::DuplicateModule { module });
            }
        }
        Ok(Self::from_registry(registry))
    }

    fn from_registry(registry: HashMap<String, ModuleInstance>) -> Self {
        debug!(modules = registry.len(), "store built");
        Self {
            inner: Arc::new(StoreInner {
                registry,
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Look up a module instance.
    pub fn module(&self, name: &str) -> Result<&ModuleInstance, StoreError> {
        if self.is_disposed() {
            return Err(StoreError::Disposed {
                module: name.to_string(),
            });
        }
        self.inner
            .registry
            .get(name)
            .ok_or_else(|| StoreError::ModuleNotFound {
                module: name.to_string(),
            })
    }

    /// Registered module names, sorted.
    pub fn modules(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.registry.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// An accessor reading from this store.
    pub fn accessor(&self) -> ModuleAccessor {
        ModuleAccessor::new(self.clone())
    }

    /// Run `f` with this store as the innermost provided store, so that
    /// [`use_module`](crate::use_module) resolves to it.
    pub fn provide<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        Scope::enter(self.clone(), f)
    }

    /// Call `callback` with the module name and new state after any
    /// module commits.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&str, &State) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        Subscription::merge(self.inner.registry.values().map(|instance| {
            let callback = Arc::clone(&callback);
            let module = instance.name().to_string();
            instance.subscribe(move |state| callback(&module, state))
        }))
    }

    /// Tear down every module. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Whether both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("modules", &self.modules())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn bind_all(
    modules: &[ModuleDefinition],
    strict: bool,
) -> (HashMap<String, ModuleInstance>, Vec<String>) {
    let mut registry = HashMap::with_capacity(modules.len());
    let mut duplicates = Vec::new();

    for definition in modules {
        let instance = ModuleInstance::bind(definition, strict);
        if let Some(previous) = registry.insert(definition.name().to_string(), instance) {
            if !strict {
                warn!(module = %definition.name(), "duplicate module name, later definition wins");
            }
            previous.dispose();
            duplicates.push(definition.name().to_string());
        }
    }

    (registry, duplicates)
}

/// Builds a fresh store for every activation.
///
/// # Examples
///
/// ```
/// use modstore::{build, use_module, ModuleDefinition};
/// use serde_json::json;
///
/// let factory = build([ModuleDefinition::new("user").state("name", "ada")]);
///
/// let name = factory
///     .scope(|_| {
///         let modules = use_module().unwrap();
///         modules.states("user", &["name"]).unwrap()["name"].clone()
///     })
///     .unwrap();
///
/// assert_eq!(name, Some(json!("ada")));
/// ```
#[derive(Debug, Clone)]
pub struct StoreFactory {
    modules: Arc<[ModuleDefinition]>,
    options: StoreOptions,
}

impl StoreFactory {
    pub fn new(modules: impl IntoIterator<Item = ModuleDefinition>) -> Self {
        Self {
            modules: modules.into_iter().collect(),
            options: StoreOptions::default(),
        }
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a long-lived store.
    pub fn build(&self) -> Result<Store, StoreError> {
        Store::assemble(&self.modules, self.options)
    }

    /// Activate a fresh store for the duration of `body`.
    ///
    /// The store is provided to `body` (see [`Store::provide`]) and
    /// disposed when `body` returns or panics, even if `body` kept a
    /// clone of it.
    pub fn scope<F, R>(&self, body: F) -> Result<R, StoreError>
    where
        F: FnOnce(&ModuleAccessor) -> R,
    {
        let store = scopeguard::guard(self.build()?, |store| store.dispose());
        let accessor = store.accessor();
        Ok(store.provide(|| body(&accessor)))
    }
}

/// Shorthand for [`StoreFactory::new`].
pub fn build(modules: impl IntoIterator<Item = ModuleDefinition>) -> StoreFactory {
    StoreFactory::new(modules)
}
