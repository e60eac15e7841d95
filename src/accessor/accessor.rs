use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::error::StoreError;
use crate::module::State;
use crate::runtime::Scope;
use crate::store::{ActionRecord, BoundAction, BoundMutation, ModuleInstance, Store, Subscription};

/// The requested members of a module, keyed by name.
///
/// Every requested key is present; members the module does not have map
/// to `None`.
pub type Selection<T> = BTreeMap<String, Option<T>>;

/// Read access to the modules of one store.
///
/// Each read takes a module name and the member names wanted, and
/// returns exactly those members. Unknown modules fail with
/// [`StoreError::ModuleNotFound`]; unknown members are `None`.
#[derive(Debug, Clone)]
pub struct ModuleAccessor {
    store: Store,
}

impl ModuleAccessor {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }

    /// The store this accessor reads from.
    pub fn store(&self) -> &Store {
        &self.store
    }

    fn module(&self, name: &str) -> Result<&ModuleInstance, StoreError> {
        self.store.module(name)
    }

    /// Current values of the requested state fields.
    pub fn states(&self, module: &str, keys: &[&str]) -> Result<Selection<Value>, StoreError> {
        let instance = self.module(module)?;
        Ok(instance.read(|state| select(keys, |key| state.get(key).cloned())))
    }

    /// Bound actions for the requested names.
    pub fn actions(
        &self,
        module: &str,
        keys: &[&str],
    ) -> Result<Selection<BoundAction>, StoreError> {
        let instance = self.module(module)?;
        Ok(select(keys, |key| instance.action(key).cloned()))
    }

    /// Bound direct-commit mutations for the requested names.
    pub fn mutations(
        &self,
        module: &str,
        keys: &[&str],
    ) -> Result<Selection<BoundMutation>, StoreError> {
        let instance = self.module(module)?;
        Ok(select(keys, |key| instance.mutation(key).cloned()))
    }

    /// Values of the requested getters, evaluated now.
    pub fn getters(&self, module: &str, keys: &[&str]) -> Result<Selection<Value>, StoreError> {
        let instance = self.module(module)?;
        Ok(select(keys, |key| instance.getter(key).map(|getter| getter.get())))
    }

    /// The module's whole current state.
    pub fn state(&self, module: &str) -> Result<Arc<State>, StoreError> {
        Ok(self.module(module)?.state())
    }

    pub fn commit(&self, module: &str, kind: &str, payload: Value) -> Result<(), StoreError> {
        self.module(module)?.commit(kind, payload)
    }

    pub fn dispatch(&self, module: &str, record: ActionRecord) -> Result<(), StoreError> {
        self.module(module)?.dispatch(record)
    }

    /// Call `callback` with the module's new state after commits.
    ///
    /// See [`ModuleInstance::subscribe`] for delivery order.
    pub fn subscribe<F>(&self, module: &str, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        Ok(self.module(module)?.subscribe(callback))
    }

    /// Registered module names, sorted.
    pub fn modules(&self) -> Vec<&str> {
        self.store.modules()
    }
}

fn select<T>(keys: &[&str], mut lookup: impl FnMut(&str) -> Option<T>) -> Selection<T> {
    keys.iter()
        .map(|key| (key.to_string(), lookup(*key)))
        .collect()
}

/// Accessor for the innermost store provided on this thread.
///
/// Fails with [`StoreError::OutsideScope`] when called outside
/// [`Store::provide`] or [`StoreFactory::scope`](crate::StoreFactory::scope).
///
/// # Examples
///
/// ```
/// use modstore::{use_module, ModuleDefinition, Store, StoreError};
///
/// assert_eq!(use_module().unwrap_err(), StoreError::OutsideScope);
///
/// let store = Store::new([ModuleDefinition::new("session")]);
/// store.provide(|| {
///     let modules = use_module().unwrap();
///     assert_eq!(modules.modules(), vec!["session"]);
/// });
/// ```
pub fn use_module() -> Result<ModuleAccessor, StoreError> {
    Scope::current()
        .map(ModuleAccessor::new)
        .ok_or(StoreError::OutsideScope)
}
