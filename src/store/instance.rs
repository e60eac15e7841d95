use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::trace;

use super::cell::{StateCell, Subscription};
use crate::error::StoreError;
use crate::module::{Action, Getter, ModuleDefinition, State};

/// A `{kind, payload}` pair routed to a module's reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRecord {
    pub kind: String,
    pub payload: Value,
}

impl ActionRecord {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

/// Handle given to actions.
///
/// The context reads and writes the live cell, so a clone moved into a
/// background thread always sees the latest state. Once the owning store
/// is disposed every write fails with [`StoreError::Disposed`].
#[derive(Clone)]
pub struct ActionContext {
    cell: Arc<StateCell>,
}

impl ActionContext {
    pub fn module(&self) -> &str {
        self.cell.module()
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<State> {
        self.cell.snapshot()
    }

    /// Commit a mutation by name.
    pub fn commit(&self, kind: impl Into<String>, payload: Value) -> Result<(), StoreError> {
        self.cell.dispatch(ActionRecord::new(kind, payload))
    }

    /// Dispatch a raw record.
    pub fn dispatch(&self, record: ActionRecord) -> Result<(), StoreError> {
        self.cell.dispatch(record)
    }

    /// Whether the owning store is still live.
    pub fn is_alive(&self) -> bool {
        self.cell.is_alive()
    }

    /// Build an [`StoreError::Action`] for this module.
    pub fn fail(&self, action: impl Into<String>, message: impl Into<String>) -> StoreError {
        StoreError::Action {
            module: self.cell.module().to_string(),
            action: action.into(),
            message: message.into(),
        }
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("module", &self.cell.module())
            .field("alive", &self.cell.is_alive())
            .finish()
    }
}

/// An action bound to its module's context.
#[derive(Clone)]
pub struct BoundAction {
    name: String,
    action: Action,
    context: ActionContext,
}

impl BoundAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the action with `payload`.
    ///
    /// Returns as soon as the action body does; work the action hands off
    /// to another thread is not awaited.
    pub fn call(&self, payload: Value) -> Result<(), StoreError> {
        trace!(module = %self.context.module(), action = %self.name, "running action");
        (self.action)(&self.context, payload)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundAction")
            .field("module", &self.context.module())
            .field("name", &self.name)
            .finish()
    }
}

/// A getter evaluated against the live state on every call.
#[derive(Clone)]
pub struct BoundGetter {
    name: String,
    getter: Getter,
    cell: Arc<StateCell>,
}

impl BoundGetter {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self) -> Value {
        let state = self.cell.snapshot();
        (self.getter)(&state)
    }
}

impl fmt::Debug for BoundGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundGetter")
            .field("module", &self.cell.module())
            .field("name", &self.name)
            .finish()
    }
}

/// A mutation exposed as a direct commit.
#[derive(Clone)]
pub struct BoundMutation {
    name: String,
    cell: Arc<StateCell>,
}

impl BoundMutation {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Commit this mutation with `payload`.
    pub fn call(&self, payload: Value) -> Result<(), StoreError> {
        self.cell.dispatch(ActionRecord::new(self.name.clone(), payload))
    }
}

impl fmt::Debug for BoundMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMutation")
            .field("module", &self.cell.module())
            .field("name", &self.name)
            .finish()
    }
}

/// Runtime form of a [`ModuleDefinition`] inside one store.
pub struct ModuleInstance {
    cell: Arc<StateCell>,
    actions: HashMap<String, BoundAction>,
    getters: HashMap<String, BoundGetter>,
    mutations: HashMap<String, BoundMutation>,
}

impl ModuleInstance {
    pub(crate) fn bind(definition: &ModuleDefinition, strict: bool) -> Self {
        let cell = StateCell::new(definition, strict);
        let context = ActionContext {
            cell: Arc::clone(&cell),
        };

        let actions = definition
            .actions()
            .iter()
            .map(|(name, action)| {
                let bound = BoundAction {
                    name: name.clone(),
                    action: Arc::clone(action),
                    context: context.clone(),
                };
                (name.clone(), bound)
            })
            .collect();

        let getters = definition
            .getters()
            .iter()
            .map(|(name, getter)| {
                let bound = BoundGetter {
                    name: name.clone(),
                    getter: Arc::clone(getter),
                    cell: Arc::clone(&cell),
                };
                (name.clone(), bound)
            })
            .collect();

        let mutations = definition
            .mutations()
            .keys()
            .map(|name| {
                let bound = BoundMutation {
                    name: name.clone(),
                    cell: Arc::clone(&cell),
                };
                (name.clone(), bound)
            })
            .collect();

        Self {
            cell,
            actions,
            getters,
            mutations,
        }
    }

    pub fn name(&self) -> &str {
        self.cell.module()
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<State> {
        self.cell.snapshot()
    }

    /// Read state without cloning the snapshot handle.
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&State) -> R,
    {
        self.cell.read(f)
    }

    pub fn dispatch(&self, record: ActionRecord) -> Result<(), StoreError> {
        self.cell.dispatch(record)
    }

    pub fn commit(&self, kind: impl Into<String>, payload: Value) -> Result<(), StoreError> {
        self.cell.dispatch(ActionRecord::new(kind, payload))
    }

    pub fn action(&self, name: &str) -> Option<&BoundAction> {
        self.actions.get(name)
    }

    pub fn getter(&self, name: &str) -> Option<&BoundGetter> {
        self.getters.get(name)
    }

    pub fn mutation(&self, name: &str) -> Option<&BoundMutation> {
        self.mutations.get(name)
    }

    /// A context equivalent to the one bound actions receive.
    pub fn context(&self) -> ActionContext {
        ActionContext {
            cell: Arc::clone(&self.cell),
        }
    }

    /// Call `callback` with the new state after committed transitions.
    ///
    /// Callbacks see states in commit order and always receive the latest
    /// one last; when commits race, intermediate states may be skipped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        self.cell.subscribe(callback)
    }

    pub(crate) fn dispose(&self) {
        self.cell.dispose();
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
