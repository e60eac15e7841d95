use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::ActionContext;

/// A module's state record.
pub type State = Map<String, Value>;

/// Edits a draft copy of the state in place.
pub type Mutation = Arc<dyn Fn(&mut State, Value) + Send + Sync>;

/// Runs against an [`ActionContext`], committing mutations as it goes.
pub type Action = Arc<dyn Fn(&ActionContext, Value) -> Result<(), StoreError> + Send + Sync>;

/// Derives a value from the current state.
pub type Getter = Arc<dyn Fn(&State) -> Value + Send + Sync>;

/// Declarative description of a store module.
///
/// A definition is plain data: a name, an initial state record and three
/// maps of handlers. Handlers are reference counted, so cloning a
/// definition is cheap and every store built from it shares the same
/// functions while owning independent state.
///
/// # Examples
///
/// ```
/// use modstore::ModuleDefinition;
/// use serde_json::json;
///
/// let counter = ModuleDefinition::new("counter")
///     .state("count", 0)
///     .mutation("increment", |state, by| {
///         let count = state["count"].as_i64().unwrap_or(0);
///         state.insert("count".into(), json!(count + by.as_i64().unwrap_or(1)));
///     })
///     .getter("doubled", |state| json!(state["count"].as_i64().unwrap_or(0) * 2));
///
/// assert_eq!(counter.name(), "counter");
/// assert!(counter.has_mutation("increment"));
/// ```
#[derive(Clone)]
pub struct ModuleDefinition {
    name: String,
    states: State,
    mutations: HashMap<String, Mutation>,
    actions: HashMap<String, Action>,
    getters: HashMap<String, Getter>,
}

impl ModuleDefinition {
    /// Create an empty module definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: State::new(),
            mutations: HashMap::new(),
            actions: HashMap::new(),
            getters: HashMap::new(),
        }
    }

    /// Set one field of the initial state.
    pub fn state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.states.insert(key.into(), value.into());
        self
    }

    /// Replace the whole initial state.
    pub fn states(mut self, states: State) -> Self {
        self.states = states;
        self
    }

    /// Replace the initial state with a JSON object.
    ///
    /// Fails with [`StoreError::InvalidState`] if `value` is not an object.
    pub fn states_from_json(self, value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(states) => Ok(self.states(states)),
            other => Err(StoreError::InvalidState {
                module: self.name,
                found: json_kind(&other).to_string(),
            }),
        }
    }

    /// Register a mutation.
    ///
    /// # Deadlocks
    ///
    /// The mutation runs while its module's state is locked. A mutation
    /// body must not call back into the store (read the same module,
    /// commit, or evaluate its getters), or it will deadlock.
    pub fn mutation<F>(mut self, name: impl Into<String>, mutation: F) -> Self
    where
        F: Fn(&mut State, Value) + Send + Sync + 'static,
    {
        self.mutations.insert(name.into(), Arc::new(mutation));
        self
    }

    /// Register an action.
    ///
    /// Long-running actions clone the context into a thread or task and
    /// return immediately; the store never waits on them.
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&ActionContext, Value) -> Result<(), StoreError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    /// Register a getter.
    pub fn getter<F>(mut self, name: impl Into<String>, getter: F) -> Self
    where
        F: Fn(&State) -> Value + Send + Sync + 'static,
    {
        self.getters.insert(name.into(), Arc::new(getter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn initial_state(&self) -> &State {
        &self.states
    }

    pub fn has_mutation(&self, name: &str) -> bool {
        self.mutations.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_getter(&self, name: &str) -> bool {
        self.getters.contains_key(name)
    }

    pub(crate) fn mutations(&self) -> &HashMap<String, Mutation> {
        &self.mutations
    }

    pub(crate) fn actions(&self) -> &HashMap<String, Action> {
        &self.actions
    }

    pub(crate) fn getters(&self) -> &HashMap<String, Getter> {
        &self.getters
    }
}

impl fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("name", &self.name)
            .field("states", &self.states)
            .field("mutations", &sorted_keys(&self.mutations))
            .field("actions", &sorted_keys(&self.actions))
            .field("getters", &sorted_keys(&self.getters))
            .finish()
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
    keys.sort_unstable();
    keys
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
