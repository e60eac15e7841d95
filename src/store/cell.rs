use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tracing::{trace, warn};

use super::instance::ActionRecord;
use crate::error::StoreError;
use crate::module::{ModuleDefinition, Mutation, State};

type Subscriber = Arc<dyn Fn(&State) + Send + Sync>;

/// Live, reducer-driven state of one module.
///
/// Every transition installs a fresh snapshot; the previous snapshot is
/// never edited, so `Arc::ptr_eq` tells whether anything changed.
///
/// Each installed snapshot gets a version. Only one thread delivers to
/// subscribers at a time, and it keeps delivering until the newest
/// version has gone out, so subscribers see versions in increasing order
/// and always end on the latest one. Intermediate versions may be skipped.
pub(crate) struct StateCell {
    module: String,
    mutations: HashMap<String, Mutation>,
    strict: bool,
    state: RwLock<Arc<State>>,
    // Written only while `state` is write-locked.
    version: AtomicU64,
    delivered: AtomicU64,
    delivering: Mutex<()>,
    subscribers: RwLock<Vec<(usize, Subscriber)>>,
    next_subscriber: AtomicUsize,
    alive: AtomicBool,
}

impl StateCell {
    pub(crate) fn new(definition: &ModuleDefinition, strict: bool) -> Arc<Self> {
        Arc::new(Self {
            module: definition.name().to_string(),
            mutations: definition.mutations().clone(),
            strict,
            state: RwLock::new(Arc::new(definition.initial_state().clone())),
            version: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            delivering: Mutex::new(()),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        })
    }

    pub(crate) fn module(&self) -> &str {
        &self.module
    }

    /// Current snapshot.
    pub(crate) fn snapshot(&self) -> Arc<State> {
        Arc::clone(&self.state.read())
    }

    /// Read state without cloning the snapshot handle.
    pub(crate) fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&State) -> R,
    {
        let state = self.state.read();
        f(&state)
    }

    /// Run the reducer for one record.
    ///
    /// Unknown kinds leave the snapshot in place unless the cell is strict.
    pub(crate) fn dispatch(&self, record: ActionRecord) -> Result<(), StoreError> {
        {
            let mut state = self.state.write();

            if !self.is_alive() {
                warn!(module = %self.module, kind = %record.kind, "dispatch after dispose");
                return Err(StoreError::Disposed {
                    module: self.module.clone(),
                });
            }

            let Some(mutation) = self.mutations.get(&record.kind) else {
                if self.strict {
                    return Err(StoreError::UnknownMutation {
                        module: self.module.clone(),
                        kind: record.kind,
                    });
                }
                trace!(module = %self.module, kind = %record.kind, "no mutation for kind, ignoring");
                return Ok(());
            };

            let mut draft = State::clone(&state);
            mutation(&mut draft, record.payload);
            *state = Arc::new(draft);
            self.version.fetch_add(1, Ordering::SeqCst);
        }

        trace!(module = %self.module, kind = %record.kind, "state committed");
        self.notify();
        Ok(())
    }

    /// Register a callback run after every committed transition.
    pub(crate) fn subscribe<F>(self: &Arc<Self>, callback: F) -> Subscription
    where
        F: Fn(&State) + Send + Sync + 'static,
    {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().push((id, Arc::new(callback)));

        Subscription {
            entries: vec![(Arc::downgrade(self), id)],
        }
    }

    fn unsubscribe(&self, id: usize) {
        self.subscribers.write().retain(|(entry, _)| *entry != id);
    }

    fn latest(&self) -> (u64, Arc<State>) {
        let state = self.state.read();
        (self.version.load(Ordering::SeqCst), Arc::clone(&state))
    }

    // Subscribers run outside the state lock so they may read or commit
    // again. A commit that finds delivery busy (on this thread or another)
    // leaves its version to the thread already delivering.
    fn notify(&self) {
        loop {
            let Some(guard) = self.delivering.try_lock() else {
                return;
            };

            loop {
                let (version, state) = self.latest();
                if version <= self.delivered.load(Ordering::SeqCst) {
                    break;
                }
                self.delivered.store(version, Ordering::SeqCst);

                let subscribers: Vec<Subscriber> = self
                    .subscribers
                    .read()
                    .iter()
                    .map(|(_, subscriber)| Arc::clone(subscriber))
                    .collect();

                for subscriber in subscribers {
                    subscriber(&state);
                }
            }

            drop(guard);

            // A commit may have landed between the last check and unlocking.
            if self.version.load(Ordering::SeqCst) <= self.delivered.load(Ordering::SeqCst) {
                return;
            }
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop accepting transitions and drop every subscriber.
    ///
    /// Waits for a transition already in progress, so the state is final
    /// once this returns.
    pub(crate) fn dispose(&self) {
        {
            let _state = self.state.write();
            self.alive.store(false, Ordering::SeqCst);
        }
        self.subscribers.write().clear();
    }
}

/// RAII guard for state subscriptions.
///
/// Dropping the guard unregisters its callbacks.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    entries: Vec<(Weak<StateCell>, usize)>,
}

impl Subscription {
    pub(crate) fn merge(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut entries = Vec::new();
        for mut subscription in subscriptions {
            entries.append(&mut subscription.entries);
        }
        Self { entries }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for (cell, id) in self.entries.drain(..) {
            if let Some(cell) = cell.upgrade() {
                cell.unsubscribe(id);
            }
        }
    }
}
