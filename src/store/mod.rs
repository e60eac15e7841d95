//! Module stores.
//!
//! A store binds a set of module definitions into live instances: one
//! state cell per module, plus bound actions, getters and mutations that
//! all operate on that cell.

mod cell;
mod instance;
mod store;

pub use cell::Subscription;
pub use instance::{
    ActionContext, ActionRecord, BoundAction, BoundGetter, BoundMutation, ModuleInstance,
};
pub use store::{build, Store, StoreBuilder, StoreFactory, StoreOptions};
