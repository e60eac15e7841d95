//! # Modstore
//!
//! Module-based state containers for Rust.
//!
//! State is organised into named modules. Each module is declared as
//! plain data and bound into a live [`Store`]:
//!
//! ## Modules (Declarations)
//!
//! - `states` - The initial state record
//! - `mutations` - Synchronous edits applied to a copy of the state
//! - `actions` - Logic that commits mutations, possibly from another thread
//! - `getters` - Values derived from the current state on every read
//!
//! ## Stores (Runtime)
//!
//! - [`Store`] - Registry of live module instances with explicit teardown
//! - [`StoreFactory`] - Builds a fresh store per activation scope
//! - [`ModuleAccessor`] - Reads named slices of state, actions, mutations
//!   and getter values
//! - [`use_module`] - Resolves the innermost store provided on this thread
//!
//! ```
//! use modstore::{build, ModuleDefinition};
//! use serde_json::json;
//!
//! let cart = ModuleDefinition::new("cart")
//!     .state("items", json!([]))
//!     .mutation("add", |state, item| {
//!         if let Some(items) = state.get_mut("items").and_then(|v| v.as_array_mut()) {
//!             items.push(item);
//!         }
//!     })
//!     .getter("total", |state| {
//!         let items = state["items"].as_array().cloned().unwrap_or_default();
//!         json!(items.iter().filter_map(|i| i["price"].as_i64()).sum::<i64>())
//!     });
//!
//! let total = build([cart])
//!     .scope(|modules| {
//!         modules.commit("cart", "add", json!({"price": 10})).unwrap();
//!         modules.commit("cart", "add", json!({"price": 5})).unwrap();
//!         modules.getters("cart", &["total"]).unwrap()
//!     })
//!     .unwrap();
//!
//! assert_eq!(total["total"], Some(json!(15)));
//! ```

pub mod accessor;
pub mod error;
pub mod module;
mod runtime;
pub mod store;

// Re-export main types for convenience
pub use accessor::{use_module, ModuleAccessor, Selection};
pub use error::StoreError;
pub use module::{ModuleDefinition, State};
pub use store::{
    build, ActionContext, ActionRecord, BoundAction, BoundGetter, BoundMutation, ModuleInstance,
    Store, StoreBuilder, StoreFactory, StoreOptions, Subscription,
};
