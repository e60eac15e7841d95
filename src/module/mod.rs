//! Declarative module definitions.
//!
//! A module bundles an initial state record with the mutations, actions
//! and getters that operate on it. Definitions are inert until a store
//! binds them.

mod definition;

pub use definition::{Action, Getter, ModuleDefinition, Mutation, State};
