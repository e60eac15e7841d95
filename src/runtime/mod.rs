//! Runtime support for scoped stores.
//!
//! This module provides the thread-local stack that lets nested code
//! resolve the nearest provided store.

mod context;

pub(crate) use context::Scope;
