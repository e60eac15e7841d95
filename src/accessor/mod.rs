//! Name-based access to module members.

mod accessor;

pub use accessor::{use_module, ModuleAccessor, Selection};
