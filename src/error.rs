//! Error types for store construction, dispatch and access.

use thiserror::Error;

/// Errors reported by stores, module instances and accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No store has been provided on the current thread.
    #[error("accessor used outside an active scope")]
    OutsideScope,

    /// The requested module is not registered in the active store.
    #[error("Module '{module}' not found")]
    ModuleNotFound { module: String },

    /// The module's store has been disposed.
    #[error("Module '{module}' belongs to a disposed store")]
    Disposed { module: String },

    /// Two definitions share a name (strict mode only).
    #[error("Module '{module}' is defined more than once")]
    DuplicateModule { module: String },

    /// A dispatched kind has no matching mutation (strict mode only).
    #[error("Module '{module}' has no mutation '{kind}'")]
    UnknownMutation { module: String, kind: String },

    /// Initial state was not a JSON object.
    #[error("Initial state of module '{module}' must be an object, found {found}")]
    InvalidState { module: String, found: String },

    /// Failure reported by an action body.
    #[error("Action '{action}' of module '{module}' failed: {message}")]
    Action {
        module: String,
        action: String,
        message: String,
    },
}

impl StoreError {
    /// Name of the module the error refers to, if any.
    pub fn module(&self) -> Option<&str> {
        match self {
            StoreError::OutsideScope => None,
            StoreError::ModuleNotFound { module }
            | StoreError::Disposed { module }
            | StoreError::DuplicateModule { module }
            | StoreError::UnknownMutation { module, .. }
            | StoreError::InvalidState { module, .. }
            | StoreError::Action { module, .. } => Some(module),
        }
    }
}
