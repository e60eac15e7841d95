use std::cell::RefCell;

use tracing::debug;

use crate::store::Store;

// Thread-local stack of provided stores, innermost last.
thread_local! {
    static SCOPE_STACK: RefCell<Vec<Store>> = const { RefCell::new(Vec::new()) };
}

/// Scoped store propagation.
///
/// Code running inside [`Scope::enter`] can find the store without it
/// being passed down explicitly. Scopes nest: the innermost store wins.
/// The stack is per thread, so work moved to another thread must carry
/// its own [`Store`] handle or accessor.
pub(crate) struct Scope;

impl Scope {
    /// Run `f` with `store` as the innermost provided store.
    ///
    /// The store is popped again even if `f` panics.
    pub(crate) fn enter<F, R>(store: Store, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let depth = SCOPE_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(store);
            stack.len()
        });
        debug!(depth, "store scope entered");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
        debug!(depth, "store scope left");

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// The innermost provided store on this thread, if any.
    pub(crate) fn current() -> Option<Store> {
        SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of stores currently provided on this thread.
    #[cfg(test)]
    pub(crate) fn depth() -> usize {
        SCOPE_STACK.with(|stack| stack.borrow().len())
    }
}
