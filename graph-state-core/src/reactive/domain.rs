//! Graph Domain
//!
//! A domain makes a store implicitly available to code running on the current
//! thread. Entering pushes the store onto a thread-local stack; the returned
//! guard pops it again. Domains nest, and the innermost one wins.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::store::Store;
use crate::error::GraphError;

thread_local! {
    static DOMAIN_STACK: RefCell<Vec<Store>> = const { RefCell::new(Vec::new()) };
}

/// Scoped access to the active store.
pub struct GraphDomain;

impl GraphDomain {
    /// Make `store` the active store until the guard is dropped.
    pub fn enter(store: &Store) -> DomainGuard {
        DOMAIN_STACK.with(|stack| stack.borrow_mut().push(store.clone()));
        DomainGuard {
            depth: Self::depth(),
            _not_send: PhantomData,
        }
    }

    /// Run `f` with `store` active.
    pub fn scope<R>(store: &Store, f: impl FnOnce() -> R) -> R {
        let _guard = Self::enter(store);
        f()
    }

    /// The innermost active store.
    pub fn current() -> Result<Store, GraphError> {
        DOMAIN_STACK.with(|stack| stack.borrow().last().cloned().ok_or(GraphError::OutOfDomain))
    }

    pub fn is_active() -> bool {
        Self::depth() > 0
    }

    fn depth() -> usize {
        DOMAIN_STACK.with(|stack| stack.borrow().len())
    }
}

/// Guard returned by [`GraphDomain::enter`]. Pinned to the thread that
/// entered the domain.
#[must_use = "the domain is exited as soon as the guard is dropped"]
pub struct DomainGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for DomainGuard {
    fn drop(&mut self) {
        DOMAIN_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "graph domains exited out of order");
            stack.pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_fails_outside_domain() {
        assert!(!GraphDomain::is_active());
        assert!(matches!(GraphDomain::current(), Err(GraphError::OutOfDomain)));
    }

    #[test]
    fn domains_nest() {
        let outer = Store::new();
        let inner = Store::new();

        let _outer_guard = GraphDomain::enter(&outer);
        assert!(GraphDomain::current().unwrap().same_store(&outer));

        GraphDomain::scope(&inner, || {
            assert!(GraphDomain::current().unwrap().same_store(&inner));
        });

        assert!(GraphDomain::current().unwrap().same_store(&outer));
    }

    #[test]
    fn domain_is_thread_local() {
        let store = Store::new();
        let _guard = GraphDomain::enter(&store);

        let seen = std::thread::spawn(GraphDomain::is_active).join().unwrap();
        assert!(!seen);
    }
}
