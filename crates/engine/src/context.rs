//! Where the current context comes from
//!
//! The registry never guesses a context; callers pass one explicitly or bind
//! a [`ContextSource`] through an [`Interceptor`](crate::Interceptor).
//! [`ThreadContext`] is the usual source: a per-thread stack of contexts
//! entered with RAII guards, so nested scopes restore the outer context on
//! exit.

use std::cell::RefCell;
use std::marker::PhantomData;

use ctxmock_core::ContextId;

/// Supplies the context an intercepted call is made under
pub trait ContextSource: Send + Sync {
    /// Context for the calling thread, if any
    fn current_context(&self) -> Option<ContextId>;
}

impl<F> ContextSource for F
where
    F: Fn() -> Option<ContextId> + Send + Sync,
{
    fn current_context(&self) -> Option<ContextId> {
        self()
    }
}

/// A source that always yields the same context
#[derive(Debug, Clone, Default)]
pub struct FixedContext(pub Option<ContextId>);

impl ContextSource for FixedContext {
    fn current_context(&self) -> Option<ContextId> {
        self.0.clone()
    }
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextId>> = RefCell::new(Vec::new());
}

/// Per-thread context stack
///
/// ```
/// use ctxmock_engine::{ContextSource, ThreadContext};
///
/// assert!(ThreadContext.current_context().is_none());
/// {
///     let _tenant = ThreadContext::enter("tenant-a");
///     assert_eq!(ThreadContext::current().unwrap().as_str(), "tenant-a");
/// }
/// assert!(ThreadContext::current().is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadContext;

impl ThreadContext {
    /// Make `context` current on this thread until the guard drops
    pub fn enter(context: impl Into<ContextId>) -> ContextGuard {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(context.into()));
        ContextGuard {
            _not_send: PhantomData,
        }
    }

    /// Innermost context entered on this thread
    pub fn current() -> Option<ContextId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
    }

    /// Number of contexts entered on this thread
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl ContextSource for ThreadContext {
    fn current_context(&self) -> Option<ContextId> {
        Self::current()
    }
}

/// Leaves the entered context when dropped
///
/// Bound to the thread that created it.
#[must_use = "the context is left as soon as the guard is dropped"]
pub struct ContextGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

impl std::fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextGuard")
            .field("current", &ThreadContext::current())
            .finish()
    }
}
