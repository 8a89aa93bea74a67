//! The stores a registry is built on, shared with the sweeper thread

use std::sync::{Arc, Weak};
use std::thread::ThreadId;

use ctxmock_core::{ArgMatcher, ContextId, InvocationRecord, MockId, MockIdentity};
use ctxmock_storage::{IdentityCanonicalizer, InvocationLog, RuleStore, StateStore};
use dashmap::DashMap;

thread_local! {
    static THREAD_MARKER: Arc<()> = Arc::new(());
}

#[derive(Debug, Default)]
pub(crate) struct Stores {
    pub(crate) identities: IdentityCanonicalizer,
    pub(crate) rules: RuleStore,
    pub(crate) log: InvocationLog,
    pub(crate) states: StateStore,
    pub(crate) pending: DashMap<ThreadId, PendingStubbing>,
}

/// A stubbing expression opened by one thread and not yet closed
#[derive(Debug)]
pub(crate) struct PendingStubbing {
    pub(crate) identity: MockIdentity,
    pub(crate) context: ContextId,
    pub(crate) matchers: Option<Vec<ArgMatcher>>,
    pub(crate) captured: Option<Arc<InvocationRecord>>,
    owner: Weak<()>,
}

impl PendingStubbing {
    /// Expression owned by the calling thread
    pub(crate) fn open(identity: MockIdentity, context: ContextId) -> Self {
        Self {
            identity,
            context,
            matchers: None,
            captured: None,
            // Dead already if the thread is tearing down its locals
            owner: THREAD_MARKER
                .try_with(Arc::downgrade)
                .unwrap_or_default(),
        }
    }

    /// The opening thread is gone or the mock was dropped
    pub(crate) fn is_abandoned(&self) -> bool {
        self.owner.strong_count() == 0 || !self.identity.is_alive()
    }
}

/// What a targeted clear removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearedData {
    /// Stubbing rules removed
    pub rules: usize,
    /// Invocation records removed
    pub records: usize,
    /// State cells reset
    pub states: usize,
}

impl ClearedData {
    /// Check whether nothing was removed
    pub fn is_empty(&self) -> bool {
        self.rules == 0 && self.records == 0 && self.states == 0
    }
}

impl Stores {
    pub(crate) fn clear_mock(&self, mock: MockId) -> ClearedData {
        ClearedData {
            rules: self.rules.clear_mock(mock),
            records: self.log.clear_mock(mock),
            states: self.states.clear_mock(mock),
        }
    }

    pub(crate) fn clear_context(&self, context: Option<&ContextId>) -> ClearedData {
        ClearedData {
            rules: self.rules.clear_for_context(context),
            records: self.log.clear_for_context(context),
            states: self.states.clear_for_context(context),
        }
    }

    /// Drop expressions whose thread exited or whose mock was dropped
    pub(crate) fn drop_abandoned_stubbings(&self) -> usize {
        let mut removed = 0;
        self.pending.retain(|_, pending| {
            let abandoned = pending.is_abandoned();
            removed += usize::from(abandoned);
            !abandoned
        });
        removed
    }

    pub(crate) fn clear(&self) {
        self.pending.clear();
        self.rules.clear();
        self.log.clear();
        self.states.clear();
        self.identities.clear();
    }
}
