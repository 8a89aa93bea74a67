//! Partition keys
//!
//! Rules, records and states are all filed under a (mock, context) pair.
//! Partitioning first by mock id and then by context is what lets two callers
//! share one mock without seeing each other's stubs, history or state.

use std::fmt;
use std::hash::BuildHasherDefault;

use ctxmock_core::{ContextId, MockId, MockIdentity};
use dashmap::DashMap;
use rustc_hash::FxHasher;

/// DashMap using FxHash: sharded locking, fast non-crypto hashing
pub(crate) type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;

pub(crate) fn fx_dashmap<K, V>() -> FxDashMap<K, V>
where
    K: Eq + std::hash::Hash,
{
    DashMap::with_hasher(BuildHasherDefault::default())
}

/// (mock, context) partition key
///
/// `context: None` is the "no context" partition; it is distinct from every
/// named context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Mock identity id
    pub mock: MockId,
    /// Context, if any
    pub context: Option<ContextId>,
}

impl PartitionKey {
    /// Key for `identity` under `context`
    pub fn new(identity: &MockIdentity, context: Option<&ContextId>) -> Self {
        Self {
            mock: identity.id(),
            context: context.cloned(),
        }
    }

    /// Check whether this key belongs to `context`
    #[inline]
    pub fn is_context(&self, context: Option<&ContextId>) -> bool {
        self.context.as_ref() == context
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.context {
            Some(ctx) => write!(f, "mock#{}@{}", self.mock, ctx),
            None => write!(f, "mock#{}@<none>", self.mock),
        }
    }
}
