//! Rule store: per-partition LIFO stubbing rules
//!
//! # Design
//!
//! - DashMap keyed by (mock, context): partitions never contend with each
//!   other beyond shard hashing
//! - Each partition keeps its rules newest-first in a `VecDeque`, so
//!   `add_rule` is an O(1) `push_front` and a head-to-tail scan visits the
//!   most recently stubbed rule first
//! - Rules are published as `Arc<StubbingRule>`: a reader sees a rule fully
//!   formed or not at all
//!
//! # Expiry
//!
//! TTL is enforced lazily: `find_rule` skips expired rules and evicts them
//! from the partition it scanned. The lifecycle sweeper calls
//! [`RuleStore::purge_expired`] to catch partitions nobody is reading.

use std::collections::VecDeque;
use std::sync::Arc;

use ctxmock_core::{
    ContextId, MethodSignature, MockId, MockIdentity, MockState, StubbingRule, Timestamp, Value,
};
use parking_lot::RwLock;
use tracing::trace;

use crate::partition::{fx_dashmap, FxDashMap, PartitionKey};

struct RulePartition {
    identity: MockIdentity,
    /// Newest first
    rules: RwLock<VecDeque<Arc<StubbingRule>>>,
}

impl RulePartition {
    fn new(identity: MockIdentity) -> Self {
        Self {
            identity,
            rules: RwLock::new(VecDeque::new()),
        }
    }

    fn evict_expired(&self, now: Timestamp) -> usize {
        let mut rules = self.rules.write();
        let before = rules.len();
        rules.retain(|rule| !rule.is_expired_at(now));
        before - rules.len()
    }

    fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }
}

/// Per-(mock, context) collection of stubbing rules
pub struct RuleStore {
    partitions: FxDashMap<PartitionKey, Arc<RulePartition>>,
}

impl RuleStore {
    /// Create an empty rule store
    pub fn new() -> Self {
        Self {
            partitions: fx_dashmap(),
        }
    }

    /// Insert `rule` at the head of the (identity, context) partition.
    ///
    /// The rule takes precedence over every rule added before it.
    pub fn add_rule(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        rule: StubbingRule,
    ) -> Arc<StubbingRule> {
        let key = PartitionKey::new(identity, context);
        let rule = Arc::new(rule);

        // The shard guard is held across the push so the sweeper cannot drop
        // the partition between lookup and insert.
        let partition = self
            .partitions
            .entry(key)
            .or_insert_with(|| Arc::new(RulePartition::new(identity.clone())));
        partition.rules.write().push_front(Arc::clone(&rule));
        rule
    }

    /// First matching, unexpired rule in LIFO order, evaluated now.
    pub fn find_rule(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        method: &MethodSignature,
        args: &[Value],
        state: &MockState,
    ) -> Option<Arc<StubbingRule>> {
        self.find_rule_at(identity, context, method, args, state, Timestamp::now())
    }

    /// First matching, unexpired rule in LIFO order, evaluated at `now`.
    ///
    /// Expired rules encountered during the scan are evicted afterwards.
    pub fn find_rule_at(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        method: &MethodSignature,
        args: &[Value],
        state: &MockState,
        now: Timestamp,
    ) -> Option<Arc<StubbingRule>> {
        let partition = {
            let key = PartitionKey::new(identity, context);
            Arc::clone(self.partitions.get(&key)?.value())
        };

        let mut saw_expired = false;
        let found = {
            let rules = partition.rules.read();
            rules
                .iter()
                .find(|rule| {
                    if rule.is_expired_at(now) {
                        saw_expired = true;
                        return false;
                    }
                    rule.matches(method, args, state)
                })
                .cloned()
        };

        if saw_expired {
            let evicted = partition.evict_expired(now);
            trace!(mock = %identity, evicted, "evicted expired rules during match");
        }
        found
    }

    /// Snapshot of a partition's rules, newest first
    pub fn rules(&self, identity: &MockIdentity, context: Option<&ContextId>) -> Vec<Arc<StubbingRule>> {
        let key = PartitionKey::new(identity, context);
        self.partitions
            .get(&key)
            .map(|p| p.rules.read().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of rules in a partition, expired ones included
    pub fn rule_count(&self, identity: &MockIdentity, context: Option<&ContextId>) -> usize {
        let key = PartitionKey::new(identity, context);
        self.partitions
            .get(&key)
            .map(|p| p.rules.read().len())
            .unwrap_or(0)
    }

    /// Total rules across all partitions
    pub fn total_rules(&self) -> usize {
        self.partitions
            .iter()
            .map(|entry| entry.value().rules.read().len())
            .sum()
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Evict expired rules from every partition; returns rules removed.
    ///
    /// Locks one partition at a time.
    pub fn purge_expired(&self, now: Timestamp) -> usize {
        self.snapshot()
            .into_iter()
            .map(|(_, partition)| partition.evict_expired(now))
            .sum()
    }

    /// Drop partitions whose mock is gone; returns rules removed.
    pub fn evict_dead(&self) -> usize {
        let mut removed = 0;
        self.partitions.retain(|_, partition| {
            if partition.identity.is_alive() {
                true
            } else {
                removed += partition.rules.read().len();
                false
            }
        });
        removed
    }

    /// Drop partitions holding no rules; returns partitions removed.
    pub fn drop_empty(&self) -> usize {
        let mut dropped = 0;
        for (key, _) in self.snapshot() {
            if self
                .partitions
                .remove_if(&key, |_, partition| partition.is_empty())
                .is_some()
            {
                dropped += 1;
            }
        }
        dropped
    }

    /// Remove a single partition; returns rules removed.
    pub fn clear_partition(&self, identity: &MockIdentity, context: Option<&ContextId>) -> usize {
        let key = PartitionKey::new(identity, context);
        self.partitions
            .remove(&key)
            .map(|(_, p)| p.rules.read().len())
            .unwrap_or(0)
    }

    /// Remove every partition of one mock; returns rules removed.
    pub fn clear_mock(&self, mock: MockId) -> usize {
        let mut removed = 0;
        self.partitions.retain(|key, partition| {
            if key.mock == mock {
                removed += partition.rules.read().len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every partition of one context, across all mocks; returns
    /// rules removed.
    pub fn clear_for_context(&self, context: Option<&ContextId>) -> usize {
        let mut removed = 0;
        self.partitions.retain(|key, partition| {
            if key.is_context(context) {
                removed += partition.rules.read().len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove everything
    pub fn clear(&self) {
        self.partitions.clear();
    }

    fn snapshot(&self) -> Vec<(PartitionKey, Arc<RulePartition>)> {
        self.partitions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleStore")
            .field("partitions", &self.partitions.len())
            .finish()
    }
}
