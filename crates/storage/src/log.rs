//! Invocation log: per-partition append-only call history
//!
//! Appends take the partition mutex, so records within one (mock, context)
//! partition keep the order they were appended in, whatever the number of
//! concurrent writers. Nothing orders records across partitions.
//!
//! Setup-time calls (made while expressing a stub) are stored with
//! `is_setup = true` and filtered out by [`InvocationLog::query`].

use std::collections::VecDeque;
use std::sync::Arc;

use ctxmock_core::{ContextId, InvocationRecord, MockId, MockIdentity, Timestamp};
use parking_lot::Mutex;
use tracing::warn;

use crate::partition::{fx_dashmap, FxDashMap, PartitionKey};

struct LogPartition {
    identity: MockIdentity,
    /// Oldest first
    records: Mutex<VecDeque<Arc<InvocationRecord>>>,
}

impl LogPartition {
    fn new(identity: MockIdentity) -> Self {
        Self {
            identity,
            records: Mutex::new(VecDeque::new()),
        }
    }

    fn len(&self) -> usize {
        self.records.lock().len()
    }
}

/// Per-(mock, context) ordered invocation history
pub struct InvocationLog {
    partitions: FxDashMap<PartitionKey, Arc<LogPartition>>,
}

impl InvocationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self {
            partitions: fx_dashmap(),
        }
    }

    /// Append `record` to its partition.
    ///
    /// Returns `None` without recording if the mock has already been dropped.
    pub fn record(&self, record: InvocationRecord) -> Option<Arc<InvocationRecord>> {
        if !record.mock().is_alive() {
            warn!(mock = %record.mock(), "dropping record for collected mock");
            return None;
        }
        let key = PartitionKey::new(record.mock(), record.context());
        let record = Arc::new(record);

        let partition = self
            .partitions
            .entry(key)
            .or_insert_with(|| Arc::new(LogPartition::new(record.mock().clone())));
        partition.records.lock().push_back(Arc::clone(&record));
        Some(record)
    }

    /// Real (non-setup) invocations of a partition, in append order
    pub fn query(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
    ) -> Vec<Arc<InvocationRecord>> {
        self.collect(identity, context, |record| !record.is_setup())
    }

    /// Every invocation of a partition, setup calls included
    pub fn query_all(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
    ) -> Vec<Arc<InvocationRecord>> {
        self.collect(identity, context, |_| true)
    }

    /// Retract the most recently appended record of a partition
    pub fn remove_most_recent(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
    ) -> Option<Arc<InvocationRecord>> {
        let key = PartitionKey::new(identity, context);
        let partition = Arc::clone(self.partitions.get(&key)?.value());
        let removed = partition.records.lock().pop_back();
        removed
    }

    /// Remove every record filed under `context`, across all mocks; returns
    /// records removed.
    pub fn clear_for_context(&self, context: Option<&ContextId>) -> usize {
        let mut removed = 0;
        self.partitions.retain(|key, partition| {
            if key.is_context(context) {
                removed += partition.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every record of one mock; returns records removed.
    pub fn clear_mock(&self, mock: MockId) -> usize {
        let mut removed = 0;
        self.partitions.retain(|key, partition| {
            if key.mock == mock {
                removed += partition.len();
                false
            } else {
                true
            }
        });
        removed
    }

    /// Drop partitions whose mock is gone; returns records removed.
    pub fn evict_dead(&self) -> usize {
        let mut removed = 0;
        self.partitions.retain(|_, partition| {
            if partition.identity.is_alive() {
                true
            } else {
                removed += partition.len();
                false
            }
        });
        removed
    }

    /// Remove records stamped before `cutoff` from every partition; returns
    /// records removed.
    ///
    /// Locks one partition at a time.
    pub fn evict_older_than(&self, cutoff: Timestamp) -> usize {
        self.snapshot()
            .into_iter()
            .map(|partition| {
                let mut records = partition.records.lock();
                let before = records.len();
                records.retain(|record| record.timestamp() >= cutoff);
                before - records.len()
            })
            .sum()
    }

    /// Trim every partition to its newest `max` records; returns records
    /// removed.
    pub fn trim_to(&self, max: usize) -> usize {
        self.snapshot()
            .into_iter()
            .map(|partition| {
                let mut records = partition.records.lock();
                let excess = records.len().saturating_sub(max);
                records.drain(..excess);
                excess
            })
            .sum()
    }

    /// Drop partitions holding no records; returns partitions removed.
    pub fn drop_empty(&self) -> usize {
        let keys: Vec<PartitionKey> = self.partitions.iter().map(|e| e.key().clone()).collect();
        keys.iter()
            .filter(|key| {
                self.partitions
                    .remove_if(key, |_, partition| partition.len() == 0)
                    .is_some()
            })
            .count()
    }

    /// Number of records (setup included) in a partition
    pub fn record_count(&self, identity: &MockIdentity, context: Option<&ContextId>) -> usize {
        let key = PartitionKey::new(identity, context);
        self.partitions.get(&key).map(|p| p.len()).unwrap_or(0)
    }

    /// Total records across all partitions
    pub fn total_records(&self) -> usize {
        self.partitions.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of partitions
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Keys of all current partitions
    pub fn partition_keys(&self) -> Vec<PartitionKey> {
        self.partitions.iter().map(|e| e.key().clone()).collect()
    }

    /// Remove everything
    pub fn clear(&self) {
        self.partitions.clear();
    }

    fn collect<F>(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        keep: F,
    ) -> Vec<Arc<InvocationRecord>>
    where
        F: Fn(&InvocationRecord) -> bool,
    {
        let key = PartitionKey::new(identity, context);
        let partition = match self.partitions.get(&key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return Vec::new(),
        };
        let records = partition.records.lock();
        records.iter().filter(|r| keep(r)).cloned().collect()
    }

    fn snapshot(&self) -> Vec<Arc<LogPartition>> {
        self.partitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }
}

impl Default for InvocationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InvocationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvocationLog")
            .field("partitions", &self.partitions.len())
            .finish()
    }
}
