//! Per-(mock, context) state cells
//!
//! Each partition holds one [`MockState`], read by the matcher as a rule
//! gate and overwritten when a matched rule declares a next state. Reads of
//! an unknown partition return [`MockState::Unset`] without creating it.
//!
//! Writes are plain last-write-wins inserts. Two threads matching rules with
//! different next states in the same partition race, and one of the two
//! values survives intact.

use ctxmock_core::{ContextId, MockId, MockIdentity, MockState};
use tracing::trace;

use crate::partition::{fx_dashmap, FxDashMap, PartitionKey};

struct StateCell {
    identity: MockIdentity,
    state: MockState,
}

/// Current state of every (mock, context) partition that has one
pub struct StateStore {
    cells: FxDashMap<PartitionKey, StateCell>,
}

impl StateStore {
    /// Create an empty state store
    pub fn new() -> Self {
        Self {
            cells: fx_dashmap(),
        }
    }

    /// Current state; `Unset` if never written
    pub fn get(&self, identity: &MockIdentity, context: Option<&ContextId>) -> MockState {
        let key = PartitionKey::new(identity, context);
        self.cells
            .get(&key)
            .map(|cell| cell.state.clone())
            .unwrap_or_default()
    }

    /// Overwrite the partition's state, returning the previous one
    pub fn set(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        state: MockState,
    ) -> MockState {
        let key = PartitionKey::new(identity, context);
        trace!(partition = %key, %state, "state transition");
        self.cells
            .insert(
                key,
                StateCell {
                    identity: identity.clone(),
                    state,
                },
            )
            .map(|previous| previous.state)
            .unwrap_or_default()
    }

    /// Return the partition to `Unset`
    pub fn reset(&self, identity: &MockIdentity, context: Option<&ContextId>) -> bool {
        self.cells
            .remove(&PartitionKey::new(identity, context))
            .is_some()
    }

    /// Drop every state of one mock; returns cells removed
    pub fn clear_mock(&self, mock: MockId) -> usize {
        self.remove_where(|key, _| key.mock == mock)
    }

    /// Drop every state filed under `context`; returns cells removed
    pub fn clear_for_context(&self, context: Option<&ContextId>) -> usize {
        self.remove_where(|key, _| key.is_context(context))
    }

    /// Drop states of mocks that are gone; returns cells removed
    pub fn evict_dead(&self) -> usize {
        self.remove_where(|_, cell| !cell.identity.is_alive())
    }

    /// Number of partitions with a state
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if no partition has a state
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Drop every state
    pub fn clear(&self) {
        self.cells.clear();
    }

    fn remove_where<F>(&self, mut doomed: F) -> usize
    where
        F: FnMut(&PartitionKey, &StateCell) -> bool,
    {
        let mut removed = 0;
        self.cells.retain(|key, cell| {
            let drop = doomed(key, cell);
            removed += usize::from(drop);
            !drop
        });
        removed
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("cells", &self.cells.len())
            .finish()
    }
}
