//! Identity canonicalizer
//!
//! Maps a mock object to its single canonical [`MockIdentity`], keyed by the
//! `Arc` allocation address rather than by the mock's own equality.
//!
//! # Weak ownership
//!
//! The map stores identities, and identities hold only a `Weak` to the mock.
//! A `Weak` also keeps the allocation itself reserved, so while an entry
//! exists its address cannot be handed to a different object. A dead entry
//! is therefore replaced by a fresh identity on the next canonicalization and
//! removed entirely by [`IdentityCanonicalizer::purge_dead`].
//!
//! # Thread Safety
//!
//! First-touch creation happens under the DashMap entry lock for the
//! address's shard: N threads racing to canonicalize the same mock get the
//! same identity.

use std::any::Any;
use std::sync::Arc;

use ctxmock_core::{address_of, MockId, MockIdentity};
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::partition::{fx_dashmap, FxDashMap};

/// Address-keyed map of canonical identities
pub struct IdentityCanonicalizer {
    by_address: FxDashMap<usize, MockIdentity>,
}

impl IdentityCanonicalizer {
    /// Create an empty canonicalizer
    pub fn new() -> Self {
        Self {
            by_address: fx_dashmap(),
        }
    }

    /// Canonical identity for `mock`, created on first touch.
    ///
    /// Idempotent while the mock lives. Never retains a strong reference.
    pub fn canonicalize<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> MockIdentity {
        let addr = address_of(mock);

        // Fast path: shared shard lock only
        if let Some(existing) = self.by_address.get(&addr) {
            if existing.is_alive() {
                return existing.clone();
            }
        }

        match self.by_address.entry(addr) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_alive() {
                    slot.get().clone()
                } else {
                    let fresh = MockIdentity::mint(mock);
                    debug!(
                        mock = %fresh,
                        replaced = slot.get().id(),
                        "replaced dead mock identity"
                    );
                    slot.insert(fresh.clone());
                    fresh
                }
            }
            Entry::Vacant(slot) => {
                let fresh = MockIdentity::mint(mock);
                debug!(mock = %fresh, "registered mock identity");
                slot.insert(fresh.clone());
                fresh
            }
        }
    }

    /// Canonical identity for `mock` if it has one; never creates.
    pub fn lookup<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> Option<MockIdentity> {
        self.by_address
            .get(&address_of(mock))
            .filter(|identity| identity.is_alive())
            .map(|identity| identity.clone())
    }

    /// Drop every identity whose mock is gone, returning their ids
    pub fn purge_dead(&self) -> Vec<MockId> {
        let mut dead = Vec::new();
        self.by_address.retain(|_, identity| {
            if identity.is_alive() {
                true
            } else {
                dead.push(identity.id());
                false
            }
        });
        dead
    }

    /// Forget the identity with the given id
    pub fn remove(&self, id: MockId) -> bool {
        let before = self.by_address.len();
        self.by_address.retain(|_, identity| identity.id() != id);
        self.by_address.len() < before
    }

    /// Snapshot of all live identities
    pub fn identities(&self) -> Vec<MockIdentity> {
        self.by_address
            .iter()
            .filter(|entry| entry.value().is_alive())
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of tracked identities, including not-yet-purged dead ones
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// Check if no identities are tracked
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }

    /// Forget every identity
    pub fn clear(&self) {
        self.by_address.clear();
    }
}

impl Default for IdentityCanonicalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for IdentityCanonicalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCanonicalizer")
            .field("tracked", &self.by_address.len())
            .finish()
    }
}
