//! Weakly-held mock identity tokens
//!
//! A [`MockIdentity`] names one mock instance by reference identity, never by
//! the mock's own `PartialEq`/`Hash`. It holds only a `Weak` handle, so rules
//! and records filed under it never keep the mock alive.
//!
//! Identities are minted by the storage layer's canonicalizer, which
//! guarantees one live identity per live mock. Minting one directly bypasses
//! that guarantee.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::timestamp::Timestamp;

/// Numeric id of a mock identity; partition keys are built from it
pub type MockId = u64;

static NEXT_MOCK_ID: AtomicU64 = AtomicU64::new(1);

struct IdentityInner {
    id: MockId,
    addr: usize,
    type_name: &'static str,
    created_at: Timestamp,
    referent: Weak<dyn Any + Send + Sync>,
}

/// Stable, weakly-owning token for one mock instance
///
/// Cloning is cheap (one `Arc` bump). Equality and hashing use the numeric id
/// only.
#[derive(Clone)]
pub struct MockIdentity(Arc<IdentityInner>);

impl MockIdentity {
    /// Mint a new identity for `mock`.
    ///
    /// Callers that need the canonical identity go through the
    /// canonicalizer instead.
    pub fn mint<M: Any + Send + Sync>(mock: &Arc<M>) -> Self {
        let strong: Arc<dyn Any + Send + Sync> = mock.clone();
        let referent = Arc::downgrade(&strong);
        drop(strong);

        MockIdentity(Arc::new(IdentityInner {
            id: NEXT_MOCK_ID.fetch_add(1, Ordering::Relaxed),
            addr: address_of(mock),
            type_name: std::any::type_name::<M>(),
            created_at: Timestamp::now(),
            referent,
        }))
    }

    /// Process-unique numeric id
    #[inline]
    pub fn id(&self) -> MockId {
        self.0.id
    }

    /// Allocation address of the mock this identity was minted for
    #[inline]
    pub fn address(&self) -> usize {
        self.0.addr
    }

    /// Type name of the mock, for diagnostics
    pub fn type_name(&self) -> &'static str {
        self.0.type_name
    }

    /// When this identity was minted
    pub fn created_at(&self) -> Timestamp {
        self.0.created_at
    }

    /// Check whether the mock is still alive
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.0.referent.strong_count() > 0
    }

    /// Check whether this identity names exactly `mock`
    pub fn refers_to<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> bool {
        self.is_alive() && self.0.addr == address_of(mock)
    }

    /// Upgrade to a strong handle on the mock, if it is still alive
    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.0.referent.upgrade()
    }
}

/// Address of the `Arc` allocation, the reference-identity key of a mock
#[inline]
pub fn address_of<M: ?Sized>(mock: &Arc<M>) -> usize {
    Arc::as_ptr(mock) as *const () as usize
}

impl PartialEq for MockIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for MockIdentity {}

impl Hash for MockIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for MockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockIdentity")
            .field("id", &self.0.id)
            .field("type_name", &self.0.type_name)
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl fmt::Display for MockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", short_type_name(self.0.type_name), self.0.id)
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}
