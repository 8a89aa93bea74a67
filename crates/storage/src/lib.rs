//! Storage layer for ctxmock
//!
//! This crate implements the concurrent stores behind the registry:
//! - IdentityCanonicalizer: address-keyed, weakly held mock identities
//! - RuleStore: LIFO stubbing rules per (mock, context) partition
//! - InvocationLog: ordered call history per partition
//! - StateStore: last-write-wins state cell per partition
//!
//! # Concurrency
//!
//! Every store is a DashMap (FxHash) of partitions:
//! - Lookups take a shard read lock, then the partition's own lock
//! - Different partitions never contend on a partition lock
//! - Inserts into a partition happen while the shard entry is held, so a
//!   concurrent sweep cannot drop a partition a writer is filling
//!
//! None of the stores retain a strong reference to a mock.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod identity;
pub mod log;
pub mod partition;
pub mod rules;
pub mod state;

pub use identity::IdentityCanonicalizer;
pub use log::InvocationLog;
pub use partition::PartitionKey;
pub use rules::RuleStore;
pub use state::StateStore;
