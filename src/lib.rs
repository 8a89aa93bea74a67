//! ctxmock - context-partitioned concurrent mock registry
//!
//! ctxmock stores stubbing rules, invocation history and a state machine per
//! (mock, context) pair, so many threads can stub, invoke and verify the same
//! test double while each caller context (tenant, request, session) sees only
//! its own behavior.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use ctxmock::{args, ContextId, MethodSignature, MockRegistry, Outcome, RegistryConfig, VerificationMode};
//!
//! struct Greeter;
//!
//! let registry = MockRegistry::with_config(RegistryConfig::manual_cleanup())?;
//! let greeter = Arc::new(Greeter);
//! let greet = MethodSignature::new("greet", ["String", "i32"]);
//! let c1 = ContextId::from("C1");
//! let c2 = ContextId::from("C2");
//!
//! let id = registry.register_mock(&greeter);
//! registry.stub(&greeter, Some(&c1), greet.clone(), args!["A", 1])?.returns("one")?;
//! registry.stub(&greeter, Some(&c2), greet.clone(), args!["A", 1])?.returns("two")?;
//!
//! assert_eq!(registry.on_invocation(&id, &greet, &args!["A", 1], Some(&c1)), Outcome::Return("one".into()));
//! assert_eq!(registry.on_invocation(&id, &greet, &args!["A", 1], Some(&c2)), Outcome::Return("two".into()));
//!
//! registry.verify(&greeter, Some(&c1), &greet, args!["A", 1], VerificationMode::once())?;
//! # Ok::<(), ctxmock::MockError>(())
//! ```
//!
//! # Architecture
//!
//! - `ctxmock-core`: values, identities, rules, records, verification modes, errors
//! - `ctxmock-storage`: the partitioned concurrent stores
//! - `ctxmock-engine`: matching, verification, lifecycle and the registry facade
//!
//! The registry facade and the data model are re-exported here; the storage
//! crate is available as [`storage`] for code that needs the raw stores.

pub use ctxmock_core::*;
pub use ctxmock_engine::*;

/// The partitioned stores backing a registry
pub use ctxmock_storage as storage;
