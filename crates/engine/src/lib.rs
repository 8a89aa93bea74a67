//! Registry engine for ctxmock
//!
//! This crate puts the storage layer to work:
//! - MockRegistry: stubbing, interception, verification and lifecycle facade
//! - Matching engine: LIFO, state-gated rule selection with next-state
//!   transitions
//! - Verification engine: counted, mode-checked verification with
//!   diagnostic reports
//! - Lifecycle manager: on-demand sweeps and the background sweeper
//! - RegistryConfig: `ctxmock.toml` configuration
//! - Interceptor and ContextSource: the boundary to test doubles and to
//!   whatever decides the current context
//!
//! The registry is the only component that knows about:
//! - setup-call exclusion for stubbing expressions
//! - cross-store operations (clearing a mock or a context everywhere)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod context;
pub mod interceptor;
pub mod lifecycle;
pub mod matching;
pub mod registry;
mod stores;
mod verification;

pub use config::{RegistryConfig, CONFIG_FILE_NAME};
pub use context::{ContextGuard, ContextSource, FixedContext, ThreadContext};
pub use interceptor::Interceptor;
pub use lifecycle::{CleanupStats, LifecycleManager};
pub use matching::Outcome;
pub use registry::{CapturedCall, MockRegistry, RegistryStats, RuleBuilder};
pub use stores::ClearedData;
