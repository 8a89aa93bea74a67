//! Core types for ctxmock
//!
//! This crate defines the data model shared by the storage and engine layers:
//! - Value: dynamically typed argument / return / state values
//! - Timestamp: microsecond wall-clock time used for TTLs and record age
//! - ContextId, MethodSignature, MockState: partition and match keys
//! - MockIdentity: weakly-held, reference-identity token for one mock
//! - ArgMatcher, ArgumentSpec: literal or predicate argument specs
//! - StubbingRule, StubAction: (condition → action) mappings
//! - InvocationRecord: one intercepted call
//! - VerificationMode and failure reports
//! - MockError: error hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod identity;
pub mod invocation;
pub mod matcher;
pub mod rule;
pub mod timestamp;
pub mod types;
pub mod value;
pub mod verification;

pub use error::{MockError, Result};
pub use identity::{address_of, MockId, MockIdentity};
pub use invocation::{InvocationRecord, InvocationSummary};
pub use matcher::{any, eq, ArgMatcher, ArgumentSpec, MatcherFn};
pub use rule::{AnswerFn, InvocationView, StubAction, StubResponse, StubbingRule, ThrownError};
pub use timestamp::Timestamp;
pub use types::{ContextId, MethodSignature, MockState};
pub use value::Value;
pub use verification::{
    UnverifiedInteractions, VerificationFailure, VerificationMode, MAX_REPORTED_INVOCATIONS,
};
