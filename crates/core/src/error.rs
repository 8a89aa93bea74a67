//! Error types for the mock registry
//!
//! Two families reach callers:
//! - usage errors: the caller asked for something the registry cannot do
//!   (unknown mock, missing context, unbalanced stubbing expression, ...)
//! - verification failures: an assertion about recorded calls did not hold
//!
//! Both are returned synchronously and never retried. Failures inside the
//! background sweeper are logged and counted instead of surfacing here.
//! We use `thiserror` for `Display` and `Error` implementations.

use thiserror::Error;

use crate::verification::{UnverifiedInteractions, VerificationFailure};

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, MockError>;

/// Error types for the mock registry
#[derive(Debug, Error)]
pub enum MockError {
    /// The object was never registered as a mock, or it has been dropped
    #[error("Not a mock: {0}")]
    NotAMock(String),

    /// The operation needs a context and none was supplied
    #[error("Missing context: {operation} requires a context")]
    MissingContext {
        /// Operation that needed the context
        operation: &'static str,
    },

    /// `end_stubbing_expression` without a matching begin
    #[error("No stubbing expression in progress on this thread")]
    NoStubbingInProgress,

    /// `begin_stubbing_expression` while one is already open on this thread
    #[error("A stubbing expression is already in progress on this thread")]
    StubbingAlreadyInProgress,

    /// A stubbing expression ended without the mock being called
    #[error("Stubbing expression captured no invocation on {0}")]
    NoInvocationCaptured(String),

    /// Malformed stubbing rule
    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    /// Invalid registry configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Expected-vs-actual invocation count mismatch
    #[error("Verification failed: {0}")]
    Verification(Box<VerificationFailure>),

    /// Calls remained that no verification accounted for
    #[error("Verification failed: {0}")]
    UnverifiedInteractions(Box<UnverifiedInteractions>),
}

impl MockError {
    /// Check whether this is an assertion outcome rather than a caller mistake
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            MockError::Verification(_) | MockError::UnverifiedInteractions(_)
        )
    }

    /// Check whether this is a caller mistake
    pub fn is_usage_error(&self) -> bool {
        !self.is_verification_failure()
    }

    /// The count-mismatch report, if this is one
    pub fn as_verification_failure(&self) -> Option<&VerificationFailure> {
        match self {
            MockError::Verification(failure) => Some(&**failure),
            _ => None,
        }
    }
}

impl From<VerificationFailure> for MockError {
    fn from(failure: VerificationFailure) -> Self {
        MockError::Verification(Box::new(failure))
    }
}

impl From<UnverifiedInteractions> for MockError {
    fn from(report: UnverifiedInteractions) -> Self {
        MockError::UnverifiedInteractions(Box::new(report))
    }
}
