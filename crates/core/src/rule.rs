//! Stubbing rules and the actions they carry
//!
//! A [`StubbingRule`] is a (condition → action) pair:
//!
//! - condition: method signature, argument spec, optional required state
//! - action: return a value, throw an error, or compute a dynamic answer
//! - side effect: optional next state, applied after the action resolves
//!
//! Rules are immutable once published to the rule store; the store shares
//! them as `Arc<StubbingRule>` so a concurrent reader sees either the whole
//! rule or nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MockError, Result};
use crate::matcher::ArgumentSpec;
use crate::timestamp::Timestamp;
use crate::types::{ContextId, MethodSignature, MockState};
use crate::value::Value;

static NEXT_RULE_ID: AtomicU64 = AtomicU64::new(1);

/// Error value a stubbed call "throws"
///
/// The interceptor turns this into whatever failure its host call site
/// expects (an `Err`, a panic, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrownError {
    /// Error kind, e.g. `"IllegalState"`
    pub kind: String,
    /// Human-readable message
    pub message: String,
}

impl ThrownError {
    /// Create a thrown error
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ThrownError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ThrownError {}

/// What a dynamic answer gets to look at
#[derive(Debug, Clone, Copy)]
pub struct InvocationView<'a> {
    /// The invoked method
    pub method: &'a MethodSignature,
    /// Arguments as passed
    pub args: &'a [Value],
    /// Context the call was made under
    pub context: Option<&'a ContextId>,
    /// State observed when the rule was selected
    pub state: &'a MockState,
}

/// Dynamic answer callback
pub type AnswerFn = dyn Fn(&InvocationView<'_>) -> std::result::Result<Value, ThrownError> + Send + Sync;

/// The single action a rule carries
#[derive(Clone)]
pub enum StubAction {
    /// Return a fixed value
    Return(Value),
    /// Throw a fixed error
    Throw(ThrownError),
    /// Compute the result from the invocation
    Answer(Arc<AnswerFn>),
}

impl StubAction {
    /// Wrap a closure as a dynamic answer
    pub fn answer<F>(f: F) -> Self
    where
        F: Fn(&InvocationView<'_>) -> std::result::Result<Value, ThrownError> + Send + Sync + 'static,
    {
        StubAction::Answer(Arc::new(f))
    }

    /// Resolve the action for one invocation
    pub fn resolve(&self, view: &InvocationView<'_>) -> StubResponse {
        match self {
            StubAction::Return(value) => StubResponse::Return(value.clone()),
            StubAction::Throw(error) => StubResponse::Throw(error.clone()),
            StubAction::Answer(f) => match f(view) {
                Ok(value) => StubResponse::Return(value),
                Err(error) => StubResponse::Throw(error),
            },
        }
    }
}

impl fmt::Debug for StubAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StubAction::Return(v) => f.debug_tuple("Return").field(v).finish(),
            StubAction::Throw(e) => f.debug_tuple("Throw").field(e).finish(),
            StubAction::Answer(_) => f.write_str("Answer(<fn>)"),
        }
    }
}

/// Resolved result of a matched rule
#[derive(Debug, Clone, PartialEq)]
pub enum StubResponse {
    /// The call returns this value
    Return(Value),
    /// The call fails with this error
    Throw(ThrownError),
}

impl StubResponse {
    /// Convert into a `Result`, the usual shape at an interception site
    pub fn into_result(self) -> std::result::Result<Value, ThrownError> {
        match self {
            StubResponse::Return(v) => Ok(v),
            StubResponse::Throw(e) => Err(e),
        }
    }
}

/// A declared (condition → action) mapping for one mock method
#[derive(Debug, Clone)]
pub struct StubbingRule {
    id: u64,
    method: MethodSignature,
    args: ArgumentSpec,
    required_state: Option<MockState>,
    next_state: Option<MockState>,
    action: StubAction,
    created_at: Timestamp,
    ttl: Option<Duration>,
}

impl StubbingRule {
    /// Create a rule with no state gating and no expiry.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidRule` if the method name is empty.
    pub fn new(method: MethodSignature, args: ArgumentSpec, action: StubAction) -> Result<Self> {
        if method.name().trim().is_empty() {
            return Err(MockError::InvalidRule(
                "stubbing rule requires a method name".to_string(),
            ));
        }
        Ok(Self {
            id: NEXT_RULE_ID.fetch_add(1, Ordering::Relaxed),
            method,
            args,
            required_state: None,
            next_state: None,
            action,
            created_at: Timestamp::now(),
            ttl: None,
        })
    }

    /// Only match while the (mock, context) state equals `state`
    pub fn with_required_state(mut self, state: MockState) -> Self {
        self.required_state = Some(state);
        self
    }

    /// Transition the (mock, context) state to `state` after matching
    pub fn with_next_state(mut self, state: MockState) -> Self {
        self.next_state = Some(state);
        self
    }

    /// Expire the rule `ttl` after its creation time
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Override the creation time (expiry is measured from it)
    pub fn with_created_at(mut self, created_at: Timestamp) -> Self {
        self.created_at = created_at;
        self
    }

    /// Process-unique rule id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Method this rule applies to
    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    /// Argument spec
    pub fn args(&self) -> &ArgumentSpec {
        &self.args
    }

    /// Required state, if gated
    pub fn required_state(&self) -> Option<&MockState> {
        self.required_state.as_ref()
    }

    /// State to transition to after matching, if any
    pub fn next_state(&self) -> Option<&MockState> {
        self.next_state.as_ref()
    }

    /// The rule's action
    pub fn action(&self) -> &StubAction {
        &self.action
    }

    /// Creation time
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Time-to-live, if any
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// When the rule stops matching, or `None` if it never expires
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.ttl.map(|ttl| self.created_at.saturating_add(ttl))
    }

    /// Check whether the rule has expired as of `now`
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.ttl {
            Some(ttl) => now
                .duration_since(self.created_at)
                .map_or(false, |age| age >= ttl),
            None => false,
        }
    }

    /// Check the non-temporal match conditions, cheapest first:
    /// method, state gate, then arguments.
    pub fn matches(&self, method: &MethodSignature, args: &[Value], state: &MockState) -> bool {
        if self.method != *method {
            return false;
        }
        if let Some(required) = &self.required_state {
            if required != state {
                return false;
            }
        }
        self.args.matches(args)
    }
}
