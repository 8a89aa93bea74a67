//! Matching engine
//!
//! Handles one intercepted (non-setup) call:
//!
//! 1. append the invocation to the log
//! 2. read the partition's current state
//! 3. select the newest unexpired rule matching method, state and arguments
//! 4. resolve its action (fixed value, fixed error or dynamic answer)
//! 5. only then apply the rule's next state, if it declares one
//!
//! Step 5 running after step 4 means no caller can observe the new state
//! before this call's result exists. Concurrent transitions in the same
//! partition are last-write-wins.

use ctxmock_core::{
    ContextId, InvocationRecord, InvocationView, MethodSignature, MockIdentity, StubResponse,
    ThrownError, Timestamp, Value,
};
use tracing::trace;

use crate::stores::Stores;

/// Result of dispatching an intercepted call
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A rule matched and the call returns this value
    Return(Value),
    /// A rule matched and the call fails with this error
    Throw(ThrownError),
    /// No rule matched; the caller decides the default
    NoRuleFound,
}

impl Outcome {
    /// Check whether a rule produced this outcome
    pub fn is_stubbed(&self) -> bool {
        !matches!(self, Outcome::NoRuleFound)
    }

    /// Convert into a call result, substituting `default` when unstubbed
    pub fn or_return(self, default: Value) -> std::result::Result<Value, ThrownError> {
        match self {
            Outcome::Return(value) => Ok(value),
            Outcome::Throw(error) => Err(error),
            Outcome::NoRuleFound => Ok(default),
        }
    }

    /// Convert into a call result, substituting the default value of
    /// `return_type` when unstubbed
    pub fn or_default_for(self, return_type: &str) -> std::result::Result<Value, ThrownError> {
        self.or_return(Value::default_for_type(return_type))
    }
}

impl From<StubResponse> for Outcome {
    fn from(response: StubResponse) -> Self {
        match response {
            StubResponse::Return(value) => Outcome::Return(value),
            StubResponse::Throw(error) => Outcome::Throw(error),
        }
    }
}

/// Rule selection and state transitions over a set of stores
pub(crate) struct MatchingEngine<'a> {
    stores: &'a Stores,
}

impl<'a> MatchingEngine<'a> {
    pub(crate) fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Record and answer one real invocation, evaluating TTLs at `now`
    pub(crate) fn dispatch(
        &self,
        identity: &MockIdentity,
        method: &MethodSignature,
        args: &[Value],
        context: Option<&ContextId>,
        now: Timestamp,
    ) -> Outcome {
        self.stores.log.record(InvocationRecord::new(
            identity.clone(),
            method.clone(),
            args,
            context.cloned(),
        ));

        let state = self.stores.states.get(identity, context);
        let rule = match self
            .stores
            .rules
            .find_rule_at(identity, context, method, args, &state, now)
        {
            Some(rule) => rule,
            None => {
                trace!(mock = %identity, method = %method, "no rule matched");
                return Outcome::NoRuleFound;
            }
        };

        let view = InvocationView {
            method,
            args,
            context,
            state: &state,
        };
        let response = rule.action().resolve(&view);

        if let Some(next) = rule.next_state() {
            self.stores.states.set(identity, context, next.clone());
        }
        trace!(mock = %identity, method = %method, rule = rule.id(), "rule matched");
        response.into()
    }
}
