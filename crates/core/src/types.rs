//! Core identifiers for the registry
//!
//! This module defines the keys rules, records and states are filed under:
//! - ContextId: caller-supplied partition key (tenant, request, session...)
//! - MethodSignature: which intercepted operation a rule or record refers to
//! - MockState: the per-(mock, context) state machine value

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::value::Value;

/// Caller-supplied context key
///
/// Contexts are compared by value: two `ContextId`s built from the same string
/// address the same partition. The registry enforces no uniqueness. The
/// absence of a context is modelled as `Option::<ContextId>::None` by callers
/// and is itself a valid partition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(Arc<str>);

impl ContextId {
    /// Create a context from any string-like key
    pub fn new(key: impl AsRef<str>) -> Self {
        Self(Arc::from(key.as_ref()))
    }

    /// Create a fresh, random context (UUID v4)
    pub fn random() -> Self {
        Self::from(Uuid::new_v4())
    }

    /// The key this context was built from
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<u64> for ContextId {
    fn from(n: u64) -> Self {
        Self::new(n.to_string())
    }
}

impl From<Uuid> for ContextId {
    fn from(id: Uuid) -> Self {
        Self::new(id.to_string())
    }
}

/// Identifies one intercepted operation: name plus parameter type names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    name: Arc<str>,
    params: Arc<[String]>,
}

impl MethodSignature {
    /// Create a signature from a method name and its parameter type names
    pub fn new<I, S>(name: impl AsRef<str>, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: Arc::from(name.as_ref()),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Signature of a method taking no parameters
    pub fn nullary(name: impl AsRef<str>) -> Self {
        Self::new(name, std::iter::empty::<String>())
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter type names, in declaration order
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(", "))
    }
}

/// Current state of one (mock, context) state machine
///
/// Every pair starts out `Unset`. Rules may require `Unset` explicitly and
/// may transition back to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum MockState {
    /// No state has been written
    #[default]
    Unset,
    /// An explicit state value
    Value(Value),
}

impl MockState {
    /// Build an explicit state from any value-convertible input
    pub fn of(value: impl Into<Value>) -> Self {
        MockState::Value(value.into())
    }

    /// Check if no state has been written
    pub fn is_unset(&self) -> bool {
        matches!(self, MockState::Unset)
    }

    /// Borrow the explicit state value, if any
    pub fn value(&self) -> Option<&Value> {
        match self {
            MockState::Unset => None,
            MockState::Value(v) => Some(v),
        }
    }
}

impl fmt::Display for MockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockState::Unset => write!(f, "<unset>"),
            MockState::Value(v) => write!(f, "{}", v),
        }
    }
}
