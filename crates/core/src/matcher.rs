//! Argument specifications: literal vectors or matcher vectors
//!
//! A rule (or a verification) describes the arguments it applies to in
//! exactly one of two forms:
//!
//! - [`ArgumentSpec::Literal`]: each argument must be deep-equal to the stored
//!   value
//! - [`ArgumentSpec::Matchers`]: each argument must be accepted by the
//!   matcher at the same position
//!
//! In both forms the argument count must equal the spec's arity.
//! Matchers are opaque predicates; [`ArgMatcher::Any`] is the reserved
//! wildcard.

use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Predicate signature for custom matchers
pub type MatcherFn = dyn Fn(&Value) -> bool + Send + Sync;

/// One positional argument matcher
#[derive(Clone)]
pub enum ArgMatcher {
    /// Accepts every argument
    Any,
    /// Accepts arguments for which the predicate returns `true`
    Predicate {
        /// Rendered in verification reports
        description: Arc<str>,
        /// The test itself
        predicate: Arc<MatcherFn>,
    },
}

impl ArgMatcher {
    /// The wildcard matcher
    pub fn any() -> Self {
        ArgMatcher::Any
    }

    /// Matcher accepting values deep-equal to `expected`
    pub fn eq(expected: impl Into<Value>) -> Self {
        let expected = expected.into();
        let description = format!("eq({})", expected);
        Self::predicate(description, move |actual| *actual == expected)
    }

    /// Matcher backed by an arbitrary predicate
    pub fn predicate<F>(description: impl AsRef<str>, predicate: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        ArgMatcher::Predicate {
            description: Arc::from(description.as_ref()),
            predicate: Arc::new(predicate),
        }
    }

    /// Check whether this matcher accepts `arg`
    #[inline]
    pub fn matches(&self, arg: &Value) -> bool {
        match self {
            ArgMatcher::Any => true,
            ArgMatcher::Predicate { predicate, .. } => predicate(arg),
        }
    }

    /// Check whether this is the wildcard
    pub fn is_any(&self) -> bool {
        matches!(self, ArgMatcher::Any)
    }
}

impl fmt::Debug for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl fmt::Display for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgMatcher::Any => write!(f, "any()"),
            ArgMatcher::Predicate { description, .. } => write!(f, "{}", description),
        }
    }
}

/// Arguments a rule or verification applies to
#[derive(Debug, Clone)]
pub enum ArgumentSpec {
    /// Exact match by deep equality
    Literal(Vec<Value>),
    /// Positional predicates
    Matchers(Vec<ArgMatcher>),
}

impl ArgumentSpec {
    /// Literal spec from anything yielding values
    pub fn literal<I, V>(args: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ArgumentSpec::Literal(args.into_iter().map(Into::into).collect())
    }

    /// Matcher spec
    pub fn matchers(matchers: impl IntoIterator<Item = ArgMatcher>) -> Self {
        ArgumentSpec::Matchers(matchers.into_iter().collect())
    }

    /// Spec for a call with no arguments
    pub fn none() -> Self {
        ArgumentSpec::Literal(Vec::new())
    }

    /// Number of arguments this spec expects
    pub fn arity(&self) -> usize {
        match self {
            ArgumentSpec::Literal(values) => values.len(),
            ArgumentSpec::Matchers(matchers) => matchers.len(),
        }
    }

    /// Check whether `args` satisfies this spec
    pub fn matches(&self, args: &[Value]) -> bool {
        if args.len() != self.arity() {
            return false;
        }
        match self {
            ArgumentSpec::Literal(expected) => expected.iter().zip(args).all(|(e, a)| e == a),
            ArgumentSpec::Matchers(matchers) => {
                matchers.iter().zip(args).all(|(m, a)| m.matches(a))
            }
        }
    }
}

impl fmt::Display for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", item)?;
            }
            Ok(())
        }
        write!(f, "(")?;
        match self {
            ArgumentSpec::Literal(values) => join(f, values.as_slice())?,
            ArgumentSpec::Matchers(matchers) => join(f, matchers.as_slice())?,
        }
        write!(f, ")")
    }
}

impl From<Vec<Value>> for ArgumentSpec {
    fn from(values: Vec<Value>) -> Self {
        ArgumentSpec::Literal(values)
    }
}

impl From<Vec<ArgMatcher>> for ArgumentSpec {
    fn from(matchers: Vec<ArgMatcher>) -> Self {
        ArgumentSpec::Matchers(matchers)
    }
}

/// Shorthand for [`ArgMatcher::any`]
pub fn any() -> ArgMatcher {
    ArgMatcher::Any
}

/// Shorthand for [`ArgMatcher::eq`]
pub fn eq(expected: impl Into<Value>) -> ArgMatcher {
    ArgMatcher::eq(expected)
}
