//! Verification modes and failure reports

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::invocation::InvocationSummary;
use crate::types::{ContextId, MethodSignature};

/// Upper bound on recorded invocations listed in a failure report
pub const MAX_REPORTED_INVOCATIONS: usize = 10;

/// How many matching invocations a verification expects
///
/// Each mode is a pure function of the actual count. There is no separate
/// "never" variant: [`VerificationMode::never`] is `Exactly(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationMode {
    /// actual == n
    Exactly(usize),
    /// actual >= n
    AtLeast(usize),
    /// actual <= n
    AtMost(usize),
}

impl VerificationMode {
    /// Exactly `n` invocations
    pub const fn times(n: usize) -> Self {
        VerificationMode::Exactly(n)
    }

    /// Exactly one invocation
    pub const fn once() -> Self {
        VerificationMode::Exactly(1)
    }

    /// No invocations at all
    pub const fn never() -> Self {
        VerificationMode::Exactly(0)
    }

    /// At least `n` invocations
    pub const fn at_least(n: usize) -> Self {
        VerificationMode::AtLeast(n)
    }

    /// At most `n` invocations
    pub const fn at_most(n: usize) -> Self {
        VerificationMode::AtMost(n)
    }

    /// The count the mode is parameterised by
    pub fn expected(&self) -> usize {
        match *self {
            VerificationMode::Exactly(n)
            | VerificationMode::AtLeast(n)
            | VerificationMode::AtMost(n) => n,
        }
    }

    /// Evaluate the mode against an observed count
    pub fn is_satisfied_by(&self, actual: usize) -> bool {
        match *self {
            VerificationMode::Exactly(n) => actual == n,
            VerificationMode::AtLeast(n) => actual >= n,
            VerificationMode::AtMost(n) => actual <= n,
        }
    }
}

impl Default for VerificationMode {
    fn default() -> Self {
        VerificationMode::once()
    }
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            VerificationMode::Exactly(0) => write!(f, "never"),
            VerificationMode::Exactly(n) => write!(f, "exactly {}", plural(n)),
            VerificationMode::AtLeast(n) => write!(f, "at least {}", plural(n)),
            VerificationMode::AtMost(n) => write!(f, "at most {}", plural(n)),
        }
    }
}

fn plural(n: usize) -> String {
    if n == 1 {
        "1 time".to_string()
    } else {
        format!("{} times", n)
    }
}

/// Expected-vs-actual count mismatch for one verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationFailure {
    /// Mode that was not satisfied
    pub mode: VerificationMode,
    /// Number of matching invocations found
    pub actual: usize,
    /// Mock the verification targeted, rendered
    pub mock: String,
    /// Method the verification targeted
    pub method: MethodSignature,
    /// Argument spec the verification targeted, rendered
    pub arguments: String,
    /// Context verified under
    pub context: Option<ContextId>,
    /// First recorded (non-setup) invocations of the partition
    pub recorded: Vec<InvocationSummary>,
    /// Total recorded (non-setup) invocations of the partition
    pub total_recorded: usize,
}

impl fmt::Display for VerificationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}.{}{} wanted {}, but was invoked {}",
            self.mock,
            self.method.name(),
            self.arguments,
            self.mode,
            plural(self.actual)
        )?;
        write_context(f, self.context.as_ref())?;
        write_recorded(f, &self.recorded, self.total_recorded)
    }
}

/// Calls that no verification accounted for
#[derive(Debug, Clone, PartialEq)]
pub struct UnverifiedInteractions {
    /// Mock inspected, rendered
    pub mock: String,
    /// Context inspected
    pub context: Option<ContextId>,
    /// First unverified invocations
    pub unverified: Vec<InvocationSummary>,
    /// Total unverified invocations
    pub total_unverified: usize,
}

impl fmt::Display for UnverifiedInteractions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "no more interactions wanted on {}, but found {} unverified",
            self.mock, self.total_unverified
        )?;
        write_context(f, self.context.as_ref())?;
        write_recorded(f, &self.unverified, self.total_unverified)
    }
}

fn write_context(f: &mut fmt::Formatter<'_>, context: Option<&ContextId>) -> fmt::Result {
    match context {
        Some(ctx) => writeln!(f, "  context: {}", ctx),
        None => writeln!(f, "  context: <none>"),
    }
}

fn write_recorded(
    f: &mut fmt::Formatter<'_>,
    shown: &[InvocationSummary],
    total: usize,
) -> fmt::Result {
    if total == 0 {
        return write!(f, "  no invocations recorded");
    }
    write!(f, "  recorded invocations ({}):", total)?;
    for summary in shown {
        write!(f, "\n    {}", summary)?;
    }
    if total > shown.len() {
        write!(f, "\n    ... and {} more", total - shown.len())?;
    }
    Ok(())
}
