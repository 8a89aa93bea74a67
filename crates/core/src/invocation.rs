//! Invocation records
//!
//! One [`InvocationRecord`] is appended to the invocation log for every
//! intercepted call. Records are immutable except for the `verified` flag,
//! which only ever goes from `false` to `true`.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};

use crate::identity::MockIdentity;
use crate::matcher::ArgMatcher;
use crate::timestamp::Timestamp;
use crate::types::{ContextId, MethodSignature};
use crate::value::Value;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

/// A single intercepted call
pub struct InvocationRecord {
    sequence: u64,
    mock: MockIdentity,
    method: MethodSignature,
    args: Vec<Value>,
    context: Option<ContextId>,
    timestamp: Timestamp,
    thread: ThreadId,
    setup: bool,
    verified: AtomicBool,
    matchers: Option<Vec<ArgMatcher>>,
}

impl InvocationRecord {
    /// Record a call made on the current thread, now.
    ///
    /// `args` is copied; later mutation by the caller does not affect the
    /// record.
    pub fn new(
        mock: MockIdentity,
        method: MethodSignature,
        args: &[Value],
        context: Option<ContextId>,
    ) -> Self {
        Self {
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            mock,
            method,
            args: args.to_vec(),
            context,
            timestamp: Timestamp::now(),
            thread: thread::current().id(),
            setup: false,
            verified: AtomicBool::new(false),
            matchers: None,
        }
    }

    /// Mark as the call made while expressing a stub; such records never
    /// count toward verification.
    pub fn as_setup(mut self) -> Self {
        self.setup = true;
        self
    }

    /// Attach the matchers that were registered for this call
    pub fn with_matchers(mut self, matchers: Vec<ArgMatcher>) -> Self {
        self.matchers = Some(matchers);
        self
    }

    /// Override the record time
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Global append sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Mock the call was made on
    pub fn mock(&self) -> &MockIdentity {
        &self.mock
    }

    /// Invoked method
    pub fn method(&self) -> &MethodSignature {
        &self.method
    }

    /// Arguments, as copied at record time
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Context the call was made under
    pub fn context(&self) -> Option<&ContextId> {
        self.context.as_ref()
    }

    /// When the call was recorded
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Thread that made the call
    pub fn thread(&self) -> ThreadId {
        self.thread
    }

    /// Check whether this is a stubbing-setup call
    pub fn is_setup(&self) -> bool {
        self.setup
    }

    /// Matchers captured with the call, if any
    pub fn matchers(&self) -> Option<&[ArgMatcher]> {
        self.matchers.as_deref()
    }

    /// Check whether a verification has accounted for this call
    pub fn is_verified(&self) -> bool {
        self.verified.load(Ordering::Acquire)
    }

    /// Mark this call as accounted for by a verification
    pub fn mark_verified(&self) {
        self.verified.store(true, Ordering::Release);
    }

    /// Owned snapshot for diagnostics
    pub fn summary(&self) -> InvocationSummary {
        InvocationSummary {
            sequence: self.sequence,
            method: self.method.clone(),
            args: self.args.clone(),
            timestamp: self.timestamp,
            thread: self.thread,
            verified: self.is_verified(),
        }
    }
}

impl fmt::Debug for InvocationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationRecord")
            .field("sequence", &self.sequence)
            .field("mock", &self.mock)
            .field("method", &self.method)
            .field("args", &self.args)
            .field("context", &self.context)
            .field("setup", &self.setup)
            .field("verified", &self.is_verified())
            .finish()
    }
}

/// Detached view of a record, carried in verification reports
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationSummary {
    /// Global append sequence number
    pub sequence: u64,
    /// Invoked method
    pub method: MethodSignature,
    /// Arguments
    pub args: Vec<Value>,
    /// When the call was recorded
    pub timestamp: Timestamp,
    /// Thread that made the call
    pub thread: ThreadId,
    /// Whether a verification had accounted for it
    pub verified: bool,
}

impl fmt::Display for InvocationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}(", self.sequence, self.method.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, ") at {} on {:?}", self.timestamp, self.thread)
    }
}
