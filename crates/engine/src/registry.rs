//! The mock registry
//!
//! [`MockRegistry`] is the single entry point interceptors, stubbing code and
//! verification code talk to. It owns:
//!
//! - the partitioned stores (identities, rules, invocation log, states)
//! - the per-thread pending stubbing expressions
//! - the runtime configuration
//! - the lifecycle manager and its background sweeper
//!
//! A registry is either created explicitly (usually one per test) or used
//! through the lazily initialized process-wide instance, [`MockRegistry::global`].
//!
//! # Stubbing expressions
//!
//! When a stub is expressed by calling the mock itself, that call must not
//! count as a real invocation. Between [`MockRegistry::begin_stubbing_expression`]
//! and [`MockRegistry::end_stubbing_expression`], the first call the same
//! thread makes on that mock is recorded with `is_setup = true`, consults no
//! rule, changes no state and is returned as a [`CapturedCall`]. Calls on
//! other threads or other mocks are unaffected.
//!
//! An expression left open by a thread that exits, or panics, is dropped by
//! the next sweep.
//!
//! # Contexts
//!
//! Interception accepts calls with no context and files them under the
//! context-less partition. Stubbing and verification always name a context
//! and fail with `MockError::MissingContext` when given none.
//!
//! A mock becomes known to the registry through [`MockRegistry::register_mock`]
//! or its first intercepted call. Stubbing or verifying anything else fails
//! with `MockError::NotAMock`.

use std::any::{type_name, Any};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use ctxmock_core::{
    ArgMatcher, ArgumentSpec, ContextId, InvocationRecord, InvocationView, MethodSignature,
    MockError, MockIdentity, MockState, Result, StubAction, StubbingRule, ThrownError, Timestamp,
    Value, VerificationMode,
};
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::RegistryConfig;
use crate::lifecycle::{CleanupStats, LifecycleManager};
use crate::matching::{MatchingEngine, Outcome};
use crate::stores::{ClearedData, PendingStubbing, Stores};
use crate::verification::VerificationEngine;

/// Process-wide registry
static GLOBAL_REGISTRY: Lazy<MockRegistry> = Lazy::new(MockRegistry::new);

/// The call captured by a stubbing expression
#[derive(Debug, Clone)]
pub struct CapturedCall {
    /// Mock the call was made on
    pub identity: MockIdentity,
    /// Context the stub applies to
    pub context: ContextId,
    /// Invoked method
    pub method: MethodSignature,
    /// Arguments as passed
    pub args: Vec<Value>,
    /// Matchers registered during the expression, if any
    pub matchers: Option<Vec<ArgMatcher>>,
}

impl CapturedCall {
    /// Argument spec for a rule built from this call.
    ///
    /// Registered matchers win over the literal arguments.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidRule` if the number of matchers differs
    /// from the number of arguments.
    pub fn argument_spec(&self) -> Result<ArgumentSpec> {
        match &self.matchers {
            Some(matchers) if matchers.len() != self.args.len() => {
                Err(MockError::InvalidRule(format!(
                    "{} matchers registered for {} arguments of {}",
                    matchers.len(),
                    self.args.len(),
                    self.method
                )))
            }
            Some(matchers) => Ok(ArgumentSpec::Matchers(matchers.clone())),
            None => Ok(ArgumentSpec::Literal(self.args.clone())),
        }
    }
}

/// Snapshot of registry sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Tracked mock identities
    pub identities: usize,
    /// (mock, context) partitions holding rules
    pub rule_partitions: usize,
    /// Stubbing rules, expired ones not yet evicted included
    pub rules: usize,
    /// (mock, context) partitions holding records
    pub log_partitions: usize,
    /// Invocation records, setup calls included
    pub records: usize,
    /// (mock, context) partitions with a state
    pub states: usize,
    /// Stubbing expressions open on some thread
    pub pending_stubbings: usize,
}

/// Context-partitioned registry of stubs, invocations and states
pub struct MockRegistry {
    stores: Arc<Stores>,
    config: Arc<RwLock<RegistryConfig>>,
    // Serializes configuration changes with the sweeper toggles they imply
    reconfigure: Mutex<()>,
    lifecycle: LifecycleManager,
}

impl MockRegistry {
    /// Registry with the default configuration
    pub fn new() -> Self {
        Self::build(RegistryConfig::default())
    }

    /// Registry with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns `MockError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    /// Registry configured from a TOML file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        Ok(Self::build(RegistryConfig::from_file(path)?))
    }

    fn build(config: RegistryConfig) -> Self {
        let auto_cleanup = config.auto_cleanup;
        let stores = Arc::new(Stores::default());
        let config = Arc::new(RwLock::new(config));
        let lifecycle = LifecycleManager::new(Arc::clone(&stores), Arc::clone(&config));
        if auto_cleanup {
            lifecycle.enable_auto_cleanup();
        }
        Self {
            stores,
            config,
            reconfigure: Mutex::new(()),
            lifecycle,
        }
    }

    /// The process-wide registry, created on first use
    pub fn global() -> &'static MockRegistry {
        &GLOBAL_REGISTRY
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Current configuration
    pub fn config(&self) -> RegistryConfig {
        self.config.read().clone()
    }

    /// Change the configuration at runtime.
    ///
    /// `update` sees the configuration as it is when the change applies, and
    /// the result is validated as a whole before it is stored. Concurrent
    /// updates apply one after the other. Toggling `auto_cleanup` starts or
    /// stops the background sweeper.
    pub fn update_config<F>(&self, update: F) -> Result<()>
    where
        F: FnOnce(&mut RegistryConfig),
    {
        let _serial = self.reconfigure.lock();
        let auto_cleanup = {
            let mut config = self.config.write();
            let mut next = config.clone();
            update(&mut next);
            next.validate()?;
            *config = next;
            config.auto_cleanup
        };

        // The sweeper reads the configuration; toggle it after the write lock drops
        if auto_cleanup {
            self.lifecycle.enable_auto_cleanup();
        } else {
            self.lifecycle.disable_auto_cleanup();
        }
        info!(auto_cleanup, "registry configuration updated");
        Ok(())
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Canonical identity of `mock`, registering it on first use
    pub fn register_mock<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> MockIdentity {
        self.stores.identities.canonicalize(mock)
    }

    /// Identity of an already registered mock.
    ///
    /// # Errors
    ///
    /// Returns `MockError::NotAMock` if `mock` was never registered.
    pub fn identity_of<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> Result<MockIdentity> {
        self.stores
            .identities
            .lookup(mock)
            .ok_or_else(|| MockError::NotAMock(type_name::<M>().to_string()))
    }

    // ========================================================================
    // Interception
    // ========================================================================

    /// Handle one intercepted call.
    ///
    /// The call is always recorded. If it is the pending setup call of a
    /// stubbing expression on this thread, it is captured and answered with
    /// `NoRuleFound`; otherwise the matching engine selects a rule.
    pub fn on_invocation(
        &self,
        identity: &MockIdentity,
        method: &MethodSignature,
        args: &[Value],
        context: Option<&ContextId>,
    ) -> Outcome {
        if self.capture_setup_call(identity, method, args, context) {
            return Outcome::NoRuleFound;
        }
        MatchingEngine::new(&self.stores).dispatch(identity, method, args, context, Timestamp::now())
    }

    fn capture_setup_call(
        &self,
        identity: &MockIdentity,
        method: &MethodSignature,
        args: &[Value],
        context: Option<&ContextId>,
    ) -> bool {
        let tid = thread::current().id();
        let awaiting = self
            .stores
            .pending
            .get(&tid)
            .map_or(false, |p| p.identity == *identity && p.captured.is_none());
        if !awaiting {
            return false;
        }

        // Only this thread touches its own entry
        let mut pending = match self.stores.pending.get_mut(&tid) {
            Some(pending) => pending,
            None => return false,
        };
        let mut record =
            InvocationRecord::new(identity.clone(), method.clone(), args, context.cloned())
                .as_setup();
        if let Some(matchers) = &pending.matchers {
            record = record.with_matchers(matchers.clone());
        }
        pending.captured = self.stores.log.record(record);
        debug!(mock = %identity, method = %method, "captured stubbing call");
        pending.captured.is_some()
    }

    // ========================================================================
    // Stubbing
    // ========================================================================

    /// Start a stubbing expression for `mock` on this thread.
    ///
    /// # Errors
    ///
    /// - `MockError::MissingContext` if `context` is `None`
    /// - `MockError::NotAMock` if `mock` was never registered
    /// - `MockError::StubbingAlreadyInProgress` if this thread already has an
    ///   open expression
    pub fn begin_stubbing_expression<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<MockIdentity> {
        let context = required(context, "begin_stubbing")?;
        let identity = self.identity_of(mock)?;
        match self.stores.pending.entry(thread::current().id()) {
            Entry::Occupied(_) => Err(MockError::StubbingAlreadyInProgress),
            Entry::Vacant(slot) => {
                slot.insert(PendingStubbing::open(identity.clone(), context.clone()));
                Ok(identity)
            }
        }
    }

    /// Attach argument matchers to this thread's open stubbing expression
    pub fn register_matchers(&self, matchers: Vec<ArgMatcher>) -> Result<()> {
        let mut pending = self
            .stores
            .pending
            .get_mut(&thread::current().id())
            .ok_or(MockError::NoStubbingInProgress)?;
        pending.matchers.get_or_insert_with(Vec::new).extend(matchers);
        Ok(())
    }

    /// Close this thread's stubbing expression and return the captured call.
    ///
    /// # Errors
    ///
    /// - `MockError::NoStubbingInProgress` if no expression is open
    /// - `MockError::NoInvocationCaptured` if the mock was not called
    pub fn end_stubbing_expression(&self) -> Result<CapturedCall> {
        let (_, pending) = self
            .stores
            .pending
            .remove(&thread::current().id())
            .ok_or(MockError::NoStubbingInProgress)?;
        let record = pending
            .captured
            .ok_or_else(|| MockError::NoInvocationCaptured(pending.identity.to_string()))?;

        Ok(CapturedCall {
            identity: pending.identity,
            context: pending.context,
            method: record.method().clone(),
            args: record.args().to_vec(),
            matchers: pending.matchers,
        })
    }

    /// Abandon this thread's stubbing expression, if any
    pub fn cancel_stubbing_expression(&self) -> bool {
        self.stores
            .pending
            .remove(&thread::current().id())
            .is_some()
    }

    /// Begin a rule for `method` of `mock` under `context`.
    ///
    /// # Errors
    ///
    /// - `MockError::MissingContext` if `context` is `None`
    /// - `MockError::NotAMock` if `mock` was never registered
    pub fn stub<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
        method: MethodSignature,
        args: impl Into<ArgumentSpec>,
    ) -> Result<RuleBuilder<'_>> {
        let context = required(context, "stub")?;
        let identity = self.identity_of(mock)?;
        Ok(RuleBuilder::new(self, identity, context.clone(), method, args.into()))
    }

    /// Begin a rule matching a call captured by a stubbing expression
    pub fn stub_captured(&self, captured: CapturedCall) -> Result<RuleBuilder<'_>> {
        let args = captured.argument_spec()?;
        Ok(RuleBuilder::new(
            self,
            captured.identity,
            captured.context,
            captured.method,
            args,
        ))
    }

    /// Publish a fully built rule.
    ///
    /// The rule takes precedence over every earlier rule of the partition.
    pub fn add_rule(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        rule: StubbingRule,
    ) -> Arc<StubbingRule> {
        let rule = self.stores.rules.add_rule(identity, context, rule);
        debug!(
            mock = %identity,
            context = ?context,
            method = %rule.method(),
            rule = rule.id(),
            "registered stubbing rule"
        );
        rule
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Check how often `method` was called with matching arguments.
    ///
    /// # Errors
    ///
    /// - `MockError::MissingContext` if `context` is `None`
    /// - `MockError::NotAMock` if `mock` was never registered
    /// - `MockError::Verification` if the count does not satisfy `mode`
    pub fn verify<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
        method: &MethodSignature,
        args: impl Into<ArgumentSpec>,
        mode: VerificationMode,
    ) -> Result<()> {
        let context = required(context, "verify")?;
        let identity = self.identity_of(mock)?;
        VerificationEngine::new(&self.stores).verify(
            &identity,
            Some(context),
            method,
            &args.into(),
            mode,
        )
    }

    /// Fail if some real call under `context` was never verified
    pub fn verify_no_more_interactions<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<()> {
        let context = required(context, "verify_no_more_interactions")?;
        let identity = self.identity_of(mock)?;
        VerificationEngine::new(&self.stores).verify_no_more_interactions(&identity, Some(context))
    }

    /// Fail if the mock was called at all under `context`
    pub fn verify_zero_interactions<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<()> {
        let context = required(context, "verify_zero_interactions")?;
        let identity = self.identity_of(mock)?;
        VerificationEngine::new(&self.stores).verify_zero_interactions(&identity, Some(context))
    }

    /// Real invocations of `mock` under `context`, in call order
    pub fn invocations<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<Vec<Arc<InvocationRecord>>> {
        let identity = self.identity_of(mock)?;
        Ok(self.stores.log.query(&identity, context))
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Current state of `mock` under `context`
    pub fn current_state<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<MockState> {
        let identity = self.identity_of(mock)?;
        Ok(self.stores.states.get(&identity, context))
    }

    /// Return `mock` to `Unset` under `context`
    pub fn reset_state<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        context: Option<&ContextId>,
    ) -> Result<()> {
        let identity = self.identity_of(mock)?;
        self.stores.states.reset(&identity, context);
        Ok(())
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drop every rule, record and state of one mock, across all contexts
    pub fn clear_mock_data(&self, identity: &MockIdentity) -> ClearedData {
        let cleared = self.stores.clear_mock(identity.id());
        debug!(mock = %identity, ?cleared, "cleared mock data");
        cleared
    }

    /// Drop every rule, record and state filed under `context`, across all
    /// mocks. Call when a request, session or tenant ends.
    pub fn clear_context(&self, context: Option<&ContextId>) -> ClearedData {
        let cleared = self.stores.clear_context(context);
        debug!(context = ?context, ?cleared, "cleared context");
        cleared
    }

    /// Forget everything: identities, rules, records, states and open
    /// stubbing expressions
    pub fn clear_all(&self) {
        self.stores.clear();
        info!("registry cleared");
    }

    /// Run a sweep now
    pub fn cleanup_now(&self) -> CleanupStats {
        self.lifecycle.cleanup_now()
    }

    /// Run a sweep as if the current time were `now`
    pub fn cleanup_at(&self, now: Timestamp) -> CleanupStats {
        self.lifecycle.cleanup_at(now)
    }

    /// Counters accumulated over every sweep so far
    pub fn cleanup_totals(&self) -> CleanupStats {
        self.lifecycle.totals()
    }

    /// Start the background sweeper
    pub fn enable_auto_cleanup(&self) -> bool {
        let _serial = self.reconfigure.lock();
        self.config.write().auto_cleanup = true;
        self.lifecycle.enable_auto_cleanup()
    }

    /// Stop the background sweeper
    pub fn disable_auto_cleanup(&self) {
        let _serial = self.reconfigure.lock();
        self.config.write().auto_cleanup = false;
        self.lifecycle.disable_auto_cleanup();
    }

    /// Check whether the background sweeper is running
    pub fn is_auto_cleanup_running(&self) -> bool {
        self.lifecycle.is_auto_cleanup_running()
    }

    /// Current sizes
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            identities: self.stores.identities.len(),
            rule_partitions: self.stores.rules.partition_count(),
            rules: self.stores.rules.total_rules(),
            log_partitions: self.stores.log.partition_count(),
            records: self.stores.log.total_records(),
            states: self.stores.states.len(),
            pending_stubbings: self.stores.pending.len(),
        }
    }
}

fn required<'c>(context: Option<&'c ContextId>, operation: &'static str) -> Result<&'c ContextId> {
    context.ok_or(MockError::MissingContext { operation })
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRegistry")
            .field("stats", &self.stats())
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}

/// Builder for one stubbing rule
///
/// Nothing is published until a terminal method (`returns`, `throws`,
/// `answers` or `then`) is called.
#[must_use = "a rule is only registered by returns(), throws(), answers() or then()"]
pub struct RuleBuilder<'r> {
    registry: &'r MockRegistry,
    identity: MockIdentity,
    context: ContextId,
    method: MethodSignature,
    args: ArgumentSpec,
    required_state: Option<MockState>,
    next_state: Option<MockState>,
    ttl: Option<Duration>,
}

impl<'r> RuleBuilder<'r> {
    fn new(
        registry: &'r MockRegistry,
        identity: MockIdentity,
        context: ContextId,
        method: MethodSignature,
        args: ArgumentSpec,
    ) -> Self {
        Self {
            registry,
            identity,
            context,
            method,
            args,
            required_state: None,
            next_state: None,
            ttl: None,
        }
    }

    /// Only match while the state equals `state`
    pub fn when_state(mut self, state: MockState) -> Self {
        self.required_state = Some(state);
        self
    }

    /// Move to `state` after the rule answers
    pub fn then_state(mut self, state: MockState) -> Self {
        self.next_state = Some(state);
        self
    }

    /// Stop matching `ttl` after registration
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Answer with a fixed value
    pub fn returns(self, value: impl Into<Value>) -> Result<Arc<StubbingRule>> {
        self.then(StubAction::Return(value.into()))
    }

    /// Answer with a fixed error
    pub fn throws(self, error: ThrownError) -> Result<Arc<StubbingRule>> {
        self.then(StubAction::Throw(error))
    }

    /// Compute the answer from each invocation
    pub fn answers<F>(self, answer: F) -> Result<Arc<StubbingRule>>
    where
        F: Fn(&InvocationView<'_>) -> std::result::Result<Value, ThrownError>
            + Send
            + Sync
            + 'static,
    {
        self.then(StubAction::answer(answer))
    }

    /// Register the rule with an explicit action
    pub fn then(self, action: StubAction) -> Result<Arc<StubbingRule>> {
        let mut rule = StubbingRule::new(self.method, self.args, action)?;
        if let Some(state) = self.required_state {
            rule = rule.with_required_state(state);
        }
        if let Some(state) = self.next_state {
            rule = rule.with_next_state(state);
        }
        if let Some(ttl) = self.ttl {
            rule = rule.with_ttl(ttl);
        }
        Ok(self
            .registry
            .add_rule(&self.identity, Some(&self.context), rule))
    }
}
