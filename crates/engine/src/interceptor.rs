//! Interception boundary
//!
//! Generated or hand-written test doubles forward each call to an
//! [`Interceptor`], which resolves the current context from its
//! [`ContextSource`] and hands the call to the registry. The same context is
//! used for stubbing and verification through the interceptor, so test code
//! written inside a context scope never names the context explicitly.
//!
//! Stubbing and verification fail with `MockError::MissingContext` outside
//! any context scope. Intercepted calls only do so when `require_context` is
//! set.

use std::any::Any;
use std::sync::Arc;

use ctxmock_core::{
    ArgumentSpec, ContextId, InvocationRecord, MethodSignature, MockError, MockIdentity, Result,
    Value, VerificationMode,
};

use crate::context::{ContextSource, ThreadContext};
use crate::matching::Outcome;
use crate::registry::{MockRegistry, RuleBuilder};

/// A registry bound to a context source
///
/// ```
/// use std::sync::Arc;
/// use ctxmock_core::{args, MethodSignature, Value};
/// use ctxmock_engine::{Interceptor, MockRegistry, Outcome, RegistryConfig, ThreadContext};
///
/// struct Greeter;
///
/// let registry = MockRegistry::with_config(RegistryConfig::manual_cleanup()).unwrap();
/// let interceptor = Interceptor::new(&registry);
/// let greeter = Arc::new(Greeter);
/// interceptor.register(&greeter);
/// let greet = MethodSignature::new("greet", ["String"]);
///
/// let _ctx = ThreadContext::enter("request-1");
/// interceptor.stub(&greeter, greet.clone(), args!["A"])?.returns("hello")?;
/// let outcome = interceptor.intercept(&greeter, &greet, &args!["A"]).unwrap();
/// assert_eq!(outcome, Outcome::Return(Value::from("hello")));
/// # Ok::<(), ctxmock_core::MockError>(())
/// ```
pub struct Interceptor<'r, S = ThreadContext> {
    registry: &'r MockRegistry,
    source: S,
}

impl<'r> Interceptor<'r, ThreadContext> {
    /// Interceptor reading the per-thread context stack
    pub fn new(registry: &'r MockRegistry) -> Self {
        Self::with_source(registry, ThreadContext)
    }
}

impl Interceptor<'static, ThreadContext> {
    /// Interceptor over the process-wide registry
    pub fn global() -> Self {
        Self::new(MockRegistry::global())
    }
}

impl<'r, S: ContextSource> Interceptor<'r, S> {
    /// Interceptor reading contexts from `source`
    pub fn with_source(registry: &'r MockRegistry, source: S) -> Self {
        Self { registry, source }
    }

    /// The underlying registry
    pub fn registry(&self) -> &'r MockRegistry {
        self.registry
    }

    /// Context calls are currently attributed to
    pub fn current_context(&self) -> Option<ContextId> {
        self.source.current_context()
    }

    /// Make `mock` known to the registry before it is first called
    pub fn register<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> MockIdentity {
        self.registry.register_mock(mock)
    }

    /// Forward one call made on `mock`.
    ///
    /// # Errors
    ///
    /// Returns `MockError::MissingContext` when `require_context` is set and
    /// no context is current.
    pub fn intercept<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        method: &MethodSignature,
        args: &[Value],
    ) -> Result<Outcome> {
        let identity = self.registry.register_mock(mock);
        self.intercept_identity(&identity, method, args)
    }

    /// Forward one call made on an already resolved identity
    pub fn intercept_identity(
        &self,
        identity: &MockIdentity,
        method: &MethodSignature,
        args: &[Value],
    ) -> Result<Outcome> {
        let context = self.context_for("intercept")?;
        Ok(self
            .registry
            .on_invocation(identity, method, args, context.as_ref()))
    }

    /// Begin a rule for `mock` under the current context.
    ///
    /// # Errors
    ///
    /// - `MockError::MissingContext` if no context is current
    /// - `MockError::NotAMock` if `mock` was never registered or called
    pub fn stub<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        method: MethodSignature,
        args: impl Into<ArgumentSpec>,
    ) -> Result<RuleBuilder<'r>> {
        let context = self.source.current_context();
        self.registry.stub(mock, context.as_ref(), method, args)
    }

    /// Open a stubbing expression for `mock` under the current context
    pub fn begin_stubbing<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> Result<MockIdentity> {
        let context = self.source.current_context();
        self.registry.begin_stubbing_expression(mock, context.as_ref())
    }

    /// Verify calls made under the current context
    pub fn verify<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
        method: &MethodSignature,
        args: impl Into<ArgumentSpec>,
        mode: VerificationMode,
    ) -> Result<()> {
        let context = self.source.current_context();
        self.registry
            .verify(mock, context.as_ref(), method, args, mode)
    }

    /// Fail if a call made under the current context was never verified
    pub fn verify_no_more_interactions<M: Any + Send + Sync>(&self, mock: &Arc<M>) -> Result<()> {
        let context = self.source.current_context();
        self.registry
            .verify_no_more_interactions(mock, context.as_ref())
    }

    /// Calls made under the current context
    pub fn invocations<M: Any + Send + Sync>(
        &self,
        mock: &Arc<M>,
    ) -> Result<Vec<Arc<InvocationRecord>>> {
        let context = self.source.current_context();
        self.registry.invocations(mock, context.as_ref())
    }

    fn context_for(&self, operation: &'static str) -> Result<Option<ContextId>> {
        let context = self.source.current_context();
        if context.is_none() && self.registry.config().require_context {
            return Err(MockError::MissingContext { operation });
        }
        Ok(context)
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Interceptor<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("source", &self.source)
            .finish()
    }
}
