//! Verification engine
//!
//! Counts the real (non-setup) invocations of one partition that match a
//! method and argument spec, then evaluates a [`VerificationMode`] against
//! the count. Counted records are marked verified, which is what
//! [`VerificationEngine::verify_no_more_interactions`] later inspects.

use std::sync::Arc;

use ctxmock_core::{
    ArgumentSpec, ContextId, InvocationRecord, InvocationSummary, MethodSignature, MockError,
    MockIdentity, Result, UnverifiedInteractions, VerificationFailure, VerificationMode,
    MAX_REPORTED_INVOCATIONS,
};
use tracing::debug;

use crate::stores::Stores;

pub(crate) struct VerificationEngine<'a> {
    stores: &'a Stores,
}

impl<'a> VerificationEngine<'a> {
    pub(crate) fn new(stores: &'a Stores) -> Self {
        Self { stores }
    }

    /// Check that `method` was called with arguments matching `spec` the
    /// number of times `mode` allows, under `context`.
    pub(crate) fn verify(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        method: &MethodSignature,
        spec: &ArgumentSpec,
        mode: VerificationMode,
    ) -> Result<()> {
        let recorded = self.stores.log.query(identity, context);
        let matching: Vec<&Arc<InvocationRecord>> = recorded
            .iter()
            .filter(|record| record.method() == method && spec.matches(record.args()))
            .collect();

        for record in &matching {
            record.mark_verified();
        }

        let actual = matching.len();
        if mode.is_satisfied_by(actual) {
            return Ok(());
        }

        debug!(mock = %identity, method = %method, %mode, actual, "verification failed");
        Err(MockError::from(VerificationFailure {
            mode,
            actual,
            mock: identity.to_string(),
            method: method.clone(),
            arguments: spec.to_string(),
            context: context.cloned(),
            recorded: summarize(&recorded),
            total_recorded: recorded.len(),
        }))
    }

    /// Fail if any real call of the partition has not been accounted for by
    /// an earlier verification.
    pub(crate) fn verify_no_more_interactions(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
    ) -> Result<()> {
        let unverified: Vec<Arc<InvocationRecord>> = self
            .stores
            .log
            .query(identity, context)
            .into_iter()
            .filter(|record| !record.is_verified())
            .collect();
        self.check_empty(identity, context, unverified)
    }

    /// Fail if the partition has any real call at all
    pub(crate) fn verify_zero_interactions(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
    ) -> Result<()> {
        let recorded = self.stores.log.query(identity, context);
        self.check_empty(identity, context, recorded)
    }

    fn check_empty(
        &self,
        identity: &MockIdentity,
        context: Option<&ContextId>,
        records: Vec<Arc<InvocationRecord>>,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        Err(MockError::from(UnverifiedInteractions {
            mock: identity.to_string(),
            context: context.cloned(),
            unverified: summarize(&records),
            total_unverified: records.len(),
        }))
    }
}

fn summarize(records: &[Arc<InvocationRecord>]) -> Vec<InvocationSummary> {
    records
        .iter()
        .take(MAX_REPORTED_INVOCATIONS)
        .map(|record| record.summary())
        .collect()
}
