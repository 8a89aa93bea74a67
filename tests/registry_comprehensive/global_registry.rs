//! Global registry and thread-bound contexts
//!
//! The process-wide registry is shared by every test in this binary, so each
//! test uses its own mocks and contexts and never clears it.

use std::sync::Arc;
use std::thread;

use crate::common::*;
use ctxmock::{
    args, ContextId, Interceptor, MockError, MockRegistry, Outcome, ThreadContext, VerificationMode,
};

#[test]
fn global_is_a_single_instance() {
    let a = MockRegistry::global() as *const MockRegistry;
    let b = thread::spawn(|| MockRegistry::global() as *const MockRegistry as usize)
        .join()
        .unwrap();
    assert_eq!(a as usize, b);
}

#[test]
fn global_interceptor_routes_by_thread_context() {
    let mock = greeter();
    let interceptor = Interceptor::global();
    interceptor.register(&mock);
    let tenants = ["global-tenant-a", "global-tenant-b"];

    for tenant in tenants {
        let _guard = ThreadContext::enter(tenant);
        interceptor
            .stub(&mock, greet(), args!["A", 1])
            .unwrap()
            .returns(tenant)
            .unwrap();
    }

    let handles: Vec<_> = tenants
        .iter()
        .map(|tenant| {
            let mock = Arc::clone(&mock);
            let tenant = tenant.to_string();
            thread::spawn(move || {
                let interceptor = Interceptor::global();
                let _guard = ThreadContext::enter(tenant.as_str());
                interceptor.intercept(&mock, &greet(), &args!["A", 1]).unwrap()
            })
        })
        .collect();

    for (tenant, h) in tenants.iter().zip(handles) {
        assert_eq!(h.join().unwrap(), Outcome::Return((*tenant).into()));
    }

    let registry = MockRegistry::global();
    for tenant in tenants {
        let c = ContextId::from(tenant);
        registry
            .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::once())
            .unwrap();
    }
}

#[test]
fn global_stubbing_outside_any_context_is_rejected() {
    let mock = greeter();
    let interceptor = Interceptor::global();
    interceptor.register(&mock);
    assert_eq!(interceptor.current_context(), None);

    assert!(matches!(
        interceptor.stub(&mock, greet(), args!["A", 1]).err(),
        Some(MockError::MissingContext { operation: "stub" })
    ));
    assert!(matches!(
        interceptor.verify(&mock, &greet(), args!["A", 1], VerificationMode::never()),
        Err(MockError::MissingContext { operation: "verify" })
    ));

    // A raw call outside any context is still accepted
    assert_eq!(
        interceptor.intercept(&mock, &greet(), &args!["A", 1]).unwrap(),
        Outcome::NoRuleFound
    );
}

#[test]
fn nested_thread_contexts_restore_on_exit() {
    let mock = greeter();
    let interceptor = Interceptor::global();
    let id = MockRegistry::global().register_mock(&mock);

    {
        let _outer = ThreadContext::enter("global-outer");
        {
            let _inner = ThreadContext::enter("global-inner");
            assert_eq!(interceptor.current_context(), Some(ctx("global-inner")));
            interceptor.intercept_identity(&id, &greet(), &args!["A", 1]).unwrap();
        }
        assert_eq!(interceptor.current_context(), Some(ctx("global-outer")));
        interceptor.intercept_identity(&id, &greet(), &args!["A", 1]).unwrap();
    }
    assert_eq!(ThreadContext::current(), None);

    for name in ["global-outer", "global-inner"] {
        let c = ctx(name);
        MockRegistry::global()
            .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::once())
            .unwrap();
    }
}
