//! Context isolation
//!
//! Two contexts sharing one mock never observe each other's rules,
//! invocations or state.

use crate::common::*;
use ctxmock::{args, MockError, MockState, Outcome, VerificationMode};

#[test]
fn same_call_answers_per_context() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let (c1, c2) = (ctx("C1"), ctx("C2"));

    registry.stub(&mock, Some(&c1), greet(), args!["A", 1]).unwrap().returns("one").unwrap();
    registry.stub(&mock, Some(&c2), greet(), args!["A", 1]).unwrap().returns("two").unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c1)),
        Outcome::Return("one".into())
    );
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c2)),
        Outcome::Return("two".into())
    );

    registry
        .verify(&mock, Some(&c1), &greet(), args!["A", 1], VerificationMode::once())
        .unwrap();
    registry
        .verify(&mock, Some(&c2), &greet(), args!["A", 1], VerificationMode::once())
        .unwrap();
}

#[test]
fn rule_in_one_context_is_invisible_in_another() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let (c1, c2) = (ctx("C1"), ctx("C2"));

    registry.stub(&mock, Some(&c1), greet(), args!["A", 1]).unwrap().returns("one").unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c2)),
        Outcome::NoRuleFound
    );
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], None),
        Outcome::NoRuleFound
    );
    registry
        .verify(&mock, Some(&c1), &greet(), args!["A", 1], VerificationMode::never())
        .unwrap();
}

#[test]
fn no_context_is_its_own_partition() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c1 = ctx("C1");

    registry.stub(&mock, Some(&c1), greet(), args!["A", 1]).unwrap().returns("one").unwrap();

    // Context-less calls are recorded apart and never see C1's rules
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], None),
        Outcome::NoRuleFound
    );
    assert_eq!(registry.invocations(&mock, None).unwrap().len(), 1);
    assert!(registry.invocations(&mock, Some(&c1)).unwrap().is_empty());

    // ...but cannot be stubbed or verified
    assert!(matches!(
        registry.stub(&mock, None, greet(), args!["A", 1]).err(),
        Some(MockError::MissingContext { .. })
    ));
    assert!(matches!(
        registry.verify(&mock, None, &greet(), args!["A", 1], VerificationMode::once()),
        Err(MockError::MissingContext { .. })
    ));
}

#[test]
fn state_is_per_context() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let (c1, c2) = (ctx("C1"), ctx("C2"));

    registry
        .stub(&mock, Some(&c1), greet(), args!["A", 1])
        .unwrap()
        .then_state(MockState::of("greeted"))
        .returns("one")
        .unwrap();

    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c1));

    assert_eq!(registry.current_state(&mock, Some(&c1)).unwrap(), MockState::of("greeted"));
    assert_eq!(registry.current_state(&mock, Some(&c2)).unwrap(), MockState::Unset);
}

#[test]
fn distinct_mocks_never_share_partitions() {
    let registry = registry();
    let (a, b) = (greeter(), greeter());
    registry.register_mock(&a);
    let id_b = registry.register_mock(&b);
    let c1 = ctx("C1");

    registry.stub(&a, Some(&c1), greet(), args!["A", 1]).unwrap().returns("a").unwrap();

    assert_eq!(
        registry.on_invocation(&id_b, &greet(), &args!["A", 1], Some(&c1)),
        Outcome::NoRuleFound
    );
    assert!(registry.invocations(&a, Some(&c1)).unwrap().is_empty());
}
