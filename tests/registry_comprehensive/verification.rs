//! Verification
//!
//! Counting laws, failure reports and no-more-interactions.

use crate::common::*;
use ctxmock::{any, args, eq, MockError, VerificationMode, MAX_REPORTED_INVOCATIONS};
use proptest::prelude::*;

#[test]
fn counts_only_matching_calls_in_context() {
    let registry = registry();
    let mock = greeter();
    let (c1, c2) = (ctx("C1"), ctx("C2"));
    let id = registry.register_mock(&mock);

    for _ in 0..3 {
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c1));
    }
    registry.on_invocation(&id, &greet(), &args!["B", 1], Some(&c1));
    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c2));

    registry
        .verify(&mock, Some(&c1), &greet(), args!["A", 1], VerificationMode::times(3))
        .unwrap();
    registry
        .verify(&mock, Some(&c1), &greet(), vec![any(), any()], VerificationMode::times(4))
        .unwrap();
    registry
        .verify(&mock, Some(&c2), &greet(), vec![eq("A"), any()], VerificationMode::once())
        .unwrap();
}

#[test]
fn failure_reports_expected_actual_and_recorded_calls() {
    let registry = registry();
    let mock = greeter();
    let c = ctx("C");
    let id = registry.register_mock(&mock);

    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c));
    registry.on_invocation(&id, &greet(), &args!["B", 2], Some(&c));

    let err = registry
        .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::times(2))
        .unwrap_err();
    assert!(!err.is_usage_error());

    let failure = err.as_verification_failure().unwrap();
    assert_eq!(failure.mode, VerificationMode::times(2));
    assert_eq!(failure.actual, 1);
    assert_eq!(failure.context, Some(c));
    assert_eq!(failure.total_recorded, 2);
    assert_eq!(failure.recorded.len(), 2);
    assert_eq!(failure.recorded[1].args, args!["B", 2]);

    let message = err.to_string();
    assert!(message.contains("greet"), "{}", message);
}

#[test]
fn failure_report_is_capped() {
    let registry = registry();
    let mock = greeter();
    let c = ctx("C");
    let id = registry.register_mock(&mock);

    let calls = MAX_REPORTED_INVOCATIONS + 5;
    for i in 0..calls {
        registry.on_invocation(&id, &greet(), &args!["A", i as i64], Some(&c));
    }

    let err = registry
        .verify(&mock, Some(&c), &greet(), vec![any(), any()], VerificationMode::never())
        .unwrap_err();
    let failure = err.as_verification_failure().unwrap();
    assert_eq!(failure.recorded.len(), MAX_REPORTED_INVOCATIONS);
    assert_eq!(failure.total_recorded, calls);
}

#[test]
fn unregistered_mock_is_a_usage_error() {
    let registry = registry();
    let stranger = greeter();
    let c = ctx("C");
    let err = registry
        .verify(&stranger, Some(&c), &greet(), args!["A", 1], VerificationMode::never())
        .unwrap_err();
    assert!(matches!(err, MockError::NotAMock(_)));
    assert!(err.is_usage_error());
}

#[test]
fn verification_without_context_is_a_usage_error() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    registry.on_invocation(&id, &greet(), &args!["A", 1], None);

    for err in [
        registry
            .verify(&mock, None, &greet(), args!["A", 1], VerificationMode::once())
            .unwrap_err(),
        registry.verify_no_more_interactions(&mock, None).unwrap_err(),
        registry.verify_zero_interactions(&mock, None).unwrap_err(),
    ] {
        assert!(matches!(err, MockError::MissingContext { .. }), "{:?}", err);
        assert!(err.is_usage_error());
    }

    // The context-less call is still on record
    assert_eq!(registry.invocations(&mock, None).unwrap().len(), 1);
}

#[test]
fn no_more_interactions_after_everything_verified() {
    let registry = registry();
    let mock = greeter();
    let c = ctx("C");
    let id = registry.register_mock(&mock);

    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c));
    registry.on_invocation(&id, &greet(), &args!["B", 2], Some(&c));

    registry
        .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::once())
        .unwrap();
    let err = registry.verify_no_more_interactions(&mock, Some(&c)).unwrap_err();
    match err {
        MockError::UnverifiedInteractions(report) => {
            assert_eq!(report.total_unverified, 1);
            assert_eq!(report.unverified[0].args, args!["B", 2]);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    registry
        .verify(&mock, Some(&c), &greet(), args!["B", 2], VerificationMode::once())
        .unwrap();
    registry.verify_no_more_interactions(&mock, Some(&c)).unwrap();
}

#[test]
fn no_more_interactions_ignores_setup_and_other_contexts() {
    let registry = registry();
    let mock = greeter();
    let (c1, c2) = (ctx("C1"), ctx("C2"));
    registry.register_mock(&mock);

    let id = registry.begin_stubbing_expression(&mock, Some(&c1)).unwrap();
    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c1));
    let captured = registry.end_stubbing_expression().unwrap();
    registry.stub_captured(captured).unwrap().returns("x").unwrap();

    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c2));

    registry.verify_no_more_interactions(&mock, Some(&c1)).unwrap();
    registry.verify_zero_interactions(&mock, Some(&c1)).unwrap();
    assert!(registry.verify_zero_interactions(&mock, Some(&c2)).is_err());
}

proptest! {
    /// times(n) holds exactly at the real count; at_least/at_most bracket it
    #[test]
    fn counting_laws(calls in 0usize..12, n in 0usize..12) {
        let registry = registry();
        let mock = greeter();
        let c = ctx("C");
        let id = registry.register_mock(&mock);
        for _ in 0..calls {
            registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c));
        }

        let check = |mode| registry.verify(&mock, Some(&c), &greet(), args!["A", 1], mode).is_ok();
        prop_assert!(check(VerificationMode::times(calls)));
        prop_assert_eq!(check(VerificationMode::times(n)), n == calls);
        prop_assert_eq!(check(VerificationMode::at_least(n)), calls >= n);
        prop_assert_eq!(check(VerificationMode::at_most(n)), calls <= n);
        prop_assert_eq!(check(VerificationMode::never()), calls == 0);
    }
}
