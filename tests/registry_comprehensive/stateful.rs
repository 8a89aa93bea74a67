//! Stateful stubbing
//!
//! Rules gated on the (mock, context) state, and transitions applied after
//! a rule answers.

use std::sync::Arc;

use crate::common::*;
use ctxmock::{MockState, Outcome, ThrownError};

fn auth_rules(registry: &ctxmock::MockRegistry, mock: &Arc<AuthService>, c: &ctxmock::ContextId) {
    registry
        .stub(mock, Some(c), login(), ctxmock::ArgumentSpec::none())
        .unwrap()
        .when_state(MockState::Unset)
        .then_state(MockState::of("IN"))
        .returns(true)
        .unwrap();
    registry
        .stub(mock, Some(c), get_secret(), ctxmock::ArgumentSpec::none())
        .unwrap()
        .when_state(MockState::of("IN"))
        .returns("s3cr3t")
        .unwrap();
    registry
        .stub(mock, Some(c), logout(), ctxmock::ArgumentSpec::none())
        .unwrap()
        .when_state(MockState::of("IN"))
        .then_state(MockState::of("OUT"))
        .returns(true)
        .unwrap();
    registry
        .stub(mock, Some(c), get_secret(), ctxmock::ArgumentSpec::none())
        .unwrap()
        .when_state(MockState::of("OUT"))
        .throws(ThrownError::new("IllegalState", "logged out"))
        .unwrap();
}

#[test]
fn login_secret_logout_scenario() {
    let registry = registry();
    let mock = Arc::new(AuthService);
    let id = registry.register_mock(&mock);
    let c = ctx("session-1");
    auth_rules(&registry, &mock, &c);

    // Before login no gated rule applies
    assert_eq!(
        registry.on_invocation(&id, &get_secret(), &[], Some(&c)),
        Outcome::NoRuleFound
    );

    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::Return(true.into())
    );
    assert_eq!(
        registry.on_invocation(&id, &get_secret(), &[], Some(&c)),
        Outcome::Return("s3cr3t".into())
    );

    // Login is only stubbed for a fresh session
    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::NoRuleFound
    );
    assert_eq!(registry.current_state(&mock, Some(&c)).unwrap(), MockState::of("IN"));

    registry.on_invocation(&id, &logout(), &[], Some(&c));
    assert_eq!(
        registry.on_invocation(&id, &get_secret(), &[], Some(&c)),
        Outcome::Throw(ThrownError::new("IllegalState", "logged out"))
    );
    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::NoRuleFound
    );
    assert_eq!(registry.current_state(&mock, Some(&c)).unwrap(), MockState::of("OUT"));
}

#[test]
fn sessions_progress_independently() {
    let registry = registry();
    let mock = Arc::new(AuthService);
    let id = registry.register_mock(&mock);
    let (s1, s2) = (ctx("s1"), ctx("s2"));
    auth_rules(&registry, &mock, &s1);
    auth_rules(&registry, &mock, &s2);

    registry.on_invocation(&id, &login(), &[], Some(&s1));

    assert_eq!(
        registry.on_invocation(&id, &get_secret(), &[], Some(&s1)),
        Outcome::Return("s3cr3t".into())
    );
    assert_eq!(
        registry.on_invocation(&id, &get_secret(), &[], Some(&s2)),
        Outcome::NoRuleFound
    );
}

#[test]
fn gate_on_unset_matches_only_before_any_transition() {
    let registry = registry();
    let mock = Arc::new(AuthService);
    let id = registry.register_mock(&mock);
    let c = ctx("c");

    registry
        .stub(&mock, Some(&c), login(), ctxmock::ArgumentSpec::none())
        .unwrap()
        .when_state(MockState::Unset)
        .then_state(MockState::of(1))
        .returns("first login")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::Return("first login".into())
    );
    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::NoRuleFound
    );

    registry.reset_state(&mock, Some(&c)).unwrap();
    assert_eq!(
        registry.on_invocation(&id, &login(), &[], Some(&c)),
        Outcome::Return("first login".into())
    );
}

#[test]
fn answer_computes_from_arguments_and_state() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("c");

    registry
        .stub(&mock, Some(&c), greet(), vec![ctxmock::any(), ctxmock::any()])
        .unwrap()
        .then_state(MockState::of("greeted"))
        .answers(|view| {
            let name = view.args[0].as_str().unwrap_or("?");
            Ok(format!("hello {} ({})", name, view.state).into())
        })
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &ctxmock::args!["A", 1], Some(&c)),
        Outcome::Return(format!("hello A ({})", MockState::Unset).into())
    );
    assert_eq!(
        registry.on_invocation(&id, &greet(), &ctxmock::args!["B", 1], Some(&c)),
        Outcome::Return(format!("hello B ({})", MockState::of("greeted")).into())
    );
}
