//! Rule precedence
//!
//! Among rules whose conditions all match, the most recently added wins.

use crate::common::*;
use ctxmock::{any, args, eq, ArgMatcher, ArgumentSpec, Outcome, Value};
use proptest::prelude::*;

#[test]
fn later_rule_overrides_earlier() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry.stub(&mock, Some(&c), greet(), args!["A", 1]).unwrap().returns("x").unwrap();
    registry.stub(&mock, Some(&c), greet(), args!["A", 1]).unwrap().returns("y").unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::Return("y".into())
    );
}

#[test]
fn newer_wildcard_shadows_older_literal() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry.stub(&mock, Some(&c), greet(), args!["A", 1]).unwrap().returns("literal").unwrap();
    registry
        .stub(&mock, Some(&c), greet(), vec![any(), any()])
        .unwrap()
        .returns("wildcard")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::Return("wildcard".into())
    );
}

#[test]
fn older_rule_still_serves_what_newer_does_not_match() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry
        .stub(&mock, Some(&c), greet(), vec![any(), any()])
        .unwrap()
        .returns("fallback")
        .unwrap();
    registry
        .stub(&mock, Some(&c), greet(), vec![eq("vip"), any()])
        .unwrap()
        .returns("vip")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["vip", 1], Some(&c)),
        Outcome::Return("vip".into())
    );
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["guest", 1], Some(&c)),
        Outcome::Return("fallback".into())
    );
}

#[test]
fn arity_mismatch_never_matches() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry
        .stub(&mock, Some(&c), greet(), ArgumentSpec::matchers([any()]))
        .unwrap()
        .returns("short")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::NoRuleFound
    );
}

#[test]
fn predicate_matcher_selects_rule() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");
    let adult = ArgMatcher::predicate(">= 18", |v: &Value| v.as_int().map_or(false, |n| n >= 18));

    registry
        .stub(&mock, Some(&c), greet(), vec![any(), adult])
        .unwrap()
        .returns("welcome")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 30], Some(&c)),
        Outcome::Return("welcome".into())
    );
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 12], Some(&c)),
        Outcome::NoRuleFound
    );
}

proptest! {
    /// Whatever the sequence of identical stubs, the last one answers
    #[test]
    fn last_of_identical_stubs_wins(answers in proptest::collection::vec(proptest::num::i64::ANY, 1..20)) {
        let registry = registry();
        let mock = greeter();
        let id = registry.register_mock(&mock);
        let c = ctx("C");
        for answer in &answers {
            registry
                .stub(&mock, Some(&c), greet(), args!["A", 1])
                .unwrap()
                .returns(*answer)
                .unwrap();
        }

        let expected = Outcome::Return(Value::Int(*answers.last().unwrap()));
        prop_assert_eq!(registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)), expected);
    }
}
