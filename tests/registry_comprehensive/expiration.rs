//! Rule expiration
//!
//! TTLs are honored at match time even if no sweep ever runs.

use std::thread;
use std::time::Duration;

use crate::common::*;
use ctxmock::{args, Outcome};

#[test]
fn expired_rule_stops_matching_without_sweep() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry
        .stub(&mock, Some(&c), greet(), args!["A", 1])
        .unwrap()
        .ttl(Duration::from_millis(50))
        .returns("fresh")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::Return("fresh".into())
    );

    thread::sleep(Duration::from_millis(80));
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::NoRuleFound
    );
    // Lazily evicted by the failed match
    assert_eq!(registry.stats().rules, 0);
}

#[test]
fn expired_override_uncovers_older_rule() {
    let registry = registry();
    let mock = greeter();
    let id = registry.register_mock(&mock);
    let c = ctx("C");

    registry.stub(&mock, Some(&c), greet(), args!["A", 1]).unwrap().returns("permanent").unwrap();
    registry
        .stub(&mock, Some(&c), greet(), args!["A", 1])
        .unwrap()
        .ttl(Duration::from_millis(30))
        .returns("temporary")
        .unwrap();

    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::Return("temporary".into())
    );

    thread::sleep(Duration::from_millis(60));
    assert_eq!(
        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
        Outcome::Return("permanent".into())
    );
}

#[test]
fn sweep_evicts_expired_rules_nobody_matched() {
    let registry = registry();
    let mock = greeter();
    registry.register_mock(&mock);
    let c = ctx("C");

    registry
        .stub(&mock, Some(&c), greet(), args!["A", 1])
        .unwrap()
        .ttl(Duration::from_millis(1))
        .returns("gone")
        .unwrap();
    thread::sleep(Duration::from_millis(10));

    let stats = registry.cleanup_now();
    assert_eq!(stats.rules_expired, 1);
    assert_eq!(registry.stats().rule_partitions, 0);
}
