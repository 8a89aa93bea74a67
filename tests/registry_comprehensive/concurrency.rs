//! Concurrency
//!
//! Stubbing, invoking and verifying from many threads at once. Counts must
//! be exact and contexts must never bleed into each other.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use crate::common::*;
use ctxmock::{args, MockRegistry, Outcome, RegistryConfig, VerificationMode};

// ============================================================================
// Per-context workers
// ============================================================================

#[test]
fn stub_invoke_verify_per_thread_context() {
    let registry = Arc::new(registry());
    let mock = greeter();
    let threads = 16;
    let calls = 200;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let mock = Arc::clone(&mock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let c = ctx(&format!("worker-{}", t));
                let id = registry.register_mock(&mock);
                registry
                    .stub(&mock, Some(&c), greet(), args!["A", 1])
                    .unwrap()
                    .returns(t as i64)
                    .unwrap();
                barrier.wait();

                for _ in 0..calls {
                    let outcome = registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c));
                    assert_eq!(outcome, Outcome::Return((t as i64).into()));
                }
                registry
                    .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::times(calls))
                    .unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(registry.stats().records, threads * calls);
}

#[test]
fn shared_context_counts_are_exact() {
    let registry = Arc::new(registry());
    let mock = greeter();
    let c = ctx("shared");
    let threads = 8;
    let calls = 500;
    let barrier = Arc::new(Barrier::new(threads));

    let id = registry.register_mock(&mock);
    registry
        .stub(&mock, Some(&c), greet(), vec![ctxmock::any(), ctxmock::any()])
        .unwrap()
        .returns("hi")
        .unwrap();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let id = id.clone();
            let c = c.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..calls {
                    registry.on_invocation(&id, &greet(), &args!["T", (t * calls + i) as i64], Some(&c));
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    registry
        .verify(
            &mock,
            Some(&c),
            &greet(),
            vec![ctxmock::any(), ctxmock::any()],
            VerificationMode::times(threads * calls),
        )
        .unwrap();

    // Every call recorded exactly once
    let seen: HashSet<i64> = registry
        .invocations(&mock, Some(&c))
        .unwrap()
        .iter()
        .filter_map(|r| r.args()[1].as_int())
        .collect();
    assert_eq!(seen.len(), threads * calls);
}

#[test]
fn stubbing_while_invoking_never_mixes_contexts() {
    let registry = Arc::new(registry());
    let mock = greeter();
    let stubbers = 4;
    let invokers = 4;
    let rounds = 100;
    let barrier = Arc::new(Barrier::new(stubbers + invokers));
    registry.register_mock(&mock);

    let mut handles = Vec::new();
    for s in 0..stubbers {
        let registry = Arc::clone(&registry);
        let mock = Arc::clone(&mock);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let c = ctx(&format!("stubber-{}", s));
            barrier.wait();
            for round in 0..rounds {
                registry
                    .stub(&mock, Some(&c), greet(), args!["A", 1])
                    .unwrap()
                    .returns(format!("{}-{}", s, round))
                    .unwrap();
            }
        }));
    }
    for i in 0..invokers {
        let registry = Arc::clone(&registry);
        let id = registry.register_mock(&mock);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || {
            let c = ctx(&format!("invoker-{}", i));
            barrier.wait();
            for _ in 0..rounds {
                assert_eq!(
                    registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
                    Outcome::NoRuleFound
                );
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    // The last rule of each stubber context wins
    let id = registry.register_mock(&mock);
    for s in 0..stubbers {
        let c = ctx(&format!("stubber-{}", s));
        assert_eq!(
            registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
            Outcome::Return(format!("{}-{}", s, rounds - 1).into())
        );
    }
}

// ============================================================================
// Identity
// ============================================================================

#[test]
fn racing_registration_yields_one_identity() {
    let registry = Arc::new(registry());
    let mock = greeter();
    let threads = 16;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let mock = Arc::clone(&mock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.register_mock(&mock).id()
            })
        })
        .collect();

    let ids: HashSet<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(registry.stats().identities, 1);
}

// ============================================================================
// Background sweeper under load
// ============================================================================

#[test]
fn sweeper_runs_alongside_invocations() {
    init_tracing();
    let registry = Arc::new(
        MockRegistry::with_config(RegistryConfig {
            cleanup_interval_ms: 5,
            auto_cleanup: true,
            ..RegistryConfig::default()
        })
        .unwrap(),
    );
    assert!(registry.is_auto_cleanup_running());

    let mock = greeter();
    let threads = 4;
    let calls = 300;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let mock = Arc::clone(&mock);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let c = ctx(&format!("swept-{}", t));
                let id = registry.register_mock(&mock);
                registry
                    .stub(&mock, Some(&c), greet(), args!["A", 1])
                    .unwrap()
                    .returns("ok")
                    .unwrap();
                barrier.wait();
                for _ in 0..calls {
                    assert_eq!(
                        registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
                        Outcome::Return("ok".into())
                    );
                }
                registry
                    .verify(&mock, Some(&c), &greet(), args!["A", 1], VerificationMode::times(calls))
                    .unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    registry.disable_auto_cleanup();
    assert!(!registry.is_auto_cleanup_running());
}

// ============================================================================
// Stress
// ============================================================================

#[test]
#[ignore] // Run with: cargo test --test registry_comprehensive -- --ignored
fn stress_many_mocks_many_contexts() {
    let registry = Arc::new(registry());
    let threads = 8;
    let mocks_per_thread = 50;
    let contexts_per_mock = 20;
    let barrier = Arc::new(Barrier::new(threads));
    let start = Instant::now();

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut kept = Vec::new();
                for m in 0..mocks_per_thread {
                    let mock = greeter();
                    let id = registry.register_mock(&mock);
                    for k in 0..contexts_per_mock {
                        let c = ctx(&format!("{}-{}-{}", t, m, k));
                        registry
                            .stub(&mock, Some(&c), greet(), args!["A", 1])
                            .unwrap()
                            .returns(k as i64)
                            .unwrap();
                        assert_eq!(
                            registry.on_invocation(&id, &greet(), &args!["A", 1], Some(&c)),
                            Outcome::Return((k as i64).into())
                        );
                    }
                    // Half the mocks die young
                    if m % 2 == 0 {
                        kept.push(mock);
                    }
                }
                kept
            })
        })
        .collect();

    let kept: Vec<_> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
    let elapsed = start.elapsed();

    let stats = registry.cleanup_now();
    let survivors = threads * mocks_per_thread / 2;
    assert_eq!(kept.len(), survivors);
    assert_eq!(stats.identities_removed, survivors);
    assert_eq!(registry.stats().identities, survivors);
    assert_eq!(registry.stats().records, survivors * contexts_per_mock);

    println!(
        "{} mocks x {} contexts in {:?}",
        threads * mocks_per_thread,
        contexts_per_mock,
        elapsed
    );
    assert!(elapsed < Duration::from_secs(60));
}
