//! Lifecycle manager: on-demand and background reclamation
//!
//! A sweep runs these steps in order, each locking one partition at a time
//! so it can proceed alongside live traffic:
//!
//! 1. forget identities whose mock was dropped, and every partition of them
//! 2. drop stubbing expressions left open by a thread that exited
//! 3. evict invocation records older than the maximum age
//! 4. trim the oldest records beyond the per-partition quota
//! 5. evict expired stubbing rules
//! 6. drop partitions left empty
//!
//! A panic inside a step is caught, logged and counted in
//! [`CleanupStats::failures`]; the remaining steps still run.
//!
//! # Background sweeper
//!
//! The sweeper is a plain thread that sleeps in short slices so shutdown is
//! observed promptly and re-reads the configuration every cycle. It stops
//! when auto-cleanup is disabled or the manager is dropped.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ctxmock_core::Timestamp;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::RegistryConfig;
use crate::stores::Stores;

/// Counters from one sweep, or accumulated over many
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// Identities of dropped mocks that were forgotten
    pub identities_removed: usize,
    /// Open stubbing expressions whose thread or mock is gone
    pub stubbings_abandoned: usize,
    /// Records evicted for exceeding the maximum age
    pub records_aged_out: usize,
    /// Records trimmed to respect the per-partition quota
    pub records_trimmed: usize,
    /// Expired rules evicted
    pub rules_expired: usize,
    /// Empty partitions dropped
    pub partitions_dropped: usize,
    /// Sweep steps that panicked
    pub failures: usize,
}

impl CleanupStats {
    /// Total entries reclaimed
    pub fn reclaimed(&self) -> usize {
        self.identities_removed
            + self.stubbings_abandoned
            + self.records_aged_out
            + self.records_trimmed
            + self.rules_expired
            + self.partitions_dropped
    }

    /// Add another sweep's counters to these
    pub fn absorb(&mut self, other: &CleanupStats) {
        self.identities_removed += other.identities_removed;
        self.stubbings_abandoned += other.stubbings_abandoned;
        self.records_aged_out += other.records_aged_out;
        self.records_trimmed += other.records_trimmed;
        self.rules_expired += other.rules_expired;
        self.partitions_dropped += other.partitions_dropped;
        self.failures += other.failures;
    }
}

struct Sweeper {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns the sweep routine and the background sweeper thread
pub struct LifecycleManager {
    stores: Arc<Stores>,
    config: Arc<RwLock<RegistryConfig>>,
    totals: Arc<Mutex<CleanupStats>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl LifecycleManager {
    pub(crate) fn new(stores: Arc<Stores>, config: Arc<RwLock<RegistryConfig>>) -> Self {
        Self {
            stores,
            config,
            totals: Arc::new(Mutex::new(CleanupStats::default())),
            sweeper: Mutex::new(None),
        }
    }

    /// Sweep now, evaluating ages and TTLs against the current time
    pub fn cleanup_now(&self) -> CleanupStats {
        self.cleanup_at(Timestamp::now())
    }

    /// Sweep as if the current time were `now`
    pub fn cleanup_at(&self, now: Timestamp) -> CleanupStats {
        let config = self.config.read().clone();
        let stats = sweep(&self.stores, &config, now);
        self.totals.lock().absorb(&stats);
        stats
    }

    /// Counters accumulated over every sweep so far
    pub fn totals(&self) -> CleanupStats {
        *self.totals.lock()
    }

    /// Start the background sweeper if it is not already running.
    ///
    /// Returns whether a sweeper is running afterwards.
    pub fn enable_auto_cleanup(&self) -> bool {
        let mut slot = self.sweeper.lock();
        if slot.as_ref().map_or(false, |s| !s.handle.is_finished()) {
            return true;
        }
        if let Some(stale) = slot.take() {
            let _ = stale.handle.join();
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let stores = Arc::clone(&self.stores);
        let config = Arc::clone(&self.config);
        let totals = Arc::clone(&self.totals);
        let flag = Arc::clone(&shutdown);

        let spawned = thread::Builder::new()
            .name("ctxmock-sweeper".to_string())
            .spawn(move || sweeper_loop(&stores, &config, &totals, &flag));

        match spawned {
            Ok(handle) => {
                info!("background sweeper started");
                *slot = Some(Sweeper { shutdown, handle });
                true
            }
            Err(e) => {
                error!(error = %e, "failed to spawn background sweeper");
                false
            }
        }
    }

    /// Stop the background sweeper and wait for it to exit
    pub fn disable_auto_cleanup(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(sweeper) = sweeper {
            sweeper.shutdown.store(true, Ordering::Relaxed);
            if sweeper.handle.join().is_err() {
                error!("background sweeper exited with a panic");
            }
            info!("background sweeper stopped");
        }
    }

    /// Check whether the background sweeper thread is alive
    pub fn is_auto_cleanup_running(&self) -> bool {
        self.sweeper
            .lock()
            .as_ref()
            .map_or(false, |s| !s.handle.is_finished())
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        self.disable_auto_cleanup();
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("auto_cleanup_running", &self.is_auto_cleanup_running())
            .field("totals", &self.totals())
            .finish()
    }
}

fn sweeper_loop(
    stores: &Stores,
    config: &RwLock<RegistryConfig>,
    totals: &Mutex<CleanupStats>,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        // Sleep first; check the flag every slice
        let interval = config.read().cleanup_interval();
        let slice = Duration::from_millis(100).min(interval);
        let mut elapsed = Duration::ZERO;
        while elapsed < interval {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            thread::sleep(slice);
            elapsed += slice;
        }

        let snapshot = config.read().clone();
        let stats = sweep(stores, &snapshot, Timestamp::now());
        totals.lock().absorb(&stats);
    }
}

/// One full sweep over `stores`
pub(crate) fn sweep(stores: &Stores, config: &RegistryConfig, now: Timestamp) -> CleanupStats {
    let mut stats = CleanupStats::default();

    if let Some(removed) = run_step("dead identities", &mut stats.failures, || {
        let dead = stores.identities.purge_dead();
        stores.rules.evict_dead();
        stores.log.evict_dead();
        stores.states.evict_dead();
        dead.len()
    }) {
        stats.identities_removed = removed;
    }

    if let Some(abandoned) = run_step("abandoned stubbings", &mut stats.failures, || {
        stores.drop_abandoned_stubbings()
    }) {
        stats.stubbings_abandoned = abandoned;
    }

    let cutoff = now.saturating_sub(config.max_record_age());
    if let Some(aged) = run_step("record age", &mut stats.failures, || {
        stores.log.evict_older_than(cutoff)
    }) {
        stats.records_aged_out = aged;
    }

    if let Some(trimmed) = run_step("record quota", &mut stats.failures, || {
        stores.log.trim_to(config.max_records_per_partition)
    }) {
        stats.records_trimmed = trimmed;
    }

    if let Some(expired) = run_step("rule expiry", &mut stats.failures, || {
        stores.rules.purge_expired(now)
    }) {
        stats.rules_expired = expired;
    }

    if let Some(dropped) = run_step("empty partitions", &mut stats.failures, || {
        stores.rules.drop_empty() + stores.log.drop_empty()
    }) {
        stats.partitions_dropped = dropped;
    }

    if stats.reclaimed() > 0 || stats.failures > 0 {
        info!(
            identities = stats.identities_removed,
            stubbings = stats.stubbings_abandoned,
            aged_out = stats.records_aged_out,
            trimmed = stats.records_trimmed,
            rules_expired = stats.rules_expired,
            partitions = stats.partitions_dropped,
            failures = stats.failures,
            "sweep complete"
        );
    } else {
        debug!("sweep found nothing to reclaim");
    }
    stats
}

fn run_step<T>(step: &'static str, failures: &mut usize, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(step, "sweep step panicked: {}", panic_message(payload.as_ref()));
            *failures += 1;
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("(non-string panic)")
}
