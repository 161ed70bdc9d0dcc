// Automation metrics
//
// Lock-free counters describing what the cycle engine did, including the
// in-flight lock instrumentation used to prove mutual exclusion.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Engine-wide counters.
///
/// Uses atomic operations so the tick path, the chat path and the scheduler
/// worker can all record without locking.
#[derive(Debug)]
pub struct Metrics {
    /// Cycles that acquired the in-flight lock
    pub cycles_started: AtomicU64,

    /// Cycle starts refused because another cycle held the lock
    pub lock_rejections: AtomicU64,

    /// Lock releases (normal, forced, or by abandonment)
    pub lock_releases: AtomicU64,

    /// Current number of lock holders
    lock_holders: AtomicUsize,

    /// Highest number of simultaneous lock holders ever seen
    pub max_lock_holders: AtomicUsize,

    /// Sell commands issued
    pub sells: AtomicU64,

    /// Stack splits performed
    pub splits: AtomicU64,

    /// Storage-to-hotbar moves performed
    pub relocations: AtomicU64,

    /// Entries into failback
    pub failback_entries: AtomicU64,

    /// Resell actions fired while in failback
    pub resells: AtomicU64,

    /// Cycles dropped because the host session was unavailable
    pub abandoned_cycles: AtomicU64,

    /// Time spent holding the in-flight lock, in milliseconds
    pub total_cycle_time_ms: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            cycles_started: AtomicU64::new(0),
            lock_rejections: AtomicU64::new(0),
            lock_releases: AtomicU64::new(0),
            lock_holders: AtomicUsize::new(0),
            max_lock_holders: AtomicUsize::new(0),
            sells: AtomicU64::new(0),
            splits: AtomicU64::new(0),
            relocations: AtomicU64::new(0),
            failback_entries: AtomicU64::new(0),
            resells: AtomicU64::new(0),
            abandoned_cycles: AtomicU64::new(0),
            total_cycle_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a successful in-flight lock acquisition
    pub fn record_lock_acquired(&self) {
        self.cycles_started.fetch_add(1, Ordering::Relaxed);
        let holders = self.lock_holders.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_lock_holders.fetch_max(holders, Ordering::SeqCst);
    }

    /// Record an in-flight lock release
    pub fn record_lock_released(&self, held_for: Duration) {
        self.lock_releases.fetch_add(1, Ordering::Relaxed);
        self.lock_holders.fetch_sub(1, Ordering::SeqCst);
        self.total_cycle_time_ms
            .fetch_add(held_for.as_millis() as u64, Ordering::Relaxed);
    }

    /// Record a refused cycle start
    pub fn record_lock_rejected(&self) {
        self.lock_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sell(&self) {
        self.sells.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_split(&self) {
        self.splits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_relocation(&self) {
        self.relocations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failback(&self) {
        self.failback_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resell(&self) {
        self.resells.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abandoned(&self) {
        self.abandoned_cycles.fetch_add(1, Ordering::Relaxed);
    }

    /// Current number of lock holders (0 or 1)
    pub fn lock_holders(&self) -> usize {
        self.lock_holders.load(Ordering::SeqCst)
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Average time a cycle held the lock, in milliseconds
    pub fn avg_cycle_time_ms(&self) -> f64 {
        let total = self.total_cycle_time_ms.load(Ordering::Relaxed);
        let count = self.lock_releases.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== SellHelper Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Cycles: {} started, {} rejected, {} abandoned (avg {:.0}ms, max holders {})",
            self.cycles_started.load(Ordering::Relaxed),
            self.lock_rejections.load(Ordering::Relaxed),
            self.abandoned_cycles.load(Ordering::Relaxed),
            self.avg_cycle_time_ms(),
            self.max_lock_holders.load(Ordering::SeqCst)
        );
        tracing::info!(
            "Actions: {} sells, {} splits, {} relocations",
            self.sells.load(Ordering::Relaxed),
            self.splits.load(Ordering::Relaxed),
            self.relocations.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Failback: {} entries, {} resells",
            self.failback_entries.load(Ordering::Relaxed),
            self.resells.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
