// Session state
//
// This module provides the Session which holds the automation flags with
// atomic compare-and-set semantics and emits change events for observers
// (overlay, logs, tests).
//
// Two independent producers (the tick path and the chat path) drive the
// session concurrently, so every flag that gates a transition is an atomic,
// and the few compound transitions (lifecycle, failback) take a short lock.

use crate::metrics::Metrics;
use crate::models::{CyclePhase, ResellMode, SessionSnapshot};
use crate::scheduler::TaskHandle;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;

/// Why the session stopped listing and started reselling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailbackReason {
    /// The server reported the listing storage as full.
    StorageFull,
    /// The target is only in storage and the hotbar has no room for it.
    NoFreeHotbarSlot,
    /// A split needs an empty storage slot and there is none.
    NoScratchSlot,
}

impl fmt::Display for FailbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFull => write!(f, "Auction storage is full"),
            Self::NoFreeHotbarSlot => write!(f, "No free hotbar slot"),
            Self::NoScratchSlot => write!(f, "No empty inventory slot for splitting"),
        }
    }
}

/// Change events emitted by the session.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Activated,

    Deactivated,

    PhaseChanged { from: CyclePhase, to: CyclePhase },

    SellIssued { price: u64 },

    FailbackEntered { reason: FailbackReason },

    FailbackCleared,

    ResellIssued { mode: ResellMode },

    /// Nothing left to sell; automation switched itself off.
    Exhausted,

    /// A cycle was dropped because the host was not ready.
    CycleAbandoned { reason: String },
}

/// Proof of holding the in-flight lock for one cycle.
///
/// Only the holder of the current token can release the lock, so a stale
/// continuation from an earlier cycle can never release a newer cycle's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleToken {
    id: u64,
    epoch: u64,
}

impl CycleToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// Automation session: one per engine, reset on every activation.
///
/// # Invariants
///
/// - At most one [`CycleToken`] holds the in-flight lock at any instant.
/// - `in_failback` is true exactly while a resell task is scheduled.
/// - Deactivation clears the lock and failback and cancels every pending
///   continuation, whatever step was in progress.
pub struct Session {
    active: AtomicBool,

    /// Bumped on every activation and deactivation. Continuations scheduled
    /// under an older epoch are dead.
    epoch: AtomicU64,

    /// Id of the cycle holding the in-flight lock, 0 when free.
    lock_holder: AtomicU64,
    next_cycle_id: AtomicU64,
    lock_acquired_at: Mutex<Option<Instant>>,

    in_failback: AtomicBool,

    /// Repeating resell task. Guarded together with `in_failback`.
    resell: Mutex<Option<TaskHandle>>,

    /// One-shot continuations of the current epoch.
    pending: Mutex<Vec<TaskHandle>>,

    phase: Mutex<CyclePhase>,

    /// Serializes activation, deactivation and exhaustion.
    lifecycle: Mutex<()>,

    events: broadcast::Sender<SessionEvent>,
    metrics: Arc<Metrics>,
}

impl Session {
    /// Create an inactive session with a broadcast buffer of 100 events.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        let (events, _) = broadcast::channel(100);
        Self {
            active: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            lock_holder: AtomicU64::new(0),
            next_cycle_id: AtomicU64::new(0),
            lock_acquired_at: Mutex::new(None),
            in_failback: AtomicBool::new(false),
            resell: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
            phase: Mutex::new(CyclePhase::Idle),
            lifecycle: Mutex::new(()),
            events,
            metrics,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn in_failback(&self) -> bool {
        self.in_failback.load(Ordering::SeqCst)
    }

    pub fn cycle_in_flight(&self) -> bool {
        self.lock_holder.load(Ordering::SeqCst) != 0
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn phase(&self) -> CyclePhase {
        *self.phase.lock()
    }

    /// Active and still in the given epoch.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.is_active() && self.epoch() == epoch
    }

    /// The cycle owning `token` may keep going.
    pub fn is_live(&self, token: CycleToken) -> bool {
        self.is_current(token.epoch) && self.lock_holder.load(Ordering::SeqCst) == token.id
    }

    /// Flip `active`. Returns the new value.
    pub fn toggle(&self) -> bool {
        let _guard = self.lifecycle.lock();
        if self.is_active() {
            self.shut_down(CyclePhase::Idle);
            self.emit(SessionEvent::Deactivated);
            false
        } else {
            self.start_epoch();
            true
        }
    }

    /// Switch on. Returns false if already active.
    pub fn activate(&self) -> bool {
        let _guard = self.lifecycle.lock();
        if self.is_active() {
            return false;
        }
        self.start_epoch();
        true
    }

    /// Switch off and clear everything. Returns whether it was active.
    pub fn deactivate(&self) -> bool {
        let _guard = self.lifecycle.lock();
        let was_active = self.is_active();
        self.shut_down(CyclePhase::Idle);
        if was_active {
            self.emit(SessionEvent::Deactivated);
        }
        was_active
    }

    /// Terminal completion of the cycle owning `token`.
    ///
    /// Returns false (and changes nothing) if the cycle is no longer live.
    pub fn exhaust(&self, token: CycleToken) -> bool {
        let _guard = self.lifecycle.lock();
        if !self.is_live(token) {
            return false;
        }
        self.shut_down(CyclePhase::Exhausted);
        self.emit(SessionEvent::Exhausted);
        true
    }

    fn start_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
        self.emit(SessionEvent::Activated);
    }

    fn shut_down(&self, phase: CyclePhase) {
        self.active.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.force_release();
        self.end_failback();
        self.cancel_pending();
        self.set_phase(phase);
    }

    /// Try to take the in-flight lock for a new cycle.
    pub fn try_acquire_cycle(&self) -> Option<CycleToken> {
        if !self.is_active() {
            return None;
        }

        let epoch = self.epoch();
        let id = self.next_cycle_id.fetch_add(1, Ordering::SeqCst) + 1;
        {
            // The timestamp lock only keeps the holder count in step with the
            // CAS; exclusion itself comes from `lock_holder`.
            let mut acquired_at = self.lock_acquired_at.lock();
            if self
                .lock_holder
                .compare_exchange(0, id, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                drop(acquired_at);
                self.metrics.record_lock_rejected();
                return None;
            }
            *acquired_at = Some(Instant::now());
            self.metrics.record_lock_acquired();
        }

        let token = CycleToken { id, epoch };
        // A deactivation may have slipped in between reading the epoch and
        // taking the lock.
        if !self.is_current(epoch) {
            self.release(token);
            return None;
        }
        Some(token)
    }

    /// Release the lock if `token` still holds it.
    pub fn release(&self, token: CycleToken) -> bool {
        let mut acquired_at = self.lock_acquired_at.lock();
        let released = self
            .lock_holder
            .compare_exchange(token.id, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if released {
            let held_for = acquired_at.take().map(|at| at.elapsed()).unwrap_or_default();
            self.metrics.record_lock_released(held_for);
        }
        released
    }

    /// Release the lock whoever holds it.
    pub fn force_release(&self) -> bool {
        let mut acquired_at = self.lock_acquired_at.lock();
        let released = self.lock_holder.swap(0, Ordering::SeqCst) != 0;
        if released {
            let held_for = acquired_at.take().map(|at| at.elapsed()).unwrap_or_default();
            self.metrics.record_lock_released(held_for);
        }
        released
    }

    /// Enter failback within `epoch`.
    ///
    /// Releases the in-flight lock first, then stores the resell task
    /// produced by `start_resell`. Returns false if the session is no longer
    /// current or already in failback.
    pub fn begin_failback<F>(&self, epoch: u64, start_resell: F) -> bool
    where
        F: FnOnce() -> TaskHandle,
    {
        let mut resell = self.resell.lock();
        if !self.is_current(epoch) || self.in_failback() {
            return false;
        }

        self.force_release();
        self.in_failback.store(true, Ordering::SeqCst);
        if let Some(previous) = resell.replace(start_resell()) {
            previous.cancel();
        }
        // Under the resell lock, so a concurrent shutdown's Idle lands last.
        self.set_phase(CyclePhase::Failback);
        true
    }

    /// Leave failback, cancelling the resell task. Returns whether the
    /// session was in failback.
    pub fn end_failback(&self) -> bool {
        let mut resell = self.resell.lock();
        if let Some(handle) = resell.take() {
            handle.cancel();
        }
        self.in_failback.swap(false, Ordering::SeqCst)
    }

    /// Remember a continuation so deactivation can cancel it.
    pub fn track(&self, handle: TaskHandle) {
        let mut pending = self.pending.lock();
        pending.retain(TaskHandle::is_pending);
        pending.push(handle);
    }

    fn cancel_pending(&self) {
        for handle in self.pending.lock().drain(..) {
            handle.cancel();
        }
    }

    /// Number of tracked continuations that may still fire.
    pub fn pending_steps(&self) -> usize {
        self.pending.lock().iter().filter(|h| h.is_pending()).count()
    }

    pub fn set_phase(&self, phase: CyclePhase) {
        let mut current = self.phase.lock();
        if *current == phase {
            return;
        }
        let from = std::mem::replace(&mut *current, phase);
        drop(current);
        tracing::debug!("Phase {} -> {}", from, phase);
        self.emit(SessionEvent::PhaseChanged { from, to: phase });
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let resell = self.resell.lock();
        let in_failback = self.in_failback();
        let resell_scheduled = resell.as_ref().is_some_and(|h| !h.is_cancelled());
        drop(resell);

        SessionSnapshot {
            active: self.is_active(),
            cycle_in_flight: self.cycle_in_flight(),
            in_failback,
            resell_scheduled,
            phase: self.phase(),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: SessionEvent) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.events.send(event);
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
