// Failback supervisor
//
// Entered when listing is blocked. Fires one resell action immediately and
// then every RESELL_PERIOD until a purchase notification or deactivation.

use super::EngineInner;
use crate::host::{ClickButton, GameClient, ScreenKind};
use crate::models::{CyclePhase, ResellMode};
use crate::state::{FailbackReason, SessionEvent};
use crate::timing;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

pub(crate) const RESELL_COMMAND: &str = "ah resell";
pub(crate) const OPEN_LISTINGS_COMMAND: &str = "ah";

/// Screen slot clicked once the listings surface is open.
pub(crate) const GUIDED_FIRST_SLOT: usize = 46;
/// Screen slot clicked on the follow-up surface.
pub(crate) const GUIDED_SECOND_SLOT: usize = 52;

impl EngineInner {
    /// Enter failback within `epoch`. Returns false if the session moved on
    /// or is already in failback.
    pub(super) fn enter_failback(self: &Arc<Self>, epoch: u64, reason: FailbackReason) -> bool {
        let weak: Weak<Self> = Arc::downgrade(self);
        let entered = self.session.begin_failback(epoch, || {
            self.scheduler.every(
                timing::RESELL_PERIOD,
                Arc::new(move || {
                    if let Some(this) = weak.upgrade() {
                        this.resell();
                    }
                }),
            )
        });
        if !entered {
            return false;
        }

        self.release_inventory();
        self.metrics.record_failback();
        self.session.emit(SessionEvent::FailbackEntered { reason });
        tracing::info!("Failback: {}", reason);

        let line = format!("[SellHelper] {}, resending listings", reason);
        self.main.execute(Box::new(move |client: &mut dyn GameClient| {
            if client.has_player() {
                client.post_message(&line);
            }
        }));
        true
    }

    /// One recovery action, in the configured mode.
    fn resell(self: &Arc<Self>) {
        if !self.session.is_active() || !self.session.in_failback() {
            return;
        }
        let epoch = self.session.epoch();
        let mode = self.config.get().resell_mode;
        self.metrics.record_resell();
        self.session.emit(SessionEvent::ResellIssued { mode });

        match mode {
            ResellMode::Direct => self.send_if_current(epoch, RESELL_COMMAND),
            ResellMode::Guided => {
                self.send_if_current(epoch, OPEN_LISTINGS_COMMAND);
                self.poll_click(
                    epoch,
                    GUIDED_FIRST_SLOT,
                    timing::GUIDED_POLL_RETRIES,
                    move |this| {
                        this.poll_click(
                            epoch,
                            GUIDED_SECOND_SLOT,
                            timing::GUIDED_POLL_RETRIES,
                            move |this| this.close_listings(epoch),
                        )
                    },
                );
            }
        }
    }

    fn send_if_current(self: &Arc<Self>, epoch: u64, command: &'static str) {
        let this = Arc::clone(self);
        self.main.execute(Box::new(move |client: &mut dyn GameClient| {
            if this.session.is_current(epoch) && client.has_player() {
                tracing::debug!("Resell: /{}", command);
                client.send_command(command);
            }
        }));
    }

    /// Wait for a container with more than `slot` slots and click `slot`.
    ///
    /// Each miss costs one retry; `next` runs after a hit or once the
    /// retries are spent.
    fn poll_click<F>(self: &Arc<Self>, epoch: u64, slot: usize, retries: u32, next: F)
    where
        F: FnOnce(&Arc<Self>) + Send + 'static,
    {
        self.schedule_in_epoch(timing::GUIDED_POLL_INTERVAL, epoch, move |this| {
            if !this.session.in_failback() {
                return;
            }

            let clicked = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&clicked);
            this.main.execute(Box::new(move |client: &mut dyn GameClient| {
                if !client.has_player() {
                    return;
                }
                let ready = client
                    .current_screen()
                    .is_some_and(|s| s.kind == ScreenKind::Container && s.slot_count > slot);
                if ready {
                    client.click_slot(slot, ClickButton::Left);
                    flag.store(true, Ordering::SeqCst);
                }
            }));

            this.schedule_in_epoch(timing::GUIDED_POLL_SETTLE, epoch, move |this| {
                if clicked.load(Ordering::SeqCst) {
                    tracing::debug!("Guided resell: clicked slot {}", slot);
                    next(this);
                } else if retries <= 1 {
                    tracing::debug!("Guided resell: slot {} never appeared", slot);
                    next(this);
                } else {
                    this.poll_click(epoch, slot, retries - 1, next);
                }
            });
        });
    }

    fn close_listings(self: &Arc<Self>, epoch: u64) {
        self.schedule_in_epoch(timing::GUIDED_CLOSE_SETTLE.sample(), epoch, |this| {
            this.main.execute(Box::new(|client: &mut dyn GameClient| {
                if client.has_player() && client.current_screen().is_some() {
                    client.close_screen();
                }
            }));
        });
    }

    /// The server refused a listing.
    pub(super) fn handle_blocked(self: &Arc<Self>) {
        if !self.session.is_active() || self.session.in_failback() {
            return;
        }
        self.enter_failback(self.session.epoch(), FailbackReason::StorageFull);
    }

    /// One of our listings was bought: leave failback and resume scanning.
    pub(super) fn handle_sold(self: &Arc<Self>) {
        if self.session.end_failback() {
            tracing::info!("Purchase received, leaving failback");
            self.session.emit(SessionEvent::FailbackCleared);
            self.session.set_phase(CyclePhase::Idle);
        }

        if self.session.is_active() {
            let epoch = self.session.epoch();
            self.schedule_in_epoch(timing::RESUME_AFTER_SOLD.sample(), epoch, |this| {
                this.start_cycle()
            });
        }
    }
}
