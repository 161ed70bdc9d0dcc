// Cycle steps
//
// scan -> (select) -> (split | relocate) -> sell -> scan ...
//
// Every step re-validates against a fresh read of the slot space, because the
// snapshot the previous step acted on may already be stale.

use super::EngineInner;
use crate::host::{ClickButton, GameClient, ScreenKind, screen_slot};
use crate::models::{CyclePhase, SellConfig};
use crate::services::{SlotRegion, find_free_hotbar_slot, find_scratch_slot, find_target};
use crate::state::{CycleToken, FailbackReason, SessionEvent};
use crate::timing;
use std::sync::Arc;
use std::time::Duration;

pub(super) const EXHAUSTED_MESSAGE: &str = "[SellHelper] All items sold!";
const NOTIFICATION_TITLE: &str = "SellHelper";
const NOTIFICATION_BODY: &str = "All items sold!";

impl EngineInner {
    /// Begin a new cycle if the session is active, not in failback and no
    /// other cycle holds the in-flight lock.
    pub(super) fn start_cycle(self: &Arc<Self>) {
        if !self.session.is_active() || self.session.in_failback() {
            return;
        }
        let Some(token) = self.session.try_acquire_cycle() else {
            tracing::debug!("Cycle start refused: another cycle is in flight");
            return;
        };

        self.session.set_phase(CyclePhase::Scanning);
        self.step_on_main(Duration::ZERO, token, |this, token, client| {
            this.scan(token, client)
        });
    }

    fn scan(self: &Arc<Self>, token: CycleToken, client: &mut dyn GameClient) {
        let config = self.config.get();
        let Some(found) = find_target(&*client, &config.item_id, config.amount) else {
            self.exhaust(token, client);
            return;
        };
        tracing::debug!(
            "Found {} x{} at slot {} ({:?})",
            config.item_id,
            found.count,
            found.index,
            found.region
        );

        match found.region {
            SlotRegion::MainHand => self.prepare_and_sell(token, found.index, found.count, config),
            SlotRegion::Hotbar => {
                client.select_hotbar_slot(found.index);
                self.schedule_step(timing::SELECT_SETTLE.sample(), token, move |this, token| {
                    this.prepare_and_sell(token, found.index, found.count, config)
                });
            }
            SlotRegion::MainStorage => match find_free_hotbar_slot(&*client) {
                Some(free) => {
                    self.session.set_phase(CyclePhase::Preparing);
                    self.open_inventory(client);
                    self.step_on_main(
                        timing::OPEN_INVENTORY_SETTLE.sample(),
                        token,
                        move |this, token, client| {
                            this.relocate(token, client, found.index, found.count, free, config)
                        },
                    );
                }
                None => self.fail_cycle(token, FailbackReason::NoFreeHotbarSlot),
            },
        }
    }

    /// Sell straight away when the stack is exactly the configured amount,
    /// otherwise split it down first.
    fn prepare_and_sell(
        self: &Arc<Self>,
        token: CycleToken,
        slot: usize,
        count: u32,
        config: SellConfig,
    ) {
        if count == config.amount {
            self.session.set_phase(CyclePhase::Selling);
            self.schedule_step(timing::PRE_SELL_PAUSE.sample(), token, move |this, token| {
                this.sell(token, config)
            });
            return;
        }

        self.session.set_phase(CyclePhase::Preparing);
        self.on_main(token, move |this, token, client| {
            if find_scratch_slot(&*client).is_none() {
                this.fail_cycle(token, FailbackReason::NoScratchSlot);
                return;
            }
            this.open_inventory(client);
            this.step_on_main(
                timing::OPEN_INVENTORY_SETTLE.sample(),
                token,
                move |this, token, client| this.split_stack(token, client, slot, count, config),
            );
        });
    }

    /// Split `count` units in `slot` down to the configured amount, parking
    /// the excess one unit at a time in an empty storage slot.
    fn split_stack(
        self: &Arc<Self>,
        token: CycleToken,
        client: &mut dyn GameClient,
        slot: usize,
        count: u32,
        config: SellConfig,
    ) {
        if !inventory_open(&*client) {
            self.abandon(token, "inventory screen not open");
            return;
        }

        let stack = client.stack(slot);
        if !stack.is(&config.item_id) || stack.count != count {
            tracing::debug!("Slot {} changed before split, rescanning", slot);
            self.close_and_rescan(token, client);
            return;
        }

        // No clicks at all unless the whole sequence can complete.
        let Some(scratch) = find_scratch_slot(&*client) else {
            self.close_inventory(client);
            self.schedule_step(
                timing::FAILBACK_AFTER_CLOSE.sample(),
                token,
                |this, token| this.fail_cycle(token, FailbackReason::NoScratchSlot),
            );
            return;
        };

        let excess = count - config.amount;
        tracing::debug!(
            "Splitting slot {}: {} units to scratch slot {}",
            slot,
            excess,
            scratch
        );
        client.click_slot(screen_slot(slot), ClickButton::Left);
        for _ in 0..excess {
            client.click_slot(screen_slot(scratch), ClickButton::Right);
        }
        client.click_slot(screen_slot(slot), ClickButton::Left);
        self.metrics.record_split();

        self.step_on_main(
            timing::SPLIT_SETTLE.sample(),
            token,
            move |this, token, client| {
                this.close_inventory(client);
                this.session.set_phase(CyclePhase::Selling);
                this.schedule_step(timing::CLOSE_SETTLE.sample(), token, move |this, token| {
                    this.sell(token, config)
                });
            },
        );
    }

    /// Move the stack at storage index `from` into the empty hotbar slot `to`,
    /// then scan again.
    fn relocate(
        self: &Arc<Self>,
        token: CycleToken,
        client: &mut dyn GameClient,
        from: usize,
        count: u32,
        to: usize,
        config: SellConfig,
    ) {
        if !inventory_open(&*client) {
            self.abandon(token, "inventory screen not open");
            return;
        }

        let source = client.stack(from);
        if !source.is(&config.item_id) || source.count != count || !client.stack(to).is_empty() {
            tracing::debug!("Slots {} / {} changed before relocation, rescanning", from, to);
            self.close_and_rescan(token, client);
            return;
        }

        tracing::debug!("Relocating slot {} to hotbar slot {}", from, to);
        client.click_slot(screen_slot(from), ClickButton::Left);
        client.click_slot(screen_slot(to), ClickButton::Left);
        self.metrics.record_relocation();

        self.step_on_main(
            timing::RELOCATE_SETTLE.sample(),
            token,
            |this, token, client| this.close_and_rescan(token, client),
        );
    }

    fn sell(self: &Arc<Self>, token: CycleToken, config: SellConfig) {
        self.on_main(token, move |this, token, client| {
            client.send_command(&config.sell_command());
            this.metrics.record_sell();
            this.session.set_phase(CyclePhase::Selling);
            this.session.emit(SessionEvent::SellIssued {
                price: config.price,
            });
            tracing::info!(
                "Listed {} x{} for {}",
                config.item_id,
                config.amount,
                config.price
            );

            this.schedule_step(timing::SELL_WINDOW.sample(), token, |this, token| {
                this.finish_cycle(token)
            });
        });
    }

    fn close_and_rescan(self: &Arc<Self>, token: CycleToken, client: &mut dyn GameClient) {
        self.close_inventory(client);
        self.schedule_step(timing::CLOSE_SETTLE.sample(), token, |this, token| {
            this.finish_cycle(token)
        });
    }

    /// Release the lock and go straight back to scanning.
    fn finish_cycle(self: &Arc<Self>, token: CycleToken) {
        if !self.session.release(token) {
            return;
        }
        if !self.session.in_failback() {
            self.session.set_phase(CyclePhase::Idle);
        }
        self.start_cycle();
    }

    /// Divert the cycle into failback. The lock is released either way.
    fn fail_cycle(self: &Arc<Self>, token: CycleToken, reason: FailbackReason) {
        self.enter_failback(token.epoch(), reason);
        self.session.release(token);
    }

    /// Drop the cycle without touching `active` or failback.
    pub(super) fn abandon(self: &Arc<Self>, token: CycleToken, reason: &str) {
        if !self.session.release(token) {
            return;
        }
        tracing::warn!("Cycle abandoned: {}", reason);
        self.metrics.record_abandoned();
        self.session.emit(SessionEvent::CycleAbandoned {
            reason: reason.to_string(),
        });
        if !self.session.in_failback() {
            self.session.set_phase(CyclePhase::Idle);
        }
    }

    /// Nothing left to sell: switch off and tell the user.
    fn exhaust(self: &Arc<Self>, token: CycleToken, client: &mut dyn GameClient) {
        if !self.session.exhaust(token) {
            return;
        }
        tracing::info!("No more items to sell, automation stopped");
        client.post_message(EXHAUSTED_MESSAGE);

        if let Err(e) = self.notifier.notify(NOTIFICATION_TITLE, NOTIFICATION_BODY) {
            tracing::debug!("Desktop notification skipped: {}", e);
        }
    }
}

fn inventory_open(client: &dyn GameClient) -> bool {
    client
        .current_screen()
        .is_some_and(|screen| screen.kind == ScreenKind::Inventory)
}
