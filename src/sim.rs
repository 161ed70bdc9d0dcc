// In-memory host
//
// A simulated game client and two main-thread dispatchers. Used by the
// `sellhelper` binary and by the engine tests.
//
// - SimClient: 36-slot inventory with a cursor, screens and a command log
// - InlineMainThread: runs tasks on the submitting thread, serialized
// - QueuedMainThread: queues tasks until the host loop drains them

use crate::host::{
    ClickButton, GameClient, HOTBAR_SCREEN_OFFSET, HOTBAR_SIZE, INVENTORY_SIZE, ItemStack,
    MAIN_STORAGE, MainTask, MainThread, Screen, ScreenKind, SlotSpace,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Slot count reported for the player's inventory screen.
pub const INVENTORY_SCREEN_SLOTS: usize = 46;

/// Slot count of the server's listings container.
pub const LISTINGS_SCREEN_SLOTS: usize = 54;

const MAX_STACK: u32 = 64;

/// One interaction the client performed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAction {
    Select(usize),
    OpenInventory,
    CloseScreen,
    Click { slot: usize, button: ClickButton },
    Command(String),
    Message(String),
}

/// Simulated client.
#[derive(Debug, Clone)]
pub struct SimClient {
    slots: Vec<ItemStack>,
    selected: usize,
    player: bool,
    screen: Option<Screen>,
    cursor: ItemStack,
    actions: Vec<HostAction>,
    listings: Vec<ItemStack>,
    auto_list: bool,
}

impl Default for SimClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClient {
    /// Empty inventory, hotbar slot 0 selected, player present.
    pub fn new() -> Self {
        Self {
            slots: vec![ItemStack::empty(); INVENTORY_SIZE],
            selected: 0,
            player: true,
            screen: None,
            cursor: ItemStack::empty(),
            actions: Vec::new(),
            listings: Vec::new(),
            auto_list: false,
        }
    }

    pub fn with_stack(mut self, index: usize, item_id: &str, count: u32) -> Self {
        self.set_stack(index, ItemStack::new(item_id, count));
        self
    }

    pub fn with_selected(mut self, slot: usize) -> Self {
        self.selected = slot;
        self
    }

    /// Make `ah sell` move the held stack into the listings, like the server.
    pub fn with_auto_list(mut self, enabled: bool) -> Self {
        self.auto_list = enabled;
        self
    }

    pub fn set_stack(&mut self, index: usize, stack: ItemStack) {
        self.slots[index] = stack;
    }

    pub fn set_player(&mut self, present: bool) {
        self.player = present;
    }

    /// Force a screen open without recording an action.
    pub fn set_screen(&mut self, screen: Option<Screen>) {
        self.screen = screen;
    }

    pub fn cursor(&self) -> &ItemStack {
        &self.cursor
    }

    pub fn listings(&self) -> &[ItemStack] {
        &self.listings
    }

    /// A buyer takes the oldest listing.
    pub fn buy_listing(&mut self) -> Option<ItemStack> {
        (!self.listings.is_empty()).then(|| self.listings.remove(0))
    }

    pub fn actions(&self) -> &[HostAction] {
        &self.actions
    }

    pub fn clear_actions(&mut self) {
        self.actions.clear();
    }

    pub fn commands(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::Command(c) => Some(c.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::Message(m) => Some(m.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(usize, ClickButton)> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                HostAction::Click { slot, button } => Some((*slot, *button)),
                _ => None,
            })
            .collect()
    }

    /// Total units of `item_id` across inventory, cursor and listings.
    pub fn total_of(&self, item_id: &str) -> u32 {
        self.slots
            .iter()
            .chain(std::iter::once(&self.cursor))
            .chain(self.listings.iter())
            .filter(|s| s.is(item_id))
            .map(|s| s.count)
            .sum()
    }

    /// Inventory index behind an inventory-screen slot.
    fn inventory_index(screen_slot: usize) -> Option<usize> {
        if MAIN_STORAGE.contains(&screen_slot) {
            Some(screen_slot)
        } else if (HOTBAR_SCREEN_OFFSET..HOTBAR_SCREEN_OFFSET + HOTBAR_SIZE).contains(&screen_slot) {
            Some(screen_slot - HOTBAR_SCREEN_OFFSET)
        } else {
            None
        }
    }

    fn left_click(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if self.cursor.is_empty() || slot.is_empty() || slot.item_id != self.cursor.item_id {
            std::mem::swap(slot, &mut self.cursor);
            return;
        }
        let moved = self.cursor.count.min(MAX_STACK.saturating_sub(slot.count));
        slot.count += moved;
        self.cursor.count -= moved;
        if self.cursor.is_empty() {
            self.cursor = ItemStack::empty();
        }
    }

    fn right_click(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if self.cursor.is_empty() {
            if slot.is_empty() {
                return;
            }
            let taken = slot.count.div_ceil(2);
            self.cursor = ItemStack::new(slot.item_id.clone(), taken);
            slot.count -= taken;
            if slot.is_empty() {
                *slot = ItemStack::empty();
            }
        } else if slot.is_empty() || (slot.item_id == self.cursor.item_id && slot.count < MAX_STACK) {
            if slot.is_empty() {
                *slot = ItemStack::new(self.cursor.item_id.clone(), 0);
            }
            slot.count += 1;
            self.cursor.count -= 1;
            if self.cursor.is_empty() {
                self.cursor = ItemStack::empty();
            }
        } else {
            std::mem::swap(slot, &mut self.cursor);
        }
    }

    fn return_cursor(&mut self) {
        if self.cursor.is_empty() {
            return;
        }
        let cursor = std::mem::take(&mut self.cursor);
        match self.slots.iter().position(ItemStack::is_empty) {
            Some(free) => self.slots[free] = cursor,
            None => tracing::warn!("Inventory full, dropped {} x{}", cursor.item_id, cursor.count),
        }
    }

    fn list_main_hand(&mut self) {
        let held = std::mem::take(&mut self.slots[self.selected]);
        if !held.is_empty() {
            self.listings.push(held);
        }
    }
}

impl SlotSpace for SimClient {
    fn selected_slot(&self) -> usize {
        self.selected
    }

    fn stack(&self, index: usize) -> ItemStack {
        self.slots.get(index).cloned().unwrap_or_default()
    }
}

impl GameClient for SimClient {
    fn has_player(&self) -> bool {
        self.player
    }

    fn select_hotbar_slot(&mut self, slot: usize) {
        self.actions.push(HostAction::Select(slot));
        if slot < HOTBAR_SIZE {
            self.selected = slot;
        }
    }

    fn open_inventory(&mut self) {
        self.actions.push(HostAction::OpenInventory);
        self.screen = Some(Screen {
            kind: ScreenKind::Inventory,
            slot_count: INVENTORY_SCREEN_SLOTS,
        });
    }

    fn current_screen(&self) -> Option<Screen> {
        self.screen
    }

    fn click_slot(&mut self, screen_slot: usize, button: ClickButton) {
        self.actions.push(HostAction::Click {
            slot: screen_slot,
            button,
        });

        let Some(screen) = self.screen else {
            return;
        };
        if screen.kind != ScreenKind::Inventory {
            return;
        }
        if let Some(index) = Self::inventory_index(screen_slot) {
            match button {
                ClickButton::Left => self.left_click(index),
                ClickButton::Right => self.right_click(index),
            }
        }
    }

    fn close_screen(&mut self) {
        self.actions.push(HostAction::CloseScreen);
        self.screen = None;
        self.return_cursor();
    }

    fn send_command(&mut self, command: &str) {
        self.actions.push(HostAction::Command(command.to_string()));

        if command.starts_with("ah sell ") && self.auto_list {
            self.list_main_hand();
        } else if command == "ah" {
            self.screen = Some(Screen {
                kind: ScreenKind::Container,
                slot_count: LISTINGS_SCREEN_SLOTS,
            });
        }
    }

    fn post_message(&mut self, text: &str) {
        tracing::info!("[chat] {}", text);
        self.actions.push(HostAction::Message(text.to_string()));
    }
}

/// Runs tasks immediately on the submitting thread.
///
/// Tasks never overlap: a task submitted while another one runs (from inside
/// it, or from another thread) is queued and run by the thread already
/// draining, before that thread returns.
pub struct InlineMainThread<C> {
    client: Mutex<C>,
    queue: Mutex<VecDeque<MainTask>>,
    draining: AtomicBool,
}

impl<C: GameClient + Send> InlineMainThread<C> {
    pub fn new(client: C) -> Self {
        Self {
            client: Mutex::new(client),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    /// Inspect or modify the client between tasks.
    pub fn with_client<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.client.lock())
    }

    fn drain(&self) {
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_err()
            {
                return;
            }

            loop {
                let next = self.queue.lock().pop_front();
                let Some(task) = next else {
                    break;
                };
                let mut client = self.client.lock();
                task(&mut *client);
            }

            self.draining.store(false, Ordering::SeqCst);
            // A task pushed between the last pop and the store above would
            // otherwise be stranded.
            if self.queue.lock().is_empty() {
                return;
            }
        }
    }
}

impl<C: GameClient + Send> MainThread for InlineMainThread<C> {
    fn execute(&self, task: MainTask) {
        self.queue.lock().push_back(task);
        self.drain();
    }
}

/// Queues tasks for the host loop, which drains them once per tick.
pub struct QueuedMainThread {
    sender: mpsc::UnboundedSender<MainTask>,
    receiver: Mutex<mpsc::UnboundedReceiver<MainTask>>,
}

impl Default for QueuedMainThread {
    fn default() -> Self {
        Self::new()
    }
}

impl QueuedMainThread {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Run every queued task, including tasks queued by those tasks.
    /// Returns the number of tasks run.
    pub fn drain(&self, client: &mut dyn GameClient) -> usize {
        let mut receiver = self.receiver.lock();
        let mut ran = 0;
        while let Ok(task) = receiver.try_recv() {
            task(client);
            ran += 1;
        }
        ran
    }
}

impl MainThread for QueuedMainThread {
    fn execute(&self, task: MainTask) {
        if self.sender.send(task).is_err() {
            tracing::warn!("Main thread queue closed, task dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::screen_slot;
    use std::sync::Arc;

    const DIAMOND: &str = "minecraft:diamond";

    #[test]
    fn test_split_by_clicks() {
        let mut client = SimClient::new().with_stack(2, DIAMOND, 12);
        client.open_inventory();

        client.click_slot(screen_slot(2), ClickButton::Left);
        for _ in 0..7 {
            client.click_slot(screen_slot(9), ClickButton::Right);
        }
        client.click_slot(screen_slot(2), ClickButton::Left);
        client.close_screen();

        assert_eq!(client.stack(2), ItemStack::new(DIAMOND, 5));
        assert_eq!(client.stack(9), ItemStack::new(DIAMOND, 7));
        assert!(client.cursor().is_empty());
        assert_eq!(client.total_of(DIAMOND), 12);
    }

    #[test]
    fn test_clicks_without_inventory_screen_do_nothing() {
        let mut client = SimClient::new().with_stack(0, DIAMOND, 3);
        client.click_slot(screen_slot(0), ClickButton::Left);

        assert_eq!(client.stack(0).count, 3);
        assert_eq!(client.clicks().len(), 1);
    }

    #[test]
    fn test_close_returns_cursor() {
        let mut client = SimClient::new().with_stack(4, DIAMOND, 3);
        client.open_inventory();
        client.click_slot(screen_slot(4), ClickButton::Left);
        client.close_screen();

        assert_eq!(client.stack(0), ItemStack::new(DIAMOND, 3));
        assert!(client.current_screen().is_none());
    }

    #[test]
    fn test_auto_list_and_listings_screen() {
        let mut client = SimClient::new()
            .with_stack(0, DIAMOND, 5)
            .with_auto_list(true);

        client.send_command("ah sell 100");
        assert!(client.stack(0).is_empty());
        assert_eq!(client.listings(), &[ItemStack::new(DIAMOND, 5)]);

        client.send_command("ah");
        assert_eq!(
            client.current_screen().map(|s| s.kind),
            Some(ScreenKind::Container)
        );
        assert_eq!(client.commands(), vec!["ah sell 100", "ah"]);
    }

    #[test]
    fn test_inline_main_thread_is_reentrant() {
        let main = Arc::new(InlineMainThread::new(SimClient::new()));
        let inner = Arc::clone(&main);

        main.execute(Box::new(move |client: &mut dyn GameClient| {
            client.post_message("outer");
            inner.execute(Box::new(|client: &mut dyn GameClient| {
                client.post_message("inner");
            }));
            client.post_message("outer done");
        }));

        main.with_client(|c| assert_eq!(c.messages(), vec!["outer", "outer done", "inner"]));
    }

    #[test]
    fn test_queued_main_thread_runs_on_drain() {
        let main = QueuedMainThread::new();
        let mut client = SimClient::new();

        main.execute(Box::new(|client: &mut dyn GameClient| client.send_command("ah")));
        assert!(client.commands().is_empty());

        assert_eq!(main.drain(&mut client), 1);
        assert_eq!(client.commands(), vec!["ah"]);
        assert_eq!(main.drain(&mut client), 0);
    }
}
