// Host collaborator interfaces
//
// The automation core never touches the game client directly. Everything it
// needs from the host is expressed here:
// - SlotSpace / GameClient: inventory reads and UI interactions, valid only on
//   the host's main thread
// - MainThread: marshals a task onto that main thread
// - DesktopNotifier: cosmetic out-of-game notification

use std::ops::Range;
use thiserror::Error;

/// Number of hotbar slots (inventory indices `0..9`).
pub const HOTBAR_SIZE: usize = 9;

/// Inventory indices of the main storage rows.
pub const MAIN_STORAGE: Range<usize> = 9..36;

/// Screen slot of hotbar index 0 while the inventory screen is open.
///
/// Storage index `i` keeps its index on screen; hotbar index `h` appears at
/// `HOTBAR_SCREEN_OFFSET + h`.
pub const HOTBAR_SCREEN_OFFSET: usize = 36;

/// Total inventory indices addressed by the core.
pub const INVENTORY_SIZE: usize = MAIN_STORAGE.end;

/// Map an inventory index to its slot in the open inventory screen.
pub fn screen_slot(inventory_index: usize) -> usize {
    if inventory_index < HOTBAR_SIZE {
        HOTBAR_SCREEN_OFFSET + inventory_index
    } else {
        inventory_index
    }
}

/// Contents of a single slot. A count of zero means the slot is empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemStack {
    pub item_id: String,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>, count: u32) -> Self {
        Self {
            item_id: item_id.into(),
            count,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn is(&self, item_id: &str) -> bool {
        !self.is_empty() && self.item_id == item_id
    }
}

/// Mouse button used for a slot interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickButton {
    /// Pick up / place the whole stack.
    Left,
    /// Place a single unit from the cursor.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    /// The player's own inventory screen.
    Inventory,
    /// A server-provided container surface (e.g. the auction listings).
    Container,
}

/// The UI surface currently open on the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub kind: ScreenKind,
    pub slot_count: usize,
}

/// Read access to the player's slot space.
pub trait SlotSpace {
    /// Currently selected hotbar index (the primary hand).
    fn selected_slot(&self) -> usize;

    /// Stack at an inventory index (`0..INVENTORY_SIZE`).
    fn stack(&self, index: usize) -> ItemStack;

    fn main_hand(&self) -> ItemStack {
        self.stack(self.selected_slot())
    }
}

/// Main-thread view of the game client.
pub trait GameClient: SlotSpace {
    /// Whether a player session is live. Every decision point re-checks this.
    fn has_player(&self) -> bool;

    /// Select a hotbar slot and tell the server about it.
    fn select_hotbar_slot(&mut self, slot: usize);

    fn open_inventory(&mut self);

    fn current_screen(&self) -> Option<Screen>;

    /// Click a slot of the currently open screen.
    fn click_slot(&mut self, screen_slot: usize, button: ClickButton);

    fn close_screen(&mut self);

    /// Send a command (without the leading slash) through the network layer.
    fn send_command(&mut self, command: &str);

    /// Post a line to the in-game message surface.
    fn post_message(&mut self, text: &str);
}

/// A unit of work that must run on the host's main thread.
pub type MainTask = Box<dyn FnOnce(&mut dyn GameClient) + Send>;

/// The host's serialized execution context.
pub trait MainThread: Send + Sync {
    /// Queue `task` for execution on the main thread. No result is observed.
    fn execute(&self, task: MainTask);
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Desktop notifications are not supported on this system")]
    Unsupported,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Out-of-game notification surface.
pub trait DesktopNotifier: Send + Sync {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notifier that only records the notification in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl DesktopNotifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        tracing::info!("[{}] {}", title, body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_slot_mapping() {
        assert_eq!(screen_slot(0), 36);
        assert_eq!(screen_slot(8), 44);
        assert_eq!(screen_slot(9), 9);
        assert_eq!(screen_slot(35), 35);
    }

    #[test]
    fn test_empty_stack_never_matches() {
        let stack = ItemStack::new("minecraft:diamond", 0);
        assert!(stack.is_empty());
        assert!(!stack.is("minecraft:diamond"));
        assert!(ItemStack::new("minecraft:diamond", 1).is("minecraft:diamond"));
    }
}
