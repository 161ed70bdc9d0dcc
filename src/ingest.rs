//! Event ingest: turns host callbacks into engine commands.
//!
//! The host calls [`EventIngest::on_tick`] once per client tick and
//! [`EventIngest::on_message`] for every inbound chat or game line. The two
//! usually arrive on different threads.

use crate::engine::CycleEngine;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Edge-triggered key query.
pub trait KeyInput {
    /// Consume one pending press. Returns false once no presses remain.
    fn was_pressed(&mut self) -> bool;
}

/// Press counter shared between an input thread and the tick loop.
#[derive(Debug, Default)]
pub struct KeyLatch {
    presses: AtomicUsize,
}

impl KeyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.presses.load(Ordering::SeqCst)
    }
}

impl KeyInput for &KeyLatch {
    fn was_pressed(&mut self) -> bool {
        self.presses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Where an inbound line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageChannel {
    Chat,
    /// System/game line. Overlay lines are the action bar and never carry
    /// auction replies.
    Game { overlay: bool },
}

pub struct EventIngest {
    engine: CycleEngine,
}

impl EventIngest {
    pub fn new(engine: CycleEngine) -> Self {
        Self { engine }
    }

    /// Drain every press edge since the last tick. Returns the number of
    /// toggles issued.
    pub fn on_tick(&self, keys: &mut dyn KeyInput) -> usize {
        let mut toggles = 0;
        while keys.was_pressed() {
            self.engine.toggle();
            toggles += 1;
        }
        toggles
    }

    pub fn on_message(&self, channel: MessageChannel, text: &str) {
        if let MessageChannel::Game { overlay: true } = channel {
            return;
        }
        self.engine.on_text_message(text);
    }

    pub fn engine(&self) -> &CycleEngine {
        &self.engine
    }
}
