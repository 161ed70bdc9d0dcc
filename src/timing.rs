//! Timing constants for every automation step.
//!
//! Each UI interaction is followed by a settle delay drawn uniformly from a
//! named range, so consecutive actions never land on a fixed cadence. The
//! only fixed interval is the failback resell period.
//!
//! | Step                         | Range (ms)  |
//! |------------------------------|-------------|
//! | hotbar select settle         | 100 – 200   |
//! | pre-sell pause (exact stack) | 100 – 200   |
//! | inventory open settle        | 200 – 400   |
//! | split clicks settle          | 150 – 300   |
//! | relocation clicks settle     | 100 – 300   |
//! | screen close settle          | 150 – 350   |
//! | sell window                  | 800 – 1200  |
//! | resume after purchase        | 300 – 600   |
//! | resell period                | 35 000      |

use rand::Rng;
use std::time::Duration;

/// Inclusive millisecond range a step delay is sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    /// Draw a delay from the range.
    ///
    /// Uses the thread-local generator, so concurrent callers never share
    /// generator state.
    pub fn sample(&self) -> Duration {
        if self.min_ms >= self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(ms)
    }

    pub fn contains(&self, delay: Duration) -> bool {
        let ms = delay.as_millis();
        ms >= u128::from(self.min_ms) && ms <= u128::from(self.max_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

// ── Cycle steps ─────────────────────────────────────────────────────────────

pub const SELECT_SETTLE: DelayRange = DelayRange::new(100, 200);
pub const PRE_SELL_PAUSE: DelayRange = DelayRange::new(100, 200);
pub const OPEN_INVENTORY_SETTLE: DelayRange = DelayRange::new(200, 400);
pub const SPLIT_SETTLE: DelayRange = DelayRange::new(150, 300);
pub const RELOCATE_SETTLE: DelayRange = DelayRange::new(100, 300);
pub const CLOSE_SETTLE: DelayRange = DelayRange::new(150, 350);

/// Window after the sell command in which a "storage full" reply can still
/// divert the session into failback.
pub const SELL_WINDOW: DelayRange = DelayRange::new(800, 1200);

pub const RESUME_AFTER_SOLD: DelayRange = DelayRange::new(300, 600);

/// Delay between closing the inventory and entering failback when no scratch
/// slot was available for a split.
pub const FAILBACK_AFTER_CLOSE: DelayRange = DelayRange::new(150, 350);

// ── Failback ────────────────────────────────────────────────────────────────

pub const RESELL_PERIOD: Duration = Duration::from_millis(35_000);

pub const GUIDED_POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Time given to the main thread to apply a poll click before checking it.
pub const GUIDED_POLL_SETTLE: Duration = Duration::from_millis(100);
pub const GUIDED_POLL_RETRIES: u32 = 10;
pub const GUIDED_CLOSE_SETTLE: DelayRange = DelayRange::new(200, 400);
