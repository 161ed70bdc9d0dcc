//! Shared harness: engine on a virtual clock, driving a simulated client.

#![allow(dead_code)]

use sellhelper::host::{DesktopNotifier, HOTBAR_SIZE};
use sellhelper::sim::{InlineMainThread, SimClient};
use sellhelper::{CycleEngine, ManualScheduler, MemoryConfig, ResellMode, SellConfig};
use std::sync::Arc;
use std::time::Duration;

pub const DIAMOND: &str = "minecraft:diamond";
pub const DIRT: &str = "minecraft:dirt";
pub const PRICE: u64 = 100;

pub const SOLD_TEXT: &str = "У Вас купили minecraft:diamond x5 на /ah за 100";
pub const BLOCKED_TEXT: &str = "Освободите хранилище или уберите предметы с продажи";

pub struct Harness {
    pub scheduler: Arc<ManualScheduler>,
    pub main: Arc<InlineMainThread<SimClient>>,
    pub config: Arc<MemoryConfig>,
    pub engine: CycleEngine,
}

impl Harness {
    pub fn new(client: SimClient) -> Self {
        Self::with_config(client, sell_config(5, ResellMode::Direct))
    }

    pub fn with_config(client: SimClient, config: SellConfig) -> Self {
        Self::build(client, config, None)
    }

    pub fn with_notifier(client: SimClient, notifier: Arc<dyn DesktopNotifier>) -> Self {
        Self::build(client, sell_config(5, ResellMode::Direct), Some(notifier))
    }

    fn build(
        client: SimClient,
        config: SellConfig,
        notifier: Option<Arc<dyn DesktopNotifier>>,
    ) -> Self {
        let scheduler = Arc::new(ManualScheduler::new());
        let main = Arc::new(InlineMainThread::new(client));
        let config = Arc::new(MemoryConfig::new(config));

        let mut builder = CycleEngine::builder(scheduler.clone(), main.clone(), config.clone());
        if let Some(notifier) = notifier {
            builder = builder.notifier(notifier);
        }

        Self {
            scheduler,
            main,
            config,
            engine: builder.build(),
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.scheduler.advance(Duration::from_millis(ms));
    }

    pub fn client<R>(&self, f: impl FnOnce(&mut SimClient) -> R) -> R {
        self.main.with_client(f)
    }

    pub fn commands(&self) -> Vec<String> {
        self.client(|c| c.commands().iter().map(|s| s.to_string()).collect())
    }

    pub fn messages(&self) -> Vec<String> {
        self.client(|c| c.messages().iter().map(|s| s.to_string()).collect())
    }

    /// Deactivation leaves nothing behind.
    pub fn assert_fully_stopped(&self) {
        let snapshot = self.engine.snapshot();
        assert!(snapshot.is_fully_stopped(), "not stopped: {:?}", snapshot);
        assert_eq!(self.scheduler.pending_repeating(), 0);
        assert_eq!(self.scheduler.pending(), 0);
        assert_eq!(self.engine.pending_steps(), 0);
        assert_eq!(self.engine.metrics().lock_holders(), 0);
    }
}

pub fn sell_config(amount: u32, resell_mode: ResellMode) -> SellConfig {
    SellConfig {
        item_id: DIAMOND.to_string(),
        amount,
        price: PRICE,
        resell_mode,
        ..SellConfig::default()
    }
}

/// Hotbar filled with dirt, target stack in storage slot 15.
pub fn storage_only_client() -> SimClient {
    let mut client = SimClient::new().with_stack(15, DIAMOND, 5);
    for slot in 0..HOTBAR_SIZE {
        client = client.with_stack(slot, DIRT, 1);
    }
    client
}
