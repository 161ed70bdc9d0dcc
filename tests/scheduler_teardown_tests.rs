//! Teardown of an engine running on the worker-thread scheduler
//!
//! Kept in its own test binary: it installs a process-wide panic hook.

mod common;

use common::*;
use sellhelper::sim::{InlineMainThread, SimClient};
use sellhelper::{CycleEngine, MemoryConfig, ResellMode, TokioScheduler};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[test]
fn test_shutdown_then_drop_mid_cycle_is_clean() {
    let panics = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&panics);
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        counter.fetch_add(1, Ordering::SeqCst);
        eprintln!("panic during teardown: {}", info);
    }));

    for round in 0..10 {
        let scheduler = Arc::new(TokioScheduler::new("teardown-scheduler").unwrap());
        let main = Arc::new(InlineMainThread::new(
            SimClient::new().with_stack(0, DIAMOND, 5),
        ));
        let config = Arc::new(MemoryConfig::new(sell_config(5, ResellMode::Direct)));
        let engine = CycleEngine::builder(scheduler, main.clone(), config).build();

        engine.toggle();
        // The sell window is still pending when the engine goes away.
        thread::sleep(Duration::from_millis(300));
        engine.shutdown();
        drop(engine);

        // The worker drops the aborted steps, and with them the scheduler.
        thread::sleep(Duration::from_millis(50));
        assert_eq!(panics.load(Ordering::SeqCst), 0, "round {}", round);
        assert_eq!(main.with_client(|c| c.commands().len()), 1);
    }

    std::panic::set_hook(previous);
}
