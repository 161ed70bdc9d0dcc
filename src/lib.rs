// SellHelper - list / wait / relist automation for a game client's auction house
//
// This is the library crate containing the automation core and its host
// interfaces. The binary crate (main.rs) runs the core against a simulated
// client.

pub mod commands;
pub mod config;
pub mod engine;
pub mod host;
pub mod hud;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod scheduler;
pub mod services;
pub mod sim;
pub mod state;
pub mod timing;

// Re-export commonly used types for convenience
pub use config::{ConfigManager, ConfigStore, MemoryConfig, SharedConfig};
pub use engine::{CycleEngine, EngineBuilder};
pub use ingest::{EventIngest, KeyInput, KeyLatch, MessageChannel};
pub use models::{CyclePhase, ResellMode, SellConfig, SessionSnapshot};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, TokioScheduler};
pub use state::{FailbackReason, SessionEvent};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
