//! SellHelper simulation binary.
//!
//! Runs the automation engine in real time against an in-memory game client.
//! It initializes:
//! - Logging infrastructure (daily rolling file + optional console output)
//! - Configuration ([`ConfigManager`] / [`SharedConfig`], `sellhelper.json`)
//! - The scheduler worker thread ([`TokioScheduler`])
//! - A simulated client whose "main thread" is the loop below
//!
//! # Input
//!
//! One command per stdin line:
//! - `toggle`: press the toggle key
//! - `/sellhelper ...`: configuration commands
//! - `buy`: a buyer takes the oldest listing (emits the purchase message)
//! - `full`: the server reports the listing storage as full
//! - `quit`: exit (end of input works too)
//! - anything else is delivered as an inbound chat line

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use sellhelper::host::{GameClient, HOTBAR_SIZE, INVENTORY_SIZE, ItemStack};
use sellhelper::logging::{self, LogOptions};
use sellhelper::sim::{QueuedMainThread, SimClient};
use sellhelper::{
    APP_NAME, ConfigManager, ConfigStore, CycleEngine, EventIngest, KeyLatch, MessageChannel,
    SharedConfig, TokioScheduler, VERSION, commands, services,
};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Host tick interval.
const TICK: Duration = Duration::from_millis(50);

const SOLD_MESSAGE: &str = "У Вас купили предмет на /ah";
const BLOCKED_MESSAGE: &str = "Освободите хранилище или уберите предметы с продажи";

#[derive(Parser)]
#[command(name = "sellhelper", version, about = "Auction house list/relist automation simulator")]
struct Cli {
    /// Directory holding sellhelper.json
    #[arg(long, default_value = "config")]
    config_dir: Utf8PathBuf,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Log at debug level
    #[arg(long)]
    debug: bool,

    /// Also log to the console
    #[arg(long)]
    console: bool,

    /// Write the log file as JSON lines
    #[arg(long)]
    json: bool,

    /// Units of the configured item placed in the simulated inventory
    #[arg(long, default_value_t = 128)]
    stock: u32,
}

enum Input {
    Toggle,
    Command(String),
    Buy,
    Full,
    Chat(String),
    Quit,
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "" => None,
            "toggle" => Some(Self::Toggle),
            "buy" => Some(Self::Buy),
            "full" => Some(Self::Full),
            "quit" | "exit" => Some(Self::Quit),
            _ if line.starts_with("/sellhelper") => Some(Self::Command(line.to_string())),
            _ => Some(Self::Chat(line.to_string())),
        }
    }
}

/// Fill the simulated inventory with `stock` units, storage first, in full
/// stacks of 64.
fn stocked_client(item_id: &str, stock: u32) -> SimClient {
    let mut client = SimClient::new().with_auto_list(true);
    let mut remaining = stock;
    let order = (HOTBAR_SIZE..INVENTORY_SIZE).chain(0..HOTBAR_SIZE);
    for index in order {
        if remaining == 0 {
            break;
        }
        let count = remaining.min(64);
        client.set_stack(index, ItemStack::new(item_id, count));
        remaining -= count;
    }
    client
}

fn spawn_stdin_reader() -> Result<mpsc::UnboundedReceiver<Input>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                if let Some(input) = Input::parse(&line) {
                    if tx.send(input).is_err() {
                        return;
                    }
                }
            }
            let _ = tx.send(Input::Quit);
        })
        .context("Failed to spawn stdin reader")?;
    Ok(rx)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_options = LogOptions::new(&cli.log_dir, "sellhelper");
    log_options.debug = cli.debug;
    log_options.console = cli.console;
    log_options.json = cli.json;
    let _guard = logging::setup_logging(&log_options)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let config = Arc::new(SharedConfig::new(ConfigManager::new(&cli.config_dir)?));
    let initial = config.get();
    tracing::info!(
        "Selling {} x{} for {} (resell: {})",
        initial.item_id,
        initial.amount,
        initial.price,
        initial.resell_mode
    );

    let scheduler =
        Arc::new(TokioScheduler::new("sellhelper-scheduler").context("Failed to start scheduler")?);
    let main_thread = Arc::new(QueuedMainThread::new());
    let classifier = services::classifier_for(&initial.phrases)
        .context("Invalid phrase pattern in sellhelper.json")?;
    let engine = CycleEngine::builder(scheduler, main_thread.clone(), config.clone())
        .classifier(classifier)
        .build();
    let ingest = EventIngest::new(engine.clone());

    let mut client = stocked_client(&initial.item_id, cli.stock);
    let latch = KeyLatch::new();
    let mut inputs = spawn_stdin_reader()?;

    tracing::info!("Simulation running, type 'toggle' to start");
    'host: loop {
        while let Ok(input) = inputs.try_recv() {
            match input {
                Input::Toggle => latch.press(),
                Input::Command(line) => {
                    let feedback = match commands::execute(&line, &client, &config) {
                        Ok(feedback) => feedback,
                        Err(e) => format!("[SellHelper] {}", e),
                    };
                    client.post_message(&feedback);
                }
                Input::Buy => match client.buy_listing() {
                    Some(sold) => {
                        tracing::info!("Buyer took {} x{}", sold.item_id, sold.count);
                        ingest.on_message(MessageChannel::Chat, SOLD_MESSAGE);
                    }
                    None => tracing::info!("Nothing listed to buy"),
                },
                Input::Full => {
                    ingest.on_message(MessageChannel::Game { overlay: false }, BLOCKED_MESSAGE)
                }
                Input::Chat(text) => ingest.on_message(MessageChannel::Chat, &text),
                Input::Quit => break 'host,
            }
        }

        ingest.on_tick(&mut &latch);
        main_thread.drain(&mut client);
        std::thread::sleep(TICK);
    }

    engine.shutdown();
    main_thread.drain(&mut client);
    tracing::info!(
        "{} stacks still listed, {} commands sent",
        client.listings().len(),
        client.commands().len()
    );
    engine.metrics().log_summary();

    Ok(())
}
