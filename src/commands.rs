//! `/sellhelper` client command surface.
//!
//! ```text
//! /sellhelper set_item [amount]
//! /sellhelper set_price <price>
//! /sellhelper resell_mode <direct|guided>
//! ```
//!
//! Every successful command persists the configuration and returns the
//! feedback line to show the player.

use crate::config::{ConfigStore, SharedConfig};
use crate::host::SlotSpace;
use crate::models::ResellMode;
use thiserror::Error;

pub const COMMAND_NAME: &str = "sellhelper";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("Not a /sellhelper command")]
    NotACommand,

    #[error("Hold the item in your hand!")]
    EmptyHand,

    #[error("Missing argument: {0}")]
    MissingArgument(&'static str),

    #[error("Amount must be a whole number of at least 1, got '{0}'")]
    InvalidAmount(String),

    #[error("Price must be a whole number of at least 0, got '{0}'")]
    InvalidPrice(String),

    #[error("Resell mode must be 'direct' or 'guided', got '{0}'")]
    InvalidResellMode(String),

    #[error("Unknown sub-command '{0}'")]
    UnknownSubcommand(String),

    #[error("Failed to save config: {0}")]
    Save(String),
}

/// Parse and run one command line. The leading slash is optional.
pub fn execute<S>(line: &str, hand: &S, config: &SharedConfig) -> Result<String, CommandError>
where
    S: SlotSpace + ?Sized,
{
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let mut args = line.split_whitespace();
    if args.next() != Some(COMMAND_NAME) {
        return Err(CommandError::NotACommand);
    }

    let subcommand = args.next().ok_or(CommandError::MissingArgument("sub-command"))?;
    match subcommand {
        "set_item" => set_item(args.next(), hand, config),
        "set_price" => set_price(args.next(), config),
        "resell_mode" => set_resell_mode(args.next(), config),
        other => Err(CommandError::UnknownSubcommand(other.to_string())),
    }
}

fn set_item<S>(amount: Option<&str>, hand: &S, config: &SharedConfig) -> Result<String, CommandError>
where
    S: SlotSpace + ?Sized,
{
    let held = hand.main_hand();
    if held.is_empty() {
        return Err(CommandError::EmptyHand);
    }

    let amount = match amount {
        None => held.count,
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) if n >= 1 => n,
            _ => return Err(CommandError::InvalidAmount(raw.to_string())),
        },
    };

    let saved = config
        .update(|c| {
            c.item_id = held.item_id.clone();
            c.amount = amount;
        })
        .map_err(|e| CommandError::Save(format!("{:#}", e)))?;

    Ok(format!("[SellHelper] Item: {} x{}", saved.item_id, saved.amount))
}

fn set_price(price: Option<&str>, config: &SharedConfig) -> Result<String, CommandError> {
    let raw = price.ok_or(CommandError::MissingArgument("price"))?;
    let price: u64 = raw
        .parse()
        .map_err(|_| CommandError::InvalidPrice(raw.to_string()))?;

    config
        .update(|c| c.price = price)
        .map_err(|e| CommandError::Save(format!("{:#}", e)))?;

    Ok(format!("[SellHelper] Price: {}", price))
}

fn set_resell_mode(mode: Option<&str>, config: &SharedConfig) -> Result<String, CommandError> {
    let raw = mode.ok_or(CommandError::MissingArgument("mode"))?;
    let mode = match raw {
        "direct" => ResellMode::Direct,
        "guided" => ResellMode::Guided,
        other => return Err(CommandError::InvalidResellMode(other.to_string())),
    };

    if config.get().resell_mode != mode {
        config
            .update(|c| c.resell_mode = mode)
            .map_err(|e| CommandError::Save(format!("{:#}", e)))?;
    }

    Ok(format!("[SellHelper] Resell mode: {}", mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::host::ItemStack;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    struct Hand(ItemStack);

    impl SlotSpace for Hand {
        fn selected_slot(&self) -> usize {
            0
        }

        fn stack(&self, _index: usize) -> ItemStack {
            self.0.clone()
        }
    }

    fn shared_config() -> (SharedConfig, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        (SharedConfig::new(ConfigManager::new(&dir).unwrap()), temp_dir)
    }

    #[test]
    fn test_set_item_uses_held_count() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::new("minecraft:diamond", 16));

        let feedback = execute("/sellhelper set_item", &hand, &config).unwrap();

        assert_eq!(feedback, "[SellHelper] Item: minecraft:diamond x16");
        assert_eq!(config.get().item_id, "minecraft:diamond");
        assert_eq!(config.get().amount, 16);
        assert_eq!(config.manager().load().unwrap().amount, 16);
    }

    #[test]
    fn test_set_item_with_amount() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::new("minecraft:diamond", 16));

        execute("sellhelper set_item 5", &hand, &config).unwrap();
        assert_eq!(config.get().amount, 5);

        assert_eq!(
            execute("/sellhelper set_item 0", &hand, &config),
            Err(CommandError::InvalidAmount("0".to_string()))
        );
        assert_eq!(config.get().amount, 5);
    }

    #[test]
    fn test_set_item_needs_held_item() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::empty());

        assert_eq!(
            execute("/sellhelper set_item", &hand, &config),
            Err(CommandError::EmptyHand)
        );
    }

    #[test]
    fn test_set_price() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::empty());

        let feedback = execute("/sellhelper set_price 1500", &hand, &config).unwrap();
        assert_eq!(feedback, "[SellHelper] Price: 1500");
        assert_eq!(config.get().price, 1500);

        assert!(matches!(
            execute("/sellhelper set_price -3", &hand, &config),
            Err(CommandError::InvalidPrice(_))
        ));
        assert_eq!(
            execute("/sellhelper set_price", &hand, &config),
            Err(CommandError::MissingArgument("price"))
        );
    }

    #[test]
    fn test_resell_mode() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::empty());

        execute("/sellhelper resell_mode guided", &hand, &config).unwrap();
        assert_eq!(config.get().resell_mode, ResellMode::Guided);
        assert!(matches!(
            execute("/sellhelper resell_mode fast", &hand, &config),
            Err(CommandError::InvalidResellMode(_))
        ));
    }

    #[test]
    fn test_other_input_rejected() {
        let (config, _dir) = shared_config();
        let hand = Hand(ItemStack::empty());

        assert_eq!(
            execute("/ah sell 100", &hand, &config),
            Err(CommandError::NotACommand)
        );
        assert_eq!(
            execute("/sellhelper list", &hand, &config),
            Err(CommandError::UnknownSubcommand("list".to_string()))
        );
        assert_eq!(
            execute("/sellhelper", &hand, &config),
            Err(CommandError::MissingArgument("sub-command"))
        );
    }
}
