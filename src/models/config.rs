use serde::{Deserialize, Serialize};
use std::fmt;

/// How the failback supervisor re-lists expired auctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ResellMode {
    /// Open the listings GUI and click through the resell buttons.
    Guided,
    /// Send the resell command directly.
    Direct,
}

impl TryFrom<u8> for ResellMode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Guided),
            1 => Ok(Self::Direct),
            other => Err(format!("resellMode must be 0 or 1, got {}", other)),
        }
    }
}

impl From<ResellMode> for u8 {
    fn from(mode: ResellMode) -> Self {
        match mode {
            ResellMode::Guided => 0,
            ResellMode::Direct => 1,
        }
    }
}

impl fmt::Display for ResellMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guided => write!(f, "guided"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Sell configuration from `sellhelper.json`.
///
/// Read by the cycle engine once per decision point; a writer may replace it
/// between cycles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellConfig {
    #[serde(default = "default_item_id")]
    pub item_id: String,

    /// Units per listing. Always at least 1.
    #[serde(default = "default_amount")]
    pub amount: u32,

    #[serde(default)]
    pub price: u64,

    #[serde(default = "default_resell_mode", alias = "ahResell")]
    pub resell_mode: ResellMode,

    /// Server phrases that signal a purchase or a full listing storage.
    #[serde(default)]
    pub phrases: PhraseRules,
}

impl Default for SellConfig {
    fn default() -> Self {
        Self {
            item_id: default_item_id(),
            amount: default_amount(),
            price: 0,
            resell_mode: default_resell_mode(),
            phrases: PhraseRules::default(),
        }
    }
}

impl SellConfig {
    /// The chat command that lists the held stack at the configured price.
    pub fn sell_command(&self) -> String {
        format!("ah sell {}", self.price)
    }

    /// Clamp values a hand-edited file may have broken.
    pub fn normalized(mut self) -> Self {
        if self.amount == 0 {
            tracing::warn!("Configured amount 0 is invalid, using 1");
            self.amount = 1;
        }
        self
    }
}

fn default_item_id() -> String {
    "minecraft:air".to_string()
}

fn default_amount() -> u32 {
    1
}

fn default_resell_mode() -> ResellMode {
    ResellMode::Direct
}

/// Server phrases recognised in inbound chat.
///
/// Matching is substring based and case sensitive unless `regex` is set, in
/// which case every entry is a regular expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhraseRules {
    /// Any of these marks the listing storage as full.
    pub blocked_any: Vec<String>,

    /// All of these together mark a completed purchase.
    pub sold_all: Vec<String>,

    pub regex: bool,
}

impl Default for PhraseRules {
    fn default() -> Self {
        Self {
            blocked_any: vec![
                "Освободите хранилище".to_string(),
                "уберите предметы с продажи".to_string(),
            ],
            sold_all: vec!["У Вас купили".to_string(), "на /ah".to_string()],
            regex: false,
        }
    }
}
