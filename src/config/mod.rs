use crate::models::SellConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use parking_lot::RwLock;
use std::fs;

/// File name of the persisted sell configuration.
pub const CONFIG_FILE_NAME: &str = "sellhelper.json";

/// Read-mostly source of the sell configuration consumed by the engine.
///
/// `get()` returns an owned snapshot so one decision point always sees a
/// consistent record even if a writer replaces it concurrently.
pub trait ConfigStore: Send + Sync {
    fn get(&self) -> SellConfig;
}

/// Configuration manager for loading and saving `sellhelper.json`.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager rooted at `config_dir`, creating the
    /// directory if needed.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        })
    }

    /// Load the sell configuration.
    ///
    /// # Returns
    /// The loaded SellConfig, or defaults if the file doesn't exist
    pub fn load(&self) -> Result<SellConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
            return Ok(SellConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        let config: SellConfig = serde_json::from_str(&file_contents)
            .with_context(|| format!("Failed to parse config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config.normalized())
    }

    /// Load the configuration, falling back to defaults on any error.
    pub fn load_or_default(&self) -> SellConfig {
        self.load().unwrap_or_else(|e| {
            tracing::warn!("{:#}; using defaults", e);
            SellConfig::default()
        })
    }

    /// Save the sell configuration as pretty-printed JSON.
    pub fn save(&self, config: &SellConfig) -> Result<()> {
        let json =
            serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?;

        fs::write(&self.config_path, json)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}

/// Process-wide configuration store backed by a [`ConfigManager`].
///
/// Loaded lazily on the first `get()` and cached; reloaded only by
/// [`set`](Self::set) or [`reload`](Self::reload).
#[derive(Debug)]
pub struct SharedConfig {
    manager: ConfigManager,
    cached: RwLock<Option<SellConfig>>,
}

impl SharedConfig {
    pub fn new(manager: ConfigManager) -> Self {
        Self {
            manager,
            cached: RwLock::new(None),
        }
    }

    /// Replace the cached record and persist it.
    pub fn set(&self, config: SellConfig) -> Result<()> {
        let config = config.normalized();
        *self.cached.write() = Some(config.clone());
        self.manager.save(&config)
    }

    /// Apply `update` to the current record, then persist it.
    pub fn update<F>(&self, update: F) -> Result<SellConfig>
    where
        F: FnOnce(&mut SellConfig),
    {
        let mut config = self.get();
        update(&mut config);
        self.set(config.clone())?;
        Ok(config)
    }

    /// Drop the cache and read the file again.
    pub fn reload(&self) -> SellConfig {
        let config = self.manager.load_or_default();
        *self.cached.write() = Some(config.clone());
        config
    }

    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }
}

impl ConfigStore for SharedConfig {
    fn get(&self) -> SellConfig {
        if let Some(config) = self.cached.read().as_ref() {
            return config.clone();
        }

        let mut cached = self.cached.write();
        cached
            .get_or_insert_with(|| self.manager.load_or_default())
            .clone()
    }
}

/// In-memory store without persistence.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    config: RwLock<SellConfig>,
}

impl MemoryConfig {
    pub fn new(config: SellConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn set(&self, config: SellConfig) {
        *self.config.write() = config.normalized();
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self) -> SellConfig {
        self.config.read().clone()
    }
}
