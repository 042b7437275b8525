use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::fetcher::FetcherConfig;

pub const DEFAULT_CONFIG_PATH: &str = "gator.toml";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// User that commands act on behalf of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
    #[serde(default)]
    pub fetcher: FetcherConfig,
}

fn default_db_url() -> String {
    "sqlite:gator.db?mode=rwc".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            current_user_name: None,
            fetcher: FetcherConfig::default(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file does not exist yet.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Record `name` as the current user and persist the change.
    pub fn set_user<P: AsRef<Path>>(&mut self, name: &str, path: P) -> anyhow::Result<()> {
        self.current_user_name = Some(name.to_string());
        self.save(path)
    }
}
