// src/config.rs
// Node configuration: JSON file under the user's home plus env overrides

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const ENV_HOME: &str = "TIERFEE_HOME";
pub const ENV_API_ADDR: &str = "TIERFEE_API_ADDR";
pub const ENV_LOG: &str = "TIERFEE_LOG";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// RocksDB data directory.
    pub home: String,
    /// Listener for the query API.
    pub api_addr: String,
    /// Default `env_logger` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genesis_file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        let home = get_config_dir().join("data");
        Self {
            home: home.to_string_lossy().into_owned(),
            api_addr: "127.0.0.1:1317".to_string(),
            log_level: default_log_level(),
            genesis_file: None,
        }
    }
}

impl NodeConfig {
    /// Read the config at `path` (or the default location), writing defaults
    /// there on first run, then apply `.env` and environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(get_config_path);

        let mut config = if config_path.exists() {
            let json = fs::read_to_string(&config_path)
                .with_context(|| format!("reading config {}", config_path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing config {}", config_path.display()))?
        } else {
            let config = Self::default();
            config.save(&config_path)?;
            // logging is not set up yet; the config decides its filter
            eprintln!("wrote default config to {}", config_path.display());
            config
        };

        dotenvy::dotenv().ok();
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating config dir {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing config {}", path.display()))?;
        Ok(())
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(home) = lookup(ENV_HOME) {
            self.home = home;
        }
        if let Some(addr) = lookup(ENV_API_ADDR) {
            self.api_addr = addr;
        }
        if let Some(level) = lookup(ENV_LOG) {
            self.log_level = level;
        }
    }

    pub fn api_socket_addr(&self) -> Result<SocketAddr> {
        self.api_addr
            .parse()
            .with_context(|| format!("invalid api_addr {:?}", self.api_addr))
    }
}

pub fn get_config_dir() -> PathBuf {
    let home = if cfg!(windows) {
        std::env::var("USERPROFILE").unwrap_or_else(|_| "C:\\Users\\Default".to_string())
    } else {
        std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string())
    };
    PathBuf::from(home).join(".tierfee")
}

pub fn get_config_path() -> PathBuf {
    get_config_dir().join("config.json")
}
