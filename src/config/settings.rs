use crate::core::{Amount, GenesisAllocation, BLOCK_REWARD, DEFAULT_TRANSACTION_FEE};
use crate::error::{BlockchainError, Result};
use crate::miner::{MinerConfig, DEFAULT_NONCE_RANGE};
use crate::wallet::{PeerDirectory, PeerEntry};
use log::warn;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_DIFFICULTY_BITS: u32 = 20;
pub const DEFAULT_GENERATOR_INTERVAL_SECS: u64 = 5;
const KEY_FILENAME: &str = "node.key";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const NODE_ID_KEY: &str = "NODE_ID";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    pub address: String,
    pub data_dir: PathBuf,
    /// Defaults to `node.key` inside `data_dir`
    pub key_file: Option<PathBuf>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        NodeSettings {
            address: DEFAULT_NODE_ADDR.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            key_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningSettings {
    pub difficulty_bits: u32,
    pub nonce_range: u64,
    pub block_reward: Amount,
    pub autostart: bool,
}

impl Default for MiningSettings {
    fn default() -> Self {
        MiningSettings {
            difficulty_bits: DEFAULT_DIFFICULTY_BITS,
            nonce_range: DEFAULT_NONCE_RANGE,
            block_reward: BLOCK_REWARD,
            autostart: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSettings {
    pub interval_secs: u64,
    pub fee: Amount,
    pub autostart: bool,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        GeneratorSettings {
            interval_secs: DEFAULT_GENERATOR_INTERVAL_SECS,
            fee: DEFAULT_TRANSACTION_FEE,
            autostart: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisSettings {
    pub allocations: Vec<GenesisAllocation>,
}

/// Node configuration, read from a TOML file and overridden by `NODE_ADDRESS` / `NODE_ID`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeSettings,
    pub mining: MiningSettings,
    pub generator: GeneratorSettings,
    pub peers: Vec<PeerEntry>,
    pub genesis: GenesisSettings,
}

impl Config {
    /// Load `path` if given and present, otherwise defaults; environment overrides applied
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = match path {
            Some(path) if path.exists() => Config::from_toml_str(&fs::read_to_string(path)?)?,
            Some(path) => {
                warn!("Config file {} not found, using defaults", path.display());
                Config::default()
            }
            None => Config::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Config> {
        Ok(toml::from_str(contents)?)
    }

    /// `NODE_ADDRESS` replaces the listen address; `NODE_ID` isolates the data directory
    /// as `data/node_<id>` so several nodes can share a machine.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(address) = lookup(NODE_ADDRESS_KEY) {
            self.node.address = address;
        }
        if let Some(node_id) = lookup(NODE_ID_KEY) {
            self.node.data_dir = PathBuf::from(DEFAULT_DATA_DIR).join(format!("node_{node_id}"));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.mining.difficulty_bits > 256 {
            return Err(BlockchainError::Config(format!(
                "mining.difficulty_bits must be at most 256, got {}",
                self.mining.difficulty_bits
            )));
        }
        if self.mining.nonce_range == 0 {
            return Err(BlockchainError::Config(
                "mining.nonce_range must be positive".to_string(),
            ));
        }
        if self.generator.interval_secs == 0 {
            return Err(BlockchainError::Config(
                "generator.interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn key_file(&self) -> PathBuf {
        self.node
            .key_file
            .clone()
            .unwrap_or_else(|| self.node.data_dir.join(KEY_FILENAME))
    }

    pub fn peer_directory(&self) -> PeerDirectory {
        PeerDirectory::new(self.peers.clone())
    }

    pub fn miner_config(&self) -> MinerConfig {
        MinerConfig {
            nonce_range: self.mining.nonce_range,
            block_reward: self.mining.block_reward,
        }
    }

    pub fn generator_interval(&self) -> Duration {
        Duration::from_secs(self.generator.interval_secs)
    }

    /// Extract node ID from address (e.g., "127.0.0.1:2001" -> "2001")
    pub fn extract_node_id_from_addr(&self) -> String {
        match self.node.address.rsplit(':').next() {
            Some(port) if !port.is_empty() => port.to_string(),
            _ => "default".to_string(),
        }
    }
}
