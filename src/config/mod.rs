//! Configuration management
//!
//! Node settings come from an optional TOML file with environment overrides for the
//! listen address and the node id.

pub mod settings;

pub use settings::{
    Config, GeneratorSettings, GenesisSettings, MiningSettings, NodeSettings, DEFAULT_DIFFICULTY_BITS,
    DEFAULT_NODE_ADDR,
};
