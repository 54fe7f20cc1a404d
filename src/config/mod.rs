//! Configuration types and loading
//!
//! JSON configuration with environment-variable overrides.

mod loader;
mod types;

pub use loader::{create_default_config, load_config, load_config_str, load_config_with_env};
pub use types::{
    Config, IpcConfig, LinkConfig, ListenConfig, LogConfig, PeerConfig, StatsConfig,
    TunnelConfig,
};
