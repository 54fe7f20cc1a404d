//! Configuration type definitions

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stats::STATS_INTERVAL_SECS;
use crate::transport::WG_PORT;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// UDP listen settings
    #[serde(default)]
    pub listen: ListenConfig,

    /// Tunnel interface and peer settings
    pub tunnel: TunnelConfig,

    /// Physical-link settings
    #[serde(default)]
    pub link: LinkConfig,

    /// Throughput reporting settings
    #[serde(default)]
    pub stats: StatsConfig,

    /// IPC control socket settings
    #[serde(default)]
    pub ipc: IpcConfig,

    /// Logging settings
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first
    /// offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.port == 0 {
            return Err(ConfigError::ValidationError(
                "listen.port must be nonzero".into(),
            ));
        }
        if self.tunnel.private_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "tunnel.private_key is required".into(),
            ));
        }
        if self.tunnel.peer.public_key.is_empty() {
            return Err(ConfigError::ValidationError(
                "tunnel.peer.public_key is required".into(),
            ));
        }
        if self.tunnel.mtu < 576 || self.tunnel.mtu > 1500 {
            return Err(ConfigError::ValidationError(format!(
                "tunnel.mtu {} out of range (576-1500)",
                self.tunnel.mtu
            )));
        }
        if self.tunnel.timer_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tunnel.timer_period_ms must be nonzero".into(),
            ));
        }
        if self.stats.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "stats.interval_secs must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// A complete default configuration, usable as a starting template.
    #[must_use]
    pub fn default_config() -> Self {
        Self {
            listen: ListenConfig::default(),
            tunnel: TunnelConfig::default(),
            link: LinkConfig::default(),
            stats: StatsConfig::default(),
            ipc: IpcConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// UDP listen settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Port the tunnel's UDP socket binds to
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self { port: WG_PORT }
    }
}

/// Tunnel interface and peer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Local tunnel IPv4 address
    #[serde(default = "default_tunnel_address")]
    pub address: Ipv4Addr,

    /// Local tunnel netmask
    #[serde(default = "default_tunnel_netmask")]
    pub netmask: Ipv4Addr,

    /// MTU of the virtual tunnel interface
    #[serde(default = "default_mtu")]
    pub mtu: u16,

    /// Base64-encoded x25519 private key
    #[serde(default)]
    pub private_key: String,

    /// Engine timer period in milliseconds
    #[serde(default = "default_timer_period_ms")]
    pub timer_period_ms: u64,

    /// Peer settings
    #[serde(default)]
    pub peer: PeerConfig,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            address: default_tunnel_address(),
            netmask: default_tunnel_netmask(),
            mtu: default_mtu(),
            // Sample key pair; replace with your own deployment keys.
            private_key: "kL/HdaoIlqlDmrjtIkb/0PmF+3N7eApdkrjUQvsbK0c=".into(),
            timer_period_ms: default_timer_period_ms(),
            peer: PeerConfig::default(),
        }
    }
}

impl TunnelConfig {
    /// Engine timer period as a [`Duration`].
    #[must_use]
    pub fn timer_period(&self) -> Duration {
        Duration::from_millis(self.timer_period_ms)
    }
}

/// Remote peer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerConfig {
    /// Base64-encoded x25519 public key of the peer
    #[serde(default)]
    pub public_key: String,

    /// Transport endpoint of the peer, if known up front
    #[serde(default)]
    pub endpoint: Option<SocketAddr>,

    /// Persistent keepalive interval in seconds
    #[serde(default)]
    pub keepalive: Option<u16>,

    /// Networks routed through the peer (engine policy, not enforced here)
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: Vec<String>,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            public_key: "isbaRdaRiSo5/WtqEdmpH+NrFeT1+QoLvnhVI1oFfhE=".into(),
            endpoint: Some("192.168.8.139:51820".parse().expect("valid endpoint")),
            keepalive: None,
            allowed_ips: default_allowed_ips(),
        }
    }
}

/// Physical-link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Name of the physical interface the tunnel rides on
    #[serde(default = "default_link_interface")]
    pub interface: Option<String>,

    /// Treat the link as already up at startup instead of waiting for an
    /// external connectivity notification
    #[serde(default = "default_true")]
    pub assume_up: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interface: default_link_interface(),
            assume_up: true,
        }
    }
}

/// Throughput reporting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Seconds between throughput reports
    #[serde(default = "default_stats_interval")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: STATS_INTERVAL_SECS,
        }
    }
}

impl StatsConfig {
    /// Reporting interval as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// IPC control socket settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpcConfig {
    /// Unix socket path
    #[serde(default = "default_ipc_socket")]
    pub socket_path: PathBuf,

    /// Whether the IPC server runs at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Socket file mode
    #[serde(default = "default_socket_mode")]
    pub socket_mode: u32,

    /// Maximum accepted message size in bytes
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            socket_path: default_ipc_socket(),
            enabled: true,
            socket_mode: default_socket_mode(),
            max_message_size: default_max_message_size(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("text" or "json")
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Include the target module in log lines
    #[serde(default)]
    pub target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            target: false,
        }
    }
}

fn default_port() -> u16 {
    WG_PORT
}

fn default_tunnel_address() -> Ipv4Addr {
    Ipv4Addr::new(10, 1, 1, 50)
}

fn default_tunnel_netmask() -> Ipv4Addr {
    Ipv4Addr::new(255, 255, 255, 0)
}

fn default_mtu() -> u16 {
    1420
}

fn default_timer_period_ms() -> u64 {
    crate::engine::ENGINE_TIMER_PERIOD_MS
}

fn default_allowed_ips() -> Vec<String> {
    vec!["0.0.0.0/0".into()]
}

fn default_link_interface() -> Option<String> {
    Some("wlan0".into())
}

fn default_true() -> bool {
    true
}

fn default_stats_interval() -> u64 {
    STATS_INTERVAL_SECS
}

fn default_ipc_socket() -> PathBuf {
    PathBuf::from("/run/wg-bridge.sock")
}

fn default_socket_mode() -> u32 {
    0o660
}

fn default_max_message_size() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}
