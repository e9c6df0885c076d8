use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 2375;
pub const DEFAULT_RUNTIME_BINARY: &str = "nerdctl";

/// Settings of the container runtime client.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Docker-compatible CLI used to reach the container engine.
    pub binary: PathBuf,
    /// containerd namespace, only understood by nerdctl.
    pub namespace: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_RUNTIME_BINARY),
            namespace: None,
        }
    }
}

/// Complete daemon configuration, as read from the TOML file.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub bind_address: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub runtime: RuntimeConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
