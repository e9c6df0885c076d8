use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, LevelFilter};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Command-line arguments of the `harbord` daemon.
///
/// Every flag is optional: values given on the command line (or through the matching
/// environment variable) override the ones read from the configuration file, which in turn
/// override the built-in defaults of [`DaemonConfig`].
///
/// # Examples
///
/// ```
/// use clap::Parser;
/// use harbor::configuration::config::CliArgs;
///
/// let args = CliArgs::parse_from(["harbord", "--port", "2376"]);
/// let config = args.into_config().unwrap();
/// assert_eq!(config.port, 2376);
/// ```
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "harbord")]
#[command(version)]
#[command(about = "Docker-compatible container lifecycle daemon")]
pub struct CliArgs {
    /// Path of a TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <PATH>` or the `HARBORD_CONFIG` environment variable
    #[arg(short, long, env = "HARBORD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Network address the API server binds to
    #[arg(long, env = "HARBORD_BIND_ADDRESS")]
    pub bind_address: Option<IpAddr>,

    /// TCP port of the API server
    #[arg(long, env = "HARBORD_PORT")]
    pub port: Option<u16>,

    /// Docker-compatible CLI used to drive containers (nerdctl, docker, podman)
    #[arg(long, env = "HARBORD_RUNTIME_BINARY")]
    pub runtime_binary: Option<PathBuf>,

    /// containerd namespace passed to nerdctl
    #[arg(long, env = "HARBORD_NAMESPACE")]
    pub namespace: Option<String>,

    /// Log level filter (off, error, warn, info, debug, trace)
    #[arg(long, env = "HARBORD_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level debug`
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub debug: bool,
}

impl CliArgs {
    /// Builds the effective configuration: defaults, then the file, then the flags.
    pub fn into_config(self) -> Result<DaemonConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => DaemonConfig::from_file(path)?,
            None => DaemonConfig::default(),
        };

        if let Some(bind_address) = self.bind_address {
            config.bind_address = bind_address;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(binary) = self.runtime_binary {
            config.runtime.binary = binary;
        }
        if let Some(namespace) = self.namespace {
            config.runtime.namespace = Some(namespace);
        }
        if let Some(log_level) = self.log_level {
            config.log_level = log_level;
        }
        if self.debug {
            config.log_level = "debug".to_string();
        }

        config.validate()?;
        Ok(config)
    }
}

impl DaemonConfig {
    /// Reads and validates a TOML configuration file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: DaemonConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.level_filter()?;

        if self.runtime.binary.as_os_str().is_empty() {
            return Err(ConfigError::BadRuntime(
                "runtime binary must not be empty".to_string(),
            ));
        }
        if let Some(namespace) = &self.runtime.namespace {
            if namespace.trim().is_empty() {
                return Err(ConfigError::BadRuntime(
                    "namespace must not be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::BadLogLevel(self.log_level.clone()))
    }
}
