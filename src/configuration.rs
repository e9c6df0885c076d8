pub mod config;
pub mod types;

pub use config::CliArgs;
pub use types::{DaemonConfig, RuntimeConfig};
