pub mod attach;
pub mod configuration;
pub mod container_management;
pub mod controller;
pub mod error_handling;
pub mod runtime;
pub mod web_interface;

pub use attach::{AttachOptions, StreamProvisioner};
pub use configuration::{CliArgs, DaemonConfig};
pub use container_management::ContainerService;
pub use controller::Controller;
