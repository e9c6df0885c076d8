//! Container runtime boundary.
//!
//! The daemon never talks to the container engine directly: every operation goes
//! through the [`ContainerRuntime`] trait. [`CliRuntime`] is the implementation used
//! by `harbord`, driving a Docker-compatible command line tool.

pub mod cli_runtime;
#[cfg(test)]
pub mod mock_runtime;
pub mod runtime_trait;
pub mod types;

pub use cli_runtime::CliRuntime;
pub use runtime_trait::ContainerRuntime;
pub use types::{
    AttachStreams, ContainerHandle, ContainerStatus, InputStream, LifecycleOptions, LogsOptions,
    OutputStream, StreamSlot,
};
