//! Container runtime trait
//!
//! This module defines the `ContainerRuntime` trait, the boundary between the daemon and the
//! client library that actually talks to the container engine.
//!
//! Implementors are responsible for:
//! - Resolving container references (ids, id prefixes, names)
//! - Reporting the lifecycle status of a container
//! - Pumping stdio for attach and log replay, honoring cancellation
//! - Performing the state-changing lifecycle calls

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error_handling::types::RuntimeError;
use crate::runtime::types::{
    AttachStreams, ContainerHandle, ContainerStatus, LifecycleOptions, LogsOptions,
};

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Returns every container matching `reference`. An empty list is not an error.
    async fn search_containers(&self, reference: &str)
        -> Result<Vec<ContainerHandle>, RuntimeError>;

    /// Current status of a located container. Lookup failures read as
    /// [`ContainerStatus::Unknown`].
    async fn container_status(&self, container: &ContainerHandle) -> ContainerStatus;

    /// Attaches the given streams to the container's stdio until the session ends,
    /// the caller detaches, or `cancel` fires.
    async fn attach_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
        streams: AttachStreams,
    ) -> Result<(), RuntimeError>;

    /// Replays (and optionally follows) the container's logs into the given streams.
    async fn container_logs(
        &self,
        cancel: &CancellationToken,
        id: &str,
        options: LogsOptions,
    ) -> Result<(), RuntimeError>;

    async fn pause_container(&self, id: &str, options: &LifecycleOptions)
        -> Result<(), RuntimeError>;

    async fn unpause_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError>;

    async fn stop_container(&self, id: &str, options: &LifecycleOptions)
        -> Result<(), RuntimeError>;

    async fn restart_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError>;
}
