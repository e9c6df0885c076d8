//! State-gated lifecycle transitions.
//!
//! Every operation follows the same gate: resolve the reference, read the current
//! status, then either delegate to the runtime or reject the request without touching
//! the container.
//!
//! | operation | allowed from                       | rejected with                         |
//! |-----------|------------------------------------|---------------------------------------|
//! | pause     | running                            | conflict (already paused/not running) |
//! | unpause   | paused                             | conflict (not paused)                 |
//! | stop      | running, paused                    | not modified, or conflict if unknown  |
//! | restart   | created, running, paused, stopped  | conflict (unknown state)              |

use std::fmt;
use std::str::FromStr;

use log::debug;

use super::container_service::ContainerService;
use crate::error_handling::types::ServiceError;
use crate::runtime::types::{ContainerStatus, LifecycleOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOperation {
    Pause,
    Unpause,
    Stop,
    Restart,
}

impl LifecycleOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOperation::Pause => "pause",
            LifecycleOperation::Unpause => "unpause",
            LifecycleOperation::Stop => "stop",
            LifecycleOperation::Restart => "restart",
        }
    }

    /// Statuses the operation may start from.
    pub fn allowed_from(&self) -> &'static [ContainerStatus] {
        use ContainerStatus::*;
        match self {
            LifecycleOperation::Pause => &[Running],
            LifecycleOperation::Unpause => &[Paused],
            LifecycleOperation::Stop => &[Running, Paused],
            LifecycleOperation::Restart => &[Created, Running, Paused, Stopped],
        }
    }

    /// Checks the operation against the container's current status.
    pub fn admit(&self, reference: &str, status: ContainerStatus) -> Result<(), ServiceError> {
        if self.allowed_from().contains(&status) {
            return Ok(());
        }
        Err(self.rejection(reference, status))
    }

    fn rejection(&self, reference: &str, status: ContainerStatus) -> ServiceError {
        use ContainerStatus::*;
        match self {
            LifecycleOperation::Pause if status == Paused => {
                ServiceError::Conflict(format!("container {} is already paused", reference))
            }
            LifecycleOperation::Pause => {
                ServiceError::Conflict(format!("container {} is not running", reference))
            }
            LifecycleOperation::Unpause => {
                ServiceError::Conflict(format!("container {} is not paused", reference))
            }
            LifecycleOperation::Stop if matches!(status, Created | Stopped) => {
                ServiceError::NotModified(format!("container {} is already stopped", reference))
            }
            LifecycleOperation::Stop => {
                ServiceError::Conflict(format!("container {} is not running", reference))
            }
            LifecycleOperation::Restart => {
                ServiceError::Conflict(format!("container {} is in an unknown state", reference))
            }
        }
    }
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleOperation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(LifecycleOperation::Pause),
            "unpause" => Ok(LifecycleOperation::Unpause),
            "stop" => Ok(LifecycleOperation::Stop),
            "restart" => Ok(LifecycleOperation::Restart),
            other => Err(format!("unknown lifecycle operation: {}", other)),
        }
    }
}

impl ContainerService {
    /// Runs `operation` against the referenced container.
    pub async fn apply(
        &self,
        operation: LifecycleOperation,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        self.transition(operation, reference, options).await
    }

    /// Pauses a running container.
    pub async fn pause(
        &self,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        self.transition(LifecycleOperation::Pause, reference, options)
            .await
    }

    pub async fn unpause(
        &self,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        self.transition(LifecycleOperation::Unpause, reference, options)
            .await
    }

    pub async fn stop(
        &self,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        self.transition(LifecycleOperation::Stop, reference, options)
            .await
    }

    pub async fn restart(
        &self,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        self.transition(LifecycleOperation::Restart, reference, options)
            .await
    }

    async fn transition(
        &self,
        operation: LifecycleOperation,
        reference: &str,
        options: &LifecycleOptions,
    ) -> Result<(), ServiceError> {
        let container = self.locate(reference).await?;
        let status = self.runtime.container_status(&container).await;
        debug!(
            "{} requested for container {} ({})",
            operation,
            container.id(),
            status
        );
        operation.admit(reference, status)?;

        let id = container.id();
        let result = match operation {
            LifecycleOperation::Pause => self.runtime.pause_container(id, options).await,
            LifecycleOperation::Unpause => self.runtime.unpause_container(id, options).await,
            LifecycleOperation::Stop => self.runtime.stop_container(id, options).await,
            LifecycleOperation::Restart => self.runtime.restart_container(id, options).await,
        };

        result.map_err(|e| {
            debug!("failed to {} container {}: {}", operation, reference, e);
            ServiceError::from(e)
        })
    }
}
