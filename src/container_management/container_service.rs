use log::info;
use std::sync::Arc;

use crate::runtime::runtime_trait::ContainerRuntime;

/// Entry point of every container operation exposed by the daemon.
///
/// The service itself is stateless: it resolves container references, checks the
/// preconditions of the requested operation and delegates to the [`ContainerRuntime`].
/// Operations live next to the concern they implement:
/// - lookup in [`locator`](super::locator)
/// - state-gated transitions in [`lifecycle`](super::lifecycle)
/// - stream attach in [`crate::attach::orchestrator`]
///
/// It is cheap to share behind an `Arc` across request handlers.
pub struct ContainerService {
    pub(crate) runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerService {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        info!("Initializing ContainerService");
        Self { runtime }
    }

    pub fn runtime(&self) -> &dyn ContainerRuntime {
        self.runtime.as_ref()
    }
}
