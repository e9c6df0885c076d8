use log::{debug, error};

use super::container_service::ContainerService;
use crate::error_handling::types::{RuntimeError, ServiceError};
use crate::runtime::types::ContainerHandle;

impl ContainerService {
    /// Resolves a caller-supplied reference (id, id prefix or name) to a single container.
    ///
    /// An exact id or name match wins over prefix matches; several prefix matches make the
    /// reference ambiguous.
    pub async fn locate(&self, reference: &str) -> Result<ContainerHandle, ServiceError> {
        let mut found = match self.runtime.search_containers(reference).await {
            Ok(found) => found,
            Err(RuntimeError::NotFound(_)) => {
                debug!("no such container: {}", reference);
                return Err(ServiceError::NotFound(reference.to_string()));
            }
            Err(e) => {
                error!("failed to search container {}: {}", reference, e);
                return Err(e.into());
            }
        };

        if found.len() > 1 {
            if let Some(exact) = found
                .iter()
                .position(|c| c.id() == reference || c.name() == reference)
            {
                found = vec![found.swap_remove(exact)];
            }
        }

        match found.len() {
            0 => {
                debug!("no such container: {}", reference);
                Err(ServiceError::NotFound(reference.to_string()))
            }
            1 => {
                let container = found.remove(0);
                debug!("resolved {} to container {}", reference, container.id());
                Ok(container)
            }
            count => {
                debug!(
                    "multiple IDs found with provided prefix: {}, total containers found: {}",
                    reference, count
                );
                Err(ServiceError::Ambiguous(reference.to_string()))
            }
        }
    }
}
