use std::future::Future;
use std::sync::Arc;

use log::{error, info, warn};

use crate::configuration::types::DaemonConfig;
use crate::container_management::ContainerService;
use crate::error_handling::types::ControllerError;
use crate::runtime::CliRuntime;
use crate::web_interface::WebServer;

/// Owns the daemon configuration and wires the runtime, the service and the API server.
pub struct Controller {
    config: DaemonConfig,
}

impl Controller {
    pub fn new(config: DaemonConfig) -> Result<Self, ControllerError> {
        info!("Creating controller");
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Serves the API until Ctrl-C is received.
    pub async fn run(&self) -> Result<(), ControllerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves the API until `shutdown` resolves.
    pub async fn run_until(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ControllerError> {
        let runtime = CliRuntime::new(&self.config.runtime);
        if !runtime.is_available().await {
            error!(
                "Container runtime {} cannot be executed",
                runtime.binary().display()
            );
            return Err(ControllerError::RuntimeNotAvailable(
                runtime.binary().display().to_string(),
            ));
        }
        info!("Using container runtime {}", runtime.binary().display());

        let service = Arc::new(ContainerService::new(Arc::new(runtime)));
        let server = WebServer::new(service);
        server.start(self.config.socket_addr(), shutdown).await?;

        info!("Controller stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown requested"),
        Err(e) => {
            // without a signal handler the daemon runs until killed
            warn!("Unable to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
