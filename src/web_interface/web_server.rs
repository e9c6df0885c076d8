use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::info;

use super::routes::api;
use crate::container_management::ContainerService;
use crate::error_handling::types::WebError;

/// HTTP server exposing the Docker-compatible container API
pub struct WebServer {
    service: Arc<ContainerService>,
}

impl WebServer {
    pub fn new(service: Arc<ContainerService>) -> Self {
        Self { service }
    }

    /// Serves the API on `addr` until `shutdown` resolves.
    ///
    /// In-flight requests are allowed to finish before this returns.
    pub async fn start(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WebError> {
        let routes = api(self.service.clone())?;
        let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, shutdown)?;

        info!("API server listening on http://{}", bound);
        server.await;
        info!("API server stopped");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::mock_runtime::MockRuntime;

    fn server() -> WebServer {
        WebServer::new(Arc::new(ContainerService::new(Arc::new(MockRuntime::new()))))
    }

    #[tokio::test]
    async fn start_returns_after_shutdown() {
        let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
        server().start(addr, async {}).await.unwrap();
    }

    #[tokio::test]
    async fn start_reports_bind_failure() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let err = server().start(addr, async {}).await.unwrap_err();
        assert!(matches!(err, WebError::Bind(_)));
    }
}
