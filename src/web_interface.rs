// Web Interface module root
pub mod routes;
pub mod types;
pub mod web_server;

// Re-export commonly used items
pub use routes::api;
pub use types::ApiError;
pub use web_server::WebServer;
