use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors reported by a container runtime client.
///
/// These are opaque to the service layer: apart from [`RuntimeError::NotFound`],
/// which the locator classifies, they are surfaced to the caller unmodified.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },
    #[error("`{command}` exited with {}", describe_exit(.code))]
    Exited { command: String, code: Option<i32> },
    #[error("unexpected runtime output: {0}")]
    InvalidOutput(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("runtime IO error: {0}")]
    Io(#[from] io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// Errors surfaced by the container service to the HTTP layer.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("no such container: {0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    NotModified(String),
    #[error("multiple IDs found with provided prefix: {0}")]
    Ambiguous(String),
    /// The transport could not provide the attach streams.
    #[error(transparent)]
    StreamSetup(io::Error),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::NotFound(_) | ServiceError::Runtime(RuntimeError::NotFound(_))
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid log level: {0}")]
    BadLogLevel(String),
    #[error("invalid runtime configuration: {0}")]
    BadRuntime(String),
}

#[derive(Debug, Error)]
pub enum WebError {
    #[error("unable to bind the API server: {0}")]
    Bind(#[from] warp::Error),
    #[error("invalid route pattern: {0}")]
    Pattern(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),
    #[error("web server error: {0}")]
    Web(#[from] WebError),
    #[error("container runtime `{0}` is not available")]
    RuntimeNotAvailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_errors_pass_through_service_error_display() {
        let err = ServiceError::from(RuntimeError::CommandFailed {
            command: "nerdctl pause c1".to_string(),
            stderr: "boom".to_string(),
        });
        assert_eq!(err.to_string(), "`nerdctl pause c1` failed: boom");
    }

    #[test]
    fn stream_setup_error_keeps_source_message() {
        let err = ServiceError::StreamSetup(io::Error::new(io::ErrorKind::Other, "error"));
        assert_eq!(err.to_string(), "error");
        assert!(!err.is_not_found());
    }

    #[test]
    fn runtime_not_found_counts_as_not_found() {
        assert!(ServiceError::NotFound("c1".into()).is_not_found());
        assert!(ServiceError::Runtime(RuntimeError::NotFound("c1".into())).is_not_found());
        assert!(!ServiceError::Conflict("x".into()).is_not_found());
    }

    #[test]
    fn exit_message_reports_signal_termination() {
        let err = RuntimeError::Exited {
            command: "nerdctl attach c1".to_string(),
            code: None,
        };
        assert_eq!(err.to_string(), "`nerdctl attach c1` exited with a signal");
    }
}
