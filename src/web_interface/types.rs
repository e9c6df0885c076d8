use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::attach::types::{AttachOptions, StreamProvisioner};
use crate::runtime::types::LifecycleOptions;

/// API error payload
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Query of `POST /containers/{ref}/{pause,unpause,stop,restart}`
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct LifecycleQuery {
    /// Seconds to wait before killing the container.
    pub t: Option<u64>,
    pub signal: Option<String>,
}

impl LifecycleQuery {
    pub fn into_options(self) -> LifecycleOptions {
        LifecycleOptions {
            timeout: self.t.map(Duration::from_secs),
            signal: self.signal.filter(|signal| !signal.is_empty()),
        }
    }
}

/// Query of `POST /containers/{ref}/attach`
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachQuery {
    #[serde(default, deserialize_with = "flag")]
    pub stream: bool,
    #[serde(default, deserialize_with = "flag")]
    pub logs: bool,
    #[serde(default, deserialize_with = "flag")]
    pub stdin: bool,
    #[serde(default, deserialize_with = "flag")]
    pub stdout: bool,
    #[serde(default, deserialize_with = "flag")]
    pub stderr: bool,
    #[serde(default)]
    pub detach_keys: String,
}

impl AttachQuery {
    /// Attach options for the HTTP transport, which always multiplexes its output.
    pub fn into_options(self, get_streams: Box<dyn StreamProvisioner>) -> AttachOptions {
        AttachOptions {
            use_stdin: self.stdin,
            use_stdout: self.stdout,
            use_stderr: self.stderr,
            mux_streams: true,
            stream: self.stream,
            logs: self.logs,
            detach_keys: self.detach_keys,
            get_streams,
        }
    }
}

/// Docker's boolean form values: anything but empty, `0`, `no`, `false` or `none` is set.
pub fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "no" | "false" | "none"
    )
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(parse_flag(&value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_follow_docker_form_values() {
        for set in ["1", "true", "True", "yes", "t"] {
            assert!(parse_flag(set), "{}", set);
        }
        for unset in ["", "0", "false", "FALSE", "no", "none", " 0 "] {
            assert!(!parse_flag(unset), "{:?}", unset);
        }
    }

    #[test]
    fn lifecycle_query_converts_seconds() {
        let query = LifecycleQuery {
            t: Some(3),
            signal: Some(String::new()),
        };
        assert_eq!(
            query.into_options(),
            LifecycleOptions {
                timeout: Some(Duration::from_secs(3)),
                signal: None,
            }
        );
    }
}
