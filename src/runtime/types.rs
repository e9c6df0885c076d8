//! Values exchanged with a container runtime client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

/// Input side of an attach session (the caller's stdin).
pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Output side of an attach session (stdout or stderr towards the caller).
pub type OutputStream = Box<dyn AsyncWrite + Send + Unpin>;

/// One stdio channel of an attach or logs call.
///
/// `Absent` is a valid state meaning "discard this channel", it is not an error.
pub enum StreamSlot<T> {
    Present(T),
    Absent,
}

impl<T> StreamSlot<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, StreamSlot::Present(_))
    }

    /// Keeps the stream only when `wanted` is set.
    pub fn select(self, wanted: bool) -> Self {
        if wanted {
            self
        } else {
            StreamSlot::Absent
        }
    }

    /// Takes the stream out, leaving `Absent` behind.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, StreamSlot::Absent)
    }

    pub fn or(self, other: Self) -> Self {
        match self {
            StreamSlot::Present(_) => self,
            StreamSlot::Absent => other,
        }
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            StreamSlot::Present(stream) => Some(stream),
            StreamSlot::Absent => None,
        }
    }
}

impl<T> From<Option<T>> for StreamSlot<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(stream) => StreamSlot::Present(stream),
            None => StreamSlot::Absent,
        }
    }
}

impl<T> fmt::Debug for StreamSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSlot::Present(_) => write!(f, "Present"),
            StreamSlot::Absent => write!(f, "Absent"),
        }
    }
}

/// Lifecycle status of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Stopped,
    Unknown,
}

impl ContainerStatus {
    /// Maps a runtime state string (`State.Status` in inspect output).
    pub fn from_state(state: &str) -> Self {
        state.parse().unwrap_or(ContainerStatus::Unknown)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Created => "created",
            ContainerStatus::Running => "running",
            ContainerStatus::Paused => "paused",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Unknown => "unknown",
        }
    }
}

impl FromStr for ContainerStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(ContainerStatus::Created),
            // a restarting container has a live task
            "running" | "restarting" => Ok(ContainerStatus::Running),
            "paused" | "pausing" => Ok(ContainerStatus::Paused),
            "exited" | "dead" | "removing" | "stopped" => Ok(ContainerStatus::Stopped),
            "unknown" => Ok(ContainerStatus::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A container located by the runtime.
///
/// Only valid for the duration of one operation; the runtime owns the container.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerHandle {
    id: String,
    name: String,
    created_at: Option<DateTime<Utc>>,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

/// Streams handed to the runtime for a live attach.
#[derive(Debug)]
pub struct AttachStreams {
    pub stdin: StreamSlot<InputStream>,
    pub stdout: StreamSlot<OutputStream>,
    pub stderr: StreamSlot<OutputStream>,
    /// Passed through uninterpreted; the runtime owns the grammar.
    pub detach_keys: String,
}

/// Parameters of a log replay.
#[derive(Debug)]
pub struct LogsOptions {
    pub stdout: StreamSlot<OutputStream>,
    pub stderr: StreamSlot<OutputStream>,
    pub follow: bool,
    /// Empty means the whole backlog.
    pub since: String,
    /// Empty means no upper bound.
    pub until: String,
    pub timestamps: bool,
    /// `None` replays every line.
    pub tail: Option<u64>,
}

/// Options of the state-changing lifecycle calls.
///
/// Pause and unpause ignore both fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Grace period before the runtime kills the container.
    pub timeout: Option<Duration>,
    /// Signal sent to stop the container.
    pub signal: Option<String>,
}
