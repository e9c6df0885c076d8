//! In-memory runtime used by the service and web tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::error_handling::types::RuntimeError;
use crate::runtime::runtime_trait::ContainerRuntime;
use crate::runtime::types::{
    AttachStreams, ContainerHandle, ContainerStatus, LifecycleOptions, LogsOptions, OutputStream,
    StreamSlot,
};

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeCall {
    Search(String),
    Status(String),
    Attach {
        id: String,
        stdin: bool,
        stdout: bool,
        stderr: bool,
        detach_keys: String,
    },
    Logs {
        id: String,
        stdout: bool,
        stderr: bool,
        follow: bool,
        since: String,
    },
    Pause(String),
    Unpause(String),
    Stop(String, LifecycleOptions),
    Restart(String, LifecycleOptions),
}

/// Ordered record of runtime calls and acknowledgements.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Acknowledged,
    Call(RuntimeCall),
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

pub struct MockRuntime {
    containers: Vec<ContainerHandle>,
    status: ContainerStatus,
    search_error: Mutex<Option<RuntimeError>>,
    call_error: Mutex<Option<RuntimeError>>,
    stdout_bytes: Vec<u8>,
    stderr_bytes: Vec<u8>,
    journal: Journal,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self {
            containers: Vec::new(),
            status: ContainerStatus::Running,
            search_error: Mutex::new(None),
            call_error: Mutex::new(None),
            stdout_bytes: Vec::new(),
            stderr_bytes: Vec::new(),
            journal: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_container(mut self, id: &str, name: &str) -> Self {
        self.containers.push(ContainerHandle::new(id, name));
        self
    }

    pub fn with_status(mut self, status: ContainerStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_search_error(self, err: RuntimeError) -> Self {
        *self.search_error.lock().unwrap() = Some(err);
        self
    }

    /// Makes the next attach, logs or lifecycle call fail with `err`.
    pub fn with_call_error(self, err: RuntimeError) -> Self {
        *self.call_error.lock().unwrap() = Some(err);
        self
    }

    /// Bytes written to stdout and stderr by attach and logs calls.
    pub fn with_output(mut self, stdout: &[u8], stderr: &[u8]) -> Self {
        self.stdout_bytes = stdout.to_vec();
        self.stderr_bytes = stderr.to_vec();
        self
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.journal
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                Event::Call(call) => Some(call.clone()),
                Event::Acknowledged => None,
            })
            .collect()
    }

    fn record(&self, call: RuntimeCall) {
        self.journal.lock().unwrap().push(Event::Call(call));
    }

    fn outcome(&self) -> Result<(), RuntimeError> {
        match self.call_error.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn emit(
        &self,
        stdout: StreamSlot<OutputStream>,
        stderr: StreamSlot<OutputStream>,
    ) -> Result<(), RuntimeError> {
        let out = write_all(stdout, self.stdout_bytes.clone());
        let err = write_all(stderr, self.stderr_bytes.clone());
        let (out, err) = tokio::join!(out, err);
        out?;
        err?;
        Ok(())
    }
}

async fn write_all(slot: StreamSlot<OutputStream>, bytes: Vec<u8>) -> std::io::Result<()> {
    if let StreamSlot::Present(mut stream) = slot {
        // small chunks so concurrent writers really interleave
        for chunk in bytes.chunks(3) {
            stream.write_all(chunk).await?;
            tokio::task::yield_now().await;
        }
        stream.flush().await?;
    }
    Ok(())
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn search_containers(
        &self,
        reference: &str,
    ) -> Result<Vec<ContainerHandle>, RuntimeError> {
        self.record(RuntimeCall::Search(reference.to_string()));
        if let Some(err) = self.search_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self
            .containers
            .iter()
            .filter(|c| c.id().starts_with(reference) || c.name() == reference)
            .cloned()
            .collect())
    }

    async fn container_status(&self, container: &ContainerHandle) -> ContainerStatus {
        self.record(RuntimeCall::Status(container.id().to_string()));
        self.status
    }

    async fn attach_container(
        &self,
        _cancel: &CancellationToken,
        id: &str,
        streams: AttachStreams,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Attach {
            id: id.to_string(),
            stdin: streams.stdin.is_present(),
            stdout: streams.stdout.is_present(),
            stderr: streams.stderr.is_present(),
            detach_keys: streams.detach_keys.clone(),
        });
        self.outcome()?;
        self.emit(streams.stdout, streams.stderr).await
    }

    async fn container_logs(
        &self,
        _cancel: &CancellationToken,
        id: &str,
        options: LogsOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Logs {
            id: id.to_string(),
            stdout: options.stdout.is_present(),
            stderr: options.stderr.is_present(),
            follow: options.follow,
            since: options.since.clone(),
        });
        self.outcome()?;
        self.emit(options.stdout, options.stderr).await
    }

    async fn pause_container(
        &self,
        id: &str,
        _options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Pause(id.to_string()));
        self.outcome()
    }

    async fn unpause_container(
        &self,
        id: &str,
        _options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Unpause(id.to_string()));
        self.outcome()
    }

    async fn stop_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Stop(id.to_string(), options.clone()));
        self.outcome()
    }

    async fn restart_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::Restart(id.to_string(), options.clone()));
        self.outcome()
    }
}
