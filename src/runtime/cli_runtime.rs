use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::configuration::types::RuntimeConfig;
use crate::error_handling::types::RuntimeError;
use crate::runtime::runtime_trait::ContainerRuntime;
use crate::runtime::types::{
    AttachStreams, ContainerHandle, ContainerStatus, InputStream, LifecycleOptions, LogsOptions,
    OutputStream, StreamSlot,
};

/// Runtime client driving a Docker-compatible command line tool.
///
/// Works with `nerdctl` (the default), `docker` and `podman`. Every call spawns the
/// tool through `tokio::process::Command`; streaming calls pump the child's stdio
/// to and from the caller's streams until the child exits or the call is cancelled.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    binary: PathBuf,
    namespace: Option<String>,
}

/// Subset of the `inspect` output we rely on.
#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Created", default)]
    created: Option<String>,
    #[serde(rename = "State", default)]
    state: Option<InspectState>,
}

#[derive(Debug, Default, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
}

impl InspectEntry {
    fn status(&self) -> ContainerStatus {
        self.state
            .as_ref()
            .map(|state| ContainerStatus::from_state(&state.status))
            .unwrap_or(ContainerStatus::Unknown)
    }

    fn into_handle(self) -> ContainerHandle {
        let created_at = self
            .created
            .as_deref()
            .and_then(|created| DateTime::parse_from_rfc3339(created).ok())
            .map(|created| created.with_timezone(&Utc));
        let handle = ContainerHandle::new(self.id, self.name.trim_start_matches('/'));
        match created_at {
            Some(created_at) => handle.with_created_at(created_at),
            None => handle,
        }
    }
}

impl CliRuntime {
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            namespace: config.namespace.clone(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Checks whether the configured tool can be executed on this host.
    pub async fn is_available(&self) -> bool {
        let available = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false);

        debug!(
            "{} availability check: {}",
            self.binary.display(),
            available
        );
        available
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.binary);
        if let Some(namespace) = &self.namespace {
            cmd.arg("--namespace").arg(namespace);
        }
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    fn describe(&self, args: &[String]) -> String {
        format!("{} {}", self.binary.display(), args.join(" "))
    }

    async fn inspect(&self, reference: &str) -> Result<Vec<InspectEntry>, RuntimeError> {
        let args = vec![
            "inspect".to_string(),
            "--type".to_string(),
            "container".to_string(),
            reference.to_string(),
        ];
        let output = self.command(&args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if is_missing(&stderr) {
                debug!("inspect found no container for {}", reference);
                return Ok(Vec::new());
            }
            return Err(RuntimeError::CommandFailed {
                command: self.describe(&args),
                stderr,
            });
        }

        parse_inspect(&String::from_utf8_lossy(&output.stdout))
    }

    /// Runs a short-lived command to completion, classifying a missing container.
    async fn run(&self, id: &str, args: Vec<String>) -> Result<(), RuntimeError> {
        let output = self.command(&args).output().await?;
        if output.status.success() {
            debug!("`{}` succeeded", self.describe(&args));
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if is_missing(&stderr) {
            return Err(RuntimeError::NotFound(id.to_string()));
        }
        Err(RuntimeError::CommandFailed {
            command: self.describe(&args),
            stderr,
        })
    }

    async fn run_streaming(
        &self,
        cancel: &CancellationToken,
        args: Vec<String>,
        stdin: StreamSlot<InputStream>,
        stdout: StreamSlot<OutputStream>,
        stderr: StreamSlot<OutputStream>,
    ) -> Result<(), RuntimeError> {
        let command = self.describe(&args);
        let mut child = self
            .command(&args)
            .stdin(stdio_for(&stdin))
            .stdout(stdio_for(&stdout))
            .stderr(stdio_for(&stderr))
            .spawn()?;
        debug!("spawned `{}`", command);

        let stdin_pump = match (child.stdin.take(), stdin) {
            (Some(mut sink), StreamSlot::Present(mut source)) => Some(tokio::spawn(async move {
                let copied = tokio::io::copy(&mut source, &mut sink).await;
                // closing the child's stdin tells it the caller is done writing
                let _ = sink.shutdown().await;
                copied
            })),
            _ => None,
        };

        let mut pumps = JoinSet::new();
        if let (Some(source), StreamSlot::Present(sink)) = (child.stdout.take(), stdout) {
            pumps.spawn(pump(source, sink));
        }
        if let (Some(source), StreamSlot::Present(sink)) = (child.stderr.take(), stderr) {
            pumps.spawn(pump(source, sink));
        }

        let outcome = supervise(&mut child, &mut pumps, cancel).await;
        if let Some(task) = stdin_pump {
            match finish_stdin(task).await {
                Some(Ok(copied)) => debug!("forwarded {} bytes of stdin to `{}`", copied, command),
                Some(Err(e)) => debug!("stdin of `{}` failed: {}", command, e),
                None => {}
            }
        }

        let status = match outcome {
            Ok(status) => status,
            Err(e) => {
                warn!("stopping `{}`: {}", command, e);
                if let Err(kill_err) = child.kill().await {
                    debug!("kill of `{}` failed: {}", command, kill_err);
                }
                pumps.abort_all();
                return Err(e);
            }
        };

        // the child is gone, drain whatever is left in its pipes
        while let Some(joined) = pumps.join_next().await {
            flatten(joined)?;
        }

        if status.success() {
            Ok(())
        } else {
            Err(RuntimeError::Exited {
                command,
                code: status.code(),
            })
        }
    }
}

#[async_trait]
impl ContainerRuntime for CliRuntime {
    async fn search_containers(
        &self,
        reference: &str,
    ) -> Result<Vec<ContainerHandle>, RuntimeError> {
        let entries = self.inspect(reference).await?;
        Ok(entries.into_iter().map(InspectEntry::into_handle).collect())
    }

    async fn container_status(&self, container: &ContainerHandle) -> ContainerStatus {
        match self.inspect(container.id()).await {
            Ok(entries) => entries
                .first()
                .map(InspectEntry::status)
                .unwrap_or(ContainerStatus::Unknown),
            Err(e) => {
                warn!("unable to read status of {}: {}", container.id(), e);
                ContainerStatus::Unknown
            }
        }
    }

    async fn attach_container(
        &self,
        cancel: &CancellationToken,
        id: &str,
        streams: AttachStreams,
    ) -> Result<(), RuntimeError> {
        let args = attach_args(id, &streams);
        let AttachStreams {
            stdin,
            stdout,
            stderr,
            ..
        } = streams;
        self.run_streaming(cancel, args, stdin, stdout, stderr).await
    }

    async fn container_logs(
        &self,
        cancel: &CancellationToken,
        id: &str,
        options: LogsOptions,
    ) -> Result<(), RuntimeError> {
        let args = logs_args(id, &options);
        let LogsOptions { stdout, stderr, .. } = options;
        self.run_streaming(cancel, args, StreamSlot::Absent, stdout, stderr)
            .await
    }

    async fn pause_container(
        &self,
        id: &str,
        _options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.run(id, vec!["pause".to_string(), id.to_string()]).await
    }

    async fn unpause_container(
        &self,
        id: &str,
        _options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.run(id, vec!["unpause".to_string(), id.to_string()])
            .await
    }

    async fn stop_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        self.run(id, stop_args("stop", id, options)).await
    }

    async fn restart_container(
        &self,
        id: &str,
        options: &LifecycleOptions,
    ) -> Result<(), RuntimeError> {
        let options = LifecycleOptions {
            timeout: options.timeout,
            signal: None,
        };
        self.run(id, stop_args("restart", id, &options)).await
    }
}

fn parse_inspect(stdout: &str) -> Result<Vec<InspectEntry>, RuntimeError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(stdout).map_err(|e| RuntimeError::InvalidOutput(e.to_string()))
}

fn is_missing(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    stderr.contains("no such") || stderr.contains("not found")
}

fn attach_args(id: &str, streams: &AttachStreams) -> Vec<String> {
    let mut args = vec!["attach".to_string()];
    if !streams.detach_keys.is_empty() {
        args.push("--detach-keys".to_string());
        args.push(streams.detach_keys.clone());
    }
    if !streams.stdin.is_present() {
        args.push("--no-stdin".to_string());
    }
    args.push(id.to_string());
    args
}

fn logs_args(id: &str, options: &LogsOptions) -> Vec<String> {
    let mut args = vec!["logs".to_string()];
    if options.follow {
        args.push("--follow".to_string());
    }
    if !options.since.is_empty() {
        args.push("--since".to_string());
        args.push(options.since.clone());
    }
    if !options.until.is_empty() {
        args.push("--until".to_string());
        args.push(options.until.clone());
    }
    if options.timestamps {
        args.push("--timestamps".to_string());
    }
    if let Some(tail) = options.tail {
        args.push("--tail".to_string());
        args.push(tail.to_string());
    }
    args.push(id.to_string());
    args
}

fn stop_args(verb: &str, id: &str, options: &LifecycleOptions) -> Vec<String> {
    let mut args = vec![verb.to_string()];
    if let Some(timeout) = options.timeout {
        args.push("-t".to_string());
        args.push(timeout.as_secs().to_string());
    }
    if let Some(signal) = &options.signal {
        args.push("-s".to_string());
        args.push(signal.clone());
    }
    args.push(id.to_string());
    args
}

fn stdio_for<T>(slot: &StreamSlot<T>) -> Stdio {
    if slot.is_present() {
        Stdio::piped()
    } else {
        Stdio::null()
    }
}

async fn pump<R>(mut source: R, mut sink: OutputStream) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    let copied = tokio::io::copy(&mut source, &mut sink).await?;
    sink.flush().await?;
    Ok(copied)
}

/// Waits for the child while watching cancellation and the output pumps.
async fn supervise(
    child: &mut Child,
    pumps: &mut JoinSet<io::Result<u64>>,
    cancel: &CancellationToken,
) -> Result<ExitStatus, RuntimeError> {
    loop {
        tokio::select! {
            status = child.wait() => return Ok(status?),
            _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
            Some(joined) = pumps.join_next(), if !pumps.is_empty() => {
                flatten(joined)?;
            }
        }
    }
}

/// Stops the stdin pump, returning its outcome when it had already finished.
async fn finish_stdin(task: JoinHandle<io::Result<u64>>) -> Option<io::Result<u64>> {
    if !task.is_finished() {
        // the caller may keep its stdin open after the container is gone
        task.abort();
        return None;
    }
    match task.await {
        Ok(copied) => Some(copied),
        Err(e) => Some(Err(io::Error::from(e))),
    }
}

fn flatten(joined: Result<io::Result<u64>, JoinError>) -> Result<u64, RuntimeError> {
    match joined {
        Ok(copied) => Ok(copied?),
        Err(e) => Err(RuntimeError::Io(io::Error::from(e))),
    }
}
