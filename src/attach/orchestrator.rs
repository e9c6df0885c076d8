use log::debug;
use tokio_util::sync::CancellationToken;

use super::multiplexer::{Multiplexer, StdStream};
use super::types::{AttachOptions, StreamSet};
use crate::container_management::ContainerService;
use crate::error_handling::types::ServiceError;
use crate::runtime::types::{AttachStreams, ContainerHandle, LogsOptions, OutputStream, StreamSlot};

impl ContainerService {
    /// Connects the caller's stdio to a container, or replays its logs.
    ///
    /// The acknowledgement of the provisioned streams is delivered exactly once after a
    /// successful stream setup, before any data flows. A failing stream setup is
    /// returned as is and never acknowledged.
    pub async fn attach(
        &self,
        cancel: &CancellationToken,
        reference: &str,
        options: AttachOptions,
    ) -> Result<(), ServiceError> {
        let container = self.locate(reference).await?;
        debug!("attaching container: {}", container.id());

        let AttachOptions {
            use_stdin,
            use_stdout,
            use_stderr,
            mux_streams,
            stream,
            logs,
            detach_keys,
            get_streams,
        } = options;

        let StreamSet {
            stdin,
            mut stdout,
            mut stderr,
            ack,
        } = get_streams
            .provision(cancel)
            .map_err(ServiceError::StreamSetup)?;

        if !stream && !logs {
            ack.acknowledge();
            return Ok(());
        }

        if mux_streams {
            (stdout, stderr) = multiplex(stdout.take(), stderr.take());
        }

        let stdin = stdin.select(use_stdin);
        let stdout = stdout.select(use_stdout);
        let stderr = stderr.select(use_stderr);

        ack.acknowledge();

        if logs {
            return self
                .replay_logs(cancel, &container, stdout, stderr, stream)
                .await
                .map_err(|e| {
                    debug!("failed to stream logs for container {}: {}", reference, e);
                    e
                });
        }

        let streams = AttachStreams {
            stdin,
            stdout,
            stderr,
            detach_keys,
        };
        self.runtime
            .attach_container(cancel, container.id(), streams)
            .await
            .map_err(|e| {
                debug!("failed to attach to container {}: {}", reference, e);
                ServiceError::from(e)
            })
    }

    async fn replay_logs(
        &self,
        cancel: &CancellationToken,
        container: &ContainerHandle,
        stdout: StreamSlot<OutputStream>,
        stderr: StreamSlot<OutputStream>,
        follow: bool,
    ) -> Result<(), ServiceError> {
        // a followed replay starts from the beginning, a one-shot replay from "0s"
        let since = if follow { String::new() } else { "0s".to_string() };
        let options = LogsOptions {
            stdout,
            stderr,
            follow,
            since,
            until: String::new(),
            timestamps: false,
            tail: None,
        };

        self.runtime
            .container_logs(cancel, container.id(), options)
            .await
            .map_err(ServiceError::from)
    }
}

/// Wraps the physical output stream into tagged stdout and stderr writers.
///
/// The physical stream is stdout, or stderr when stdout is absent.
fn multiplex(
    stdout: StreamSlot<OutputStream>,
    stderr: StreamSlot<OutputStream>,
) -> (StreamSlot<OutputStream>, StreamSlot<OutputStream>) {
    match stdout.or(stderr) {
        StreamSlot::Present(physical) => {
            let mux = Multiplexer::new(physical);
            let out: OutputStream = Box::new(mux.writer(StdStream::Stdout));
            let err: OutputStream = Box::new(mux.writer(StdStream::Stderr));
            (StreamSlot::Present(out), StreamSlot::Present(err))
        }
        StreamSlot::Absent => (StreamSlot::Absent, StreamSlot::Absent),
    }
}
