use std::fmt;
use std::io;

use tokio_util::sync::CancellationToken;

use crate::runtime::types::{InputStream, OutputStream, StreamSlot};

/// Completion callback of a stream provisioner.
///
/// Tells the transport that the handshake succeeded and data is about to flow (or that
/// no data will flow at all). Consumed on use, so it can only run once.
pub struct Acknowledgement(Box<dyn FnOnce() + Send>);

impl Acknowledgement {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(callback))
    }

    pub fn noop() -> Self {
        Self::new(|| {})
    }

    pub fn acknowledge(self) {
        (self.0)()
    }
}

impl fmt::Debug for Acknowledgement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Acknowledgement")
    }
}

/// Endpoints supplied by the transport for one attach call.
#[derive(Debug)]
pub struct StreamSet {
    pub stdin: StreamSlot<InputStream>,
    pub stdout: StreamSlot<OutputStream>,
    pub stderr: StreamSlot<OutputStream>,
    pub ack: Acknowledgement,
}

/// Source of the stdio endpoints of an attach call, owned by the transport layer.
///
/// The request's cancellation token is handed over so the transport can tie the
/// lifetime of its endpoints to the request.
pub trait StreamProvisioner: Send {
    fn provision(self: Box<Self>, cancel: &CancellationToken) -> io::Result<StreamSet>;
}

impl<F> StreamProvisioner for F
where
    F: FnOnce(&CancellationToken) -> io::Result<StreamSet> + Send,
{
    fn provision(self: Box<Self>, cancel: &CancellationToken) -> io::Result<StreamSet> {
        (*self)(cancel)
    }
}

/// Parameters of an attach call.
pub struct AttachOptions {
    pub use_stdin: bool,
    pub use_stdout: bool,
    pub use_stderr: bool,
    /// Frame stdout and stderr over a single stream for client-side demultiplexing.
    pub mux_streams: bool,
    /// Keep streaming: live attach, or follow the logs.
    pub stream: bool,
    /// Replay the container logs instead of attaching.
    pub logs: bool,
    pub detach_keys: String,
    pub get_streams: Box<dyn StreamProvisioner>,
}

impl AttachOptions {
    /// Options with every flag cleared: acknowledge and return without I/O.
    pub fn new(get_streams: Box<dyn StreamProvisioner>) -> Self {
        Self {
            use_stdin: false,
            use_stdout: false,
            use_stderr: false,
            mux_streams: false,
            stream: false,
            logs: false,
            detach_keys: String::new(),
            get_streams,
        }
    }
}

impl fmt::Debug for AttachOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachOptions")
            .field("use_stdin", &self.use_stdin)
            .field("use_stdout", &self.use_stdout)
            .field("use_stderr", &self.use_stderr)
            .field("mux_streams", &self.mux_streams)
            .field("stream", &self.stream)
            .field("logs", &self.logs)
            .field("detach_keys", &self.detach_keys)
            .finish_non_exhaustive()
    }
}
