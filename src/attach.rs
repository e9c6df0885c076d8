//! Attach subsystem.
//!
//! Connects a caller's stdio to a running container (or replays its logs). The transport
//! supplies the endpoints through a [`StreamProvisioner`]; when requested, stdout and
//! stderr are framed over a single stream by the [`multiplexer`].

pub mod multiplexer;
pub mod orchestrator;
pub mod types;

pub use multiplexer::{read_frame, Multiplexer, MuxWriter, StdStream};
pub use types::{Acknowledgement, AttachOptions, StreamProvisioner, StreamSet};
