//! Framing of stdout and stderr over one byte stream.
//!
//! Every write through a tagged [`MuxWriter`] becomes one frame on the shared stream:
//!
//! ```text
//! +--------+-----------+------------------------+-----------------+
//! | tag u8 | 3 x 0x00  | payload length u32 BE  | payload ...     |
//! +--------+-----------+------------------------+-----------------+
//! ```
//!
//! This is the framing Docker clients expect on non-TTY attach and logs streams.
//! Writers created from one [`Multiplexer`] may be used concurrently from different
//! tasks: a frame, once started, is written out completely before any other frame,
//! even when the underlying stream accepts it in several partial writes.
//!
//! Like `BufWriter`, a write is reported complete as soon as its frame is buffered.
//! Whichever writer polls next pushes the remainder out before its own frame, and
//! `flush` pushes out the last one.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{ready, Context, Poll, Wake, Waker};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

pub const HEADER_LEN: usize = 8;
const MAX_PAYLOAD: usize = u32::MAX as usize;

/// Logical channel carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StdStream {
    Stdin = 0,
    Stdout = 1,
    Stderr = 2,
    Systemerr = 3,
}

impl StdStream {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StdStream::Stdin),
            1 => Some(StdStream::Stdout),
            2 => Some(StdStream::Stderr),
            3 => Some(StdStream::Systemerr),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

pub fn frame_header(stream: StdStream, len: u32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0] = stream.tag();
    header[4..].copy_from_slice(&len.to_be_bytes());
    header
}

/// A frame accepted from a writer and not yet fully on the shared stream.
struct PendingFrame {
    bytes: Vec<u8>,
    written: usize,
}

impl PendingFrame {
    fn new(stream: StdStream, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&frame_header(stream, payload.len() as u32));
        bytes.extend_from_slice(payload);
        Self { bytes, written: 0 }
    }
}

/// Tasks waiting on the shared stream.
///
/// The stream keeps a single waker, so it is handed one that wakes all of them.
#[derive(Default)]
struct Waiters(Mutex<Vec<Waker>>);

impl Waiters {
    fn register(&self, waker: &Waker) {
        let mut waiters = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if !waiters.iter().any(|w| w.will_wake(waker)) {
            waiters.push(waker.clone());
        }
    }

    fn wake_all(&self) {
        let waiters = {
            let mut waiters = self.0.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *waiters)
        };
        for waker in waiters {
            waker.wake();
        }
    }
}

impl Wake for Waiters {
    fn wake(self: Arc<Self>) {
        self.wake_all();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.wake_all();
    }
}

struct Shared<W> {
    inner: W,
    pending: Option<PendingFrame>,
    waiters: Arc<Waiters>,
    fanout: Waker,
}

impl<W: AsyncWrite + Unpin> Shared<W> {
    /// Writes out the pending frame, if any.
    ///
    /// The frame is discarded when the stream fails, so the error is reported once.
    fn poll_drain(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.waiters.register(cx.waker());
        let mut fanout = Context::from_waker(&self.fanout);

        while let Some(frame) = self.pending.as_mut() {
            if frame.written == frame.bytes.len() {
                self.pending = None;
                break;
            }
            let remaining = &frame.bytes[frame.written..];
            match Pin::new(&mut self.inner).poll_write(&mut fanout, remaining) {
                Poll::Ready(Ok(0)) => {
                    self.pending = None;
                    return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
                }
                Poll::Ready(Ok(n)) => frame.written += n,
                Poll::Ready(Err(e)) => {
                    self.pending = None;
                    return Poll::Ready(Err(e));
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        Poll::Ready(Ok(()))
    }

    fn poll_flush(&mut self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        ready!(self.poll_drain(cx))?;
        let mut fanout = Context::from_waker(&self.fanout);
        Pin::new(&mut self.inner).poll_flush(&mut fanout)
    }
}

fn lock<W>(shared: &Mutex<Shared<W>>) -> MutexGuard<'_, Shared<W>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owner of the shared output stream, handing out tagged writers.
///
/// The underlying stream is closed when the multiplexer and all of its writers are dropped.
/// A frame still buffered at that point is lost, so writers flush before they go.
pub struct Multiplexer<W> {
    shared: Arc<Mutex<Shared<W>>>,
}

impl<W: AsyncWrite + Unpin> Multiplexer<W> {
    pub fn new(inner: W) -> Self {
        let waiters = Arc::new(Waiters::default());
        let fanout = Waker::from(waiters.clone());
        Self {
            shared: Arc::new(Mutex::new(Shared {
                inner,
                pending: None,
                waiters,
                fanout,
            })),
        }
    }

    pub fn writer(&self, stream: StdStream) -> MuxWriter<W> {
        MuxWriter {
            stream,
            shared: self.shared.clone(),
        }
    }
}

/// Writer tagging everything written through it with one [`StdStream`].
///
/// `Pending` means nothing from the buffer was taken, so a write future may be
/// dropped at any point and the writer used again.
pub struct MuxWriter<W> {
    stream: StdStream,
    shared: Arc<Mutex<Shared<W>>>,
}

impl<W> MuxWriter<W> {
    pub fn stream(&self) -> StdStream {
        self.stream
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for MuxWriter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let mut shared = lock(&this.shared);

        // an earlier frame, from any writer, goes out first
        ready!(shared.poll_drain(cx))?;
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }

        let payload = &buf[..buf.len().min(MAX_PAYLOAD)];
        shared.pending = Some(PendingFrame::new(this.stream, payload));
        match shared.poll_drain(cx) {
            Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
            _ => Poll::Ready(Ok(payload.len())),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        lock(&self.shared).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // the shared stream outlives a single writer
        self.poll_flush(cx)
    }
}

/// Reads the next frame, or `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<(StdStream, Vec<u8>)>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "truncated frame header",
            ));
        }
        filled += n;
    }

    let stream = StdStream::from_tag(header[0]).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unknown stream tag {}", header[0]),
        )
    })?;
    let len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some((stream, payload)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    async fn collect_frames<R: AsyncRead + Unpin>(mut reader: R) -> Vec<(StdStream, Vec<u8>)> {
        let mut frames = Vec::new();
        while let Some(frame) = read_frame(&mut reader).await.unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn header_layout() {
        assert_eq!(
            frame_header(StdStream::Stderr, 0x0102_0304),
            [2, 0, 0, 0, 1, 2, 3, 4]
        );
        assert_eq!(StdStream::from_tag(1), Some(StdStream::Stdout));
        assert_eq!(StdStream::from_tag(9), None);
    }

    #[tokio::test]
    async fn write_emits_header_then_payload() {
        let mock = tokio_test::io::Builder::new()
            .write(&frame_header(StdStream::Stdout, 5))
            .write(b"hello")
            .write(&frame_header(StdStream::Stderr, 4))
            .write(b"oops")
            .build();
        let mux = Multiplexer::new(mock);
        let mut stdout = mux.writer(StdStream::Stdout);
        let mut stderr = mux.writer(StdStream::Stderr);

        stdout.write_all(b"hello").await.unwrap();
        stderr.write_all(b"oops").await.unwrap();
    }

    #[tokio::test]
    async fn empty_write_emits_nothing() {
        let mock = tokio_test::io::Builder::new().build();
        let mux = Multiplexer::new(mock);
        let mut stdout = mux.writer(StdStream::Stdout);

        assert_eq!(stdout.write(b"").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_writers_never_interleave_frames() {
        // a tiny pipe forces partial writes in the middle of frames
        let (physical, reader) = tokio::io::duplex(7);
        let mux = Multiplexer::new(physical);

        let mut expected_out = Vec::new();
        let mut expected_err = Vec::new();
        let mut tasks = Vec::new();
        for (stream, expected) in [
            (StdStream::Stdout, &mut expected_out),
            (StdStream::Stderr, &mut expected_err),
        ] {
            let mut writer = mux.writer(stream);
            let chunks: Vec<Vec<u8>> = (0..200)
                .map(|i| {
                    let byte = if stream == StdStream::Stdout { b'o' } else { b'e' };
                    vec![byte; 1 + (i * 7) % 23]
                })
                .collect();
            for chunk in &chunks {
                expected.extend_from_slice(chunk);
            }
            tasks.push(tokio::spawn(async move {
                for chunk in chunks {
                    writer.write_all(&chunk).await.unwrap();
                }
                writer.flush().await.unwrap();
            }));
        }
        drop(mux);

        let reader_task = tokio::spawn(collect_frames(reader));
        for task in tasks {
            task.await.unwrap();
        }
        let frames = reader_task.await.unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        for (stream, payload) in frames {
            match stream {
                StdStream::Stdout => {
                    assert!(payload.iter().all(|b| *b == b'o'));
                    out.extend(payload);
                }
                StdStream::Stderr => {
                    assert!(payload.iter().all(|b| *b == b'e'));
                    err.extend(payload);
                }
                other => panic!("unexpected stream {:?}", other),
            }
        }
        assert_eq!(out, expected_out);
        assert_eq!(err, expected_err);
    }

    #[tokio::test]
    async fn dropped_writer_frame_is_completed_by_the_next_writer() {
        let (physical, reader) = tokio::io::duplex(4);
        let mux = Multiplexer::new(physical);
        let mut stdout = mux.writer(StdStream::Stdout);
        let mut stderr = mux.writer(StdStream::Stderr);

        {
            // the frame is buffered even though the pipe takes only its first bytes
            let mut write = tokio_test::task::spawn(stdout.write(b"0123456789"));
            assert!(matches!(write.poll(), Poll::Ready(Ok(10))));
        }
        drop(stdout);

        let reader_task = tokio::spawn(collect_frames(reader));
        stderr.write_all(b"xy").await.unwrap();
        stderr.flush().await.unwrap();
        drop(stderr);
        drop(mux);

        let frames = reader_task.await.unwrap();
        assert_eq!(
            frames,
            vec![
                (StdStream::Stdout, b"0123456789".to_vec()),
                (StdStream::Stderr, b"xy".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn abandoned_write_leaves_the_writer_usable() {
        let (physical, reader) = tokio::io::duplex(4);
        let mux = Multiplexer::new(physical);
        let mut stdout = mux.writer(StdStream::Stdout);
        let mut stderr = mux.writer(StdStream::Stderr);

        assert_eq!(stdout.write(b"0123456789").await.unwrap(), 10);
        {
            // the pipe is full, so this write takes nothing and is given up
            let mut write = tokio_test::task::spawn(stdout.write(b"lost"));
            assert!(write.poll().is_pending());
        }

        let reader_task = tokio::spawn(collect_frames(reader));
        assert_eq!(stdout.write(b"xy").await.unwrap(), 2);
        stdout.write_all(b"zz").await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            stderr.write_all(b"err").await?;
            stderr.flush().await
        })
        .await
        .expect("sibling writer stalled")
        .unwrap();
        drop(stdout);
        drop(stderr);
        drop(mux);

        let frames = reader_task.await.unwrap();
        assert_eq!(
            frames,
            vec![
                (StdStream::Stdout, b"0123456789".to_vec()),
                (StdStream::Stdout, b"xy".to_vec()),
                (StdStream::Stdout, b"zz".to_vec()),
                (StdStream::Stderr, b"err".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn flush_pushes_out_the_buffered_frame() {
        let mock = tokio_test::io::Builder::new()
            .write(&frame_header(StdStream::Stdout, 3))
            .wait(std::time::Duration::from_millis(10))
            .write(b"abc")
            .build();
        let mux = Multiplexer::new(mock);
        let mut stdout = mux.writer(StdStream::Stdout);

        assert_eq!(stdout.write(b"abc").await.unwrap(), 3);
        stdout.flush().await.unwrap();
    }

    #[tokio::test]
    async fn failed_stream_reports_the_error_to_the_writer() {
        let mock = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            .build();
        let mux = Multiplexer::new(mock);
        let mut stdout = mux.writer(StdStream::Stdout);

        let err = stdout.write(b"abc").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn truncated_header_is_an_error() {
        let mut reader: &[u8] = &[1, 0, 0];
        let err = read_frame(&mut reader).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let mut empty: &[u8] = &[];
        assert!(read_frame(&mut empty).await.unwrap().is_none());

        let mut bad_tag: &[u8] = &[7, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(
            read_frame(&mut bad_tag).await.unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }
}
