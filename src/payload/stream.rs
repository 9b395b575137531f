//! In-memory byte stream fed by inbound frames.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, stream};
use tokio::{io::AsyncRead, sync::Notify};
use tokio_util::io::StreamReader;

use crate::lock;

#[derive(Debug, Default)]
struct StreamState {
    chunks: VecDeque<Bytes>,
    produced: usize,
    consumed: usize,
    finished: bool,
    cancelled: bool,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<StreamState>,
    readable: Notify,
}

/// Append-only byte buffer with an asynchronous reader.
///
/// A producer [`write`](Self::write)s chunks and calls
/// [`done_producing`](Self::done_producing) when complete. Readers consume
/// bytes in order and suspend while the buffer is empty and the producer has
/// not finished. Clones share the same buffer.
///
/// # Examples
///
/// ```
/// use streamwire::payload::PayloadStream;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let stream = PayloadStream::new();
/// stream.write(&b"hello"[..]);
/// stream.done_producing();
/// assert_eq!(&stream.read_until_end().await[..], b"hello");
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct PayloadStream {
    shared: Arc<Shared>,
}

impl PayloadStream {
    /// Create an empty, unfinished stream.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Append `bytes`. Ignored after the stream finished or was cancelled.
    pub fn write(&self, bytes: impl Into<Bytes>) {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return;
        }
        {
            let mut state = lock(&self.shared.state);
            if state.finished || state.cancelled {
                return;
            }
            state.produced += bytes.len();
            state.chunks.push_back(bytes);
        }
        self.shared.readable.notify_waiters();
    }

    /// Mark the end of the data. Pending readers drain what is buffered and
    /// then observe end of stream.
    pub fn done_producing(&self) {
        lock(&self.shared.state).finished = true;
        self.shared.readable.notify_waiters();
    }

    /// Abort the stream: buffered bytes are released and every pending or
    /// future read returns zero.
    pub fn cancel(&self) {
        {
            let mut state = lock(&self.shared.state);
            state.cancelled = true;
            state.chunks.clear();
        }
        self.shared.readable.notify_waiters();
    }

    /// Total bytes written so far.
    #[must_use]
    pub fn len(&self) -> usize { lock(&self.shared.state).produced }

    /// Whether nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Bytes handed to readers so far.
    #[must_use]
    pub fn consumed(&self) -> usize { lock(&self.shared.state).consumed }

    /// Whether the producer has called [`done_producing`](Self::done_producing).
    #[must_use]
    pub fn is_finished(&self) -> bool { lock(&self.shared.state).finished }

    /// Whether the stream was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool { lock(&self.shared.state).cancelled }

    /// Copy up to `buf.len()` bytes into `buf`.
    ///
    /// Suspends while nothing is buffered and the stream is still open.
    /// Returns zero only at the end of the stream, after cancellation, or
    /// when `buf` is empty.
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        self.next_with(|chunks| {
            let mut copied = 0;
            while copied < buf.len() {
                let Some(front) = chunks.front_mut() else {
                    break;
                };
                let n = front.len().min(buf.len() - copied);
                buf[copied..copied + n].copy_from_slice(&front[..n]);
                front.advance(n);
                if front.is_empty() {
                    chunks.pop_front();
                }
                copied += n;
            }
            copied
        })
        .await
    }

    /// Take the next buffered chunk whole, or `None` at end of stream.
    pub async fn read_chunk(&self) -> Option<Bytes> {
        let chunk = self
            .next_with(|chunks| chunks.pop_front().unwrap_or_default())
            .await;
        (!chunk.is_empty()).then_some(chunk)
    }

    /// Read everything until the producer finishes.
    ///
    /// Returns what was read before cancellation if the stream is cancelled.
    pub async fn read_until_end(&self) -> Bytes {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.read_chunk().await {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }

    /// Remove and return whatever is buffered without waiting.
    pub(crate) fn drain_buffered(&self) -> Bytes {
        let mut state = lock(&self.shared.state);
        let mut out = BytesMut::with_capacity(state.chunks.iter().map(Bytes::len).sum());
        for chunk in state.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        state.consumed += out.len();
        out.freeze()
    }

    /// Adapt this stream into an [`AsyncRead`].
    #[must_use]
    pub fn into_reader(self) -> impl AsyncRead + Send + Unpin + 'static {
        StreamReader::new(self.into_chunks())
    }

    fn into_chunks(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Unpin + 'static {
        Box::pin(stream::unfold(self, |stream| async move {
            let chunk = stream.read_chunk().await?;
            Some((Ok(chunk), stream))
        }))
    }

    /// Run `take` against the buffered chunks once data is available or the
    /// stream is terminal. `take` returning zero bytes signals end of stream.
    async fn next_with<T, F>(&self, mut take: F) -> T
    where
        F: FnMut(&mut VecDeque<Bytes>) -> T,
        T: Measured,
    {
        loop {
            let notified = self.shared.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = lock(&self.shared.state);
                if state.cancelled {
                    return T::empty();
                }
                if !state.chunks.is_empty() {
                    let value = take(&mut state.chunks);
                    state.consumed += value.measure();
                    return value;
                }
                if state.finished {
                    return T::empty();
                }
            }
            notified.await;
        }
    }
}

/// Values that report how many stream bytes they carry.
trait Measured {
    fn empty() -> Self;
    fn measure(&self) -> usize;
}

impl Measured for usize {
    fn empty() -> Self { 0 }

    fn measure(&self) -> usize { *self }
}

impl Measured for Bytes {
    fn empty() -> Self { Bytes::new() }

    fn measure(&self) -> usize { self.len() }
}
