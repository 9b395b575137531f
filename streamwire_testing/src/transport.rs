//! In-memory transports.

use std::{
    io,
    sync::{
        Mutex,
        MutexGuard,
        PoisonError,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use streamwire::{TransportReceiver, TransportSender};
use tokio::sync::{Notify, mpsc};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Outbound transport that records every `send` call.
///
/// Each call is stored separately so tests can assert how writes were
/// split, not just the bytes that were written.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    writes: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
    fail_after: Option<usize>,
    max_write: Option<usize>,
    written: Notify,
}

impl RecordingTransport {
    /// Transport accepting every write in full.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Transport that fails every send after `successes` successful ones.
    #[must_use]
    pub fn failing_after(successes: usize) -> Self {
        Self {
            fail_after: Some(successes),
            ..Self::default()
        }
    }

    /// Transport that accepts at most `limit` bytes per send.
    #[must_use]
    pub fn with_max_write(limit: usize) -> Self {
        Self {
            max_write: Some(limit),
            ..Self::default()
        }
    }

    /// Every successful send, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<Vec<u8>> { lock(&self.writes).clone() }

    /// All written bytes concatenated.
    #[must_use]
    pub fn bytes(&self) -> Vec<u8> { lock(&self.writes).concat() }

    /// Number of successful sends.
    #[must_use]
    pub fn write_count(&self) -> usize { lock(&self.writes).len() }

    /// Whether `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    /// Wait until at least `count` sends have succeeded.
    pub async fn wait_for_writes(&self, count: usize) {
        loop {
            let notified = self.written.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.write_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl TransportSender for RecordingTransport {
    fn is_connected(&self) -> bool { !self.is_closed() }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        if self.is_closed() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        let n = self.max_write.map_or(buf.len(), |limit| buf.len().min(limit));
        {
            let mut writes = lock(&self.writes);
            if self.fail_after.is_some_and(|limit| writes.len() >= limit) {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            writes.push(buf[..n].to_vec());
        }
        self.written.notify_waiters();
        Ok(n)
    }

    async fn close(&self) { self.closed.store(true, Ordering::Release); }
}

/// Inbound transport replaying bytes pushed by the test.
///
/// [`receive`](TransportReceiver::receive) returns pushed bytes in order,
/// splitting chunks across reads as needed, and returns zero once
/// [`finish`](Self::finish) has been called and everything was consumed.
#[derive(Debug)]
pub struct ScriptedTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    rx: tokio::sync::Mutex<(mpsc::UnboundedReceiver<Bytes>, Bytes)>,
    closed: AtomicBool,
}

impl Default for ScriptedTransport {
    fn default() -> Self { Self::new() }
}

impl ScriptedTransport {
    /// Transport with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new((rx, Bytes::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue `bytes` for a later receive.
    pub fn push(&self, bytes: impl Into<Bytes>) {
        if let Some(tx) = lock(&self.tx).as_ref() {
            let _ = tx.send(bytes.into());
        }
    }

    /// Signal end of input after the queued bytes.
    pub fn finish(&self) { lock(&self.tx).take(); }

    /// Whether `close` was called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }
}

#[async_trait]
impl TransportReceiver for ScriptedTransport {
    fn is_connected(&self) -> bool { !self.is_closed() }

    async fn receive(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut guard = self.rx.lock().await;
        let (rx, pending) = &mut *guard;
        while pending.is_empty() {
            match rx.recv().await {
                Some(chunk) => *pending = chunk,
                None => return Ok(0),
            }
        }
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        pending.advance(n);
        Ok(n)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.finish();
    }
}
