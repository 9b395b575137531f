//! Tests for the outbound frame queue.

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use rstest::rstest;
use streamwire::{
    Header,
    MAX_HEADER_LENGTH,
    MAX_PAYLOAD_LENGTH,
    PayloadType,
    SendError,
    TransportError,
    transport::{DisconnectedEvent, PayloadSender},
};
use streamwire_testing::{RecordingTransport, TestResult, decode_frames};
use tokio::{sync::oneshot, time::timeout};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(1);

fn connected(transport: RecordingTransport) -> (PayloadSender, Arc<RecordingTransport>) {
    let transport = Arc::new(transport);
    let sender = PayloadSender::new(8);
    sender
        .connect(transport.clone())
        .expect("first connect succeeds");
    (sender, transport)
}

fn stream_header(len: usize, end: bool) -> Header { Header::new(PayloadType::Stream, Uuid::new_v4(), len, end) }

#[tokio::test]
async fn header_and_payload_are_separate_writes() -> TestResult {
    let (sender, transport) = connected(RecordingTransport::new());
    let header = stream_header(3, true);
    sender.send_payload(header, &b"abc"[..], true, None).await?;
    timeout(WAIT, transport.wait_for_writes(2)).await?;

    let writes = transport.writes();
    assert_eq!(writes[0].len(), MAX_HEADER_LENGTH);
    assert_eq!(Header::decode(&writes[0])?, header);
    assert_eq!(writes[1], b"abc");
    Ok(())
}

#[tokio::test]
async fn empty_payload_writes_header_only() -> TestResult {
    let (sender, transport) = connected(RecordingTransport::new());
    let (tx, rx) = oneshot::channel::<Header>();
    sender
        .send_payload(
            stream_header(0, true),
            Bytes::new(),
            true,
            Some(Box::new(move |header| {
                let _ = tx.send(header);
            })),
        )
        .await?;
    let written = timeout(WAIT, rx).await??;
    assert_eq!(written.payload_length, 0);
    assert_eq!(transport.write_count(), 1);
    Ok(())
}

#[rstest]
#[case(&b""[..], true)]
#[case(&b"data"[..], false)]
#[tokio::test]
async fn unknown_length_derives_end_from_payload(
    #[case] payload: &'static [u8],
    #[case] expected_end: bool,
) -> TestResult {
    let (sender, transport) = connected(RecordingTransport::new());
    sender
        .send_payload(stream_header(0, !expected_end), payload, false, None)
        .await?;
    let expected_writes = if payload.is_empty() { 1 } else { 2 };
    timeout(WAIT, transport.wait_for_writes(expected_writes)).await?;
    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames[0].0.end, expected_end);
    assert_eq!(frames[0].0.payload_length, payload.len());
    Ok(())
}

#[tokio::test]
async fn frames_queued_before_connect_are_written_in_order() -> TestResult {
    let sender = PayloadSender::new(8);
    let first = stream_header(1, false);
    let second = stream_header(1, true);
    sender.send_payload(first, &b"1"[..], true, None).await?;
    sender.send_payload(second, &b"2"[..], true, None).await?;

    let transport = Arc::new(RecordingTransport::new());
    sender.connect(transport.clone())?;
    timeout(WAIT, transport.wait_for_writes(4)).await?;

    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].0, first);
    assert_eq!(frames[1].0, second);
    Ok(())
}

#[tokio::test]
async fn partial_writes_are_completed() -> TestResult {
    let (sender, transport) = connected(RecordingTransport::with_max_write(10));
    let header = stream_header(25, true);
    let payload = vec![7u8; 25];
    sender.send_payload(header, payload.clone(), true, None).await?;
    // 48-byte header in five writes, 25-byte payload in three.
    timeout(WAIT, transport.wait_for_writes(8)).await?;

    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames, vec![(header, Bytes::from(payload))]);
    Ok(())
}

#[tokio::test]
async fn write_failure_disconnects_once_and_drops_callbacks() -> TestResult {
    let (sender, transport) = connected(RecordingTransport::failing_after(0));
    let events: Arc<Mutex<Vec<DisconnectedEvent>>> = Arc::default();
    let sink = events.clone();
    sender.set_on_disconnected(Arc::new(move |event| {
        sink.lock().expect("lock").push(event);
    }));

    let (tx, rx) = oneshot::channel::<Header>();
    sender
        .send_payload(
            stream_header(1, true),
            &b"x"[..],
            true,
            Some(Box::new(move |header| {
                let _ = tx.send(header);
            })),
        )
        .await?;

    assert!(timeout(WAIT, rx).await?.is_err(), "callback must not run");
    timeout(WAIT, sender.wait_closed()).await?;
    assert!(transport.is_closed());
    assert!(!sender.is_connected());

    sender.disconnect(Some("again".into())).await;
    let events = events.lock().expect("lock");
    assert_eq!(events.len(), 1);
    assert!(events[0].reason.is_some());

    let err = sender
        .send_payload(stream_header(0, true), Bytes::new(), true, None)
        .await
        .expect_err("sender is disconnected");
    assert!(matches!(err, SendError::Disconnected));
    Ok(())
}

#[tokio::test]
async fn connect_twice_is_rejected() {
    let (sender, _transport) = connected(RecordingTransport::new());
    let err = sender
        .connect(Arc::new(RecordingTransport::new()))
        .expect_err("second connect must fail");
    assert!(matches!(err, TransportError::AlreadyConnected));
}

#[tokio::test]
async fn oversized_payload_is_rejected() {
    let sender = PayloadSender::new(1);
    let payload = vec![0u8; MAX_PAYLOAD_LENGTH + 1];
    let err = sender
        .send_payload(stream_header(payload.len(), true), payload, true, None)
        .await
        .expect_err("payload exceeds frame limit");
    assert!(matches!(err, SendError::PayloadTooLarge(n) if n == MAX_PAYLOAD_LENGTH + 1));
}

#[tokio::test]
async fn concurrent_producers_do_not_interleave() -> TestResult {
    let (sender, transport) = connected(RecordingTransport::with_max_write(7));
    let written = Arc::new(AtomicUsize::new(0));
    let mut tasks = Vec::new();
    for i in 0..4u8 {
        let sender = sender.clone();
        let written = written.clone();
        tasks.push(tokio::spawn(async move {
            let payload = vec![i; 100];
            let (tx, rx) = oneshot::channel();
            sender
                .send_payload(
                    stream_header(100, true),
                    payload,
                    true,
                    Some(Box::new(move |_| {
                        let _ = tx.send(());
                    })),
                )
                .await
                .expect("queued");
            rx.await.expect("written");
            written.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for task in tasks {
        timeout(WAIT, task).await??;
    }
    assert_eq!(written.load(Ordering::SeqCst), 4);

    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames.len(), 4);
    for (_, payload) in frames {
        assert!(payload.iter().all(|b| *b == payload[0]));
    }
    Ok(())
}
