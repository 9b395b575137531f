//! Tests for the inbound frame read loop.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use bytes::Bytes;
use rstest::rstest;
use streamwire::{
    Header,
    MAX_PAYLOAD_LENGTH,
    PayloadType,
    payload::PayloadStream,
    transport::{DisconnectedEvent, PayloadReceiver, ReceiveSubscription},
};
use streamwire_testing::{ScriptedTransport, TestResult, encode_frame};
use tokio::sync::mpsc;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(1);

struct Harness {
    receiver: PayloadReceiver,
    transport: Arc<ScriptedTransport>,
    frames: mpsc::UnboundedReceiver<(Header, bool, Bytes)>,
    lookups: Arc<Mutex<Vec<Uuid>>>,
    disconnects: mpsc::UnboundedReceiver<DisconnectedEvent>,
}

/// Receiver wired to channels recording each callback.
fn harness() -> Harness {
    let receiver = PayloadReceiver::new();
    let (frame_tx, frames) = mpsc::unbounded_channel();
    let (disconnect_tx, disconnects) = mpsc::unbounded_channel();
    let lookups: Arc<Mutex<Vec<Uuid>>> = Arc::default();
    let seen = lookups.clone();
    receiver.subscribe(ReceiveSubscription {
        get_stream: Box::new(move |header: &Header| {
            seen.lock().expect("lock").push(header.id);
            header.payload_type.is_stream().then(PayloadStream::new)
        }),
        receive_action: Box::new(move |header: &Header, stream: Option<&PayloadStream>, payload: Bytes| {
            let _ = frame_tx.send((*header, stream.is_some(), payload));
        }),
    });
    receiver.set_on_disconnected(Arc::new(move |event: DisconnectedEvent| {
        let _ = disconnect_tx.send(event);
    }));
    let transport = Arc::new(ScriptedTransport::new());
    receiver
        .connect(transport.clone())
        .expect("first connect succeeds");
    Harness {
        receiver,
        transport,
        frames,
        lookups,
        disconnects,
    }
}

async fn next_frame(h: &mut Harness) -> (Header, bool, Bytes) {
    tokio::time::timeout(WAIT, h.frames.recv())
        .await
        .expect("frame delivered in time")
        .expect("frame channel open")
}

async fn next_disconnect(h: &mut Harness) -> DisconnectedEvent {
    tokio::time::timeout(WAIT, h.disconnects.recv())
        .await
        .expect("disconnect delivered in time")
        .expect("disconnect channel open")
}

#[tokio::test]
async fn frames_split_across_reads_are_reassembled() {
    let mut h = harness();
    let header = Header::new(PayloadType::Stream, Uuid::new_v4(), 5, true);
    let bytes = encode_frame(header, b"hello");
    for chunk in bytes.chunks(7) {
        h.transport.push(chunk.to_vec());
    }

    let (got, had_stream, payload) = next_frame(&mut h).await;
    assert_eq!(got, header);
    assert!(had_stream);
    assert_eq!(&payload[..], b"hello");
    assert_eq!(*h.lookups.lock().expect("lock"), vec![header.id]);
}

#[tokio::test]
async fn stream_lookup_waits_for_whole_frame() {
    let mut h = harness();
    let header = Header::new(PayloadType::Stream, Uuid::new_v4(), 4, true);
    let bytes = encode_frame(header, b"data");
    let (head, body) = bytes.split_at(bytes.len() - 2);
    h.transport.push(head.to_vec());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.lookups.lock().expect("lock").is_empty());

    h.transport.push(body.to_vec());
    let (got, ..) = next_frame(&mut h).await;
    assert_eq!(got, header);
    assert_eq!(*h.lookups.lock().expect("lock"), vec![header.id]);
}

#[tokio::test]
async fn zero_length_frames_are_delivered() {
    let mut h = harness();
    let header = Header::new(PayloadType::CancelAll, Uuid::new_v4(), 0, true);
    h.transport.push(encode_frame(header, b""));
    let (got, had_stream, payload) = next_frame(&mut h).await;
    assert_eq!(got, header);
    assert!(!had_stream);
    assert!(payload.is_empty());
}

#[tokio::test]
async fn frames_are_delivered_in_order() {
    let mut h = harness();
    let id = Uuid::new_v4();
    let mut bytes = Vec::new();
    for (i, end) in [(0u8, false), (1, false), (2, true)] {
        bytes.extend(encode_frame(Header::new(PayloadType::Stream, id, 1, end), &[i]));
    }
    h.transport.push(bytes);
    for expected in 0u8..3 {
        let (_, _, payload) = next_frame(&mut h).await;
        assert_eq!(payload[0], expected);
    }
}

#[tokio::test]
async fn peer_close_disconnects_once() -> TestResult {
    let mut h = harness();
    h.transport.finish();
    let event = next_disconnect(&mut h).await;
    assert!(event.reason.is_some());
    tokio::time::timeout(WAIT, h.receiver.wait_closed()).await?;
    assert!(h.transport.is_closed());

    h.receiver.disconnect(Some("again".into())).await;
    assert!(h.disconnects.try_recv().is_err());
    Ok(())
}

#[rstest]
#[case::malformed_header(b"not a header at all, just forty-eight bytes!!!\n".to_vec())]
#[case::truncated_header(b"A.000010.".to_vec())]
#[case::truncated_payload(encode_frame(Header::new(PayloadType::Stream, Uuid::nil(), 10, true), b"short"))]
#[case::oversized_payload(
    encode_frame(Header::new(PayloadType::Stream, Uuid::nil(), MAX_PAYLOAD_LENGTH + 1, true), b"")
)]
#[tokio::test]
async fn framing_errors_disconnect(#[case] bytes: Vec<u8>) {
    let mut h = harness();
    h.transport.push(bytes);
    h.transport.finish();
    let event = next_disconnect(&mut h).await;
    assert!(event.reason.is_some());
    assert!(h.frames.try_recv().is_err(), "no frame may be delivered");
}

#[tokio::test]
async fn local_disconnect_stops_loop() -> TestResult {
    let mut h = harness();
    h.receiver.disconnect(Some("local".into())).await;
    let event = next_disconnect(&mut h).await;
    assert_eq!(event.reason.as_deref(), Some("local"));
    tokio::time::timeout(WAIT, h.receiver.wait_closed()).await?;
    assert!(!h.receiver.is_connected());
    Ok(())
}
