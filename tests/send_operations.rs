//! Tests for message disassembly into frames.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use rstest::rstest;
use streamwire::{
    MAX_PAYLOAD_LENGTH,
    PayloadType,
    ResponseMessageStream,
    StreamingRequest,
    StreamingResponse,
    payload::{SendOperations, StreamManager},
    transport::PayloadSender,
};
use streamwire_testing::{RecordingTransport, TestResult, decode_frames};
use tokio::time::timeout;
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(1);

fn operations() -> (SendOperations, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let sender = PayloadSender::new(16);
    sender
        .connect(transport.clone())
        .expect("first connect succeeds");
    (SendOperations::new(sender), transport)
}

#[tokio::test]
async fn request_sends_descriptor_then_stream() -> TestResult {
    let (ops, transport) = operations();
    let id = Uuid::new_v4();
    let content = vec![b'x'; 250];
    let stream = ResponseMessageStream::new(content.clone());
    let mut request = StreamingRequest::post("/a/b");
    request.add_stream(stream.clone());

    timeout(WAIT, ops.send_request(id, &request)).await??;
    assert_eq!(transport.write_count(), 4);

    let frames = decode_frames(&transport.bytes());
    let (descriptor, json) = &frames[0];
    assert_eq!(descriptor.payload_type, PayloadType::Request);
    assert_eq!(descriptor.id, id);
    assert!(descriptor.end);
    let value: serde_json::Value = serde_json::from_slice(json)?;
    assert_eq!(value["verb"], "POST");
    assert_eq!(value["path"], "/a/b");
    assert_eq!(value["streams"][0]["id"], stream.id().hyphenated().to_string());
    assert_eq!(value["streams"][0]["contentType"], "text/plain");
    assert_eq!(value["streams"][0]["length"], 250);

    let (frame, body) = &frames[1];
    assert_eq!(frame.payload_type, PayloadType::Stream);
    assert_eq!(frame.id, stream.id());
    assert!(frame.end);
    assert_eq!(&body[..], &content[..]);
    Ok(())
}

#[tokio::test]
async fn small_stream_is_one_end_frame() -> TestResult {
    let (ops, transport) = operations();
    let mut response = StreamingResponse::ok();
    response.add_stream(ResponseMessageStream::new(vec![1u8; 100]));
    timeout(WAIT, ops.send_response(Uuid::new_v4(), &response)).await??;

    let frames = decode_frames(&transport.bytes());
    let content: Vec<_> = frames
        .iter()
        .filter(|(h, _)| h.payload_type == PayloadType::Stream)
        .collect();
    assert_eq!(content.len(), 1);
    assert!(content[0].0.end);
    assert_eq!(content[0].0.payload_length, 100);
    Ok(())
}

#[rstest]
#[case(0, vec![0])]
#[case(MAX_PAYLOAD_LENGTH - 1, vec![MAX_PAYLOAD_LENGTH - 1])]
#[case(MAX_PAYLOAD_LENGTH, vec![MAX_PAYLOAD_LENGTH])]
#[case(MAX_PAYLOAD_LENGTH + 1, vec![MAX_PAYLOAD_LENGTH, 1])]
#[case(2 * MAX_PAYLOAD_LENGTH, vec![MAX_PAYLOAD_LENGTH, MAX_PAYLOAD_LENGTH])]
#[tokio::test]
async fn stream_chunk_boundaries(#[case] size: usize, #[case] expected: Vec<usize>) -> TestResult {
    let (ops, transport) = operations();
    let content: Bytes = (0..size).map(|i| (i % 251) as u8).collect::<Vec<_>>().into();
    let stream = ResponseMessageStream::new(content.clone());
    let mut response = StreamingResponse::ok();
    response.add_stream(stream.clone());
    timeout(WAIT, ops.send_response(Uuid::new_v4(), &response)).await??;

    let frames: Vec<_> = decode_frames(&transport.bytes())
        .into_iter()
        .filter(|(h, _)| h.id == stream.id())
        .collect();
    let lengths: Vec<_> = frames.iter().map(|(h, _)| h.payload_length).collect();
    assert_eq!(lengths, expected);

    let ends: Vec<_> = frames.iter().map(|(h, _)| h.end).collect();
    let mut expected_ends = vec![false; expected.len()];
    if let Some(last) = expected_ends.last_mut() {
        *last = true;
    }
    assert_eq!(ends, expected_ends);

    let manager = StreamManager::new();
    let assembler = manager.get_payload_assembler(stream.id());
    for (header, payload) in frames {
        manager.on_receive(&header, payload);
    }
    assert!(assembler.is_end());
    assert_eq!(assembler.stream().read_until_end().await, content);
    Ok(())
}

#[tokio::test]
async fn large_descriptor_is_split() -> TestResult {
    let (ops, transport) = operations();
    let path = format!("/{}", "p".repeat(MAX_PAYLOAD_LENGTH));
    let id = Uuid::new_v4();
    timeout(WAIT, ops.send_request(id, &StreamingRequest::get(path.clone()))).await??;

    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|(h, _)| h.id == id && h.payload_type == PayloadType::Request));
    assert!(!frames[0].0.end);
    assert!(frames[1].0.end);
    let json: Vec<u8> = frames.iter().flat_map(|(_, p)| p.iter().copied()).collect();
    let value: serde_json::Value = serde_json::from_slice(&json)?;
    assert_eq!(value["path"], path);
    Ok(())
}

#[rstest]
#[case::all(PayloadType::CancelAll)]
#[case::stream(PayloadType::CancelStream)]
#[tokio::test]
async fn cancel_frames_are_empty(#[case] kind: PayloadType) -> TestResult {
    let (ops, transport) = operations();
    let id = Uuid::new_v4();
    let send = async {
        if kind == PayloadType::CancelAll {
            ops.send_cancel_all(id).await
        } else {
            ops.send_cancel_stream(id).await
        }
    };
    timeout(WAIT, send).await??;

    assert_eq!(transport.write_count(), 1);
    let frames = decode_frames(&transport.bytes());
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0.payload_type, kind);
    assert_eq!(frames[0].0.id, id);
    assert_eq!(frames[0].0.payload_length, 0);
    assert!(frames[0].0.end);
    Ok(())
}

#[tokio::test]
async fn disconnected_sender_fails_send() {
    let sender = PayloadSender::new(4);
    let ops = SendOperations::new(sender.clone());
    sender.disconnect(None).await;
    let result = timeout(WAIT, ops.send_cancel_all(Uuid::new_v4()))
        .await
        .expect("send resolves");
    assert!(result.is_err());
}
